//! Shared test helpers: a scriptable classifier and in-memory wiring

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use persons_api::classifier::{Classifier, ClassifierError};
use persons_api::enrichment::Enricher;
use persons_api::repository::SqlitePersonRepository;
use persons_api::service::PersonService;
use persons_api::{build_router, AppState};
use persons_common::config::DatabaseConfig;
use persons_common::db::init_database;
use persons_common::{Nationality, NewPerson};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted behaviour of one stub classifier call
#[derive(Debug, Clone)]
pub enum Reply<T> {
    /// Answer immediately with this value
    Value(T),
    /// Fail immediately with a transport error
    Fail,
    /// Fail with a transport error after a delay
    FailAfter(Duration),
    /// Never answer; only returns once cancelled
    Hang,
}

/// Classifier whose three calls follow a script and are counted
pub struct StubClassifier {
    age: Reply<i32>,
    gender: Reply<String>,
    nationalities: Reply<Vec<Nationality>>,
    /// Calls started
    pub calls: AtomicUsize,
    /// Calls that returned, whatever the outcome
    pub finished: AtomicUsize,
    /// Calls that returned because their token was cancelled
    pub cancelled: AtomicUsize,
}

impl StubClassifier {
    pub fn new(
        age: Reply<i32>,
        gender: Reply<&str>,
        nationalities: Reply<Vec<Nationality>>,
    ) -> Self {
        let gender = match gender {
            Reply::Value(g) => Reply::Value(g.to_string()),
            Reply::Fail => Reply::Fail,
            Reply::FailAfter(d) => Reply::FailAfter(d),
            Reply::Hang => Reply::Hang,
        };
        Self {
            age,
            gender,
            nationalities,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    /// age 18, male, RU 0.9 / KZ 0.05
    pub fn ivan() -> Self {
        Self::new(
            Reply::Value(18),
            Reply::Value("male"),
            Reply::Value(ivan_nationalities()),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn respond<T: Clone>(
        &self,
        reply: &Reply<T>,
        cancel: &CancellationToken,
    ) -> Result<T, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let result = match reply {
            Reply::Value(value) => Ok(value.clone()),
            Reply::Fail => Err(ClassifierError::Network("stub transport failure".to_string())),
            Reply::FailAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Err(ClassifierError::Network("stub transport failure".to_string()))
            }
            Reply::Hang => {
                cancel.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(ClassifierError::Cancelled)
            }
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn fetch_age(
        &self,
        _name: &str,
        cancel: &CancellationToken,
    ) -> Result<i32, ClassifierError> {
        self.respond(&self.age, cancel).await
    }

    async fn fetch_gender(
        &self,
        _name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ClassifierError> {
        self.respond(&self.gender, cancel).await
    }

    async fn fetch_nationalities(
        &self,
        _name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Nationality>, ClassifierError> {
        self.respond(&self.nationalities, cancel).await
    }
}

pub fn ivan_nationalities() -> Vec<Nationality> {
    vec![Nationality::new("RU", 0.9), Nationality::new("KZ", 0.05)]
}

pub fn new_person(name: &str, surname: &str) -> NewPerson {
    NewPerson {
        name: name.to_string(),
        surname: surname.to_string(),
        patronymic: None,
    }
}

/// Service over a fresh in-memory database
pub async fn setup_service(classifier: Arc<StubClassifier>) -> (Arc<PersonService>, SqlitePool) {
    let pool = init_database(&DatabaseConfig::in_memory())
        .await
        .expect("in-memory database");
    let repository = Arc::new(SqlitePersonRepository::new(pool.clone()));
    let service = Arc::new(PersonService::new(repository, Enricher::new(classifier)));
    (service, pool)
}

/// Full router over a fresh in-memory database
pub async fn setup_app(classifier: Arc<StubClassifier>) -> (Router, SqlitePool) {
    setup_app_with_timeout(classifier, Duration::from_secs(30)).await
}

pub async fn setup_app_with_timeout(
    classifier: Arc<StubClassifier>,
    request_timeout: Duration,
) -> (Router, SqlitePool) {
    let (service, pool) = setup_service(classifier).await;
    let app = build_router(AppState::new(service), request_timeout);
    (app, pool)
}

/// Wait until `finished` stub calls have returned, or give up after 5s
pub async fn wait_for_finished(classifier: &StubClassifier, finished: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while classifier.finished() < finished {
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {} of {} classifier calls finished",
            classifier.finished(),
            finished
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count query")
}
