//! HTTP classifier client
//!
//! Talks to agify/genderize/nationalize-compatible endpoints: `GET
//! <url>?name=<name>` returning a JSON object. One shared `reqwest::Client`
//! carries the per-request timeout.

use super::{Classifier, ClassifierError};
use async_trait::async_trait;
use persons_common::config::ClassifierConfig;
use persons_common::Nationality;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// User-Agent sent with every classifier request
const USER_AGENT: &str = concat!("persons-api/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in [`ClassifierError::Status`]
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Deserialize)]
struct AgeResponse {
    age: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GenderResponse {
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NationalityResponse {
    #[serde(default)]
    country: Vec<Nationality>,
}

/// Classifier backed by the three remote HTTP services
pub struct HttpClassifier {
    http_client: reqwest::Client,
    age_url: String,
    gender_url: String,
    nationality_url: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            age_url: config.age_url.clone(),
            gender_url: config.gender_url.clone(),
            nationality_url: config.nationality_url.clone(),
        })
    }

    /// Issue one GET and decode the body, giving up as soon as `cancel` fires
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ClassifierError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %url, "Classifier request cancelled");
                Err(ClassifierError::Cancelled)
            }
            result = self.request(url, name) => result,
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        url: &str,
        name: &str,
    ) -> Result<T, ClassifierError> {
        debug!(url = %url, name = %name, "Querying classifier");

        let response = self
            .http_client
            .get(url)
            .query(&[("name", name)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ClassifierError::Status(status.as_u16(), body));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ClassifierError::Timeout
            } else {
                ClassifierError::Parse(e.to_string())
            }
        })
    }
}

fn transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Network(e.to_string())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn fetch_age(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<i32, ClassifierError> {
        let response: AgeResponse = self.get_json(&self.age_url, name, cancel).await?;
        response.age.ok_or(ClassifierError::MissingField("age"))
    }

    async fn fetch_gender(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ClassifierError> {
        let response: GenderResponse = self.get_json(&self.gender_url, name, cancel).await?;
        response.gender.ok_or(ClassifierError::MissingField("gender"))
    }

    async fn fetch_nationalities(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Nationality>, ClassifierError> {
        let response: NationalityResponse =
            self.get_json(&self.nationality_url, name, cancel).await?;
        Ok(response.country)
    }
}
