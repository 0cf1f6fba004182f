//! Enrichment coordinator
//!
//! Fills in age, gender and nationalities for a [`NewPerson`] by running the
//! three classifier calls concurrently. All three futures are polled to
//! completion before [`Enricher::enrich`] returns, so no classifier work
//! outlives the call. The first failure cancels a child token shared by the
//! siblings, which makes in-flight requests stop instead of running to their
//! own timeout.

use crate::classifier::{Classifier, ClassifierError};
use persons_common::{Gender, Nationality, NewPerson, Person};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The attribute a classifier call was responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Age,
    Gender,
    Nationality,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attribute::Age => "age",
            Attribute::Gender => "gender",
            Attribute::Nationality => "nationality",
        })
    }
}

/// Enrichment failed for one attribute
#[derive(Debug, Error)]
#[error("{attribute} enrichment failed: {source}")]
pub struct EnrichmentError {
    pub attribute: Attribute,
    #[source]
    pub source: ClassifierError,
}

impl EnrichmentError {
    /// True if this attribute only failed because its call was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

/// Runs the classifiers for a person and assembles the result
pub struct Enricher {
    classifier: Arc<dyn Classifier>,
}

impl Enricher {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Populate age, gender and nationalities for `person`
    ///
    /// Cancelling `parent` cancels all outstanding classifier calls. On
    /// failure the root cause is returned: the first error that is not a
    /// cancellation, or a cancellation if that is all there is. The returned
    /// person has `id == 0`.
    pub async fn enrich(
        &self,
        person: NewPerson,
        parent: &CancellationToken,
    ) -> Result<Person, EnrichmentError> {
        let token = parent.child_token();
        let name = person.name.trim();

        debug!(name = %name, "Enriching person");

        let age = async {
            let result = self
                .classifier
                .fetch_age(name, &token)
                .await
                .and_then(validate_age);
            settle(Attribute::Age, result, &token)
        };

        let gender = async {
            let result = self
                .classifier
                .fetch_gender(name, &token)
                .await
                .and_then(validate_gender);
            settle(Attribute::Gender, result, &token)
        };

        let nationalities = async {
            let result = self
                .classifier
                .fetch_nationalities(name, &token)
                .await
                .and_then(validate_nationalities);
            settle(Attribute::Nationality, result, &token)
        };

        // Completion barrier: every future finishes before we look at results
        let (age, gender, nationalities) = tokio::join!(age, gender, nationalities);

        match (age, gender, nationalities) {
            (Ok(age), Ok(gender), Ok(nationalities)) => {
                debug!(
                    name = %name,
                    age,
                    gender = %gender,
                    nationalities = nationalities.len(),
                    "Person enriched"
                );
                Ok(Person {
                    id: 0,
                    name: person.name,
                    surname: person.surname,
                    patronymic: person.patronymic,
                    age,
                    gender,
                    nationalities,
                })
            }
            (age, gender, nationalities) => {
                let mut failures: Vec<EnrichmentError> =
                    [age.err(), gender.err(), nationalities.err()]
                        .into_iter()
                        .flatten()
                        .collect();
                let root = failures
                    .iter()
                    .position(|failure| !failure.is_cancelled())
                    .unwrap_or(0);
                Err(failures.swap_remove(root))
            }
        }
    }
}

/// Record one attribute's outcome, cancelling the siblings on failure
fn settle<T>(
    attribute: Attribute,
    result: Result<T, ClassifierError>,
    token: &CancellationToken,
) -> Result<T, EnrichmentError> {
    match result {
        Ok(value) => {
            debug!(attribute = %attribute, "Classifier succeeded");
            Ok(value)
        }
        Err(source) => {
            if source.is_cancelled() {
                debug!(attribute = %attribute, "Classifier call cancelled");
            } else {
                warn!(attribute = %attribute, error = %source, "Classifier failed");
            }
            token.cancel();
            Err(EnrichmentError { attribute, source })
        }
    }
}

fn validate_age(age: i32) -> Result<i32, ClassifierError> {
    if age < 0 {
        return Err(ClassifierError::InvalidAge(age));
    }
    Ok(age)
}

fn validate_gender(raw: String) -> Result<Gender, ClassifierError> {
    raw.parse::<Gender>()
        .map_err(|_| ClassifierError::InvalidGender(raw))
}

fn validate_nationalities(
    nationalities: Vec<Nationality>,
) -> Result<Vec<Nationality>, ClassifierError> {
    if nationalities.is_empty() {
        return Err(ClassifierError::EmptyNationalities);
    }
    if let Some(bad) = nationalities.iter().find(|n| !n.is_valid()) {
        return Err(ClassifierError::InvalidProbability {
            country: bad.country.clone(),
            probability: bad.probability,
        });
    }
    Ok(nationalities)
}
