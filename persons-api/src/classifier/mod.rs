//! Name classifier clients
//!
//! Three independent remote services infer a person's age, gender and
//! nationality distribution from a first name. The [`Classifier`] trait is
//! the seam between the enrichment coordinator and the network.

pub mod http;

pub use http::HttpClassifier;

use async_trait::async_trait;
use persons_common::Nationality;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Classifier call errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier returned status {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The service answered but had no value for this name
    #[error("Classifier returned no '{0}' for this name")]
    MissingField(&'static str),

    #[error("Classifier returned no nationalities")]
    EmptyNationalities,

    #[error("Unsupported gender '{0}'")]
    InvalidGender(String),

    #[error("Negative age {0}")]
    InvalidAge(i32),

    #[error("Probability {probability} for {country} is outside [0, 1]")]
    InvalidProbability { country: String, probability: f64 },

    #[error("Request cancelled")]
    Cancelled,
}

impl ClassifierError {
    /// True if the call was stopped by its cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClassifierError::Cancelled)
    }
}

/// Name-based attribute inference
///
/// Each method issues exactly one outbound request, never retries, and
/// returns [`ClassifierError::Cancelled`] promptly once `cancel` fires.
/// Values are returned as reported; validation is the caller's job.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Estimated age for `name`
    async fn fetch_age(&self, name: &str, cancel: &CancellationToken)
        -> Result<i32, ClassifierError>;

    /// Estimated gender for `name`, as the raw string the service reported
    async fn fetch_gender(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ClassifierError>;

    /// Country distribution for `name` (possibly empty)
    async fn fetch_nationalities(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Nationality>, ClassifierError>;
}
