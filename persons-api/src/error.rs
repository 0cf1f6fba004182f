//! Domain error taxonomy and its HTTP mapping

use crate::enrichment::EnrichmentError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors returned by the person service
///
/// Display strings are what clients see, so they never carry database or
/// transport details; those are logged where the error is created.
#[derive(Debug, Error)]
pub enum PersonError {
    /// Malformed body, query parameter or field value (400)
    #[error("invalid input parameters: {0}")]
    InvalidInput(String),

    /// Path id is not a positive integer (400)
    #[error("invalid ID")]
    InvalidQueryId,

    /// A classifier call failed during creation (500)
    #[error("failed to enrich person ({})", .0.attribute)]
    Enrichment(#[from] EnrichmentError),

    /// No person with the requested id (404)
    #[error("person doesn't exist")]
    PersonNotExists,

    /// Any other persistence failure (500)
    #[error("unexpected server error")]
    InternalService,

    /// The request ran past the server's deadline (504)
    #[error("request timed out")]
    RequestTimeout,
}

impl PersonError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PersonError::InvalidInput(_) | PersonError::InvalidQueryId => StatusCode::BAD_REQUEST,
            PersonError::PersonNotExists => StatusCode::NOT_FOUND,
            PersonError::Enrichment(_) | PersonError::InternalService => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PersonError::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<persons_common::Error> for PersonError {
    fn from(err: persons_common::Error) -> Self {
        match err {
            persons_common::Error::InvalidInput(msg) => PersonError::InvalidInput(msg),
            _ => PersonError::InternalService,
        }
    }
}

impl IntoResponse for PersonError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for person handlers
pub type PersonResult<T> = Result<T, PersonError>;
