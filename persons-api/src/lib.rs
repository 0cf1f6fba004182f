//! persons-api library
//!
//! REST service for person records enriched by three name classifiers
//! (age, gender, nationality). The binary in `main.rs` wires these pieces
//! together; tests build the same router around stub collaborators.

use axum::error_handling::HandleErrorLayer;
use axum::{BoxError, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub mod api;
pub mod classifier;
pub mod enrichment;
pub mod error;
pub mod repository;
pub mod service;

pub use error::{PersonError, PersonResult};

use service::PersonService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PersonService>,
    /// When the service started, for the health endpoint's uptime
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<PersonService>) -> Self {
        Self {
            service,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Every request is traced and bounded by `request_timeout`. A request that
/// runs past the deadline is dropped and answered with
/// [`PersonError::RequestTimeout`].
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(api::person_routes())
        .merge(api::health_routes())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn middleware errors into the usual JSON error envelope
async fn handle_middleware_error(err: BoxError) -> PersonError {
    if err.is::<Elapsed>() {
        warn!("Request exceeded its deadline");
        PersonError::RequestTimeout
    } else {
        error!(error = %err, "Unhandled middleware error");
        PersonError::InternalService
    }
}
