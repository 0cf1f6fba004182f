//! HTTP API handlers for persons-api

pub mod health;
pub mod persons;
pub mod request;

pub use health::health_routes;
pub use persons::person_routes;
