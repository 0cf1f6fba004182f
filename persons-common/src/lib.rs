//! # Persons Common Library
//!
//! Shared code for the persons service:
//! - Domain model (person, nationality, filters and update params)
//! - Bootstrap configuration loading
//! - Database initialization and schema
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Gender, GetFilters, Nationality, NewPerson, Person, UpdateParams};
