//! Domain model for person records
//!
//! A [`Person`] is only ever created through enrichment: clients hand in a
//! [`NewPerson`] (names only) and the age, gender and nationality guesses
//! are filled in by the classifiers before the record is stored.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum length of a name part (in characters)
pub const NAME_MIN_LEN: usize = 2;

/// Maximum length of a name part (in characters)
pub const NAME_MAX_LEN: usize = 64;

/// Gender as reported by the gender classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Textual form used in JSON, query strings and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(Error::InvalidInput(format!("unknown gender '{}'", other))),
        }
    }
}

/// One nationality guess: country code plus probability in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nationality {
    /// ISO 3166-1 alpha-2 country code
    #[serde(rename = "country_id")]
    pub country: String,
    pub probability: f64,
}

impl Nationality {
    pub fn new(country: impl Into<String>, probability: f64) -> Self {
        Self {
            country: country.into(),
            probability,
        }
    }

    /// Non-empty country code and a probability within [0, 1]
    pub fn is_valid(&self) -> bool {
        !self.country.trim().is_empty() && (0.0..=1.0).contains(&self.probability)
    }
}

/// A stored (or about to be stored) person record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Store-assigned id; 0 before the record is persisted
    pub id: i64,
    pub name: String,
    pub surname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
    pub age: i32,
    pub gender: Gender,
    #[serde(rename = "nationalize")]
    pub nationalities: Vec<Nationality>,
}

/// Client-supplied part of a person, before enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
}

impl NewPerson {
    /// Validate name parts
    pub fn validate(&self) -> Result<()> {
        validate_name_part("name", &self.name)?;
        validate_name_part("surname", &self.surname)?;
        if let Some(patronymic) = &self.patronymic {
            validate_name_part("patronymic", patronymic)?;
        }
        Ok(())
    }
}

/// Sparse update of a person's name parts
///
/// Absent fields are left untouched. Age, gender and nationalities are
/// immutable after creation and have no counterpart here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateParams {
    pub name: Option<String>,
    pub surname: Option<String>,
    /// `Some(None)` clears the stored patronymic
    pub patronymic: Option<Option<String>>,
}

impl UpdateParams {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.surname.is_none() && self.patronymic.is_none()
    }

    /// Validate every present field
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name_part("name", name)?;
        }
        if let Some(surname) = &self.surname {
            validate_name_part("surname", surname)?;
        }
        if let Some(Some(patronymic)) = &self.patronymic {
            validate_name_part("patronymic", patronymic)?;
        }
        Ok(())
    }
}

/// Exact-match filters for listing persons
///
/// Each present field adds one equality predicate; absent fields do not
/// affect the query. `limit`/`offset` always apply.
#[derive(Debug, Clone, PartialEq)]
pub struct GetFilters {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub patronymic: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    /// Country code the person must have among its nationality guesses
    pub nationality: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for GetFilters {
    fn default() -> Self {
        Self {
            name: None,
            surname: None,
            patronymic: None,
            age: None,
            gender: None,
            nationality: None,
            limit: 5,
            offset: 0,
        }
    }
}

/// Check a name part is between [`NAME_MIN_LEN`] and [`NAME_MAX_LEN`] characters
pub fn validate_name_part(field: &str, value: &str) -> Result<()> {
    let len = value.trim().chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "{} must be between {} and {} characters",
            field, NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(())
}
