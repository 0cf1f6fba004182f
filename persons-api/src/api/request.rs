//! Request payloads and query-string decoding
//!
//! Empty strings count as absent, so `?name=` and `{"patronymic": ""}` on
//! create behave like the field was never sent. On update a patronymic of
//! `null` or `""` clears the stored value.

use crate::error::PersonError;
use persons_common::{Gender, GetFilters, NewPerson, UpdateParams};
use serde::{Deserialize, Deserializer};

/// Page size when `limit` is not given
pub const DEFAULT_LIMIT: i64 = 5;

/// Largest accepted `limit`
pub const MAX_LIMIT: i64 = 100;

/// Body of `POST /api/v1/persons`
///
/// Age, gender and nationality are not accepted here: they only ever come
/// from the classifiers.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePersonRequest {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
}

impl CreatePersonRequest {
    pub fn into_new_person(self) -> NewPerson {
        NewPerson {
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            patronymic: present(self.patronymic),
        }
    }
}

/// Body of `PATCH /api/v1/persons/:id`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePersonRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    /// Outer `None` when the key is missing, `Some(None)` for an explicit null
    #[serde(default, deserialize_with = "explicit_null")]
    pub patronymic: Option<Option<String>>,
}

impl UpdatePersonRequest {
    pub fn into_params(self) -> UpdateParams {
        UpdateParams {
            name: present(self.name),
            surname: present(self.surname),
            patronymic: self.patronymic.map(present),
        }
    }
}

/// Keep a JSON `null` distinct from a missing key
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Query string of `GET /api/v1/persons`
///
/// Values are taken as strings and parsed by hand so that a bad value
/// produces the usual JSON error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct ListPersonsQuery {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub patronymic: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub nationalize: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

impl ListPersonsQuery {
    pub fn into_filters(self) -> Result<GetFilters, PersonError> {
        let age = match present(self.age) {
            Some(raw) => match raw.parse::<i32>() {
                Ok(age) if age >= 0 => Some(age),
                _ => return Err(invalid("age must be a non-negative integer")),
            },
            None => None,
        };

        let gender = match present(self.gender) {
            Some(raw) => Some(
                raw.parse::<Gender>()
                    .map_err(|_| invalid("gender must be 'male' or 'female'"))?,
            ),
            None => None,
        };

        let limit = match present(self.limit) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
                _ => {
                    return Err(PersonError::InvalidInput(format!(
                        "limit must be between 1 and {}",
                        MAX_LIMIT
                    )))
                }
            },
            None => DEFAULT_LIMIT,
        };

        let page = match present(self.page) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(invalid("page must be a positive integer")),
            },
            None => 1,
        };

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| invalid("page is out of range"))?;

        Ok(GetFilters {
            name: present(self.name),
            surname: present(self.surname),
            patronymic: present(self.patronymic),
            age,
            gender,
            nationality: present(self.nationalize).map(|c| c.to_uppercase()),
            limit,
            offset,
        })
    }
}

/// Parse a path id; anything but a positive integer is rejected
pub fn parse_id(raw: &str) -> Result<i64, PersonError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PersonError::InvalidQueryId),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(msg: &str) -> PersonError {
    PersonError::InvalidInput(msg.to_string())
}
