//! Person service
//!
//! Sequences enrichment and persistence for creation and passes reads,
//! updates and deletes through to the repository. Repository and classifier
//! failures are translated into [`PersonError`] here; the HTTP layer never
//! sees a raw database or transport error.

use crate::enrichment::Enricher;
use crate::error::{PersonError, PersonResult};
use crate::repository::{PersonRepository, RepositoryError};
use persons_common::{GetFilters, NewPerson, Person, UpdateParams};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct PersonService {
    repository: Arc<dyn PersonRepository>,
    enricher: Enricher,
}

impl PersonService {
    pub fn new(repository: Arc<dyn PersonRepository>, enricher: Enricher) -> Self {
        Self {
            repository,
            enricher,
        }
    }

    /// Validate, enrich and store a new person
    ///
    /// Enrichment completes before the persistence transaction opens.
    pub async fn create(&self, person: NewPerson, cancel: &CancellationToken) -> PersonResult<i64> {
        person.validate()?;

        let enriched = self.enricher.enrich(person, cancel).await.map_err(|e| {
            warn!(attribute = %e.attribute, error = %e, "Person enrichment failed");
            PersonError::from(e)
        })?;

        let id = self
            .repository
            .create(&enriched)
            .await
            .map_err(|e| internal("create", e))?;

        info!(person_id = id, age = enriched.age, gender = %enriched.gender, "Created person");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> PersonResult<Person> {
        self.repository.get_by_id(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => PersonError::PersonNotExists,
            other => internal("get", other),
        })
    }

    /// Persons matching `filters`; no match is an empty list, not an error
    pub async fn list(&self, filters: GetFilters) -> PersonResult<Vec<Person>> {
        if filters.limit <= 0 || filters.offset < 0 {
            return Err(PersonError::InvalidInput(
                "limit must be positive and offset non-negative".to_string(),
            ));
        }

        self.repository
            .list(&filters)
            .await
            .map_err(|e| internal("list", e))
    }

    /// Replace the name parts present in `params`
    pub async fn update(&self, id: i64, params: UpdateParams) -> PersonResult<()> {
        if params.is_empty() {
            return Err(PersonError::InvalidInput("no fields to update".to_string()));
        }
        params.validate()?;

        self.get(id).await?;

        self.repository
            .update(id, &params)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => PersonError::PersonNotExists,
                other => internal("update", other),
            })?;

        info!(person_id = id, "Updated person");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> PersonResult<()> {
        self.get(id).await?;

        self.repository.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => PersonError::PersonNotExists,
            other => internal("delete", other),
        })?;

        info!(person_id = id, "Deleted person");
        Ok(())
    }
}

/// Log the underlying failure and hide it from the caller
fn internal(operation: &'static str, err: RepositoryError) -> PersonError {
    error!(operation, error = %err, "Repository operation failed");
    PersonError::InternalService
}
