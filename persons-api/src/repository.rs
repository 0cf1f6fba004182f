//! Persistence layer
//!
//! A person is stored as one `person` row plus one `person_nationality` row
//! per nationality guess. Every multi-statement write runs in a single
//! transaction; dropping an uncommitted transaction rolls it back, so an
//! early `?` return never leaves a half-written person behind.

use async_trait::async_trait;
use persons_common::{Gender, GetFilters, Nationality, Person, UpdateParams};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Persistence errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Person {0} not found")]
    NotFound(i64),

    /// Update requested with no fields set
    #[error("No fields to update")]
    NothingToUpdate,

    /// A stored row could not be turned back into a [`Person`]
    #[error("Corrupt person row: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for person records
#[async_trait]
pub trait PersonRepository: Send + Sync {
    /// Insert a person with its nationalities atomically, returning the new id
    async fn create(&self, person: &Person) -> Result<i64, RepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<Person, RepositoryError>;

    /// One page of persons matching every present filter, ordered by id
    async fn list(&self, filters: &GetFilters) -> Result<Vec<Person>, RepositoryError>;

    /// Replace the name parts present in `params`
    async fn update(&self, id: i64, params: &UpdateParams) -> Result<(), RepositoryError>;

    /// Remove a person and its nationalities
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}

/// One row of `person LEFT JOIN person_nationality`
#[derive(Debug, FromRow)]
struct PersonRow {
    id: i64,
    name: String,
    surname: String,
    patronymic: Option<String>,
    age: i32,
    gender: String,
    country: Option<String>,
    probability: Option<f64>,
}

impl PersonRow {
    /// The person part of the row, without nationalities
    fn to_person(&self) -> Result<Person, RepositoryError> {
        let gender: Gender = self.gender.parse().map_err(|_| {
            RepositoryError::Decode(format!(
                "person {} has unknown gender '{}'",
                self.id, self.gender
            ))
        })?;

        Ok(Person {
            id: self.id,
            name: self.name.clone(),
            surname: self.surname.clone(),
            patronymic: self.patronymic.clone(),
            age: self.age,
            gender,
            nationalities: Vec::new(),
        })
    }
}

const JOINED_COLUMNS: &str =
    "p.id, p.name, p.surname, p.patronymic, p.age, p.gender, n.country, n.probability";

/// SQLite-backed [`PersonRepository`]
pub struct SqlitePersonRepository {
    pool: SqlitePool,
}

impl SqlitePersonRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonRepository for SqlitePersonRepository {
    async fn create(&self, person: &Person) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO person (name, surname, patronymic, age, gender)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&person.name)
        .bind(&person.surname)
        .bind(&person.patronymic)
        .bind(person.age)
        .bind(person.gender.as_str())
        .fetch_one(&mut *tx)
        .await?;

        debug!(person_id = id, "Inserted person row");

        if let Some(mut insert) = nationality_insert(id, &person.nationalities) {
            insert.build().execute(&mut *tx).await?;
            debug!(
                person_id = id,
                count = person.nationalities.len(),
                "Inserted nationality rows"
            );
        }

        tx.commit().await?;

        debug!(person_id = id, "Committed person");

        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Person, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {JOINED_COLUMNS}
            FROM person p
            LEFT JOIN person_nationality n ON n.person_id = p.id
            WHERE p.id = ?
            ORDER BY n.rowid
            "#
        );

        let rows: Vec<PersonRow> = sqlx::query_as(&sql).bind(id).fetch_all(&self.pool).await?;

        group_rows(rows)?
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn list(&self, filters: &GetFilters) -> Result<Vec<Person>, RepositoryError> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {JOINED_COLUMNS} FROM (SELECT id, name, surname, patronymic, age, gender \
             FROM person WHERE 1 = 1"
        ));

        if let Some(name) = &filters.name {
            query.push(" AND name = ").push_bind(name.as_str());
        }
        if let Some(surname) = &filters.surname {
            query.push(" AND surname = ").push_bind(surname.as_str());
        }
        if let Some(patronymic) = &filters.patronymic {
            query.push(" AND patronymic = ").push_bind(patronymic.as_str());
        }
        if let Some(age) = filters.age {
            query.push(" AND age = ").push_bind(age);
        }
        if let Some(gender) = filters.gender {
            query.push(" AND gender = ").push_bind(gender.as_str());
        }
        if let Some(country) = &filters.nationality {
            query
                .push(" AND id IN (SELECT person_id FROM person_nationality WHERE country = ")
                .push_bind(country.as_str())
                .push(")");
        }

        // Paginate persons, not joined rows
        query
            .push(" ORDER BY id LIMIT ")
            .push_bind(filters.limit)
            .push(" OFFSET ")
            .push_bind(filters.offset)
            .push(
                ") AS p LEFT JOIN person_nationality n ON n.person_id = p.id \
                 ORDER BY p.id, n.rowid",
            );

        let rows: Vec<PersonRow> = query.build_query_as().fetch_all(&self.pool).await?;

        group_rows(rows)
    }

    async fn update(&self, id: i64, params: &UpdateParams) -> Result<(), RepositoryError> {
        if params.is_empty() {
            return Err(RepositoryError::NothingToUpdate);
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE person SET ");
        {
            let mut assignments = query.separated(", ");
            if let Some(name) = &params.name {
                assignments.push("name = ").push_bind_unseparated(name.as_str());
            }
            if let Some(surname) = &params.surname {
                assignments.push("surname = ").push_bind_unseparated(surname.as_str());
            }
            if let Some(patronymic) = &params.patronymic {
                assignments
                    .push("patronymic = ")
                    .push_bind_unseparated(patronymic.as_deref());
            }
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }

        debug!(person_id = id, "Updated person");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let nationalities = sqlx::query("DELETE FROM person_nationality WHERE person_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let person = sqlx::query("DELETE FROM person WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if person.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(id));
        }

        tx.commit().await?;

        debug!(
            person_id = id,
            nationalities = nationalities.rows_affected(),
            "Deleted person"
        );
        Ok(())
    }
}

/// Multi-row insert for a person's nationalities; `None` when there are none
fn nationality_insert(
    person_id: i64,
    nationalities: &[Nationality],
) -> Option<QueryBuilder<'_, Sqlite>> {
    if nationalities.is_empty() {
        return None;
    }

    let mut query =
        QueryBuilder::new("INSERT INTO person_nationality (person_id, country, probability) ");
    query.push_values(nationalities, |mut row, nationality| {
        row.push_bind(person_id)
            .push_bind(nationality.country.as_str())
            .push_bind(nationality.probability);
    });
    Some(query)
}

/// Fold joined rows into one person per id, keeping first-seen order
fn group_rows(rows: Vec<PersonRow>) -> Result<Vec<Person>, RepositoryError> {
    let mut persons: Vec<Person> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.id) {
            Some(&slot) => slot,
            None => {
                persons.push(row.to_person()?);
                index.insert(row.id, persons.len() - 1);
                persons.len() - 1
            }
        };

        if let (Some(country), Some(probability)) = (row.country, row.probability) {
            persons[slot]
                .nationalities
                .push(Nationality { country, probability });
        }
    }

    Ok(persons)
}
