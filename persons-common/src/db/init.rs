//! Database initialization
//!
//! Opens the bounded connection pool and creates the schema if it does not
//! exist yet. Safe to call on every startup.

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Open the connection pool described by `config` and create tables if needed
pub async fn init_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());

    // WAL allows concurrent readers with one writer; not applicable in memory
    if !config.is_in_memory() {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect_with(options)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Opened database pool"
    );

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_person_table(pool).await?;
    create_nationality_table(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

async fn create_person_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            surname TEXT NOT NULL,
            patronymic TEXT,
            age INTEGER NOT NULL CHECK (age >= 0),
            gender TEXT NOT NULL CHECK (gender IN ('male', 'female'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Nationality guesses owned by a person
///
/// Rows have no identity of their own; (person_id, country) is unique.
async fn create_nationality_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person_nationality (
            person_id INTEGER NOT NULL REFERENCES person(id) ON DELETE CASCADE,
            country TEXT NOT NULL,
            probability REAL NOT NULL CHECK (probability >= 0.0 AND probability <= 1.0),
            PRIMARY KEY (person_id, country)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_person_name ON person(name)",
        "CREATE INDEX IF NOT EXISTS idx_person_surname ON person(surname)",
        "CREATE INDEX IF NOT EXISTS idx_person_nationality_country ON person_nationality(country)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
