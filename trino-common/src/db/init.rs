//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently, so the service starts against an empty data directory
//! without manual setup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_and_migrate(&pool).await?;

    Ok(pool)
}

/// Apply pragmas and create the schema on an existing pool.
///
/// Split out from [`init_database`] so tests can run against in-memory
/// databases.
pub async fn configure_and_migrate(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers while a request's history writes commit
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    // Migrations (idempotent - safe to call multiple times)
    create_species_table(pool).await?;
    create_inference_log_table(pool).await?;
    create_audio_metadata_table(pool).await?;
    create_system_error_log_table(pool).await?;

    Ok(())
}

/// Species catalog. `species_id` doubles as the classifier output index,
/// which is why it is an explicit integer key rather than an autoincrement.
async fn create_species_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            species_id INTEGER PRIMARY KEY,
            scientific_name TEXT NOT NULL,
            common_name TEXT,
            image_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Append-only record of completed inference runs
async fn create_inference_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inference_log (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            predicted_species TEXT NOT NULL,
            confidence REAL NOT NULL,
            ranked_results TEXT NOT NULL,
            elapsed_seconds REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Submission metadata (source format, geolocation), linked to the
/// inference row produced by the same request
async fn create_audio_metadata_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audio_metadata (
            audio_id INTEGER PRIMARY KEY AUTOINCREMENT,
            origin TEXT NOT NULL,
            format TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            location TEXT,
            user_id INTEGER,
            inference_id INTEGER REFERENCES inference_log(log_id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Append-only error sink for pipeline stage failures
async fn create_system_error_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS system_error_log (
            error_id INTEGER PRIMARY KEY AUTOINCREMENT,
            message TEXT NOT NULL,
            stage TEXT,
            user_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
