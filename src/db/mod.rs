//! Database module for SQLite persistence.
//!
//! SQLite backs the school document store: one row per school plus one row per
//! (school, week) pageview bucket.

mod repository;
mod store;

pub use repository::*;
pub use store::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schools (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            languages TEXT NOT NULL DEFAULT '["en"]',
            lang_cnt INTEGER NOT NULL DEFAULT 1,
            revision_cnt INTEGER NOT NULL DEFAULT 0,
            contributors TEXT NOT NULL DEFAULT '[]',
            contributor_cnt INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS school_pageviews (
            school_id TEXT NOT NULL REFERENCES schools(id) ON DELETE CASCADE,
            week TEXT NOT NULL,
            views INTEGER NOT NULL,
            PRIMARY KEY (school_id, week)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_schools_name ON schools(name);")
        .execute(pool)
        .await?;

    Ok(())
}
