//! Database configuration for the persistent document store.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! The schema is generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the table always matches the Rust
//! model. Creation is idempotent, which lets start-up run it on every launch.

use crate::entities::KvDocument;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/milktech.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, then the
/// configured value, then the default local `SQLite` file.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Ensures the parent directory of a file-backed `SQLite` URL exists.
///
/// In-memory URLs and non-`SQLite` URLs are left alone.
pub fn ensure_sqlite_directory(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Establishes a connection to the given database URL.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_directory(database_url)?;
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the document table if it does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut document_table = schema.create_table_from_entity(KvDocument);
    document_table.if_not_exists();

    db.execute(builder.build(&document_table)).await?;

    Ok(())
}
