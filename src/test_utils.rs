//! Shared test utilities for `MilkTech`.
//!
//! Helpers for setting up a test database and building service inputs with
//! sensible defaults.

use crate::{
    core::{
        animal::AnimalInput,
        pricing::PriceRecord,
        production::{ProductionInput, Shift},
    },
    errors::Result,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a stored price record with both timestamps set to now.
pub fn price_record(id: &str, dairy_id: &str, price: f64, effective_at: &str) -> PriceRecord {
    let now = Utc::now();
    PriceRecord {
        id: id.to_string(),
        dairy_id: dairy_id.to_string(),
        price_per_liter: price,
        effective_at: effective_at.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Builds a production input for one shift.
///
/// # Defaults
/// * no dairy and no unit price
/// * no notes
///
/// The date is passed through untouched so tests can feed blank or malformed
/// values.
pub fn production_input(date: &str, shift: Shift, liters: f64) -> ProductionInput {
    ProductionInput {
        date: date.to_string(),
        shift: Some(shift),
        liters,
        ..Default::default()
    }
}

/// Builds an animal input with only the required fields; type and status fall
/// back to the service defaults (cow, active).
pub fn animal_input(name: &str, earring: &str) -> AnimalInput {
    AnimalInput {
        name: name.to_string(),
        earring: earring.to_string(),
        ..Default::default()
    }
}
