//! Animal movements: purchases, sales, deaths and transfers.

use crate::{
    core::{
        dates,
        policy::{lenient_optional_number, null_as_default},
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::info;

/// Kind of herd movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Bought into the herd
    #[serde(rename = "compra", alias = "purchase")]
    Purchase,
    /// Sold
    #[serde(rename = "venda", alias = "sale")]
    Sale,
    /// Died
    #[serde(rename = "obito", alias = "death")]
    Death,
    /// Moved to another property
    #[serde(rename = "transferencia", alias = "transfer")]
    Transfer,
}

impl MovementType {
    /// Stored name of the movement type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "compra",
            Self::Sale => "venda",
            Self::Death => "obito",
            Self::Transfer => "transferencia",
        }
    }

    /// Whether the movement usually carries a monetary amount
    #[must_use]
    pub const fn has_amount(self) -> bool {
        matches!(self, Self::Purchase | Self::Sale)
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compra" | "purchase" => Ok(Self::Purchase),
            "venda" | "sale" => Ok(Self::Sale),
            "obito" | "óbito" | "death" => Ok(Self::Death),
            "transferencia" | "transferência" | "transfer" => Ok(Self::Transfer),
            other => Err(Error::InvalidValue {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}

/// A purchase, sale, death or transfer of one animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Unique identifier of the movement
    pub id: String,
    /// Animal that moved
    pub animal_id: String,
    /// What kind of movement
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Calendar day of the movement
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    /// Purchase or sale value
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub amount: Option<f64>,
    /// Free-text notes
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// When the movement was recorded
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the record was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Values for a new movement
#[derive(Debug, Clone, Default)]
pub struct MovementInput {
    /// Animal that moved, required
    pub animal_id: String,
    /// Kind of movement, required
    pub movement_type: Option<MovementType>,
    /// Calendar day, required
    pub date: String,
    /// Purchase or sale value
    pub amount: Option<f64>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial edit. `amount: Some(None)` clears the amount.
#[derive(Debug, Clone, Default)]
pub struct MovementPatch {
    /// New kind
    pub movement_type: Option<MovementType>,
    /// New day
    pub date: Option<String>,
    /// New value; `Some(None)` clears it
    pub amount: Option<Option<f64>>,
    /// New notes
    pub notes: Option<String>,
}

fn checked_amount(amount: Option<f64>) -> Result<Option<f64>> {
    match amount {
        Some(value) if !value.is_finite() => Err(Error::InvalidAmount { amount: value }),
        other => Ok(other),
    }
}

fn required_date(date: &str) -> Result<String> {
    if date.trim().is_empty() {
        return Err(Error::MissingField { field: "date" });
    }
    dates::normalize_date(date).ok_or_else(|| Error::InvalidValue {
        field: "date",
        value: date.to_string(),
    })
}

/// Movements of one animal, oldest first.
pub async fn list_by_animal<S>(store: &S, animal_id: &str) -> Result<Vec<Movement>>
where
    S: KeyValueStore + ?Sized,
{
    let mut movements: Vec<Movement> = read_list::<Movement, _>(store, keys::MOVEMENTS)
        .await?
        .into_iter()
        .filter(|m| m.animal_id == animal_id)
        .collect();
    movements.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(movements)
}

/// Most recent movements of an animal, newest first.
pub async fn recent_for_animal<S>(store: &S, animal_id: &str, limit: usize) -> Result<Vec<Movement>>
where
    S: KeyValueStore + ?Sized,
{
    let mut movements = list_by_animal(store, animal_id).await?;
    movements.reverse();
    movements.truncate(limit);
    Ok(movements)
}

/// Records a movement.
///
/// # Errors
/// Returns `MissingField` without animal, type or date, `InvalidValue` for an
/// unparseable date and `InvalidAmount` for a non-finite amount.
pub async fn create<S>(store: &S, input: MovementInput) -> Result<Movement>
where
    S: KeyValueStore + ?Sized,
{
    if input.animal_id.trim().is_empty() {
        return Err(Error::MissingField { field: "animal_id" });
    }
    let date = required_date(&input.date)?;
    let movement_type = input
        .movement_type
        .ok_or(Error::MissingField { field: "type" })?;
    let amount = checked_amount(input.amount)?;

    let now = Utc::now();
    let movement = Movement {
        id: generate_id(),
        animal_id: input.animal_id,
        movement_type,
        date,
        amount,
        notes: input.notes.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let mut movements: Vec<Movement> = read_list(store, keys::MOVEMENTS).await?;
    movements.push(movement.clone());
    write_json(store, keys::MOVEMENTS, &movements).await?;

    info!(
        "Movement {} on {} recorded for animal {}",
        movement.movement_type, movement.date, movement.animal_id
    );
    Ok(movement)
}

/// Edits a movement; `None` for an unknown id.
pub async fn update<S>(store: &S, id: &str, patch: MovementPatch) -> Result<Option<Movement>>
where
    S: KeyValueStore + ?Sized,
{
    let date = patch
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(required_date)
        .transpose()?;
    let amount = patch.amount.map(checked_amount).transpose()?;

    let mut movements: Vec<Movement> = read_list(store, keys::MOVEMENTS).await?;
    let Some(movement) = movements.iter_mut().find(|m| m.id == id) else {
        return Ok(None);
    };

    if let Some(movement_type) = patch.movement_type {
        movement.movement_type = movement_type;
    }
    if let Some(date) = date {
        movement.date = date;
    }
    if let Some(amount) = amount {
        movement.amount = amount;
    }
    if let Some(notes) = patch.notes {
        movement.notes = notes;
    }
    movement.updated_at = Utc::now();
    let updated = movement.clone();

    write_json(store, keys::MOVEMENTS, &movements).await?;
    Ok(Some(updated))
}

/// Deletes a movement; returns whether it existed.
pub async fn remove<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let movements: Vec<Movement> = read_list(store, keys::MOVEMENTS).await?;
    let before = movements.len();
    let kept: Vec<Movement> = movements.into_iter().filter(|m| m.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::MOVEMENTS, &kept).await?;
    Ok(removed)
}

/// Deletes every movement of an animal; returns how many were removed.
pub async fn remove_by_animal<S>(store: &S, animal_id: &str) -> Result<usize>
where
    S: KeyValueStore + ?Sized,
{
    let movements: Vec<Movement> = read_list(store, keys::MOVEMENTS).await?;
    let before = movements.len();
    let kept: Vec<Movement> = movements.into_iter().filter(|m| m.animal_id != animal_id).collect();
    let removed = before - kept.len();
    write_json(store, keys::MOVEMENTS, &kept).await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::store::MemoryStore;

    fn movement(animal_id: &str, movement_type: MovementType, date: &str) -> MovementInput {
        MovementInput {
            animal_id: animal_id.to_string(),
            movement_type: Some(movement_type),
            date: date.to_string(),
            amount: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_list_and_recent() -> Result<()> {
        let store = MemoryStore::new();

        let mut purchase = movement("cow-1", MovementType::Purchase, "2023-05-01");
        purchase.amount = Some(4500.0);
        create(&store, purchase).await?;
        create(&store, movement("cow-1", MovementType::Transfer, "2024-02-01")).await?;
        create(&store, movement("cow-1", MovementType::Sale, "2024-06-01")).await?;
        create(&store, movement("cow-2", MovementType::Death, "2024-01-01")).await?;

        let all = list_by_animal(&store, "cow-1").await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].amount, Some(4500.0));

        let recent = recent_for_animal(&store, "cow-1", 2).await?;
        let types: Vec<MovementType> = recent.iter().map(|m| m.movement_type).collect();
        assert_eq!(types, vec![MovementType::Sale, MovementType::Transfer]);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_validation() -> Result<()> {
        let store = MemoryStore::new();

        let mut no_type = movement("cow-1", MovementType::Sale, "2024-01-01");
        no_type.movement_type = None;
        assert!(matches!(
            create(&store, no_type).await,
            Err(Error::MissingField { field: "type" })
        ));

        assert!(matches!(
            create(&store, movement("cow-1", MovementType::Sale, "")).await,
            Err(Error::MissingField { field: "date" })
        ));

        let mut bad_amount = movement("cow-1", MovementType::Sale, "2024-01-01");
        bad_amount.amount = Some(f64::INFINITY);
        assert!(matches!(
            create(&store, bad_amount).await,
            Err(Error::InvalidAmount { amount: _ })
        ));

        assert!(matches!(
            "gift".parse::<MovementType>(),
            Err(Error::InvalidValue { field: "type", value: _ })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_clears_amount_and_remove_by_animal() -> Result<()> {
        let store = MemoryStore::new();
        let mut sale = movement("cow-1", MovementType::Sale, "2024-01-01");
        sale.amount = Some(3000.0);
        let sale = create(&store, sale).await?;

        let updated = update(
            &store,
            &sale.id,
            MovementPatch {
                amount: Some(None),
                ..Default::default()
            },
        )
        .await?
        .unwrap();
        assert_eq!(updated.amount, None);

        create(&store, movement("cow-1", MovementType::Transfer, "2024-02-01")).await?;
        assert_eq!(remove_by_animal(&store, "cow-1").await?, 2);
        assert!(!remove(&store, &sale.id).await?);
        Ok(())
    }

    #[test]
    fn test_wire_name() {
        let json = serde_json::to_string(&MovementType::Death).unwrap();
        assert_eq!(json, "\"obito\"");
    }
}
