//! Vaccination records of animals.

use crate::{
    core::{
        dates,
        policy::{self, null_as_default},
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// One vaccination of an animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vaccine {
    /// Unique identifier of the record
    pub id: String,
    /// Vaccinated animal
    pub animal_id: String,
    /// Vaccine name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Day the dose was given
    #[serde(default, deserialize_with = "null_as_default")]
    pub applied_at: String,
    /// Date the next dose is due, empty when none is scheduled
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_due_at: String,
    /// Free-text notes
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// When the record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the record was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Values for a new vaccination
#[derive(Debug, Clone, Default)]
pub struct VaccineInput {
    /// Vaccine name, required
    pub name: String,
    /// Day the dose was given
    pub applied_at: Option<String>,
    /// Day the next dose is due
    pub next_due_at: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial edit of a vaccination
#[derive(Debug, Clone, Default)]
pub struct VaccinePatch {
    /// New name
    pub name: Option<String>,
    /// New application day
    pub applied_at: Option<String>,
    /// New due day
    pub next_due_at: Option<String>,
    /// New notes
    pub notes: Option<String>,
}

/// A due vaccine joined with the animal it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingVaccine {
    /// The vaccination record
    pub vaccine: Vaccine,
    /// Name of the animal
    pub animal_name: String,
    /// Ear tag of the animal
    pub animal_earring: String,
}

/// Vaccines of one animal in the order they were recorded.
pub async fn list_by_animal<S>(store: &S, animal_id: &str) -> Result<Vec<Vaccine>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<Vaccine, _>(store, keys::VACCINES)
        .await?
        .into_iter()
        .filter(|v| v.animal_id == animal_id)
        .collect())
}

/// Records a vaccination.
///
/// # Errors
/// Returns `MissingField` without an animal or vaccine name.
pub async fn add<S>(store: &S, animal_id: &str, input: VaccineInput) -> Result<Vaccine>
where
    S: KeyValueStore + ?Sized,
{
    if animal_id.trim().is_empty() {
        return Err(Error::MissingField { field: "animal_id" });
    }
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Error::MissingField { field: "name" });
    }

    let now = Utc::now();
    let vaccine = Vaccine {
        id: generate_id(),
        animal_id: animal_id.to_string(),
        name: name.to_string(),
        applied_at: input.applied_at.as_deref().map(policy::date_or_empty).unwrap_or_default(),
        next_due_at: input.next_due_at.as_deref().map(policy::date_or_empty).unwrap_or_default(),
        notes: input.notes.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let mut vaccines: Vec<Vaccine> = read_list(store, keys::VACCINES).await?;
    vaccines.push(vaccine.clone());
    write_json(store, keys::VACCINES, &vaccines).await?;

    info!("Vaccine '{}' recorded for animal {}", vaccine.name, animal_id);
    Ok(vaccine)
}

/// Edits a vaccination; `None` for an unknown id.
pub async fn update<S>(store: &S, id: &str, patch: VaccinePatch) -> Result<Option<Vaccine>>
where
    S: KeyValueStore + ?Sized,
{
    let mut vaccines: Vec<Vaccine> = read_list(store, keys::VACCINES).await?;
    let Some(vaccine) = vaccines.iter_mut().find(|v| v.id == id) else {
        return Ok(None);
    };

    if let Some(name) = patch.name {
        vaccine.name = name.trim().to_string();
    }
    if let Some(applied_at) = patch.applied_at {
        vaccine.applied_at = policy::date_or_empty(&applied_at);
    }
    if let Some(next_due_at) = patch.next_due_at {
        vaccine.next_due_at = policy::date_or_empty(&next_due_at);
    }
    if let Some(notes) = patch.notes {
        vaccine.notes = notes;
    }
    vaccine.updated_at = Utc::now();
    let updated = vaccine.clone();

    write_json(store, keys::VACCINES, &vaccines).await?;
    Ok(Some(updated))
}

/// Deletes a vaccination; returns whether it existed.
pub async fn remove<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let vaccines: Vec<Vaccine> = read_list(store, keys::VACCINES).await?;
    let before = vaccines.len();
    let kept: Vec<Vaccine> = vaccines.into_iter().filter(|v| v.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::VACCINES, &kept).await?;
    Ok(removed)
}

/// Deletes every vaccination of an animal; returns how many were removed.
pub async fn remove_by_animal<S>(store: &S, animal_id: &str) -> Result<usize>
where
    S: KeyValueStore + ?Sized,
{
    let vaccines: Vec<Vaccine> = read_list(store, keys::VACCINES).await?;
    let before = vaccines.len();
    let kept: Vec<Vaccine> = vaccines.into_iter().filter(|v| v.animal_id != animal_id).collect();
    let removed = before - kept.len();
    write_json(store, keys::VACCINES, &kept).await?;
    Ok(removed)
}

/// Next doses due strictly after `today` for the owner's animals, soonest
/// first, at most `limit`.
pub async fn upcoming_for_owner<S>(
    store: &S,
    owner_id: &str,
    today: NaiveDate,
    limit: usize,
) -> Result<Vec<UpcomingVaccine>>
where
    S: KeyValueStore + ?Sized,
{
    let animals = crate::core::animal::list(store, owner_id).await?;
    let owned: HashSet<&str> = animals.iter().map(|a| a.id.as_str()).collect();

    let mut upcoming: Vec<UpcomingVaccine> = read_list::<Vaccine, _>(store, keys::VACCINES)
        .await?
        .into_iter()
        .filter(|v| owned.contains(v.animal_id.as_str()))
        .filter(|v| dates::is_future(&v.next_due_at, today))
        .filter_map(|vaccine| {
            let animal = animals.iter().find(|a| a.id == vaccine.animal_id)?;
            Some(UpcomingVaccine {
                animal_name: animal.name.clone(),
                animal_earring: animal.earring.clone(),
                vaccine,
            })
        })
        .collect();

    upcoming.sort_by(|a, b| dates::compare_dates(&a.vaccine.next_due_at, &b.vaccine.next_due_at));
    upcoming.truncate(limit);
    Ok(upcoming)
}
