//! Animal registry.
//!
//! Animals belong to one owner and are identified on the farm by their
//! earring tag, which must be unique per owner regardless of case. Removing an
//! animal also removes its vaccinations, movements and reproductive events.

use crate::{
    core::{
        dates, movement,
        policy::{self, lenient_or_default, null_as_default},
        reproduction, vaccine,
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{debug, info};

/// Category of an animal. Older records use the Portuguese names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalType {
    /// Adult female in or past lactation
    #[default]
    #[serde(alias = "vaca")]
    Cow,
    /// Breeding male
    #[serde(alias = "touro")]
    Bull,
    /// Male calf
    #[serde(alias = "bezerro")]
    BullCalf,
    /// Female calf
    #[serde(alias = "bezerra")]
    HeiferCalf,
    /// Young male
    #[serde(alias = "novilho")]
    Steer,
    /// Young female before first calving
    #[serde(alias = "novilha")]
    Heifer,
}

impl AnimalType {
    /// Stored name of the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cow => "cow",
            Self::Bull => "bull",
            Self::BullCalf => "bull_calf",
            Self::HeiferCalf => "heifer_calf",
            Self::Steer => "steer",
            Self::Heifer => "heifer",
        }
    }
}

impl fmt::Display for AnimalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cow" | "vaca" => Ok(Self::Cow),
            "bull" | "touro" => Ok(Self::Bull),
            "bull_calf" | "bezerro" => Ok(Self::BullCalf),
            "heifer_calf" | "bezerra" => Ok(Self::HeiferCalf),
            "steer" | "novilho" => Ok(Self::Steer),
            "heifer" | "novilha" => Ok(Self::Heifer),
            other => Err(Error::InvalidValue {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}

/// Herd membership of an animal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalStatus {
    /// In the herd
    #[default]
    #[serde(alias = "ativo")]
    Active,
    /// Sold, dead or otherwise gone
    #[serde(alias = "inativo")]
    Inactive,
    /// Moved to another property
    #[serde(alias = "transferido")]
    Transferred,
}

impl FromStr for AnimalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" | "ativo" => Ok(Self::Active),
            "inactive" | "inativo" => Ok(Self::Inactive),
            "transferred" | "transferido" => Ok(Self::Transferred),
            other => Err(Error::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A registered animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    /// Unique identifier of the animal
    pub id: String,
    /// Producer the animal belongs to
    pub owner_id: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Ear tag, unique per owner
    #[serde(default, deserialize_with = "null_as_default")]
    pub earring: String,
    /// Category of the animal
    #[serde(rename = "type", default, deserialize_with = "lenient_or_default")]
    pub animal_type: AnimalType,
    /// Breed, free text
    #[serde(default, deserialize_with = "null_as_default")]
    pub breed: String,
    /// Whether the animal is still in the herd
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub status: AnimalStatus,
    /// Free-text lactation or growth stage
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    /// Birth day, `YYYY-MM-DD`, empty when unknown
    #[serde(default, deserialize_with = "null_as_default")]
    pub birth_date: String,
    /// Mother
    #[serde(default, deserialize_with = "null_as_default")]
    pub dam_id: String,
    /// Father
    #[serde(default, deserialize_with = "null_as_default")]
    pub sire_id: String,
    /// Free-text notes
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// When the animal was registered
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the record was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Animal {
    /// Trims text fields and normalizes the birth date.
    fn normalized(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.earring,
            &mut self.breed,
            &mut self.stage,
            &mut self.notes,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
        self.birth_date = policy::date_or_empty(&self.birth_date);
        self
    }

    /// Age in whole months; `None` without a usable birth date.
    #[must_use]
    pub fn age_in_months(&self, today: NaiveDate) -> Option<u32> {
        dates::age_in_months(&self.birth_date, today)
    }
}

/// Values for a new animal
#[derive(Debug, Clone, Default)]
pub struct AnimalInput {
    /// Display name, required
    pub name: String,
    /// Ear tag, required and unique per owner
    pub earring: String,
    /// Category; defaults to cow
    pub animal_type: Option<AnimalType>,
    /// Breed
    pub breed: Option<String>,
    /// Status; defaults to active
    pub status: Option<AnimalStatus>,
    /// Lactation or growth stage
    pub stage: Option<String>,
    /// Birth day
    pub birth_date: Option<String>,
    /// Mother
    pub dam_id: Option<String>,
    /// Father
    pub sire_id: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial edit; the id and owner cannot change
#[derive(Debug, Clone, Default)]
pub struct AnimalPatch {
    /// New name
    pub name: Option<String>,
    /// New ear tag, checked for uniqueness
    pub earring: Option<String>,
    /// New category
    pub animal_type: Option<AnimalType>,
    /// New breed
    pub breed: Option<String>,
    /// New status
    pub status: Option<AnimalStatus>,
    /// New stage
    pub stage: Option<String>,
    /// New birth day
    pub birth_date: Option<String>,
    /// New mother
    pub dam_id: Option<String>,
    /// New father
    pub sire_id: Option<String>,
    /// New notes
    pub notes: Option<String>,
}

/// Herd size per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Animals in the herd
    pub active: usize,
    /// Animals gone from the herd
    pub inactive: usize,
    /// Animals moved elsewhere
    pub transferred: usize,
}

/// Child records removed along with an animal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedChildren {
    /// Vaccine records deleted
    pub vaccines: usize,
    /// Movements deleted
    pub movements: usize,
    /// Reproduction events deleted
    pub reproductive_events: usize,
}

fn same_earring(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn earring_free(animals: &[Animal], owner_id: &str, earring: &str, ignore_id: Option<&str>) -> bool {
    !animals.iter().any(|a| {
        a.owner_id == owner_id && same_earring(&a.earring, earring) && Some(a.id.as_str()) != ignore_id
    })
}

/// Animals of an owner ordered by name.
pub async fn list<S>(store: &S, owner_id: &str) -> Result<Vec<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.is_empty() {
        return Ok(Vec::new());
    }

    let mut animals: Vec<Animal> = read_list::<Animal, _>(store, keys::ANIMALS)
        .await?
        .into_iter()
        .filter(|a| a.owner_id == owner_id)
        .map(Animal::normalized)
        .collect();
    animals.sort_by_key(|a| a.name.to_lowercase());

    debug!("Listed {} animals for owner {}", animals.len(), owner_id);
    Ok(animals)
}

/// Looks an animal up by id.
pub async fn get<S>(store: &S, id: &str) -> Result<Option<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<Animal, _>(store, keys::ANIMALS)
        .await?
        .into_iter()
        .find(|a| a.id == id)
        .map(Animal::normalized))
}

/// Whether `earring` is free for the owner, ignoring the animal `ignore_id`.
/// A blank earring is never considered free.
pub async fn is_earring_unique<S>(
    store: &S,
    owner_id: &str,
    earring: &str,
    ignore_id: Option<&str>,
) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.is_empty() || earring.trim().is_empty() {
        return Ok(false);
    }
    let animals: Vec<Animal> = read_list(store, keys::ANIMALS).await?;
    Ok(earring_free(&animals, owner_id, earring, ignore_id))
}

/// Registers an animal.
///
/// # Errors
/// Returns `MissingField` without owner, name or earring and
/// `DuplicateEarring` when the owner already uses the earring.
pub async fn create<S>(store: &S, owner_id: &str, input: AnimalInput) -> Result<Animal>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.trim().is_empty() {
        return Err(Error::MissingField { field: "owner_id" });
    }
    if input.name.trim().is_empty() {
        return Err(Error::MissingField { field: "name" });
    }
    let earring = input.earring.trim();
    if earring.is_empty() {
        return Err(Error::MissingField { field: "earring" });
    }

    let mut animals: Vec<Animal> = read_list(store, keys::ANIMALS).await?;
    if !earring_free(&animals, owner_id, earring, None) {
        return Err(Error::DuplicateEarring {
            earring: earring.to_string(),
        });
    }

    let now = Utc::now();
    let animal = Animal {
        id: generate_id(),
        owner_id: owner_id.to_string(),
        name: input.name,
        earring: earring.to_string(),
        animal_type: input.animal_type.unwrap_or_default(),
        breed: input.breed.unwrap_or_default(),
        status: input.status.unwrap_or_default(),
        stage: input.stage.unwrap_or_default(),
        birth_date: input.birth_date.unwrap_or_default(),
        dam_id: input.dam_id.unwrap_or_default(),
        sire_id: input.sire_id.unwrap_or_default(),
        notes: input.notes.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    }
    .normalized();

    animals.push(animal.clone());
    write_json(store, keys::ANIMALS, &animals).await?;

    info!("Registered animal '{}' ({}) for owner {}", animal.name, animal.earring, owner_id);
    Ok(animal)
}

/// Edits an animal; `None` for an unknown id.
///
/// # Errors
/// Returns `MissingField` for a blank earring or name and `DuplicateEarring`
/// when the new earring is taken by another animal of the owner.
pub async fn update<S>(store: &S, id: &str, patch: AnimalPatch) -> Result<Option<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    let mut animals: Vec<Animal> = read_list(store, keys::ANIMALS).await?;
    let Some(idx) = animals.iter().position(|a| a.id == id) else {
        return Ok(None);
    };

    if let Some(earring) = patch.earring.as_deref() {
        let earring = earring.trim();
        if earring.is_empty() {
            return Err(Error::MissingField { field: "earring" });
        }
        if !earring_free(&animals, &animals[idx].owner_id, earring, Some(id)) {
            return Err(Error::DuplicateEarring {
                earring: earring.to_string(),
            });
        }
    }
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(Error::MissingField { field: "name" });
    }

    let current = &mut animals[idx];
    if let Some(name) = patch.name {
        current.name = name;
    }
    if let Some(earring) = patch.earring {
        current.earring = earring;
    }
    if let Some(animal_type) = patch.animal_type {
        current.animal_type = animal_type;
    }
    if let Some(breed) = patch.breed {
        current.breed = breed;
    }
    if let Some(status) = patch.status {
        current.status = status;
    }
    if let Some(stage) = patch.stage {
        current.stage = stage;
    }
    if let Some(birth_date) = patch.birth_date {
        current.birth_date = birth_date;
    }
    if let Some(dam_id) = patch.dam_id {
        current.dam_id = dam_id;
    }
    if let Some(sire_id) = patch.sire_id {
        current.sire_id = sire_id;
    }
    if let Some(notes) = patch.notes {
        current.notes = notes;
    }
    current.updated_at = Utc::now();

    let updated = current.clone().normalized();
    animals[idx] = updated.clone();
    write_json(store, keys::ANIMALS, &animals).await?;

    info!("Updated animal {}", id);
    Ok(Some(updated))
}

/// Removes an animal and all of its child records. `None` when the animal
/// does not exist.
pub async fn remove<S>(store: &S, id: &str) -> Result<Option<RemovedChildren>>
where
    S: KeyValueStore + ?Sized,
{
    let animals: Vec<Animal> = read_list(store, keys::ANIMALS).await?;
    let before = animals.len();
    let kept: Vec<Animal> = animals.into_iter().filter(|a| a.id != id).collect();
    if kept.len() == before {
        return Ok(None);
    }
    write_json(store, keys::ANIMALS, &kept).await?;

    let removed = RemovedChildren {
        vaccines: vaccine::remove_by_animal(store, id).await?,
        movements: movement::remove_by_animal(store, id).await?,
        reproductive_events: reproduction::remove_by_animal(store, id).await?,
    };

    info!(
        "Removed animal {} with {} vaccines, {} movements, {} reproductive events",
        id, removed.vaccines, removed.movements, removed.reproductive_events
    );
    Ok(Some(removed))
}

/// Animals of an owner still in the herd.
pub async fn list_active<S>(store: &S, owner_id: &str) -> Result<Vec<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    let mut animals = list(store, owner_id).await?;
    animals.retain(|a| a.status == AnimalStatus::Active);
    Ok(animals)
}

/// Animals of an owner with the given category.
pub async fn list_by_type<S>(store: &S, owner_id: &str, animal_type: AnimalType) -> Result<Vec<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    let mut animals = list(store, owner_id).await?;
    animals.retain(|a| a.animal_type == animal_type);
    Ok(animals)
}

/// Case-insensitive substring search over name and earring. A blank query
/// lists everything.
pub async fn search<S>(store: &S, owner_id: &str, query: &str) -> Result<Vec<Animal>>
where
    S: KeyValueStore + ?Sized,
{
    let query = query.trim().to_lowercase();
    let mut animals = list(store, owner_id).await?;
    if !query.is_empty() {
        animals.retain(|a| {
            a.name.to_lowercase().contains(&query) || a.earring.to_lowercase().contains(&query)
        });
    }
    Ok(animals)
}

/// Counts an owner's animals per status.
pub async fn count_by_status<S>(store: &S, owner_id: &str) -> Result<StatusCounts>
where
    S: KeyValueStore + ?Sized,
{
    let animals = list(store, owner_id).await?;
    Ok(animals
        .iter()
        .fold(StatusCounts::default(), |mut counts, animal| {
            match animal.status {
                AnimalStatus::Active => counts.active += 1,
                AnimalStatus::Inactive => counts.inactive += 1,
                AnimalStatus::Transferred => counts.transferred += 1,
            }
            counts
        }))
}
