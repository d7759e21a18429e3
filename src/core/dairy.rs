//! Dairy directory: official dairies with their collection tanks, and the
//! personal dairies a producer tracks privately.

use crate::{
    core::{
        policy::{lenient_optional_number, null_as_default},
        pricing::{self, PriceRecord},
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Joins the non-empty address parts with commas.
fn address_line(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn state_code(value: Option<String>) -> String {
    trimmed(value).to_uppercase()
}

// ----- Official dairies -----

/// A registered buyer; owned by the dairy-role user that manages it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialDairy {
    /// Unique identifier of the dairy
    pub id: String,
    /// Dairy-role account owning the profile
    pub user_id: String,
    /// Trade name shown to producers
    #[serde(default, deserialize_with = "null_as_default")]
    pub trade_name: String,
    /// Company registration number
    #[serde(default, deserialize_with = "null_as_default")]
    pub cnpj: String,
    /// Contact phone
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    /// Street address
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    /// City
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    /// State abbreviation
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// Latitude
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub lat: Option<f64>,
    /// Longitude
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub lng: Option<f64>,
    /// When the profile was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl OfficialDairy {
    /// Address, city and state joined for display.
    #[must_use]
    pub fn full_address(&self) -> String {
        address_line(&[&self.address, &self.city, &self.state])
    }
}

/// Profile values submitted by a dairy user
#[derive(Debug, Clone, Default)]
pub struct OfficialDairyInput {
    /// Trade name
    pub trade_name: String,
    /// Company registration number
    pub cnpj: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State abbreviation
    pub state: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
}

/// Official dairy with its current price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DairyPriceSummary {
    /// The dairy
    pub dairy: OfficialDairy,
    /// Latest price per liter, 0 when the dairy never published one
    pub price: f64,
    /// When the latest price took effect
    pub effective_at: Option<String>,
}

/// Every official dairy.
pub async fn list_official<S>(store: &S) -> Result<Vec<OfficialDairy>>
where
    S: KeyValueStore + ?Sized,
{
    read_list(store, keys::OFFICIAL_DAIRIES).await
}

/// Looks an official dairy up by id.
pub async fn get_official<S>(store: &S, id: &str) -> Result<Option<OfficialDairy>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(list_official(store).await?.into_iter().find(|d| d.id == id))
}

/// The dairy managed by a user, if they registered one.
pub async fn get_official_by_user<S>(store: &S, user_id: &str) -> Result<Option<OfficialDairy>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(list_official(store)
        .await?
        .into_iter()
        .find(|d| d.user_id == user_id))
}

/// Creates the user's dairy profile, or updates it when it exists.
///
/// # Errors
/// Returns `MissingField` without a user or trade name.
pub async fn save_official<S>(store: &S, user_id: &str, input: OfficialDairyInput) -> Result<OfficialDairy>
where
    S: KeyValueStore + ?Sized,
{
    if user_id.trim().is_empty() {
        return Err(Error::MissingField { field: "user_id" });
    }
    if input.trade_name.trim().is_empty() {
        return Err(Error::MissingField { field: "trade_name" });
    }

    let mut dairies: Vec<OfficialDairy> = read_list(store, keys::OFFICIAL_DAIRIES).await?;
    let existing = dairies.iter().position(|d| d.user_id == user_id);

    let dairy = OfficialDairy {
        id: existing.map_or_else(generate_id, |i| dairies[i].id.clone()),
        user_id: user_id.to_string(),
        trade_name: input.trade_name.trim().to_string(),
        cnpj: trimmed(input.cnpj),
        phone: trimmed(input.phone),
        address: trimmed(input.address),
        city: trimmed(input.city),
        state: state_code(input.state),
        lat: input.lat.filter(|v| v.is_finite()),
        lng: input.lng.filter(|v| v.is_finite()),
        created_at: existing.map_or_else(Utc::now, |i| dairies[i].created_at),
    };

    match existing {
        Some(i) => dairies[i] = dairy.clone(),
        None => dairies.push(dairy.clone()),
    }
    write_json(store, keys::OFFICIAL_DAIRIES, &dairies).await?;

    info!("Saved dairy profile '{}' for user {}", dairy.trade_name, user_id);
    Ok(dairy)
}

/// Every official dairy with its latest price, highest price first.
pub async fn prices_overview<S>(store: &S) -> Result<Vec<DairyPriceSummary>>
where
    S: KeyValueStore + ?Sized,
{
    let dairies = list_official(store).await?;
    let mut summaries = Vec::with_capacity(dairies.len());

    for dairy in dairies {
        let latest: Option<PriceRecord> = pricing::latest_official_price(store, &dairy.id).await?;
        summaries.push(DairyPriceSummary {
            price: latest.as_ref().map_or(0.0, |p| p.price_per_liter),
            effective_at: latest.map(|p| p.effective_at),
            dairy,
        });
    }

    summaries.sort_by(|a, b| b.price.total_cmp(&a.price));
    Ok(summaries)
}

// ----- Tanks -----

/// A milk collection tank of an official dairy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    /// Unique identifier of the tank
    pub id: String,
    /// Dairy operating the tank
    pub dairy_id: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Street address
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    /// City
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    /// State abbreviation
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// Latitude
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub lat: Option<f64>,
    /// Longitude
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub lng: Option<f64>,
    /// Person in charge of the tank
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsible_name: String,
    /// Phone of the person in charge
    #[serde(default, deserialize_with = "null_as_default")]
    pub responsible_phone: String,
    /// When the tank was registered
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Tank {
    /// Address, city and state joined for display.
    #[must_use]
    pub fn full_address(&self) -> String {
        address_line(&[&self.address, &self.city, &self.state])
    }
}

/// Values for a tank
#[derive(Debug, Clone, Default)]
pub struct TankInput {
    /// Display name
    pub name: String,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State abbreviation
    pub state: Option<String>,
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lng: Option<f64>,
    /// Person in charge
    pub responsible_name: Option<String>,
    /// Phone of the person in charge
    pub responsible_phone: Option<String>,
}

/// Every registered tank.
pub async fn list_tanks<S>(store: &S) -> Result<Vec<Tank>>
where
    S: KeyValueStore + ?Sized,
{
    read_list(store, keys::TANKS).await
}

/// Tanks operated by one dairy.
pub async fn list_tanks_by_dairy<S>(store: &S, dairy_id: &str) -> Result<Vec<Tank>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(list_tanks(store)
        .await?
        .into_iter()
        .filter(|t| t.dairy_id == dairy_id)
        .collect())
}

/// Tanks whose city or state contains `term`, case-insensitively.
pub async fn search_tanks<S>(store: &S, term: &str) -> Result<Vec<Tank>>
where
    S: KeyValueStore + ?Sized,
{
    let term = term.trim().to_lowercase();
    let mut tanks = list_tanks(store).await?;
    if !term.is_empty() {
        tanks.retain(|t| {
            t.city.to_lowercase().contains(&term) || t.state.to_lowercase().contains(&term)
        });
    }
    Ok(tanks)
}

/// Creates a tank, or replaces the fields of `tank_id` when given. Returns
/// `None` when `tank_id` does not exist.
///
/// # Errors
/// Returns `MissingField` without a dairy or tank name.
pub async fn save_tank<S>(
    store: &S,
    dairy_id: &str,
    tank_id: Option<&str>,
    input: TankInput,
) -> Result<Option<Tank>>
where
    S: KeyValueStore + ?Sized,
{
    if dairy_id.trim().is_empty() {
        return Err(Error::MissingField { field: "dairy_id" });
    }
    if input.name.trim().is_empty() {
        return Err(Error::MissingField { field: "name" });
    }

    let mut tanks: Vec<Tank> = read_list(store, keys::TANKS).await?;
    let existing = match tank_id {
        Some(id) => match tanks.iter().position(|t| t.id == id) {
            Some(i) => Some(i),
            None => return Ok(None),
        },
        None => None,
    };

    let tank = Tank {
        id: existing.map_or_else(generate_id, |i| tanks[i].id.clone()),
        dairy_id: dairy_id.to_string(),
        name: input.name.trim().to_string(),
        address: trimmed(input.address),
        city: trimmed(input.city),
        state: state_code(input.state),
        lat: input.lat.filter(|v| v.is_finite()),
        lng: input.lng.filter(|v| v.is_finite()),
        responsible_name: trimmed(input.responsible_name),
        responsible_phone: trimmed(input.responsible_phone),
        created_at: existing.map_or_else(Utc::now, |i| tanks[i].created_at),
    };

    match existing {
        Some(i) => tanks[i] = tank.clone(),
        None => tanks.push(tank.clone()),
    }
    write_json(store, keys::TANKS, &tanks).await?;

    info!("Saved tank '{}' of dairy {}", tank.name, dairy_id);
    Ok(Some(tank))
}

/// Deletes a tank; returns whether it existed.
pub async fn remove_tank<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let tanks = list_tanks(store).await?;
    let before = tanks.len();
    let kept: Vec<Tank> = tanks.into_iter().filter(|t| t.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::TANKS, &kept).await?;
    Ok(removed)
}

// ----- Personal dairies -----

/// A dairy the producer sells to but that is not registered in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalDairy {
    /// Unique identifier of the dairy
    pub id: String,
    /// Producer tracking the dairy
    pub owner_id: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Company registration number
    #[serde(default, deserialize_with = "null_as_default")]
    pub cnpj: String,
    /// Contact phone
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    /// Person the producer deals with
    #[serde(default, alias = "responsavel", deserialize_with = "null_as_default")]
    pub contact_name: String,
    /// Street address
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    /// City
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    /// State abbreviation, upper-case
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// When the dairy was added
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the record was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Values for a new personal dairy
#[derive(Debug, Clone, Default)]
pub struct PersonalDairyInput {
    /// Display name, required
    pub name: String,
    /// Company registration number
    pub cnpj: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Contact person
    pub contact_name: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State abbreviation
    pub state: Option<String>,
}

/// Partial edit of a personal dairy
#[derive(Debug, Clone, Default)]
pub struct PersonalDairyPatch {
    /// New name
    pub name: Option<String>,
    /// New registration number
    pub cnpj: Option<String>,
    /// New phone
    pub phone: Option<String>,
    /// New contact person
    pub contact_name: Option<String>,
    /// New address
    pub address: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New state
    pub state: Option<String>,
}

/// Personal dairies of a producer.
pub async fn list_personal<S>(store: &S, owner_id: &str) -> Result<Vec<PersonalDairy>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<PersonalDairy, _>(store, keys::PERSONAL_DAIRIES)
        .await?
        .into_iter()
        .filter(|d| d.owner_id == owner_id)
        .collect())
}

/// Adds a personal dairy.
///
/// # Errors
/// Returns `MissingField` without an owner or name.
pub async fn create_personal<S>(store: &S, owner_id: &str, input: PersonalDairyInput) -> Result<PersonalDairy>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.trim().is_empty() {
        return Err(Error::MissingField { field: "owner_id" });
    }
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Error::MissingField { field: "name" });
    }

    let now = Utc::now();
    let dairy = PersonalDairy {
        id: generate_id(),
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        cnpj: trimmed(input.cnpj),
        phone: trimmed(input.phone),
        contact_name: trimmed(input.contact_name),
        address: trimmed(input.address),
        city: trimmed(input.city),
        state: state_code(input.state),
        created_at: now,
        updated_at: now,
    };

    let mut dairies: Vec<PersonalDairy> = read_list(store, keys::PERSONAL_DAIRIES).await?;
    dairies.push(dairy.clone());
    write_json(store, keys::PERSONAL_DAIRIES, &dairies).await?;

    info!("Added personal dairy '{}' for owner {}", dairy.name, owner_id);
    Ok(dairy)
}

/// Edits a personal dairy; `None` for an unknown id.
pub async fn update_personal<S>(store: &S, id: &str, patch: PersonalDairyPatch) -> Result<Option<PersonalDairy>>
where
    S: KeyValueStore + ?Sized,
{
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(Error::MissingField { field: "name" });
    }

    let mut dairies: Vec<PersonalDairy> = read_list(store, keys::PERSONAL_DAIRIES).await?;
    let Some(dairy) = dairies.iter_mut().find(|d| d.id == id) else {
        return Ok(None);
    };

    if let Some(name) = patch.name {
        dairy.name = name.trim().to_string();
    }
    if patch.cnpj.is_some() {
        dairy.cnpj = trimmed(patch.cnpj);
    }
    if patch.phone.is_some() {
        dairy.phone = trimmed(patch.phone);
    }
    if patch.contact_name.is_some() {
        dairy.contact_name = trimmed(patch.contact_name);
    }
    if patch.address.is_some() {
        dairy.address = trimmed(patch.address);
    }
    if patch.city.is_some() {
        dairy.city = trimmed(patch.city);
    }
    if patch.state.is_some() {
        dairy.state = state_code(patch.state);
    }
    dairy.updated_at = Utc::now();
    let updated = dairy.clone();

    write_json(store, keys::PERSONAL_DAIRIES, &dairies).await?;
    Ok(Some(updated))
}

/// Deletes a personal dairy together with its price history.
pub async fn delete_personal<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let dairies: Vec<PersonalDairy> = read_list(store, keys::PERSONAL_DAIRIES).await?;
    let before = dairies.len();
    let kept: Vec<PersonalDairy> = dairies.into_iter().filter(|d| d.id != id).collect();
    let removed = kept.len() != before;

    write_json(store, keys::PERSONAL_DAIRIES, &kept).await?;
    store.remove(&keys::personal_prices(id)).await?;

    if removed {
        info!("Deleted personal dairy {} and its prices", id);
    }
    Ok(removed)
}
