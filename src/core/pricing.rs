//! Milk price histories and price resolution.
//!
//! Two kinds of dairies publish prices: official dairies (registered buyers,
//! all sharing one price document) and a producer's personal dairies (one
//! price document per dairy). Resolution answers "what was the price per liter
//! on this date" for either kind.

use crate::{
    config::PricingConfig,
    core::{
        dates,
        policy::{lenient_number, null_as_default},
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Which price history a dairy reference points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DairyType {
    /// A registered buyer publishing prices for everyone
    Official,
    /// A dairy the producer tracks privately
    Mine,
}

/// One price per liter effective from a given instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Unique identifier of the record
    pub id: String,
    /// Dairy publishing the price
    pub dairy_id: String,
    /// Price per liter
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_per_liter: f64,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default, deserialize_with = "null_as_default")]
    pub effective_at: String,
    /// When the record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the record was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a personal price record
#[derive(Debug, Clone, Default)]
pub struct PricePatch {
    /// New price per liter
    pub price: Option<f64>,
    /// New effective day
    pub date: Option<String>,
}

/// Sorts newest first; records with unparseable `effective_at` go last.
fn sort_newest_first(records: &mut [PriceRecord]) {
    records.sort_by(|a, b| {
        dates::parse_instant(&b.effective_at).cmp(&dates::parse_instant(&a.effective_at))
    });
}

/// Price in effect on `target_date`.
///
/// The newest record effective on or before the date wins. When the date
/// predates the whole history the oldest price is used. An empty history (or
/// one with no parseable dates) resolves to `None`.
#[must_use]
pub fn resolve_price(records: &[PriceRecord], target_date: &str) -> Option<f64> {
    let mut dated: Vec<(DateTime<Utc>, &PriceRecord)> = records
        .iter()
        .filter_map(|r| dates::parse_instant(&r.effective_at).map(|ts| (ts, r)))
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let target = dates::parse_date(target_date);
    let on_or_before = target.and_then(|target| {
        dated
            .iter()
            .find(|(ts, _)| ts.date_naive() <= target)
            .map(|(_, r)| r.price_per_liter)
    });

    on_or_before.or_else(|| dated.last().map(|(_, r)| r.price_per_liter))
}

/// Price histories preloaded for one aggregation pass
#[derive(Debug, Default)]
pub struct PriceBook {
    official: HashMap<String, Vec<PriceRecord>>,
    personal: HashMap<String, Vec<PriceRecord>>,
}

impl PriceBook {
    /// Loads the official history and the histories of the given personal dairies.
    pub async fn load<'a, S, I>(store: &S, personal_dairy_ids: I) -> Result<Self>
    where
        S: KeyValueStore + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let mut official: HashMap<String, Vec<PriceRecord>> = HashMap::new();
        for record in read_list::<PriceRecord, _>(store, keys::OFFICIAL_PRICES).await? {
            official.entry(record.dairy_id.clone()).or_default().push(record);
        }

        let mut personal = HashMap::new();
        for dairy_id in personal_dairy_ids {
            if personal.contains_key(dairy_id) {
                continue;
            }
            let records = list_personal_prices(store, dairy_id).await?;
            personal.insert(dairy_id.to_string(), records);
        }

        Ok(Self { official, personal })
    }

    /// Resolves the price of a dairy on a date.
    #[must_use]
    pub fn price_on(&self, dairy_type: DairyType, dairy_id: &str, date: &str) -> Option<f64> {
        let records = match dairy_type {
            DairyType::Official => self.official.get(dairy_id),
            DairyType::Mine => self.personal.get(dairy_id),
        }?;
        resolve_price(records, date)
    }
}

/// Price of any dairy on a date, reading its history from the store.
pub async fn price_on_date<S>(
    store: &S,
    dairy_type: DairyType,
    dairy_id: &str,
    date: &str,
) -> Result<Option<f64>>
where
    S: KeyValueStore + ?Sized,
{
    let records = match dairy_type {
        DairyType::Official => list_official_prices(store, dairy_id).await?,
        DairyType::Mine => list_personal_prices(store, dairy_id).await?,
    };
    Ok(resolve_price(&records, date))
}

// ----- Official prices -----

/// Official price history of one dairy, newest first.
pub async fn list_official_prices<S>(store: &S, dairy_id: &str) -> Result<Vec<PriceRecord>>
where
    S: KeyValueStore + ?Sized,
{
    let mut records: Vec<PriceRecord> = read_list::<PriceRecord, _>(store, keys::OFFICIAL_PRICES)
        .await?
        .into_iter()
        .filter(|p| p.dairy_id == dairy_id)
        .collect();
    sort_newest_first(&mut records);
    Ok(records)
}

/// Most recent official price record of a dairy.
pub async fn latest_official_price<S>(store: &S, dairy_id: &str) -> Result<Option<PriceRecord>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(list_official_prices(store, dairy_id).await?.into_iter().next())
}

/// Publishes a new official price effective now.
///
/// # Errors
/// Returns `MissingField` without a dairy id and `InvalidAmount` when the price
/// is outside the configured range.
pub async fn add_official_price<S>(
    store: &S,
    dairy_id: &str,
    price: f64,
    limits: &PricingConfig,
) -> Result<PriceRecord>
where
    S: KeyValueStore + ?Sized,
{
    if dairy_id.trim().is_empty() {
        return Err(Error::MissingField { field: "dairy_id" });
    }
    if !price.is_finite()
        || price < limits.min_official_price
        || price > limits.max_official_price
    {
        return Err(Error::InvalidAmount { amount: price });
    }

    let now = Utc::now();
    let record = PriceRecord {
        id: generate_id(),
        dairy_id: dairy_id.to_string(),
        price_per_liter: price,
        effective_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        created_at: now,
        updated_at: now,
    };

    let mut all: Vec<PriceRecord> = read_list(store, keys::OFFICIAL_PRICES).await?;
    all.push(record.clone());
    write_json(store, keys::OFFICIAL_PRICES, &all).await?;

    info!("Official price for dairy {} set to {:.2}", dairy_id, price);
    Ok(record)
}

// ----- Personal dairy prices -----

/// Turns a user-entered date into an effective instant. A bare date is pinned
/// to noon UTC so it keeps its calendar day; empty or unparseable input means now.
fn personal_effective_at(date: Option<&str>) -> String {
    let now = || Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let Some(input) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return now();
    };

    if input.len() == 10 {
        if let Some(noon) = dates::parse_date(input).and_then(|d| d.and_hms_opt(12, 0, 0)) {
            return noon.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
        }
    }

    dates::parse_instant(input)
        .map_or_else(now, |ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn same_day(a: &str, b: &str) -> bool {
    match (dates::parse_date(a), dates::parse_date(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn validate_personal_price(price: f64) -> Result<()> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount { amount: price })
    }
}

/// Price history of a personal dairy, newest first.
pub async fn list_personal_prices<S>(store: &S, dairy_id: &str) -> Result<Vec<PriceRecord>>
where
    S: KeyValueStore + ?Sized,
{
    let mut records: Vec<PriceRecord> = read_list(store, &keys::personal_prices(dairy_id)).await?;
    sort_newest_first(&mut records);
    Ok(records)
}

/// Records a personal dairy price. A price already recorded for the same
/// calendar day is replaced in place, keeping its id and creation time.
pub async fn add_personal_price<S>(
    store: &S,
    dairy_id: &str,
    price: f64,
    date: Option<&str>,
) -> Result<PriceRecord>
where
    S: KeyValueStore + ?Sized,
{
    if dairy_id.trim().is_empty() {
        return Err(Error::MissingField { field: "dairy_id" });
    }
    validate_personal_price(price)?;

    let key = keys::personal_prices(dairy_id);
    let mut prices: Vec<PriceRecord> = read_list(store, &key).await?;
    let effective_at = personal_effective_at(date);
    let now = Utc::now();

    let same = prices
        .iter()
        .position(|p| same_day(&p.effective_at, &effective_at));

    let record = PriceRecord {
        id: same.map_or_else(generate_id, |i| prices[i].id.clone()),
        dairy_id: dairy_id.to_string(),
        price_per_liter: price,
        effective_at,
        created_at: same.map_or(now, |i| prices[i].created_at),
        updated_at: now,
    };

    match same {
        Some(i) => {
            debug!("Replacing same-day price {} of dairy {}", record.id, dairy_id);
            prices[i] = record.clone();
        }
        None => prices.push(record.clone()),
    }

    sort_newest_first(&mut prices);
    write_json(store, &key, &prices).await?;
    Ok(record)
}

/// Updates a personal price record; `None` when it does not exist.
pub async fn update_personal_price<S>(
    store: &S,
    dairy_id: &str,
    price_id: &str,
    patch: PricePatch,
) -> Result<Option<PriceRecord>>
where
    S: KeyValueStore + ?Sized,
{
    if let Some(price) = patch.price {
        validate_personal_price(price)?;
    }

    let key = keys::personal_prices(dairy_id);
    let mut prices: Vec<PriceRecord> = read_list(store, &key).await?;
    let Some(record) = prices.iter_mut().find(|p| p.id == price_id) else {
        return Ok(None);
    };

    if let Some(price) = patch.price {
        record.price_per_liter = price;
    }
    if let Some(date) = patch.date.as_deref().filter(|d| !d.trim().is_empty()) {
        record.effective_at = personal_effective_at(Some(date));
    }
    record.updated_at = Utc::now();
    let updated = record.clone();

    sort_newest_first(&mut prices);
    write_json(store, &key, &prices).await?;
    Ok(Some(updated))
}

/// Deletes a personal price record; returns whether it existed.
pub async fn delete_personal_price<S>(store: &S, dairy_id: &str, price_id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let key = keys::personal_prices(dairy_id);
    let prices: Vec<PriceRecord> = read_list(store, &key).await?;
    let before = prices.len();
    let kept: Vec<PriceRecord> = prices.into_iter().filter(|p| p.id != price_id).collect();
    let removed = kept.len() != before;

    write_json(store, &key, &kept).await?;
    Ok(removed)
}
