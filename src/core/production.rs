//! Milk production ledger.
//!
//! One entry per owner, calendar day and milking shift. The `(owner_id, date,
//! shift)` tuple is the business key: [`upsert`] overwrites an existing entry
//! for the tuple instead of appending, and [`update`] merges two entries when
//! an edit makes them collide. Daily and monthly aggregation join liters
//! against the price history of the dairy each entry was sold to.

use crate::{
    core::{
        dates,
        policy::{
            self, lenient_number, lenient_optional_number, lenient_or_default, null_as_default,
        },
        pricing::{DairyType, PriceBook},
    },
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};
use tracing::{debug, info, warn};

/// Milking shift. Morning sorts before afternoon.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    /// First milking of the day
    #[default]
    Morning,
    /// Second milking
    Afternoon,
}

impl Shift {
    /// Both shifts in display order
    pub const ALL: [Self; 2] = [Self::Morning, Self::Afternoon];

    /// Stored name of the shift
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "manha" | "manhã" => Ok(Self::Morning),
            "afternoon" | "tarde" => Ok(Self::Afternoon),
            other => Err(Error::InvalidValue {
                field: "shift",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored production entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEntry {
    /// Unique identifier of the entry
    pub id: String,
    /// Producer the entry belongs to
    pub owner_id: String,
    /// Calendar day, `YYYY-MM-DD`
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    /// Older records predate shifts and read as morning
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub shift: Shift,
    /// Liters milked in the shift
    #[serde(default, deserialize_with = "lenient_number")]
    pub liters: f64,
    /// Which price history `dairy_id` points into
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub dairy_type: Option<DairyType>,
    /// Dairy the milk was sold to
    #[serde(default)]
    pub dairy_id: Option<String>,
    /// Price stamped at sale time; overrides the dairy's price history
    #[serde(default, deserialize_with = "lenient_optional_number")]
    pub unit_price_at_sale: Option<f64>,
    /// Free-text notes
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// When the entry was first recorded
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the entry was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Values submitted for one `(date, shift)` slot
#[derive(Debug, Clone, Default)]
pub struct ProductionInput {
    /// Calendar day; timestamps are cut to their date
    pub date: String,
    /// Milking shift, required
    pub shift: Option<Shift>,
    /// Liters milked; invalid values become 0
    pub liters: f64,
    /// Price history the dairy belongs to
    pub dairy_type: Option<DairyType>,
    /// Dairy the milk was sold to
    pub dairy_id: Option<String>,
    /// Price per liter agreed at sale, if known
    pub unit_price_at_sale: Option<f64>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial edit of an entry; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProductionPatch {
    /// New calendar day
    pub date: Option<String>,
    /// New shift
    pub shift: Option<Shift>,
    /// New volume
    pub liters: Option<f64>,
    /// New price history kind
    pub dairy_type: Option<DairyType>,
    /// New buyer
    pub dairy_id: Option<String>,
    /// New stamped price
    pub unit_price_at_sale: Option<f64>,
    /// New notes
    pub notes: Option<String>,
}

/// Inclusive date filter; a missing bound is open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub from: Option<String>,
    /// Last day included
    pub to: Option<String>,
}

impl DateRange {
    /// Range covering every date.
    #[must_use]
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Range from `from` to `to`, both included
    #[must_use]
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    /// Whole calendar month; `None` when the month is not 1..=12.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        dates::month_bounds(year, month).map(|(from, to)| Self::between(from, to))
    }

    fn contains(&self, date: &str) -> bool {
        let from = self.from.as_deref().map(policy::date_or_today);
        let to = self.to.as_deref().map(policy::date_or_today);
        from.is_none_or(|from| date >= from.as_str()) && to.is_none_or(|to| date <= to.as_str())
    }
}

/// One day of production
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyProduction {
    /// Calendar day
    pub date: String,
    /// Liters of the morning shift
    pub morning_liters: f64,
    /// Liters of the afternoon shift
    pub afternoon_liters: f64,
    /// Liters of both shifts
    pub total_liters: f64,
    /// Liters times the resolved price, summed per entry
    pub gross_revenue: f64,
    /// Entries of the day, morning first
    pub items: Vec<ProductionEntry>,
}

/// Totals over a period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProductionTotals {
    /// Morning liters
    pub morning: f64,
    /// Afternoon liters
    pub afternoon: f64,
    /// All liters
    pub total: f64,
    /// Revenue over the period
    pub gross_revenue: f64,
}

impl ProductionTotals {
    /// Sums a list of daily aggregates.
    #[must_use]
    pub fn from_days(days: &[DailyProduction]) -> Self {
        days.iter().fold(Self::default(), |mut acc, day| {
            acc.morning += day.morning_liters;
            acc.afternoon += day.afternoon_liters;
            acc.total += day.total_liters;
            acc.gross_revenue += day.gross_revenue;
            acc
        })
    }
}

/// Stored dates are normalized on read; unreadable ones are kept verbatim so
/// they fall outside every bounded range.
///
/// Older documents may hold the same slot twice once their timestamps are cut
/// to dates. Those collapse into one entry: the first stored keeps its id and
/// creation time and takes the values of the most recently updated copy.
async fn load_entries<S>(store: &S) -> Result<Vec<ProductionEntry>>
where
    S: KeyValueStore + ?Sized,
{
    let stored: Vec<ProductionEntry> = read_list(store, keys::PRODUCTION).await?;
    let mut entries: Vec<ProductionEntry> = Vec::with_capacity(stored.len());
    let mut slots: HashMap<(String, String, Shift), usize> = HashMap::new();

    for mut entry in stored {
        if let Some(date) = dates::normalize_date(&entry.date) {
            entry.date = date;
        }

        let slot = (entry.owner_id.clone(), entry.date.clone(), entry.shift);
        let Some(index) = slots.get(&slot).copied() else {
            slots.insert(slot, entries.len());
            entries.push(entry);
            continue;
        };

        let kept = &mut entries[index];
        warn!(
            "Merging duplicate production entry {} into {} ({} {})",
            entry.id, kept.id, entry.date, entry.shift
        );
        let created_at = kept.created_at.min(entry.created_at);
        if entry.updated_at > kept.updated_at {
            let id = std::mem::take(&mut kept.id);
            *kept = ProductionEntry { id, ..entry };
        }
        kept.created_at = created_at;
    }
    Ok(entries)
}

fn same_slot(entry: &ProductionEntry, owner_id: &str, date: &str, shift: Shift) -> bool {
    entry.owner_id == owner_id && entry.date == date && entry.shift == shift
}

/// Creates or overwrites the entry for `(owner_id, date, shift)`.
///
/// # Errors
/// Returns `MissingField` when the owner, date or shift is missing.
pub async fn upsert<S>(store: &S, owner_id: &str, input: ProductionInput) -> Result<ProductionEntry>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.trim().is_empty() {
        return Err(Error::MissingField { field: "owner_id" });
    }
    if input.date.trim().is_empty() {
        return Err(Error::MissingField { field: "date" });
    }
    let shift = input.shift.ok_or(Error::MissingField { field: "shift" })?;

    let mut entries = load_entries(store).await?;
    let date = policy::date_or_today(&input.date);
    let liters = policy::safe_number(input.liters);
    let price = input.unit_price_at_sale.map(policy::safe_number);
    let now = Utc::now();

    let result = if let Some(existing) = entries
        .iter_mut()
        .find(|e| same_slot(e, owner_id, &date, shift))
    {
        existing.liters = liters;
        existing.dairy_type = input.dairy_type;
        existing.dairy_id = input.dairy_id;
        existing.notes = input.notes.unwrap_or_default();
        existing.date = date;
        if price.is_some() {
            existing.unit_price_at_sale = price;
        }
        existing.updated_at = now;
        debug!("Overwrote production entry {}", existing.id);
        existing.clone()
    } else {
        let entry = ProductionEntry {
            id: generate_id(),
            owner_id: owner_id.to_string(),
            date,
            shift,
            liters,
            dairy_type: input.dairy_type,
            dairy_id: input.dairy_id,
            unit_price_at_sale: price,
            notes: input.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        entries.push(entry.clone());
        entry
    };

    write_json(store, keys::PRODUCTION, &entries).await?;
    info!(
        "Recorded {} L for {} {} (owner {})",
        result.liters, result.date, result.shift, owner_id
    );
    Ok(result)
}

/// Applies a partial edit to an entry. Returns `None` for an unknown id.
///
/// When the edited `(date, shift)` lands on another entry of the same owner,
/// that entry takes the edited values while keeping its id and creation time,
/// and the edited entry is removed. The surviving entry is returned.
pub async fn update<S>(store: &S, id: &str, patch: ProductionPatch) -> Result<Option<ProductionEntry>>
where
    S: KeyValueStore + ?Sized,
{
    let mut entries = load_entries(store).await?;
    let Some(idx) = entries.iter().position(|e| e.id == id) else {
        return Ok(None);
    };

    let mut next = entries[idx].clone();
    if let Some(date) = patch.date {
        next.date = policy::date_or_today(&date);
    }
    if let Some(shift) = patch.shift {
        next.shift = shift;
    }
    if let Some(liters) = patch.liters {
        next.liters = policy::safe_number(liters);
    }
    if let Some(dairy_type) = patch.dairy_type {
        next.dairy_type = Some(dairy_type);
    }
    if let Some(dairy_id) = patch.dairy_id {
        next.dairy_id = Some(dairy_id);
    }
    if let Some(price) = patch.unit_price_at_sale {
        next.unit_price_at_sale = Some(policy::safe_number(price));
    }
    if let Some(notes) = patch.notes {
        next.notes = notes;
    }
    next.updated_at = Utc::now();

    let conflict = entries
        .iter()
        .enumerate()
        .position(|(i, e)| i != idx && same_slot(e, &next.owner_id, &next.date, next.shift));

    let survivor = if let Some(conflict_idx) = conflict {
        let kept = &entries[conflict_idx];
        let merged = ProductionEntry {
            id: kept.id.clone(),
            created_at: kept.created_at,
            ..next
        };
        info!(
            "Entry {} collided with {} on {} {}, merging",
            id, merged.id, merged.date, merged.shift
        );
        entries[conflict_idx] = merged.clone();
        entries.remove(idx);
        merged
    } else {
        entries[idx] = next.clone();
        next
    };

    write_json(store, keys::PRODUCTION, &entries).await?;
    Ok(Some(survivor))
}

/// Deletes an entry; returns whether it existed.
pub async fn remove<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let entries = load_entries(store).await?;
    let before = entries.len();
    let kept: Vec<ProductionEntry> = entries.into_iter().filter(|e| e.id != id).collect();
    let removed = kept.len() != before;

    write_json(store, keys::PRODUCTION, &kept).await?;
    if removed {
        info!("Removed production entry {}", id);
    }
    Ok(removed)
}

/// Entries of an owner within the range, newest date first, morning before
/// afternoon on the same date.
pub async fn list_by_range<S>(store: &S, owner_id: &str, range: &DateRange) -> Result<Vec<ProductionEntry>>
where
    S: KeyValueStore + ?Sized,
{
    let mut entries: Vec<ProductionEntry> = load_entries(store)
        .await?
        .into_iter()
        .filter(|e| e.owner_id == owner_id && range.contains(&e.date))
        .collect();

    entries.sort_by(|a, b| b.date.cmp(&a.date).then(a.shift.cmp(&b.shift)));
    debug!("Listed {} production entries for owner {}", entries.len(), owner_id);
    Ok(entries)
}

/// Unit price applied to an entry: its stamped sale price, else the dairy's
/// price on the entry date, else zero.
#[must_use]
pub fn unit_price(entry: &ProductionEntry, prices: &PriceBook) -> f64 {
    if let Some(stamped) = entry.unit_price_at_sale {
        return policy::safe_number(stamped);
    }
    match (entry.dairy_type, entry.dairy_id.as_deref()) {
        (Some(dairy_type), Some(dairy_id)) => prices
            .price_on(dairy_type, dairy_id, &entry.date)
            .map_or(0.0, policy::safe_number),
        _ => 0.0,
    }
}

/// Groups entries by date, ascending.
#[must_use]
pub fn aggregate_entries(entries: Vec<ProductionEntry>, prices: &PriceBook) -> Vec<DailyProduction> {
    let mut days: BTreeMap<String, DailyProduction> = BTreeMap::new();

    for entry in entries {
        let day = days
            .entry(entry.date.clone())
            .or_insert_with(|| DailyProduction {
                date: entry.date.clone(),
                morning_liters: 0.0,
                afternoon_liters: 0.0,
                total_liters: 0.0,
                gross_revenue: 0.0,
                items: Vec::new(),
            });

        let liters = policy::safe_number(entry.liters);
        match entry.shift {
            Shift::Morning => day.morning_liters += liters,
            Shift::Afternoon => day.afternoon_liters += liters,
        }
        day.total_liters = day.morning_liters + day.afternoon_liters;
        day.gross_revenue += liters * unit_price(&entry, prices);
        day.items.push(entry);
    }

    days.into_values().collect()
}

/// Daily liters and gross revenue for an owner within the range.
pub async fn aggregate_by_day<S>(store: &S, owner_id: &str, range: &DateRange) -> Result<Vec<DailyProduction>>
where
    S: KeyValueStore + ?Sized,
{
    let entries = list_by_range(store, owner_id, range).await?;

    let personal_ids: Vec<String> = entries
        .iter()
        .filter(|e| e.dairy_type == Some(DairyType::Mine))
        .filter_map(|e| e.dairy_id.clone())
        .collect();
    let prices = PriceBook::load(store, personal_ids.iter().map(String::as_str)).await?;

    Ok(aggregate_entries(entries, &prices))
}

/// Totals for one calendar month.
///
/// # Errors
/// Returns `InvalidValue` when `month` is not 1..=12.
pub async fn sum_for_month<S>(store: &S, owner_id: &str, year: i32, month: u32) -> Result<ProductionTotals>
where
    S: KeyValueStore + ?Sized,
{
    let range = DateRange::month(year, month).ok_or_else(|| Error::InvalidValue {
        field: "month",
        value: format!("{year}-{month}"),
    })?;
    let days = aggregate_by_day(store, owner_id, &range).await?;
    Ok(ProductionTotals::from_days(&days))
}

/// Shifts of `today` that have no entry yet.
pub async fn missing_shifts<S>(store: &S, owner_id: &str, today: NaiveDate) -> Result<Vec<Shift>>
where
    S: KeyValueStore + ?Sized,
{
    let today = dates::to_date_string(today);
    let recorded = list_by_range(store, owner_id, &DateRange::between(today.as_str(), today.as_str())).await?;

    Ok(Shift::ALL
        .into_iter()
        .filter(|shift| !recorded.iter().any(|e| e.shift == *shift))
        .collect())
}

/// Number of shifts still to record today (0..=2).
pub async fn missing_shifts_today<S>(store: &S, owner_id: &str, today: NaiveDate) -> Result<usize>
where
    S: KeyValueStore + ?Sized,
{
    Ok(missing_shifts(store, owner_id, today).await?.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::pricing::add_personal_price,
        store::MemoryStore,
        test_utils::{price_record, production_input},
    };

    const OWNER: &str = "owner-1";

    #[tokio::test]
    async fn test_upsert_keeps_one_entry_per_slot() -> Result<()> {
        let store = MemoryStore::new();

        let first = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 10.0)).await?;
        let second = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 12.5)).await?;
        upsert(&store, OWNER, production_input("2024-01-01", Shift::Afternoon, 8.0)).await?;
        upsert(&store, "owner-2", production_input("2024-01-01", Shift::Morning, 3.0)).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.liters, 12.5);

        let entries = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(entries.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_mistyped_record_does_not_wipe_ledger() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set(
                keys::PRODUCTION,
                r#"[
                    {"id":"good","owner_id":"owner-1","date":"2024-01-01","shift":"morning","liters":10},
                    {"id":"typed","owner_id":"owner-1","date":"2024-01-02","shift":"morning","liters":"12,5","unit_price_at_sale":"2.10","dairy_type":"someone"},
                    {"id":"nodate","owner_id":"owner-1","date":null,"shift":"afternoon","liters":1}
                ]"#
                .to_string(),
            )
            .await?;

        let before = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(before.len(), 3);
        let typed = before.iter().find(|e| e.id == "typed").unwrap();
        assert_eq!(typed.liters, 12.5);
        assert_eq!(typed.unit_price_at_sale, Some(2.1));
        assert_eq!(typed.dairy_type, None);

        upsert(&store, OWNER, production_input("2024-01-03", Shift::Morning, 5.0)).await?;

        let after = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(after.len(), 4);
        for id in ["good", "typed", "nodate"] {
            assert!(after.iter().any(|e| e.id == id), "{id} was lost");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_duplicate_slots_collapse() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set(
                keys::PRODUCTION,
                r#"[
                    {"id":"old","owner_id":"owner-1","date":"2024-01-01T08:00:00Z","shift":"morning","liters":10,
                     "created_at":"2024-01-01T08:00:00Z","updated_at":"2024-01-01T08:00:00Z"},
                    {"id":"new","owner_id":"owner-1","date":"2024-01-01","shift":"morning","liters":12,
                     "created_at":"2024-01-02T08:00:00Z","updated_at":"2024-01-02T08:00:00Z"}
                ]"#
                .to_string(),
            )
            .await?;

        let entries = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "old");
        assert_eq!(entries[0].liters, 12.0);

        let days = aggregate_by_day(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(days[0].total_liters, 12.0);

        let entry = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 15.0)).await?;
        assert_eq!(entry.id, "old");
        let stored: Vec<ProductionEntry> = read_list(&store, keys::PRODUCTION).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].liters, 15.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_requires_slot_fields() -> Result<()> {
        let store = MemoryStore::new();

        let mut input = production_input("2024-01-01", Shift::Morning, 1.0);
        input.shift = None;
        assert!(matches!(
            upsert(&store, OWNER, input).await,
            Err(Error::MissingField { field: "shift" })
        ));

        let input = production_input("", Shift::Morning, 1.0);
        assert!(matches!(
            upsert(&store, OWNER, input).await,
            Err(Error::MissingField { field: "date" })
        ));

        let input = production_input("2024-01-01", Shift::Morning, 1.0);
        assert!(matches!(
            upsert(&store, "  ", input).await,
            Err(Error::MissingField { field: "owner_id" })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_self_heals_bad_numbers_and_dates() -> Result<()> {
        let store = MemoryStore::new();

        let mut input = production_input("2024-01-01T08:00:00.000Z", Shift::Morning, f64::NAN);
        input.unit_price_at_sale = Some(-2.0);
        let entry = upsert(&store, OWNER, input).await?;
        assert_eq!(entry.date, "2024-01-01");
        assert_eq!(entry.liters, 0.0);
        assert_eq!(entry.unit_price_at_sale, Some(0.0));

        let entry = upsert(&store, OWNER, production_input("not a date", Shift::Morning, -5.0)).await?;
        assert_eq!(entry.date, dates::today_string());
        assert_eq!(entry.liters, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_keeps_stamped_price_when_not_provided() -> Result<()> {
        let store = MemoryStore::new();

        let mut input = production_input("2024-01-01", Shift::Morning, 10.0);
        input.unit_price_at_sale = Some(2.4);
        upsert(&store, OWNER, input).await?;

        let entry = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 11.0)).await?;
        assert_eq!(entry.unit_price_at_sale, Some(2.4));
        assert_eq!(entry.liters, 11.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_merges_on_collision() -> Result<()> {
        let store = MemoryStore::new();
        let a = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 10.0)).await?;
        let b = upsert(&store, OWNER, production_input("2024-01-02", Shift::Afternoon, 7.0)).await?;

        let survivor = update(
            &store,
            &b.id,
            ProductionPatch {
                date: Some("2024-01-01".to_string()),
                shift: Some(Shift::Morning),
                ..Default::default()
            },
        )
        .await?
        .unwrap();

        assert_eq!(survivor.id, a.id);
        assert_eq!(survivor.created_at, a.created_at);
        assert_eq!(survivor.liters, 7.0);

        let entries = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, a.id);
        assert!(entries.iter().all(|e| e.id != b.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_without_collision_and_unknown_id() -> Result<()> {
        let store = MemoryStore::new();
        let a = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 10.0)).await?;

        let edited = update(
            &store,
            &a.id,
            ProductionPatch {
                liters: Some(15.0),
                notes: Some("rain".to_string()),
                ..Default::default()
            },
        )
        .await?
        .unwrap();
        assert_eq!(edited.id, a.id);
        assert_eq!(edited.liters, 15.0);
        assert_eq!(edited.notes, "rain");

        assert!(update(&store, "missing", ProductionPatch::default()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        let a = upsert(&store, OWNER, production_input("2024-01-01", Shift::Morning, 10.0)).await?;

        assert!(remove(&store, &a.id).await?);
        assert!(!remove(&store, &a.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_by_range_sorting_and_bounds() -> Result<()> {
        let store = MemoryStore::new();
        upsert(&store, OWNER, production_input("2024-01-02", Shift::Afternoon, 1.0)).await?;
        upsert(&store, OWNER, production_input("2024-01-02", Shift::Morning, 2.0)).await?;
        upsert(&store, OWNER, production_input("2024-01-05", Shift::Morning, 3.0)).await?;
        upsert(&store, OWNER, production_input("2023-12-31", Shift::Morning, 4.0)).await?;

        let range = DateRange::between("2024-01-01", "2024-01-05");
        let entries = list_by_range(&store, OWNER, &range).await?;
        let slots: Vec<(&str, Shift)> = entries.iter().map(|e| (e.date.as_str(), e.shift)).collect();
        assert_eq!(
            slots,
            vec![
                ("2024-01-05", Shift::Morning),
                ("2024-01-02", Shift::Morning),
                ("2024-01-02", Shift::Afternoon),
            ]
        );

        let open_start = DateRange {
            from: None,
            to: Some("2024-01-01".to_string()),
        };
        assert_eq!(list_by_range(&store, OWNER, &open_start).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_records_without_shift_read_as_morning() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set(
                keys::PRODUCTION,
                r#"[{"id":"old","owner_id":"owner-1","date":"2024-01-03","liters":9,"shift":null,"notes":null}]"#
                    .to_string(),
            )
            .await?;

        let entries = list_by_range(&store, OWNER, &DateRange::all()).await?;
        assert_eq!(entries[0].shift, Shift::Morning);
        assert_eq!(entries[0].notes, "");
        Ok(())
    }

    #[tokio::test]
    async fn test_aggregate_by_day_joins_price_history() -> Result<()> {
        let store = MemoryStore::new();
        write_json(
            &store,
            keys::OFFICIAL_PRICES,
            &vec![
                price_record("p1", "dairy", 2.00, "2024-03-01"),
                price_record("p2", "dairy", 2.50, "2024-03-15"),
            ],
        )
        .await?;
        add_personal_price(&store, "mine", 3.00, Some("2024-03-01")).await?;

        let official = |date: &str, shift, liters| {
            let mut input = production_input(date, shift, liters);
            input.dairy_type = Some(DairyType::Official);
            input.dairy_id = Some("dairy".to_string());
            input
        };

        upsert(&store, OWNER, official("2024-02-01", Shift::Morning, 10.0)).await?;
        upsert(&store, OWNER, official("2024-03-10", Shift::Morning, 10.0)).await?;
        upsert(&store, OWNER, official("2024-03-20", Shift::Morning, 10.0)).await?;

        let mut mine = production_input("2024-03-10", Shift::Afternoon, 5.0);
        mine.dairy_type = Some(DairyType::Mine);
        mine.dairy_id = Some("mine".to_string());
        upsert(&store, OWNER, mine).await?;

        let mut stamped = official("2024-03-21", Shift::Afternoon, 4.0);
        stamped.unit_price_at_sale = Some(1.0);
        upsert(&store, OWNER, stamped).await?;

        // No dairy reference: no revenue
        upsert(&store, OWNER, production_input("2024-03-22", Shift::Morning, 6.0)).await?;

        let days = aggregate_by_day(&store, OWNER, &DateRange::all()).await?;
        let dates: Vec<&str> = days.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(
            dates,
            vec!["2024-02-01", "2024-03-10", "2024-03-20", "2024-03-21", "2024-03-22"]
        );

        assert_eq!(days[0].gross_revenue, 20.0);
        assert_eq!(days[1].morning_liters, 10.0);
        assert_eq!(days[1].afternoon_liters, 5.0);
        assert_eq!(days[1].total_liters, 15.0);
        assert_eq!(days[1].gross_revenue, 20.0 + 15.0);
        assert_eq!(days[1].items.len(), 2);
        assert_eq!(days[2].gross_revenue, 25.0);
        assert_eq!(days[3].gross_revenue, 4.0);
        assert_eq!(days[4].gross_revenue, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_month_sum_matches_daily_aggregation() -> Result<()> {
        let store = MemoryStore::new();
        for (date, shift, liters, price) in [
            ("2024-02-01", Shift::Morning, 10.0, 2.0),
            ("2024-02-01", Shift::Afternoon, 6.5, 2.0),
            ("2024-02-29", Shift::Morning, 3.25, 2.5),
            ("2024-03-01", Shift::Morning, 100.0, 2.5),
        ] {
            let mut input = production_input(date, shift, liters);
            input.unit_price_at_sale = Some(price);
            upsert(&store, OWNER, input).await?;
        }

        let range = DateRange::month(2024, 2).unwrap();
        let first = aggregate_by_day(&store, OWNER, &range).await?;
        let second = aggregate_by_day(&store, OWNER, &range).await?;
        assert_eq!(first, second);

        let totals = sum_for_month(&store, OWNER, 2024, 2).await?;
        assert_eq!(totals, ProductionTotals::from_days(&first));
        assert_eq!(totals.morning, 13.25);
        assert_eq!(totals.afternoon, 6.5);
        assert_eq!(totals.total, 19.75);
        assert_eq!(totals.gross_revenue, 10.0 * 2.0 + 6.5 * 2.0 + 3.25 * 2.5);

        assert!(matches!(
            sum_for_month(&store, OWNER, 2024, 13).await,
            Err(Error::InvalidValue { field: "month", value: _ })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_shifts_today() -> Result<()> {
        let store = MemoryStore::new();
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        assert_eq!(missing_shifts_today(&store, OWNER, today).await?, 2);
        upsert(&store, OWNER, production_input("2024-05-10", Shift::Afternoon, 1.0)).await?;
        assert_eq!(missing_shifts(&store, OWNER, today).await?, vec![Shift::Morning]);
        upsert(&store, OWNER, production_input("2024-05-10", Shift::Morning, 1.0)).await?;
        assert_eq!(missing_shifts_today(&store, OWNER, today).await?, 0);
        Ok(())
    }

    #[test]
    fn test_shift_parsing() {
        assert_eq!("Morning".parse::<Shift>().unwrap(), Shift::Morning);
        assert_eq!("tarde".parse::<Shift>().unwrap(), Shift::Afternoon);
        assert!(matches!(
            "night".parse::<Shift>(),
            Err(Error::InvalidValue { field: "shift", value: _ })
        ));
        assert!(Shift::Morning < Shift::Afternoon);
    }
}
