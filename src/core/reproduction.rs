//! Reproductive events and the reproductive status derived from them.
//!
//! The status is never stored. [`infer_state`] recomputes it from the event
//! log each time it is asked for.

use crate::{
    core::{dates, policy::null_as_default},
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::info;

/// Days from service to expected calving
pub const GESTATION_DAYS: i64 = 283;

/// Kind of reproductive event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReproKind {
    /// Artificial insemination
    #[serde(rename = "ia", alias = "insemination")]
    Insemination,
    /// Natural service
    #[serde(rename = "cobertura", alias = "service")]
    Service,
    /// Pregnancy diagnosis
    #[serde(rename = "diagnostico", alias = "diagnosis")]
    Diagnosis,
    /// Birth of a calf
    #[serde(rename = "parto", alias = "calving")]
    Calving,
}

impl ReproKind {
    /// Stored name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insemination => "ia",
            Self::Service => "cobertura",
            Self::Diagnosis => "diagnostico",
            Self::Calving => "parto",
        }
    }

    /// Insemination or natural service
    #[must_use]
    pub const fn is_service(self) -> bool {
        matches!(self, Self::Insemination | Self::Service)
    }
}

impl fmt::Display for ReproKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReproKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ia" | "insemination" => Ok(Self::Insemination),
            "cobertura" | "service" => Ok(Self::Service),
            "diagnostico" | "diagnóstico" | "diagnosis" => Ok(Self::Diagnosis),
            "parto" | "calving" => Ok(Self::Calving),
            other => Err(Error::InvalidValue {
                field: "kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A reproductive event of one animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproEvent {
    /// Unique identifier of the event
    pub id: String,
    /// Animal the event belongs to
    pub animal_id: String,
    /// What happened
    pub kind: ReproKind,
    /// Calendar day of the event
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    /// Diagnosis: positive/negative. Calving: alive/dead.
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: String,
    /// Calving: M, F or empty
    #[serde(default, deserialize_with = "null_as_default")]
    pub calf_sex: String,
    /// Free-text notes
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// When the event was recorded
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the event was last changed
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ReproEvent {
    /// Whether this is a diagnosis with a positive result.
    #[must_use]
    pub fn is_positive_diagnosis(&self) -> bool {
        self.kind == ReproKind::Diagnosis
            && matches!(
                self.result.trim().to_lowercase().as_str(),
                "positivo" | "positive"
            )
    }
}

/// Values for a new event
#[derive(Debug, Clone, Default)]
pub struct ReproInput {
    /// Animal the event belongs to
    pub animal_id: String,
    /// Kind of event, required
    pub kind: Option<ReproKind>,
    /// Calendar day, required
    pub date: String,
    /// Diagnosis or calving outcome
    pub result: Option<String>,
    /// Sex of the calf, for calvings
    pub calf_sex: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Partial edit of an event; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ReproPatch {
    /// New kind
    pub kind: Option<ReproKind>,
    /// New day
    pub date: Option<String>,
    /// New outcome
    pub result: Option<String>,
    /// New calf sex
    pub calf_sex: Option<String>,
    /// New notes
    pub notes: Option<String>,
}

/// Current reproductive status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReproStatus {
    /// No service pending confirmation
    Empty,
    /// Serviced, not yet confirmed pregnant
    Serviced,
    /// Confirmed pregnant after the last service
    Pregnant,
}

/// Derived reproductive state of one animal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproState {
    /// Inferred status
    pub status: ReproStatus,
    /// Most recent insemination or natural service
    pub last_service: Option<ReproEvent>,
    /// Most recent pregnancy diagnosis
    pub last_diagnosis: Option<ReproEvent>,
    /// Service date plus the gestation period, while pregnant
    pub expected_calving_date: Option<String>,
}

fn latest<'a>(events: &'a [ReproEvent], pred: impl Fn(&ReproEvent) -> bool) -> Option<&'a ReproEvent> {
    events.iter().filter(|&e| pred(e)).max_by(|a, b| a.date.cmp(&b.date))
}

/// Derives the reproductive state from an unordered event log.
#[must_use]
pub fn infer_state(events: &[ReproEvent]) -> ReproState {
    let last_service = latest(events, |e| e.kind.is_service());
    let last_diagnosis = latest(events, |e| e.kind == ReproKind::Diagnosis);

    let (status, expected_calving_date) = match (last_service, last_diagnosis) {
        (Some(service), Some(diagnosis))
            if diagnosis.is_positive_diagnosis() && diagnosis.date >= service.date =>
        {
            (
                ReproStatus::Pregnant,
                dates::add_days(&service.date, GESTATION_DAYS),
            )
        }
        (Some(service), diagnosis) if diagnosis.is_none_or(|d| d.date < service.date) => {
            (ReproStatus::Serviced, None)
        }
        _ => (ReproStatus::Empty, None),
    };

    ReproState {
        status,
        last_service: last_service.cloned(),
        last_diagnosis: last_diagnosis.cloned(),
        expected_calving_date,
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

/// Events of one animal, oldest first.
pub async fn list_by_animal<S>(store: &S, animal_id: &str) -> Result<Vec<ReproEvent>>
where
    S: KeyValueStore + ?Sized,
{
    let mut events: Vec<ReproEvent> = read_list::<ReproEvent, _>(store, keys::REPRODUCTION)
        .await?
        .into_iter()
        .filter(|e| e.animal_id == animal_id)
        .collect();
    events.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(events)
}

/// Current reproductive state of an animal.
pub async fn state_for_animal<S>(store: &S, animal_id: &str) -> Result<ReproState>
where
    S: KeyValueStore + ?Sized,
{
    Ok(infer_state(&list_by_animal(store, animal_id).await?))
}

/// Records a reproductive event.
///
/// # Errors
/// Returns `MissingField` without animal, kind or date and `InvalidValue` for
/// an unparseable date.
pub async fn create<S>(store: &S, input: ReproInput) -> Result<ReproEvent>
where
    S: KeyValueStore + ?Sized,
{
    if input.animal_id.trim().is_empty() {
        return Err(Error::MissingField { field: "animal_id" });
    }
    let date = required_date(&input.date)?;
    let kind = input.kind.ok_or(Error::MissingField { field: "kind" })?;

    let now = Utc::now();
    let event = ReproEvent {
        id: generate_id(),
        animal_id: input.animal_id,
        kind,
        date,
        result: input.result.unwrap_or_default(),
        calf_sex: input.calf_sex.unwrap_or_default(),
        notes: input.notes.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let mut events: Vec<ReproEvent> = read_list(store, keys::REPRODUCTION).await?;
    events.push(event.clone());
    write_json(store, keys::REPRODUCTION, &events).await?;

    info!("Recorded {} on {} for animal {}", event.kind, event.date, event.animal_id);
    Ok(event)
}

/// Edits an event; `None` for an unknown id.
pub async fn update<S>(store: &S, id: &str, patch: ReproPatch) -> Result<Option<ReproEvent>>
where
    S: KeyValueStore + ?Sized,
{
    let date = patch
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(required_date)
        .transpose()?;

    let mut events: Vec<ReproEvent> = read_list(store, keys::REPRODUCTION).await?;
    let Some(event) = events.iter_mut().find(|e| e.id == id) else {
        return Ok(None);
    };

    if let Some(kind) = patch.kind {
        event.kind = kind;
    }
    if let Some(date) = date {
        event.date = date;
    }
    if let Some(result) = patch.result {
        event.result = result;
    }
    if let Some(calf_sex) = patch.calf_sex {
        event.calf_sex = calf_sex;
    }
    if let Some(notes) = patch.notes {
        event.notes = notes;
    }
    event.updated_at = Utc::now();
    let updated = event.clone();

    write_json(store, keys::REPRODUCTION, &events).await?;
    Ok(Some(updated))
}

/// Deletes an event; returns whether it existed.
pub async fn remove<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let events: Vec<ReproEvent> = read_list(store, keys::REPRODUCTION).await?;
    let before = events.len();
    let kept: Vec<ReproEvent> = events.into_iter().filter(|e| e.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::REPRODUCTION, &kept).await?;
    Ok(removed)
}

/// Deletes every event of an animal; returns how many were removed.
pub async fn remove_by_animal<S>(store: &S, animal_id: &str) -> Result<usize>
where
    S: KeyValueStore + ?Sized,
{
    let events: Vec<ReproEvent> = read_list(store, keys::REPRODUCTION).await?;
    let before = events.len();
    let kept: Vec<ReproEvent> = events.into_iter().filter(|e| e.animal_id != animal_id).collect();
    let removed = before - kept.len();
    write_json(store, keys::REPRODUCTION, &kept).await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::MemoryStore;

    fn event(kind: ReproKind, date: &str, result: &str) -> ReproEvent {
        ReproEvent {
            id: generate_id(),
            animal_id: "cow-1".to_string(),
            kind,
            date: date.to_string(),
            result: result.to_string(),
            calf_sex: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_infer_state_pregnant_with_expected_calving() {
        let events = vec![
            event(ReproKind::Diagnosis, "2024-02-10", "Positivo"),
            event(ReproKind::Insemination, "2024-01-10", ""),
        ];
        let state = infer_state(&events);
        assert_eq!(state.status, ReproStatus::Pregnant);
        assert_eq!(state.expected_calving_date.as_deref(), Some("2024-10-19"));
        assert_eq!(state.last_service.unwrap().date, "2024-01-10");
    }

    #[test]
    fn test_infer_state_serviced_and_empty() {
        let serviced = infer_state(&[event(ReproKind::Service, "2024-01-10", "")]);
        assert_eq!(serviced.status, ReproStatus::Serviced);
        assert!(serviced.expected_calving_date.is_none());

        let empty = infer_state(&[]);
        assert_eq!(empty.status, ReproStatus::Empty);
        assert!(empty.last_service.is_none());
    }

    #[test]
    fn test_infer_state_diagnosis_before_service_is_serviced() {
        let events = vec![
            event(ReproKind::Insemination, "2024-02-01", ""),
            event(ReproKind::Diagnosis, "2024-01-15", "positive"),
        ];
        assert_eq!(infer_state(&events).status, ReproStatus::Serviced);
    }

    #[test]
    fn test_infer_state_negative_diagnosis_after_service_is_empty() {
        let events = vec![
            event(ReproKind::Insemination, "2024-01-10", ""),
            event(ReproKind::Diagnosis, "2024-02-10", "negativo"),
        ];
        let state = infer_state(&events);
        assert_eq!(state.status, ReproStatus::Empty);
        assert!(state.last_diagnosis.is_some());
    }

    #[test]
    fn test_infer_state_uses_latest_service() {
        let events = vec![
            event(ReproKind::Insemination, "2024-01-10", ""),
            event(ReproKind::Diagnosis, "2024-02-10", "positivo"),
            event(ReproKind::Service, "2024-03-01", ""),
        ];
        let state = infer_state(&events);
        assert_eq!(state.status, ReproStatus::Serviced);
        assert_eq!(state.last_service.unwrap().kind, ReproKind::Service);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&ReproKind::Insemination).unwrap(), "\"ia\"");
        let kind: ReproKind = serde_json::from_str("\"diagnostico\"").unwrap();
        assert_eq!(kind, ReproKind::Diagnosis);
        assert!(matches!(
            "ultrasound".parse::<ReproKind>(),
            Err(Error::InvalidValue { field: "kind", value: _ })
        ));
    }

    #[tokio::test]
    async fn test_event_crud_and_state_from_store() -> Result<()> {
        let store = MemoryStore::new();

        let service = create(
            &store,
            ReproInput {
                animal_id: "cow-1".to_string(),
                kind: Some(ReproKind::Insemination),
                date: "2024-01-10".to_string(),
                ..Default::default()
            },
        )
        .await?;
        let diagnosis = create(
            &store,
            ReproInput {
                animal_id: "cow-1".to_string(),
                kind: Some(ReproKind::Diagnosis),
                date: "2024-02-10".to_string(),
                result: Some("negativo".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(state_for_animal(&store, "cow-1").await?.status, ReproStatus::Empty);

        update(
            &store,
            &diagnosis.id,
            ReproPatch {
                result: Some("positivo".to_string()),
                ..Default::default()
            },
        )
        .await?
        .unwrap();
        assert_eq!(state_for_animal(&store, "cow-1").await?.status, ReproStatus::Pregnant);

        let listed = list_by_animal(&store, "cow-1").await?;
        assert_eq!(listed[0].id, service.id);

        assert!(remove(&store, &diagnosis.id).await?);
        assert_eq!(state_for_animal(&store, "cow-1").await?.status, ReproStatus::Serviced);
        assert!(update(&store, "missing", ReproPatch::default()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_validation() -> Result<()> {
        let store = MemoryStore::new();

        let missing_kind = ReproInput {
            animal_id: "cow-1".to_string(),
            date: "2024-01-10".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create(&store, missing_kind).await,
            Err(Error::MissingField { field: "kind" })
        ));

        let bad_date = ReproInput {
            animal_id: "cow-1".to_string(),
            kind: Some(ReproKind::Calving),
            date: "10/01/2024".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create(&store, bad_date).await,
            Err(Error::InvalidValue { field: "date", value: _ })
        ));

        let no_animal = ReproInput {
            kind: Some(ReproKind::Calving),
            date: "2024-01-10".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create(&store, no_animal).await,
            Err(Error::MissingField { field: "animal_id" })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_by_animal() -> Result<()> {
        let store = MemoryStore::new();
        for animal in ["cow-1", "cow-1", "cow-2"] {
            create(
                &store,
                ReproInput {
                    animal_id: animal.to_string(),
                    kind: Some(ReproKind::Service),
                    date: "2024-01-10".to_string(),
                    ..Default::default()
                },
            )
            .await?;
        }

        assert_eq!(remove_by_animal(&store, "cow-1").await?, 2);
        assert!(list_by_animal(&store, "cow-1").await?.is_empty());
        assert_eq!(list_by_animal(&store, "cow-2").await?.len(), 1);
        Ok(())
    }
}
