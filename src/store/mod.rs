//! Key-value store adapter.
//!
//! Services never talk to a backend directly: they receive something that
//! implements [`KeyValueStore`] and use the typed helpers below to read and
//! write whole JSON documents. A document that is absent or fails to parse is
//! replaced by the caller's default and a warning is logged; corruption never
//! propagates as an error.

pub mod database;
pub mod keys;
pub mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

/// Raw string storage keyed by namespaced document keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Deletes the key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and decodes a JSON document, substituting `fallback` when the key is
/// absent, the payload is `null`, or the payload fails to decode.
pub async fn read_json<T, S>(store: &S, key: &str, fallback: T) -> Result<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key).await? else {
        debug!("Document '{}' absent, using default", key);
        return Ok(fallback);
    };

    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(fallback),
        Err(e) => {
            warn!("Document '{}' is corrupted, using default: {}", key, e);
            Ok(fallback)
        }
    }
}

/// Reads a collection document; absent or corrupted documents read as empty.
///
/// Records are decoded one at a time, so a single undecodable record is
/// skipped with a warning and the rest of the collection survives.
pub async fn read_list<T, S>(store: &S, key: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let values: Vec<serde_json::Value> = read_json(store, key, Vec::new()).await?;
    let total = values.len();

    let records: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping unreadable record {} of '{}': {}", index, key, e);
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(
            "Document '{}': kept {} of {} records",
            key,
            records.len(),
            total
        );
    }
    Ok(records)
}

/// Serializes `value` and writes it as a full replacement of the document.
pub async fn write_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

/// Generates a fresh opaque record id.
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        #[serde(default)]
        qty: u32,
    }

    #[tokio::test]
    async fn test_read_list_absent_is_empty() -> Result<()> {
        let store = MemoryStore::new();
        let items: Vec<Item> = read_list(&store, "missing").await?;
        assert!(items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_list_corrupted_is_empty() -> Result<()> {
        let store = MemoryStore::new();
        store.set("items", "{not json".to_string()).await?;

        let items: Vec<Item> = read_list(&store, "items").await?;
        assert!(items.is_empty());

        // Valid JSON of the wrong shape is treated the same way
        store.set("items", r#"{"id": "x"}"#.to_string()).await?;
        let items: Vec<Item> = read_list(&store, "items").await?;
        assert!(items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_read_list_skips_only_unreadable_records() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set(
                "items",
                r#"[{"id": "a", "qty": 1}, {"id": "b", "qty": "lots"}, {"qty": 2}, {"id": "c"}]"#
                    .to_string(),
            )
            .await?;

        let items: Vec<Item> = read_list(&store, "items").await?;
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_json_null_uses_fallback() -> Result<()> {
        let store = MemoryStore::new();
        store.set("session", "null".to_string()).await?;

        let value: Option<Item> = read_json(&store, "session", None).await?;
        assert!(value.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_then_read_with_field_defaults() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set("items", r#"[{"id": "a"}, {"id": "b", "qty": 3}]"#.to_string())
            .await?;

        let mut items: Vec<Item> = read_list(&store, "items").await?;
        assert_eq!(items[0].qty, 0);
        assert_eq!(items[1].qty, 3);

        items.push(Item {
            id: "c".to_string(),
            qty: 1,
        });
        write_json(&store, "items", &items).await?;

        let reread: Vec<Item> = read_list(&store, "items").await?;
        assert_eq!(reread, items);
        Ok(())
    }

    #[test]
    fn test_generate_id_is_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
