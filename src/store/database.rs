//! SQLite-backed store using SeaORM.
//!
//! Each key maps to one row of the `kv_documents` table. Writes look the key up
//! first and either update the existing row or insert a new one, the same
//! upsert shape used for other single-row settings.

use super::KeyValueStore;
use crate::{
    entities::{KvDocument, kv_document},
    errors::Result,
};
use async_trait::async_trait;
use sea_orm::{Set, prelude::*};
use tracing::{debug, instrument};

/// Persistent key-value store over a database connection
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    /// Wraps an open connection. Tables must already exist
    /// (see [`crate::config::database::create_tables`]).
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Number of stored documents.
    pub async fn document_count(&self) -> Result<u64> {
        KvDocument::find().count(&self.db).await.map_err(Into::into)
    }
}

#[async_trait]
impl KeyValueStore for DatabaseStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let doc = KvDocument::find()
            .filter(kv_document::Column::Key.eq(key))
            .one(&self.db)
            .await?;
        Ok(doc.map(|d| d.value))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String) -> Result<()> {
        let now = chrono::Utc::now().naive_utc();

        let existing = KvDocument::find()
            .filter(kv_document::Column::Key.eq(key))
            .one(&self.db)
            .await?;

        if let Some(doc) = existing {
            let mut active_model: kv_document::ActiveModel = doc.into();
            active_model.value = Set(value);
            active_model.updated_at = Set(now);
            active_model.update(&self.db).await?;
        } else {
            let new_doc = kv_document::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value),
                updated_at: Set(now),
                ..Default::default()
            };
            new_doc.insert(&self.db).await?;
        }

        debug!("Wrote document '{}'", key);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        KvDocument::delete_many()
            .filter(kv_document::Column::Key.eq(key))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
