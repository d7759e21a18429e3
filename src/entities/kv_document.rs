//! Key-value document entity - one row per store key.
//!
//! Every collection (animals, production entries, price histories, ...) is kept
//! as a single serialized JSON array under a fixed key. The `key` column is
//! unique, so a `set` is always an overwrite of the whole document.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored document model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kv_documents")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Namespaced document key (e.g., `"milktech:milk_production"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Serialized JSON document
    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// When this document was last written
    pub updated_at: DateTime,
}

/// Documents have no relationships; references between collections are ids
/// inside the JSON payloads.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
