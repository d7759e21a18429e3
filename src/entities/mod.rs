//! Entity module - SeaORM entity definitions for the persistent backend.
//! The store keeps one table of key-value documents; domain records live inside
//! the JSON payloads and are modelled in `crate::core`.

pub mod kv_document;

pub use kv_document::{
    Column as KvDocumentColumn, Entity as KvDocument, Model as KvDocumentModel,
};
