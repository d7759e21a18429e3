//! Farm-management services.
//!
//! Every service is a set of free async functions over a
//! [`KeyValueStore`](crate::store::KeyValueStore), so the same code runs
//! against the `SQLite` store and the in-memory store used by tests.

pub mod animal;
pub mod auth;
pub mod dairy;
pub mod dashboard;
pub mod dates;
pub mod feed;
pub mod movement;
pub mod policy;
pub mod pricing;
pub mod production;
pub mod reproduction;
pub mod sample_data;
pub mod vaccine;
