//! Unified error types for the MilkTech core.
//!
//! Validation variants are raised synchronously by mutating operations and are
//! meant to be shown to the user. Storage corruption never reaches this type:
//! the store helpers substitute defaults instead. Not-found conditions are
//! reported through `Option`/`bool` return values, not errors.

use thiserror::Error;

/// Every failure the crate reports
#[derive(Debug, Error)]
pub enum Error {
    /// `config.toml` could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A required input field was blank
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the field
        field: &'static str,
    },

    /// An input field holds a value outside its domain
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Name of the field
        field: &'static str,
        /// The rejected value
        value: String,
    },

    /// A price or share is out of its accepted range
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Another animal of the same owner already carries the ear tag
    #[error("Earring \"{earring}\" is already in use")]
    DuplicateEarring {
        /// The ear tag in conflict
        earring: String,
    },

    /// An account with the email already exists
    #[error("Email already registered: {email}")]
    DuplicateEmail {
        /// The email in conflict
        email: String,
    },

    /// No account matches the email and password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Database driver failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A document could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable could not be read
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Whether this error is a user-facing validation failure rather than an
    /// infrastructure problem.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidValue { .. }
                | Self::InvalidAmount { .. }
                | Self::DuplicateEarring { .. }
                | Self::DuplicateEmail { .. }
                | Self::InvalidCredentials
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
