/// Database connection and schema creation
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;

pub use settings::{AppConfig, DashboardConfig, PricingConfig, load_app_configuration};
