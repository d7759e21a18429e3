//! Application settings loaded from `config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine. The
//! path can be overridden with `MILKTECH_CONFIG`.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Database URL; `DATABASE_URL` in the environment takes precedence
    pub database_url: Option<String>,
    /// Seed demo dairies, prices, tanks and recipes into an empty store
    pub seed_sample_data: bool,
    /// Limits applied to official price updates
    pub pricing: PricingConfig,
    /// Sizes of the dashboard lists
    pub dashboard: DashboardConfig,
}

/// Accepted range for prices published by dairies
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    /// Lowest accepted price per liter
    pub min_official_price: f64,
    /// Highest accepted price per liter
    pub max_official_price: f64,
}

/// Dashboard list sizes
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Number of dairies shown in the "top prices" list
    pub top_dairies: usize,
    /// Number of upcoming vaccines shown
    pub upcoming_vaccines: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            seed_sample_data: false,
            pricing: PricingConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_official_price: 0.50,
            max_official_price: 5.00,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_dairies: 3,
            upcoming_vaccines: 5,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if config.pricing.min_official_price > config.pricing.max_official_price {
        return Err(Error::Config {
            message: "pricing.min_official_price exceeds pricing.max_official_price".to_string(),
        });
    }

    Ok(config)
}

/// Loads the application configuration from `MILKTECH_CONFIG` or `./config.toml`,
/// using defaults when the file does not exist.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("MILKTECH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        let config = load_config(&path)?;
        info!("Loaded configuration from {}", path);
        Ok(config)
    } else {
        info!("No configuration file at {}, using defaults", path);
        Ok(AppConfig::default())
    }
}
