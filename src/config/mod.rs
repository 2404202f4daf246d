//! Application configuration module
//!
//! This module provides type-safe configuration loading using the `config`
//! and `dotenvy` crates. Values come from an optional file named by
//! `CLINIC_PORTAL_CONFIG`, overridden by environment variables with the
//! `CLINIC_PORTAL` prefix; nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use clinic_portal_identity::config::PortalConfig;
//!
//! let config = PortalConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Provider at {}", config.provider.url);
//! ```

mod database;
mod environment;
mod error;
mod log;
mod profiles;
mod provider;

pub use database::DatabaseConfig;
pub use environment::Environment;
pub use error::{ConfigError, ValidationError};
pub use log::LogConfig;
pub use profiles::{ProfileSource, ProfilesConfig};
pub use provider::ProviderConfig;

use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "CLINIC_PORTAL_CONFIG";

/// Root application configuration
///
/// Load using [`PortalConfig::load()`].
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Hosted auth/database service
    pub provider: ProviderConfig,

    /// Profile lookup
    #[serde(default)]
    pub profiles: ProfilesConfig,

    /// Direct database access (only for `profiles.source = postgres`)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

impl PortalConfig {
    /// Load configuration from the optional file and environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads the file named by `CLINIC_PORTAL_CONFIG`, if set
    /// 3. Overlays environment variables with `CLINIC_PORTAL` prefix
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CLINIC_PORTAL__PROVIDER__URL=...` -> `provider.url = ...`
    /// - `CLINIC_PORTAL__PROFILES__SOURCE=postgres` -> `profiles.source = postgres`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The named file is missing or malformed
    /// - Required values are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from(Some(Path::new(&path))),
            _ => Self::load_from(None),
        }
    }

    /// Load configuration from `file` (if given) and environment variables
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .prefix("CLINIC_PORTAL")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid, or if
    /// profiles are read from PostgreSQL without a `database` section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.provider.validate(self.environment)?;
        self.profiles.validate()?;
        match (&self.database, self.profiles.source) {
            (Some(database), _) => database.validate()?,
            (None, ProfileSource::Postgres) => {
                return Err(ValidationError::MissingRequired("DATABASE__URL"));
            }
            (None, ProfileSource::Rest) => {}
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}
