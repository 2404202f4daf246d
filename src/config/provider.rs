//! Session provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::environment::Environment;
use super::error::ValidationError;
use crate::adapters::{GoTrueConfig, RestProfileConfig};

/// Hosted auth/database service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the hosted project
    pub url: String,

    /// Public (anon) API key
    pub anon_key: SecretString,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for the GoTrue session provider
    pub fn gotrue(&self) -> GoTrueConfig {
        GoTrueConfig {
            url: self.url.clone(),
            api_key: self.anon_key.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Settings for the REST profile resolver reading `table`
    pub fn rest_profiles(&self, table: &str) -> RestProfileConfig {
        RestProfileConfig {
            url: self.url.clone(),
            api_key: self.anon_key.clone(),
            table: table.to_string(),
            timeout: self.request_timeout(),
        }
    }

    /// Validate provider configuration
    ///
    /// In production, requires HTTPS for the provider URL.
    /// In development, allows plain HTTP (e.g., a local stack).
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("PROVIDER__URL"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(ValidationError::InvalidProviderUrl);
        }
        if self.anon_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PROVIDER__ANON_KEY"));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }

        // In production, require HTTPS
        if environment.is_production() && !self.url.starts_with("https://") {
            return Err(ValidationError::ProviderMustBeHttps);
        }

        Ok(())
    }
}

fn default_request_timeout() -> u64 {
    10
}
