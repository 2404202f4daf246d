//! Profile source configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Where profiles are read from
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    /// The hosted REST interface (same project as the session provider)
    #[default]
    Rest,
    /// Direct PostgreSQL connection (requires the `database` section)
    Postgres,
}

/// Profile lookup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub source: ProfileSource,

    /// Table holding one row per principal
    #[serde(default = "default_table")]
    pub table: String,
}

impl ProfilesConfig {
    /// Validate profile configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PROFILES__TABLE"));
        }
        if self.table.chars().any(|c| c.is_whitespace() || c == ';') {
            return Err(ValidationError::InvalidTableName);
        }
        Ok(())
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            source: ProfileSource::default(),
            table: default_table(),
        }
    }
}

fn default_table() -> String {
    "profiles".to_string()
}
