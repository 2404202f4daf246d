//! Portal roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// The role carried by a profile. Closed set.
///
/// Serialized in lowercase English. The clinic's profile table historically
/// stores `medico` and `paciente`; those spellings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "medico")]
    Physician,
    #[serde(alias = "paciente")]
    Patient,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Physician, Role::Patient];

    /// Returns the canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Physician => "physician",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "physician" | "medico" => Ok(Role::Physician),
            "patient" | "paciente" => Ok(Role::Patient),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Physician).unwrap(), "\"physician\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn role_deserializes_legacy_spellings() {
        let physician: Role = serde_json::from_str("\"medico\"").unwrap();
        let patient: Role = serde_json::from_str("\"paciente\"").unwrap();
        assert_eq!(physician, Role::Physician);
        assert_eq!(patient, Role::Patient);
    }

    #[test]
    fn role_rejects_unknown_value() {
        let result: Result<Role, _> = serde_json::from_str("\"nurse\"");
        assert!(result.is_err());
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn role_from_str_is_case_insensitive() {
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("MEDICO".parse::<Role>().unwrap(), Role::Physician);
    }

    #[test]
    fn display_matches_as_str() {
        for role in Role::ALL {
            assert_eq!(role.to_string(), role.as_str());
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }
}
