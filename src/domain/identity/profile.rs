//! Application profile owned by a principal.

use serde::{Deserialize, Serialize};

use super::Role;
use crate::domain::foundation::{PrincipalId, Timestamp};

/// Application-level record describing a principal's role and contact data.
///
/// At most one profile exists per principal, and it shares the principal's id.
/// Rows from the clinic's `profiles` table deserialize directly, including
/// the legacy column names `fid`, `creado_en` and `actualizado_en`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the owning principal's id.
    pub id: PrincipalId,

    pub role: Role,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    /// Clinic-issued identifier (staff number or patient record number).
    #[serde(default, alias = "fid")]
    pub national_id: Option<String>,

    #[serde(alias = "creado_en")]
    pub created_at: Timestamp,

    #[serde(alias = "actualizado_en")]
    pub updated_at: Timestamp,
}

impl Profile {
    /// Creates a profile with only the required fields, stamped now.
    pub fn new(id: PrincipalId, role: Role) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            role,
            full_name: None,
            avatar_url: None,
            phone: None,
            national_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the display name.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Sets the contact phone.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Returns true if this profile is owned by the given principal.
    pub fn belongs_to(&self, principal_id: &PrincipalId) -> bool {
        &self.id == principal_id
    }

    /// Returns the full name, or the id when no name is on file.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pid(id: &str) -> PrincipalId {
        PrincipalId::new(id).unwrap()
    }

    #[test]
    fn deserializes_storage_row_with_legacy_columns() {
        let row = json!({
            "id": "u1",
            "role": "medico",
            "full_name": "Dr. Ana Ruiz",
            "avatar_url": null,
            "phone": "+34 600 000 000",
            "fid": "COL-2231",
            "creado_en": "2024-03-01T09:00:00+00:00",
            "actualizado_en": "2024-03-02T09:00:00+00:00"
        });

        let profile: Profile = serde_json::from_value(row).unwrap();

        assert_eq!(profile.id, pid("u1"));
        assert_eq!(profile.role, Role::Physician);
        assert_eq!(profile.national_id.as_deref(), Some("COL-2231"));
        assert!(profile.created_at.is_before(&profile.updated_at));
    }

    #[test]
    fn deserializes_canonical_row() {
        let row = json!({
            "id": "u2",
            "role": "patient",
            "created_at": "2024-03-01T09:00:00Z",
            "updated_at": "2024-03-01T09:00:00Z"
        });

        let profile: Profile = serde_json::from_value(row).unwrap();

        assert_eq!(profile.role, Role::Patient);
        assert!(profile.full_name.is_none());
    }

    #[test]
    fn rejects_row_without_role() {
        let row = json!({
            "id": "u3",
            "created_at": "2024-03-01T09:00:00Z",
            "updated_at": "2024-03-01T09:00:00Z"
        });
        assert!(serde_json::from_value::<Profile>(row).is_err());
    }

    #[test]
    fn belongs_to_compares_ids() {
        let profile = Profile::new(pid("u1"), Role::Admin);
        assert!(profile.belongs_to(&pid("u1")));
        assert!(!profile.belongs_to(&pid("u2")));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let anonymous = Profile::new(pid("u1"), Role::Patient);
        let named = anonymous.clone().with_full_name("Lucia");
        assert_eq!(anonymous.display_name(), "u1");
        assert_eq!(named.display_name(), "Lucia");
    }
}
