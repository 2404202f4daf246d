//! Profile resolver port.
//!
//! Looks up the single application profile owned by a principal. No retry
//! policy lives here; the caller decides what a failure means.

use async_trait::async_trait;

use crate::domain::foundation::{PrincipalId, ProfileLookupError};
use crate::domain::identity::Profile;

/// Single-record profile lookup by principal id.
///
/// # Contract
///
/// Implementations must:
/// - Return the profile whose id equals `principal_id`
/// - Return `ProfileLookupError::NotFound` if no such row exists
/// - Return `ProfileLookupError::Provider` for transport or backend failures
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn fetch_profile(&self, principal_id: &PrincipalId) -> Result<Profile, ProfileLookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Role;
    use std::collections::HashMap;

    struct FixedProfiles(HashMap<String, Profile>);

    #[async_trait]
    impl ProfileResolver for FixedProfiles {
        async fn fetch_profile(&self, principal_id: &PrincipalId) -> Result<Profile, ProfileLookupError> {
            self.0
                .get(principal_id.as_str())
                .cloned()
                .ok_or(ProfileLookupError::NotFound)
        }
    }

    #[tokio::test]
    async fn resolver_returns_profile_or_not_found() {
        let id = PrincipalId::new("u1").unwrap();
        let resolver = FixedProfiles(HashMap::from([(
            "u1".to_string(),
            Profile::new(id.clone(), Role::Patient),
        )]));

        assert_eq!(resolver.fetch_profile(&id).await.unwrap().role, Role::Patient);
        assert_eq!(
            resolver.fetch_profile(&PrincipalId::new("u2").unwrap()).await,
            Err(ProfileLookupError::NotFound)
        );
    }

    #[test]
    fn profile_resolver_trait_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn ProfileResolver) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn ProfileResolver>>();
    }
}
