//! The identity snapshot every consumer reads.
//!
//! `IdentityState` is replaced as a whole on every transition, so a reader
//! can never pair the principal of one snapshot with the profile of another.
//!
//! Invariants carried by the type:
//! - no principal means no profile (only `Authenticated` holds a profile)
//! - a held profile always belongs to the held principal (`ResolvedIdentity::new`)
//! - `is_loading()` is true only in `Loading`

use super::{Principal, Profile, Role, Session};
use crate::domain::foundation::{StateMachine, ValidationError};

/// A session paired with the profile owned by its principal.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    session: Session,
    profile: Profile,
}

impl ResolvedIdentity {
    /// Pairs a session with a profile, rejecting a profile owned by someone else.
    pub fn new(session: Session, profile: Profile) -> Result<Self, ValidationError> {
        if !profile.belongs_to(session.principal_id()) {
            return Err(ValidationError::invalid_format(
                "profile.id",
                format!(
                    "profile '{}' does not belong to principal '{}'",
                    profile.id,
                    session.principal_id()
                ),
            ));
        }
        Ok(Self { session, profile })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn principal(&self) -> &Principal {
        self.session.principal()
    }

    /// Swaps in a newer session for the same principal, keeping the profile.
    ///
    /// Returns `None` if the session belongs to a different principal.
    pub fn refreshed(&self, session: Session) -> Option<Self> {
        if session.principal_id() != self.session.principal_id() {
            return None;
        }
        Some(Self {
            session,
            profile: self.profile.clone(),
        })
    }
}

/// Externally observable identity snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityState {
    /// Waiting for the profile of `pending` (or for the first session lookup).
    Loading { pending: Option<Session> },

    Unauthenticated,

    Authenticated(ResolvedIdentity),

    /// Valid session, but the principal's profile is missing or unreadable.
    AuthenticatedNoProfile { session: Session },
}

impl IdentityState {
    /// The state at process start: loading, nothing known yet.
    pub fn initial() -> Self {
        IdentityState::Loading { pending: None }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, IdentityState::Loading { .. })
    }

    /// The session currently held, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            IdentityState::Loading { pending } => pending.as_ref(),
            IdentityState::Unauthenticated => None,
            IdentityState::Authenticated(resolved) => Some(resolved.session()),
            IdentityState::AuthenticatedNoProfile { session } => Some(session),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session().map(Session::principal)
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            IdentityState::Authenticated(resolved) => Some(resolved.profile()),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.profile().map(|p| p.role)
    }

    pub fn phase(&self) -> IdentityPhase {
        match self {
            IdentityState::Loading { .. } => IdentityPhase::Loading,
            IdentityState::Unauthenticated => IdentityPhase::Unauthenticated,
            IdentityState::Authenticated(_) => IdentityPhase::Authenticated,
            IdentityState::AuthenticatedNoProfile { .. } => IdentityPhase::AuthenticatedNoProfile,
        }
    }
}

impl Default for IdentityState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Payload-free projection of `IdentityState`, used to check transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityPhase {
    Loading,
    Unauthenticated,
    Authenticated,
    AuthenticatedNoProfile,
}

impl IdentityPhase {
    /// Everything except `Loading` is a steady state.
    pub fn is_steady(&self) -> bool {
        !matches!(self, IdentityPhase::Loading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityPhase::Loading => "loading",
            IdentityPhase::Unauthenticated => "unauthenticated",
            IdentityPhase::Authenticated => "authenticated",
            IdentityPhase::AuthenticatedNoProfile => "authenticated_no_profile",
        }
    }
}

impl StateMachine for IdentityPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use IdentityPhase::*;
        match self {
            Loading => vec![Loading, Unauthenticated, Authenticated, AuthenticatedNoProfile],
            Unauthenticated => vec![Loading, Unauthenticated],
            Authenticated => vec![Loading, Unauthenticated, Authenticated],
            AuthenticatedNoProfile => {
                vec![Loading, Unauthenticated, Authenticated, AuthenticatedNoProfile]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PrincipalId;

    fn session(id: &str) -> Session {
        Session::new(Principal::new(PrincipalId::new(id).unwrap()), format!("token-{}", id))
    }

    fn profile(id: &str, role: Role) -> Profile {
        Profile::new(PrincipalId::new(id).unwrap(), role)
    }

    #[test]
    fn initial_state_is_loading_without_principal() {
        let state = IdentityState::initial();
        assert!(state.is_loading());
        assert!(state.principal().is_none());
        assert!(state.profile().is_none());
    }

    #[test]
    fn resolved_identity_rejects_foreign_profile() {
        let result = ResolvedIdentity::new(session("u1"), profile("u2", Role::Admin));
        assert!(result.is_err());
    }

    #[test]
    fn authenticated_state_exposes_principal_profile_and_role() {
        let resolved = ResolvedIdentity::new(session("u1"), profile("u1", Role::Physician)).unwrap();
        let state = IdentityState::Authenticated(resolved);

        assert!(!state.is_loading());
        assert_eq!(state.principal().unwrap().id.as_str(), "u1");
        assert_eq!(state.role(), Some(Role::Physician));
        assert_eq!(state.phase(), IdentityPhase::Authenticated);
    }

    #[test]
    fn no_profile_state_has_principal_but_no_profile() {
        let state = IdentityState::AuthenticatedNoProfile { session: session("u2") };
        assert!(state.principal().is_some());
        assert!(state.profile().is_none());
    }

    #[test]
    fn unauthenticated_has_neither_principal_nor_profile() {
        let state = IdentityState::Unauthenticated;
        assert!(state.principal().is_none());
        assert!(state.profile().is_none());
        assert!(!state.is_loading());
    }

    #[test]
    fn refreshed_keeps_profile_for_same_principal_only() {
        let resolved = ResolvedIdentity::new(session("u1"), profile("u1", Role::Admin)).unwrap();
        let newer = Session::new(Principal::new(PrincipalId::new("u1").unwrap()), "token-2");

        let refreshed = resolved.refreshed(newer.clone()).unwrap();
        assert_eq!(refreshed.session(), &newer);
        assert_eq!(refreshed.profile().role, Role::Admin);
        assert!(resolved.refreshed(session("u9")).is_none());
    }

    #[test]
    fn loading_is_the_only_unsteady_phase() {
        assert!(!IdentityPhase::Loading.is_steady());
        assert!(IdentityPhase::Unauthenticated.is_steady());
        assert!(IdentityPhase::Authenticated.is_steady());
        assert!(IdentityPhase::AuthenticatedNoProfile.is_steady());
    }

    #[test]
    fn unauthenticated_cannot_jump_straight_to_a_profile() {
        assert!(IdentityPhase::Unauthenticated
            .transition_to(IdentityPhase::Authenticated)
            .is_err());
        assert!(IdentityPhase::Unauthenticated
            .transition_to(IdentityPhase::AuthenticatedNoProfile)
            .is_err());
    }

    #[test]
    fn every_phase_can_sign_out_and_none_is_terminal() {
        for phase in [
            IdentityPhase::Loading,
            IdentityPhase::Unauthenticated,
            IdentityPhase::Authenticated,
            IdentityPhase::AuthenticatedNoProfile,
        ] {
            assert!(phase.can_transition_to(&IdentityPhase::Unauthenticated));
            assert!(!phase.is_terminal());
        }
    }
}
