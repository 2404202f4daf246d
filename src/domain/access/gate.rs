//! Role-based route gate.

use crate::domain::identity::{IdentityState, Role};

/// Default path unauthenticated callers are sent to.
pub const LOGIN_PATH: &str = "/login";

/// Default path callers lacking a required role are sent to.
pub const HOME_PATH: &str = "/";

/// Set of roles allowed into a route.
///
/// An empty set places no role requirement: any authenticated caller passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet {
    admin: bool,
    physician: bool,
    patient: bool,
}

impl RoleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(roles: &[Role]) -> Self {
        roles.iter().copied().collect()
    }

    /// Roles allowed into the physician area.
    pub fn clinical_staff() -> Self {
        Self::of(&[Role::Physician, Role::Admin])
    }

    pub fn with(mut self, role: Role) -> Self {
        match role {
            Role::Admin => self.admin = true,
            Role::Physician => self.physician = true,
            Role::Patient => self.patient = true,
        }
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.admin,
            Role::Physician => self.physician,
            Role::Patient => self.patient,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.admin || self.physician || self.patient)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), RoleSet::with)
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Identity still resolving: render nothing, do not navigate.
    Hold,
    Allow,
    RedirectTo(String),
}

impl GateDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, GateDecision::RedirectTo(_))
    }
}

/// Decides whether the current identity may enter a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    login_path: String,
    home_path: String,
}

impl AccessGate {
    pub fn new(login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            home_path: home_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Evaluates access, in order:
    ///
    /// 1. loading - `Hold`
    /// 2. no principal - redirect to the login path
    /// 3. roles required and no profile, or a role outside the set - redirect home
    /// 4. otherwise `Allow`
    pub fn evaluate(&self, state: &IdentityState, required: Option<&RoleSet>) -> GateDecision {
        if state.is_loading() {
            return GateDecision::Hold;
        }
        if state.principal().is_none() {
            return GateDecision::RedirectTo(self.login_path.clone());
        }

        let Some(required) = required.filter(|roles| !roles.is_empty()) else {
            return GateDecision::Allow;
        };

        match state.role() {
            Some(role) if required.contains(role) => GateDecision::Allow,
            _ => GateDecision::RedirectTo(self.home_path.clone()),
        }
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(LOGIN_PATH, HOME_PATH)
    }
}
