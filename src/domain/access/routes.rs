//! The portal's route table and the root-route landing rules.

use super::{AccessGate, GateDecision, RoleSet};
use crate::domain::identity::{IdentityState, Role};

/// Routes the portal serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalRoute {
    /// Sign-in form. Public.
    Login,
    /// Physician dashboard (agenda, patients). Physicians and admins.
    PhysicianArea,
    /// Shell entry point. Any authenticated caller; see [`RootLanding`].
    Root,
}

impl PortalRoute {
    pub fn path(&self) -> &'static str {
        match self {
            PortalRoute::Login => "/login",
            PortalRoute::PhysicianArea => "/physician",
            PortalRoute::Root => "/",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/login" => Some(PortalRoute::Login),
            "/physician" => Some(PortalRoute::PhysicianArea),
            "" => Some(PortalRoute::Root),
            _ => None,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, PortalRoute::Login)
    }

    /// Roles allowed in. `None` means any authenticated caller.
    pub fn required_roles(&self) -> Option<RoleSet> {
        match self {
            PortalRoute::PhysicianArea => Some(RoleSet::clinical_staff()),
            PortalRoute::Login | PortalRoute::Root => None,
        }
    }

    /// Runs the gate for this route. Public routes always allow.
    pub fn guard(&self, gate: &AccessGate, state: &IdentityState) -> GateDecision {
        if self.is_public() {
            return GateDecision::Allow;
        }
        gate.evaluate(state, self.required_roles().as_ref())
    }
}

/// What the root route shows once the gate has let the caller in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootLanding {
    Hold,
    RedirectTo(String),
    AdminDashboard,
    PatientPanel,
}

impl RootLanding {
    /// Picks the landing for the root route.
    ///
    /// Loading holds. A caller without a profile cannot be routed by role and
    /// goes back to the login path. Physicians go to their area, admins get
    /// the admin dashboard in place, patients the patient panel.
    pub fn for_state(gate: &AccessGate, state: &IdentityState) -> Self {
        match PortalRoute::Root.guard(gate, state) {
            GateDecision::Hold => return RootLanding::Hold,
            GateDecision::RedirectTo(path) => return RootLanding::RedirectTo(path),
            GateDecision::Allow => {}
        }

        match state.role() {
            None => RootLanding::RedirectTo(gate.login_path().to_string()),
            Some(Role::Physician) => {
                RootLanding::RedirectTo(PortalRoute::PhysicianArea.path().to_string())
            }
            Some(Role::Admin) => RootLanding::AdminDashboard,
            Some(Role::Patient) => RootLanding::PatientPanel,
        }
    }
}
