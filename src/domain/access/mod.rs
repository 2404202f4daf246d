//! Access module - route gating driven by the identity snapshot.
//!
//! Everything here is a pure function of its inputs: no I/O, no clocks,
//! no shared state. The router asks, the gate answers.

mod gate;
mod routes;

pub use gate::{AccessGate, GateDecision, RoleSet};
pub use routes::{PortalRoute, RootLanding};
