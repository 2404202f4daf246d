//! Domain layer containing the identity vocabulary and access rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `identity` - Principals, sessions, profiles, roles and the identity snapshot
//! - `access` - Pure route-access decisions driven by the identity snapshot

pub mod access;
pub mod foundation;
pub mod identity;
