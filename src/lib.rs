//! Clinic Portal Identity - session and identity synchronization core.
//!
//! This crate keeps a single, consistent "current identity" for the
//! role-based clinical portal (admin, physician, patient). It reconciles
//! the asynchronous session notifications of the auth provider with the
//! profile records in storage, and gates route access by role.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
