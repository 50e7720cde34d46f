//! # API Shared
//!
//! Shared definitions for the consultation service API surfaces.
//!
//! Contains:
//! - Wire request/response types (`wire` module) with conversions to and
//!   from the domain types in `consult-core`
//! - The shared `HealthService`
//!
//! Used by `api-rest` and by anything that needs to speak the service's
//! JSON dialect.

pub mod health;
pub mod wire;

pub use health::{HealthRes, HealthService};
pub use wire::*;
