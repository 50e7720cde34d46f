//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into
//! services, so request handling never reads process-wide environment
//! variables mid-flight.

use crate::error::{ConsultError, ConsultResult};
use crate::service::ServiceError;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    clinic_name: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Rejects a blank clinic name.
    pub fn new(clinic_name: String) -> ConsultResult<Self> {
        if clinic_name.trim().is_empty() {
            return Err(ConsultError::Service(ServiceError::Validation(
                "clinic name cannot be empty".into(),
            )));
        }
        Ok(Self { clinic_name })
    }

    pub fn clinic_name(&self) -> &str {
        &self.clinic_name
    }
}
