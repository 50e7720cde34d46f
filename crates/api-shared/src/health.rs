use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response shared by every API surface.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Simple health service usable from any API surface.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Reports the service as alive, naming the clinic it serves.
    pub fn check_health(clinic_name: &str) -> HealthRes {
        HealthRes {
            ok: true,
            message: format!("{clinic_name} consultation service is alive"),
        }
    }
}
