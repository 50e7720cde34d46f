//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the consultation REST API on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server
//! (with OpenAPI/Swagger UI). The workspace's main `consult-run` binary is
//! the production entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use consult_core::CoreConfig;

/// Main entry point for the consultation REST API server.
///
/// Starts the REST API server on the configured address (default:
/// 0.0.0.0:3000) with OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `CONSULT_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CONSULT_CLINIC_NAME`: Clinic name reported by `/health` (default:
///   "Main Street Clinic")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the clinic name is blank,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CONSULT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let clinic_name =
        std::env::var("CONSULT_CLINIC_NAME").unwrap_or_else(|_| "Main Street Clinic".into());

    tracing::info!("-- Starting consultation REST API on {}", addr);

    let cfg = CoreConfig::new(clinic_name)?;
    let state = AppState::new(cfg);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
