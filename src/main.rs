//! Main entry point for the consultation service.
//!
//! Resolves configuration from the environment, builds the REST router from
//! `api-rest` and serves it.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{app, AppState};
use consult_core::CoreConfig;

/// Starts the consultation service.
///
/// # Environment Variables
/// - `CONSULT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CONSULT_CLINIC_NAME`: Clinic name reported by `/health` (default:
///   "Main Street Clinic")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consult=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CONSULT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let clinic_name =
        std::env::var("CONSULT_CLINIC_NAME").unwrap_or_else(|_| "Main Street Clinic".into());

    let cfg = CoreConfig::new(clinic_name)?;
    tracing::info!(clinic = cfg.clinic_name(), "-- Starting consultation service on {}", rest_addr);

    let state = AppState::new(cfg);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
