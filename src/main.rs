//! Clinic payments service - main application entry point.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the gateway client, ledger and catalog
//! 5. Build HTTP router and start server on configured port

use std::sync::Arc;
use std::time::Duration;

use clinic_payments::{
    config::Config,
    db,
    gateway::{HttpGatewayClient, LoggingGateway},
    services::{catalog::PgCatalog, ledger::PgLedger},
    state::{AppState, PaymentSettings},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        environment = ?config.gateway_environment,
        provider = %config.gateway_provider,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let gateway = HttpGatewayClient::new(
        &config.gateway_base_url,
        config.gateway_private_key.clone(),
        Duration::from_secs(config.gateway_timeout_secs),
    )?;

    let settings = PaymentSettings::from_config(&config);
    if settings.events_secret.is_none() {
        tracing::warn!(
            "GATEWAY_EVENTS_SECRET is not set: webhook signatures will NOT be verified. \
             Do not expose this instance to untrusted traffic."
        );
    }

    let state = AppState {
        gateway: Arc::new(LoggingGateway::new(gateway)),
        ledger: Arc::new(PgLedger::new(pool.clone())),
        catalog: Arc::new(PgCatalog::new(pool)),
        settings: Arc::new(settings),
    };

    let app = clinic_payments::router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
