use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ride_orchestrator::api;
use ride_orchestrator::clients::{
    HttpDriverDirectory, HttpPaymentClient, HttpPricingClient, PricingClient, StaticPriceTable,
};
use ride_orchestrator::config::{Config, LogFormat};
use ride_orchestrator::engine::{Collaborators, RideOrchestrator};
use ride_orchestrator::error::AppError;
use ride_orchestrator::observability::metrics::Metrics;
use ride_orchestrator::state::AppState;
use ride_orchestrator::store::InMemoryRideStore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let timeouts = config.call_timeouts();
    let client_error = |err: ride_orchestrator::clients::ClientError| AppError::Internal(err.to_string());

    let pricing: Arc<dyn PricingClient> = match &config.pricing_service_url {
        Some(url) => Arc::new(HttpPricingClient::new(url, timeouts.pricing).map_err(client_error)?),
        None => {
            tracing::info!("PRICING_SERVICE_URL not set; using static fare table");
            Arc::new(StaticPriceTable::standard())
        }
    };
    let drivers = HttpDriverDirectory::new(&config.users_service_url, timeouts.drivers)
        .map_err(client_error)?;
    let payments = HttpPaymentClient::new(&config.payment_service_url, timeouts.payment)
        .map_err(client_error)?;

    let orchestrator = RideOrchestrator::new(
        Collaborators {
            pricing,
            drivers: Arc::new(drivers),
            payments: Arc::new(payments),
            store: Arc::new(InMemoryRideStore::new()),
        },
        timeouts,
        Metrics::new(),
    );

    let app = api::rest::router(Arc::new(AppState::new(orchestrator)));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        users_service = %config.users_service_url,
        payment_service = %config.payment_service_url,
        "ride orchestrator started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
