mod adapters;
mod application;
mod config;
mod domain;
mod interface;
mod ports;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adapters::DhcpdLeaseSource;
use application::LeaseService;
use config::Config;
use interface::http::create_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; debug mode needs the grammar traces
    let level = if config.debug { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("leasemon={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting leasemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let source = match DhcpdLeaseSource::open(&config.dhcpd()) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to load leases: {}", e);
            return Err(e.into());
        }
    };

    let store = source.store();
    let snapshot = store.snapshot();
    info!(
        "✓ Watching {} (modified {:?}, {} valid, {} expired)",
        store.path().display(),
        store.modified(),
        snapshot.valid,
        snapshot.expired
    );
    if store.is_debug() {
        debug!("Tracing every line of {}", store.path().display());
    }

    let lease_service = Arc::new(LeaseService::new(Arc::new(source)));

    // Background refresh
    let poller = lease_service.clone();
    let period = Duration::from_secs(config.poll_interval.max(1));
    tokio::spawn(async move { poller.poll(period).await });

    // Create HTTP server
    let app = create_router(lease_service);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("✓ leasemon listening on {}", addr);
    info!("  → API: http://localhost:{}/api/leases", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
