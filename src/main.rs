use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use table_spectate_server::config::SpectateConfig;
use table_spectate_server::metrics::{self, Metrics};
use table_spectate_server::spectate::{SpectateService, TableView};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Table Spectate Server v{}", env!("CARGO_PKG_VERSION"));

    let config = SpectateConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: delay={}s, max_spectators={}, hole_cards={}",
        config.default_delay_seconds, config.default_max_spectators, config.default_show_hole_cards
    );

    let metrics = Arc::new(Metrics::new());
    let service: Arc<SpectateService<TableView>> =
        Arc::new(SpectateService::from_config(&config).with_metrics(metrics.clone()));

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let status_service = service.clone();
    let status = async move {
        let mut interval = tokio::time::interval(STATUS_INTERVAL);
        loop {
            interval.tick().await;
            info!(
                "Spectating: {} rooms, {} spectators",
                status_service.room_count(),
                status_service.total_spectators()
            );
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
        _ = status => {}
    }

    info!("Server stopped");
    Ok(())
}
