use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sentinel_enricher::{api, config, Services};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Sentinel enricher starting...");

    let cfg = config::load()?;
    info!("  Mainnet mirror: {}", cfg.mirror_mainnet_url);
    info!("  Testnet mirror: {}", cfg.mirror_testnet_url);
    info!("  Port: {}", cfg.port);

    let services = Arc::new(Services::new(cfg)?);

    let api_handle = tokio::spawn({
        let services = Arc::clone(&services);
        async move { api::serve(services).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Sentinel enricher stopped.");
    Ok(())
}
