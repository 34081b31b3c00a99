//! Sidecar discovery daemon entry point.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::signal;
use tokio::sync::watch;

use sidecar_discovery::config::Config;
use sidecar_discovery::{DockerDiscovery, DockerProvider};

/// How long shutdown waits for the background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting sidecar discovery with config: {:?}", cfg);

    let provider = Arc::new(DockerProvider::new(cfg.docker_endpoint.clone()));
    let namer = cfg.service_namer()?;
    let options = cfg.discovery_options();
    let report_interval = options.sleep_interval;

    let discovery = Arc::new(DockerDiscovery::new(provider, namer, options));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = discovery.run(shutdown_rx);

    // Status reporting
    let reporter = {
        let discovery = Arc::clone(&discovery);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(report_interval);
            loop {
                ticker.tick().await;
                report(&discovery).await;
            }
        })
    };

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    reporter.abort();
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.join()).await.is_err() {
        warn!("Discovery tasks did not stop in time");
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn report(discovery: &DockerDiscovery) {
    let services = discovery.services().await;
    let listeners = discovery.listeners().await;
    info!(
        "{} services discovered, {} change listeners, {} containers cached",
        services.len(),
        listeners.len(),
        discovery.cached_containers().await
    );

    for svc in &services {
        let (check, args) = discovery.health_check(svc).await;
        if !check.is_empty() {
            debug!("{} health check: {} {}", svc.id, check, args);
        }
    }

    match serde_json::to_string(&services) {
        Ok(json) => debug!("Services: {}", json),
        Err(e) => error!("Failed to serialize services: {}", e),
    }
}
