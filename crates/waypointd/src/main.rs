//! waypointd — peer reputation and catchup coordination daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use waypoint_api::ApiState;
use waypoint_core::config::WaypointConfig;
use waypoint_core::Error;
use waypoint_services::{CatchupTracker, PeerRegistry, PeerService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WaypointConfig::load()?;
    tracing::info!(api_port = config.api.port, "waypointd starting");

    let registry = Arc::new(PeerRegistry::new());

    match registry.load_snapshot(&config.snapshot.directory) {
        Ok(()) => tracing::info!(peers = registry.peer_count(), "peer registry snapshot loaded"),
        Err(e @ (Error::Corruption(_) | Error::VersionMismatch { .. })) => {
            tracing::warn!(error = %e, "ignoring unusable registry snapshot, starting fresh");
        }
        Err(e) => return Err(e.into()),
    }

    let reputation = Arc::new(PeerService::new(registry.clone()));
    let catchup = Arc::new(CatchupTracker::new());

    // Periodic snapshot save
    let snapshot_task = {
        let registry = registry.clone();
        let dir = config.snapshot.directory.clone();
        let period = Duration::from_secs(config.snapshot.interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // the first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if let Err(e) = registry.save_snapshot(&dir) {
                    tracing::warn!(error = %e, "periodic registry snapshot failed");
                }
            }
        })
    };

    let api_task = {
        let state = ApiState {
            registry: Some(registry.clone()),
            reputation: Some(reputation),
            catchup: Some(catchup),
        };
        let port = config.api.port;

        tokio::spawn(async move {
            if let Err(e) = waypoint_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        r = snapshot_task => tracing::error!("snapshot task exited: {:?}", r),
        r = api_task => tracing::error!("API task exited: {:?}", r),
    }

    // One last snapshot so counters survive the restart
    if let Err(e) = registry.save_snapshot(&config.snapshot.directory) {
        tracing::warn!(error = %e, "final registry snapshot failed");
    } else {
        tracing::info!("final registry snapshot written");
    }

    Ok(())
}
