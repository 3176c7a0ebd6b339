//! ContactSync Daemon - Main Entry Point
//! JSON-RPC server + sync worker + watchdog

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use config::DaemonConfig;
use contactsync_api_rpc::{RpcHandler, RpcServer, SessionHub};
use contactsync_core::application::{shutdown_channel, JobTracker, PipelineDeps, SyncService};
use contactsync_core::port::id_provider::UuidProvider;
use contactsync_core::port::time_provider::SystemTimeProvider;
use contactsync_core::port::{ChannelBroadcaster, InMemorySessionRegistry};
use contactsync_infra_csv::{LinkedInCsvSource, UploadStaging};
use contactsync_infra_notion::NotionStoreFactory;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = telemetry::init_logging(&config).context("Failed to initialize logging")?;
    telemetry::report();

    info!("ContactSync daemon v{} starting...", VERSION);
    info!(
        upload_dir = %config.upload_dir.display(),
        queue_capacity = config.pipeline.queue_capacity,
        max_attempts = config.pipeline.retry_policy.max_attempts,
        sync_timeout_secs = config.pipeline.sync_timeout.as_secs(),
        session_ttl_secs = config.pipeline.session_ttl.as_secs(),
        "Configuration loaded"
    );

    // 2. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let sessions = Arc::new(InMemorySessionRegistry::new(time_provider.clone()));
    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let store_factory = NotionStoreFactory::new(config.notion.clone())
        .context("Failed to build Notion client")?;

    let deps = PipelineDeps {
        store_factory: Arc::new(store_factory),
        source: Arc::new(LinkedInCsvSource::new()),
        broadcaster: broadcaster.clone(),
        sessions: sessions.clone(),
        tracker: Arc::new(JobTracker::new(time_provider.clone())),
        time_provider: time_provider.clone(),
    };
    let pipeline = SyncService::build(deps, Arc::new(UuidProvider), config.pipeline.clone());

    // 3. Start worker and watchdog
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker_handle = tokio::spawn(pipeline.worker.run(shutdown_rx.clone()));
    let watchdog_handle = tokio::spawn(pipeline.watchdog.run(shutdown_rx));

    // 4. Start JSON-RPC server
    let hub = Arc::new(SessionHub::new(sessions, broadcaster, Arc::new(UuidProvider)));
    let handler = Arc::new(RpcHandler::new(
        pipeline.service,
        hub,
        UploadStaging::new(config.upload_dir.clone()),
    ));
    let (addr, rpc_handle) = RpcServer::new(config.rpc.clone(), handler)
        .start()
        .await
        .context("RPC server start failed")?;

    info!(addr = %addr, "System ready. Waiting for sync requests...");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    rpc_handle.stop().context("RPC server stop failed")?;
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), watchdog_handle).await;

    info!("Shutdown complete.");
    Ok(())
}
