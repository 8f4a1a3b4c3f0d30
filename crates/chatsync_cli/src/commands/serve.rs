//! Serve command implementation.

use chatsync_server::{ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Runs the sync server until Ctrl-C.
pub fn run(
    addr: SocketAddr,
    storage: PathBuf,
    save_interval_secs: u64,
    max_body_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::new(addr)
        .with_storage_path(storage)
        .with_save_interval(Duration::from_secs(save_interval_secs.max(1)))
        .with_max_body_size(max_body_size);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let server = SyncServer::open(config)?;
        server.run(shutdown_signal()).await
    })?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
