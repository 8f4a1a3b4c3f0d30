//! Server lifecycle: load, serve, save on the way out.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::RequestHandler;
use crate::http::build_router;
use crate::saver::{BackgroundSaver, SaveSignal};
use axum::Router;
use chatsync_store::{LoadStatus, PersistenceManager, Store};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// The sync server.
///
/// Owns the store, its persistence and the request handler. The store is
/// loaded once on construction; saving happens in a background task while
/// the server is running and once more after it stops.
///
/// # Example
///
/// ```no_run
/// use chatsync_server::{ServerConfig, SyncServer};
///
/// # async fn run() -> chatsync_server::ServerResult<()> {
/// let config = ServerConfig::default().with_storage_path("/var/lib/chatsync/storage.json");
/// let server = SyncServer::open(config)?;
/// server.run(async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
pub struct SyncServer {
    config: ServerConfig,
    handler: RequestHandler,
    persistence: Arc<PersistenceManager>,
    load_status: LoadStatus,
}

impl SyncServer {
    /// Opens the storage at `config.storage_path`, taking its advisory lock,
    /// and loads it.
    ///
    /// An unreadable storage file is logged and the server starts empty.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let persistence = PersistenceManager::open_locked(&config.storage_path)?;
        Ok(Self::with_persistence(config, persistence))
    }

    /// Creates a server over an existing persistence manager and loads it.
    pub fn with_persistence(config: ServerConfig, persistence: PersistenceManager) -> Self {
        let store = Arc::new(Store::new());
        let load_status = persistence.load_into(&store);
        let handler = RequestHandler::new(store, Arc::new(SaveSignal::new()));

        Self {
            config,
            handler,
            persistence: Arc::new(persistence),
            load_status,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<Store> {
        self.handler.store()
    }

    /// Returns how the storage file was loaded.
    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> Router {
        build_router(self.handler.clone(), self.config.max_body_size)
    }

    /// Binds `config.bind_addr` and serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on `listener` until `shutdown` resolves, then drains in-flight
    /// requests and saves the store one last time.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let saver = BackgroundSaver::spawn(
            Arc::clone(self.handler.store()),
            Arc::clone(&self.persistence),
            Arc::clone(self.handler.save_signal()),
            self.config.save_interval,
        );

        let addr = listener.local_addr()?;
        info!(
            %addr,
            storage = %self.persistence.path().display(),
            tokens = self.store().token_count(),
            "sync server listening"
        );

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        info!("sync server stopping");
        saver.shutdown().await;
        served?;
        Ok(())
    }
}
