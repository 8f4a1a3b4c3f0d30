//! Server configuration.

use chatsync_store::DEFAULT_STORAGE_FILE;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8084;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Storage file path.
    pub storage_path: PathBuf,
    /// Interval of the backstop save.
    pub save_interval: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            storage_path: PathBuf::from(DEFAULT_STORAGE_FILE),
            save_interval: Duration::from_secs(5 * 60),
            max_body_size: 32 * 1024 * 1024,
        }
    }

    /// Sets the storage file path.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Sets the backstop save interval.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Sets the maximum request body size.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}
