//! Background persistence.
//!
//! Mutating handlers never touch the disk. They call
//! [`SaveSignal::request_save`], and one saver task performs the writes:
//!
//! - on request (a burst of requests collapses into one save)
//! - on a fixed interval, as a backstop
//! - once more on shutdown

use chatsync_store::{PersistenceManager, Store};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Coalescing save trigger shared by the handler and the saver task.
#[derive(Debug, Default)]
pub struct SaveSignal {
    notify: Notify,
    requested: AtomicU64,
    completed: AtomicU64,
}

impl SaveSignal {
    /// Creates a new signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the saver to persist the store soon. Never blocks.
    ///
    /// At most one request is pending at a time; further calls before the
    /// saver wakes up are absorbed by it.
    pub fn request_save(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Number of save requests made so far.
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    /// Number of saves the saver has finished (successful or not).
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }

    fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }
}

/// Why the saver ran a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveReason {
    Requested,
    Interval,
    Shutdown,
}

/// Handle to a running saver task.
#[derive(Debug)]
pub struct BackgroundSaver {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl BackgroundSaver {
    /// Spawns the saver on the current tokio runtime.
    pub fn spawn(
        store: Arc<Store>,
        persistence: Arc<PersistenceManager>,
        signal: Arc<SaveSignal>,
        interval: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(store, persistence, signal, interval, shutdown_rx));
        Self { handle, shutdown }
    }

    /// Stops the saver after one final save and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "background saver terminated abnormally");
        }
    }
}

async fn run(
    store: Arc<Store>,
    persistence: Arc<PersistenceManager>,
    signal: Arc<SaveSignal>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "background saver started");

    loop {
        let reason = tokio::select! {
            _ = signal.wait() => SaveReason::Requested,
            _ = ticker.tick() => SaveReason::Interval,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };
        save(&store, &persistence, &signal, reason).await;
    }

    save(&store, &persistence, &signal, SaveReason::Shutdown).await;
    info!("background saver stopped");
}

async fn save(
    store: &Arc<Store>,
    persistence: &Arc<PersistenceManager>,
    signal: &SaveSignal,
    reason: SaveReason,
) {
    let store = Arc::clone(store);
    let persistence = Arc::clone(persistence);
    let saved = tokio::task::spawn_blocking(move || persistence.save_logged(&store)).await;

    match saved {
        Ok(true) => debug!(?reason, "store saved"),
        Ok(false) => {}
        Err(e) => warn!(?reason, error = %e, "save task failed"),
    }
    signal.mark_completed();
}
