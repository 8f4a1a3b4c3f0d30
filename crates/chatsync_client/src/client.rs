//! The reconciliation driver.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::replica::LocalReplica;
use crate::transport::SyncTransport;
use chatsync_protocol::{
    CollectionKind, DeleteSingleItemRequest, IdsRequest, Record, SendItemsRequest,
    SendSingleItemRequest,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not syncing.
    Idle,
    /// Fetching server changes.
    Pulling,
    /// Sending local records the server lacks.
    Pushing,
    /// The last sync completed.
    Synced,
    /// The last sync failed.
    Error,
}

impl SyncState {
    /// Returns true while a sync is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pulling | SyncState::Pushing)
    }

    /// Returns true if a new sync may start.
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

/// What a pull changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Conversations saved or overwritten.
    pub conversations_saved: usize,
    /// Conversations removed because the server holds a tombstone.
    pub conversations_deleted: usize,
    /// Messages saved or overwritten.
    pub messages_saved: usize,
    /// Messages removed because the server holds a tombstone.
    pub messages_deleted: usize,
}

impl PullOutcome {
    /// Total records touched.
    pub fn total(&self) -> usize {
        self.conversations_saved
            + self.conversations_deleted
            + self.messages_saved
            + self.messages_deleted
    }

    fn record(&mut self, kind: CollectionKind, deleted: bool) {
        let counter = match (kind, deleted) {
            (CollectionKind::Conversation, false) => &mut self.conversations_saved,
            (CollectionKind::Conversation, true) => &mut self.conversations_deleted,
            (CollectionKind::Message, false) => &mut self.messages_saved,
            (CollectionKind::Message, true) => &mut self.messages_deleted,
        };
        *counter += 1;
    }
}

/// What a push sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Conversations sent.
    pub conversations_sent: usize,
    /// Messages sent.
    pub messages_sent: usize,
    /// Ids the server asked for that the replica no longer holds.
    pub skipped: usize,
}

impl PushOutcome {
    /// Total records sent.
    pub fn total(&self) -> usize {
        self.conversations_sent + self.messages_sent
    }
}

/// Result of a full sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Pull phase.
    pub pull: PullOutcome,
    /// Push phase.
    pub push: PushOutcome,
    /// Wall-clock duration.
    pub duration: Duration,
}

/// Cumulative statistics.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed syncs.
    pub cycles_completed: u64,
    /// Records applied by pulls.
    pub records_pulled: u64,
    /// Records sent by pushes.
    pub records_pushed: u64,
    /// Retries made by [`SyncClient::sync_with_retry`].
    pub retries: u64,
    /// When the last sync completed.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

/// Reconciles a [`LocalReplica`] with the sync server.
///
/// A sync is a pull followed by a push:
///
/// 1. **pull**: ask which server records the replica lacks or holds stale,
///    fetch them, then apply message deletions, messages, conversation
///    deletions and conversations, in that order
/// 2. **push**: ask which replica ids the server lacks and send them in one
///    bulk upsert
pub struct SyncClient<T: SyncTransport, R: LocalReplica> {
    config: ClientConfig,
    transport: T,
    replica: R,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<T: SyncTransport, R: LocalReplica> SyncClient<T, R> {
    /// Creates a new client.
    pub fn new(config: ClientConfig, transport: T, replica: R) -> Self {
        Self {
            config,
            transport,
            replica,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the local replica.
    pub fn replica(&self) -> &R {
        &self.replica
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn token(&self) -> &str {
        &self.config.token
    }

    fn replica_ids(&self) -> IdsRequest {
        IdsRequest::new(self.token())
            .with_conversation_ids(self.replica.ids(CollectionKind::Conversation))
            .with_message_ids(self.replica.ids(CollectionKind::Message))
    }

    /// Fetches and applies everything the server reports missing.
    pub fn pull(&self) -> ClientResult<PullOutcome> {
        let missing = self.transport.check_client_missing(&self.replica_ids())?;
        if missing.is_empty() {
            debug!("pull: nothing missing");
            return Ok(PullOutcome::default());
        }

        let request = IdsRequest::new(self.token())
            .with_conversation_ids(missing.missing_conversation_ids)
            .with_message_ids(missing.missing_message_ids);
        let items = self.transport.get_items(&request)?;

        // Messages before conversations, deletions before saves.
        let mut outcome = PullOutcome::default();
        for kind in [CollectionKind::Message, CollectionKind::Conversation] {
            self.apply(kind, items.records(kind), &mut outcome);
        }

        debug!(?outcome, "pull applied");
        Ok(outcome)
    }

    fn apply(&self, kind: CollectionKind, records: &BTreeMap<String, Record>, outcome: &mut PullOutcome) {
        for (id, _) in records.iter().filter(|(_, r)| r.is_tombstone()) {
            self.replica.remove(kind, id);
            outcome.record(kind, true);
        }
        for record in records.values().filter(|r| !r.is_tombstone()) {
            self.replica.save(kind, record.clone());
            outcome.record(kind, false);
        }
    }

    /// Sends the records the server lacks.
    pub fn push(&self) -> ClientResult<PushOutcome> {
        let missing = self.transport.check_server_missing(&self.replica_ids())?;

        let mut outcome = PushOutcome::default();
        let mut request = SendItemsRequest::new(self.token());
        for kind in CollectionKind::ALL {
            for id in missing.ids(kind) {
                let Some(record) = self.replica.get(kind, id) else {
                    outcome.skipped += 1;
                    continue;
                };
                request = request.with_record(kind, &record);
                match kind {
                    CollectionKind::Conversation => outcome.conversations_sent += 1,
                    CollectionKind::Message => outcome.messages_sent += 1,
                }
            }
        }

        if outcome.total() > 0 {
            self.transport.send_items(&request)?;
        }
        debug!(?outcome, "push sent");
        Ok(outcome)
    }

    /// Performs a full sync: pull then push.
    pub fn sync(&self) -> ClientResult<SyncReport> {
        let start = Instant::now();
        {
            let mut state = self.state.write();
            if !state.can_start_sync() {
                return Err(ClientError::InvalidStateTransition {
                    from: format!("{:?}", *state),
                    to: "sync".into(),
                });
            }
            *state = SyncState::Pulling;
        }

        let pull = match self.pull() {
            Ok(pull) => pull,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(SyncState::Pushing);
        let push = match self.push() {
            Ok(push) => push,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(SyncState::Synced);
        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.records_pulled += pull.total() as u64;
            stats.records_pushed += push.total() as u64;
            stats.last_sync_time = Some(Instant::now());
            stats.last_error = None;
        }

        let report = SyncReport {
            pull,
            push,
            duration: start.elapsed(),
        };
        info!(
            pulled = pull.total(),
            pushed = push.total(),
            duration_ms = report.duration.as_millis() as u64,
            "sync completed"
        );
        Ok(report)
    }

    /// Performs a sync, retrying transient failures with backoff.
    pub fn sync_with_retry(&self) -> ClientResult<SyncReport> {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }

            match self.sync() {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                    warn!(attempt, error = %e, "sync failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Saves a record locally and upserts it on the server.
    ///
    /// If the server already holds the id, other clients will see it as
    /// missing until they fetch it.
    pub fn send_single(&self, kind: CollectionKind, record: Record) -> ClientResult<()> {
        let request = SendSingleItemRequest::new(self.token(), kind, &record);
        self.replica.save(kind, record);
        self.transport.send_single_item(&request)?;
        Ok(())
    }

    /// Removes a record locally and tombstones it on the server.
    pub fn delete_single(&self, kind: CollectionKind, id: &str) -> ClientResult<()> {
        self.replica.remove(kind, id);
        self.transport
            .delete_single_item(&DeleteSingleItemRequest::new(self.token(), kind, id))?;
        Ok(())
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn fail(&self, error: ClientError) -> ClientError {
        warn!(error = %error, "sync failed");
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
        error
    }
}
