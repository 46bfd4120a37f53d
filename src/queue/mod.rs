//! Durable, ordered queue of assembled pings awaiting upload.

mod record;

pub use record::RecordError;

use crate::config::{DEFAULT_MAX_PENDING_BYTES, DEFAULT_MAX_PENDING_PINGS, DEFAULT_MAX_UPLOAD_ATTEMPTS};
use crate::domain::PendingPing;
use crate::storage::{StorageDirectory, StorageError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Storage fault: {0}")]
    Storage(#[from] StorageError),
    #[error("Queue suspended after a storage fault")]
    Suspended,
    #[error("Ping not found: {0}")]
    NotFound(Uuid),
    #[error("Ping already queued: {0}")]
    Duplicate(Uuid),
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

impl QueueError {
    /// Storage faults and the suspension they cause cannot be recovered from
    /// without reopening the queue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueueError::Storage(_) | QueueError::Suspended)
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// A ping is deleted once its attempt count reaches this ceiling.
    pub max_attempts: u32,
    pub max_pending_pings: usize,
    pub max_pending_bytes: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_UPLOAD_ATTEMPTS,
            max_pending_pings: DEFAULT_MAX_PENDING_PINGS,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

/// What happened to a ping after a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retained { attempt_count: u32 },
    /// The attempt ceiling was reached and the ping was deleted.
    Dropped { attempt_count: u32 },
}

/// Counts from rehydrating the queue at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RehydrationReport {
    pub restored: usize,
    pub discarded_corrupt: usize,
    pub discarded_over_quota: usize,
}

struct QueueState {
    pings: VecDeque<PendingPing>,
    next_sequence: u64,
}

/// Pending pings, oldest first, mirrored in memory over a [`StorageDirectory`].
///
/// Every mutation reaches storage before the in-memory view changes. The
/// first storage failure faults the queue; all later operations return
/// [`QueueError::Suspended`] until a new queue is opened over the store.
pub struct PendingPingQueue<S: StorageDirectory> {
    store: S,
    config: QueueConfig,
    state: Mutex<QueueState>,
    faulted: AtomicBool,
    report: RehydrationReport,
}

impl<S: StorageDirectory> PendingPingQueue<S> {
    /// Opens the queue, rebuilding its order from the records in `store`.
    pub async fn open(store: S, config: QueueConfig) -> Result<Self, QueueError> {
        let mut report = RehydrationReport::default();
        let mut pings = Vec::new();

        for key in store.list_keys().await? {
            if !record::is_ping_key(&key) {
                continue;
            }
            let Some(data) = store.get(&key).await? else {
                continue;
            };

            match record::decode(&key, &data) {
                Ok(ping) => pings.push(ping),
                Err(e) => {
                    tracing::warn!("Discarding unreadable pending ping {key}: {e}");
                    store.delete(&key).await?;
                    report.discarded_corrupt += 1;
                }
            }
        }

        pings.sort_by(|a, b| {
            a.sequence()
                .cmp(&b.sequence())
                .then_with(|| a.created_at().cmp(&b.created_at()))
        });
        let mut pings = VecDeque::from(pings);

        // Over quota: the oldest pings go first
        let mut total_bytes: u64 = pings.iter().map(|p| p.size() as u64).sum();
        while pings.len() > config.max_pending_pings || total_bytes > config.max_pending_bytes {
            let Some(oldest) = pings.pop_front() else {
                break;
            };
            store.delete(&record::storage_key(oldest.id())).await?;
            total_bytes = total_bytes.saturating_sub(oldest.size() as u64);
            report.discarded_over_quota += 1;
        }

        if report.discarded_over_quota > 0 {
            tracing::warn!(
                "Pending ping quota exceeded, deleted {} oldest ping(s)",
                report.discarded_over_quota
            );
        }

        let next_sequence = pings.back().map_or(0, |p| p.sequence() + 1);
        report.restored = pings.len();

        tracing::info!("Rehydrated {} pending ping(s)", report.restored);

        Ok(Self {
            store,
            config,
            state: Mutex::new(QueueState {
                pings,
                next_sequence,
            }),
            faulted: AtomicBool::new(false),
            report,
        })
    }

    /// Durably records `ping` at the back of the queue.
    pub async fn enqueue(&self, mut ping: PendingPing) -> Result<(), QueueError> {
        self.ensure_healthy()?;
        let mut state = self.state.lock().await;

        if state.pings.iter().any(|p| p.id() == ping.id()) {
            return Err(QueueError::Duplicate(ping.id()));
        }

        ping.set_sequence(state.next_sequence);
        let data = record::encode(&ping)?;
        let key = record::storage_key(ping.id());
        self.checked(self.store.put(&key, data).await)?;

        tracing::debug!(
            "Queued ping {} ({}) at position {}",
            ping.id(),
            ping.document_type(),
            ping.sequence()
        );
        state.next_sequence += 1;
        state.pings.push_back(ping);
        Ok(())
    }

    /// Up to `limit` pings, oldest first.
    pub async fn peek_batch(&self, limit: usize) -> Result<Vec<PendingPing>, QueueError> {
        self.ensure_healthy()?;
        let state = self.state.lock().await;
        Ok(state.pings.iter().take(limit).cloned().collect())
    }

    pub async fn ack_success(&self, id: Uuid) -> Result<(), QueueError> {
        self.remove(id).await
    }

    pub async fn ack_unrecoverable_failure(&self, id: Uuid) -> Result<(), QueueError> {
        self.remove(id).await
    }

    /// Bumps the attempt count in place. Reaching the configured ceiling
    /// deletes the ping instead.
    pub async fn ack_recoverable_failure(&self, id: Uuid) -> Result<RetryDisposition, QueueError> {
        self.ensure_healthy()?;
        let mut state = self.state.lock().await;
        let index = Self::position(&state, id)?;

        let mut updated = state.pings[index].clone();
        let attempt_count = updated.increment_attempts();
        let key = record::storage_key(id);

        if attempt_count >= self.config.max_attempts {
            self.checked(self.store.delete(&key).await)?;
            state.pings.remove(index);
            tracing::warn!(
                "Deleting ping {id} after {attempt_count} recoverable failures"
            );
            return Ok(RetryDisposition::Dropped { attempt_count });
        }

        let data = record::encode(&updated)?;
        self.checked(self.store.put(&key, data).await)?;
        state.pings[index] = updated;

        Ok(RetryDisposition::Retained { attempt_count })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.pings.is_empty()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.state.lock().await.pings.iter().any(|p| p.id() == id)
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn rehydration_report(&self) -> RehydrationReport {
        self.report
    }

    async fn remove(&self, id: Uuid) -> Result<(), QueueError> {
        self.ensure_healthy()?;
        let mut state = self.state.lock().await;
        let index = Self::position(&state, id)?;

        self.checked(self.store.delete(&record::storage_key(id)).await)?;
        state.pings.remove(index);
        tracing::debug!("Removed ping {id} from queue");
        Ok(())
    }

    fn position(state: &QueueState, id: Uuid) -> Result<usize, QueueError> {
        state
            .pings
            .iter()
            .position(|p| p.id() == id)
            .ok_or(QueueError::NotFound(id))
    }

    fn ensure_healthy(&self) -> Result<(), QueueError> {
        if self.is_faulted() {
            Err(QueueError::Suspended)
        } else {
            Ok(())
        }
    }

    fn checked<T>(&self, result: Result<T, StorageError>) -> Result<T, QueueError> {
        result.map_err(|e| {
            if !self.faulted.swap(true, Ordering::SeqCst) {
                tracing::error!("Pending ping storage failed, suspending queue: {e}");
            }
            QueueError::Storage(e)
        })
    }
}
