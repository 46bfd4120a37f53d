use super::backoff::{Backoff, BackoffConfig};
use super::stats::{UploadStats, UploadStatsSnapshot};
use super::{UploadOutcome, UploadRequest};
use crate::config::{Configuration, DEFAULT_UPLOAD_INTERVAL, DEFAULT_UPLOAD_TIMEOUT};
use crate::debug::DebugController;
use crate::queue::{PendingPingQueue, QueueError, RetryDisposition};
use crate::storage::StorageDirectory;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Fatal storage fault, uploads suspended: {0}")]
    StorageFault(QueueError),
    #[error("Scheduler suspended after a storage fault")]
    Suspended,
    #[error("Queue error: {0}")]
    Queue(QueueError),
}

impl SchedulerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::StorageFault(_) | SchedulerError::Suspended)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on a single uploader call.
    pub upload_timeout: Duration,
    /// Period of the background worker.
    pub upload_interval: Duration,
    pub compress_uploads: bool,
    pub backoff: BackoffConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            compress_uploads: true,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QueueEmpty,
    /// A ping failed recoverably; the run ends and waits for the next trigger.
    RecoverableFailure,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub uploaded: usize,
    pub unrecoverable: usize,
    pub recoverable: usize,
    pub dropped_after_retries: usize,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            uploaded: 0,
            unrecoverable: 0,
            recoverable: 0,
            dropped_after_retries: 0,
            stop_reason: StopReason::QueueEmpty,
        }
    }

    pub fn attempted(&self) -> usize {
        self.uploaded + self.unrecoverable + self.recoverable + self.dropped_after_retries
    }
}

/// Drains the pending queue through the configured uploader, one ping at a
/// time.
///
/// Runs never overlap: concurrent `run_once` callers wait behind the run in
/// progress, and `trigger` calls made while the worker is busy collapse into
/// a single follow-up run.
pub struct UploadScheduler<S: StorageDirectory> {
    queue: Arc<PendingPingQueue<S>>,
    config: Configuration,
    settings: SchedulerConfig,
    run_lock: Mutex<()>,
    suspended: AtomicBool,
    trigger: Notify,
    cancel: CancellationToken,
    stats: UploadStats,
}

impl<S: StorageDirectory> UploadScheduler<S> {
    pub fn new(
        queue: Arc<PendingPingQueue<S>>,
        config: Configuration,
        settings: SchedulerConfig,
    ) -> Self {
        Self {
            queue,
            config,
            settings,
            run_lock: Mutex::new(()),
            suspended: AtomicBool::new(false),
            trigger: Notify::new(),
            cancel: CancellationToken::new(),
            stats: UploadStats::new(),
        }
    }

    pub async fn run_once(&self) -> Result<RunSummary, SchedulerError> {
        self.ensure_active()?;
        let _guard = self.run_lock.lock().await;
        self.ensure_active()?;

        let debug = DebugController::new(&self.config);
        let mut summary = RunSummary::new();

        loop {
            if self.cancel.is_cancelled() {
                summary.stop_reason = StopReason::Cancelled;
                break;
            }

            let next = self
                .queue
                .peek_batch(1)
                .await
                .map_err(|e| self.queue_failure(e))?
                .into_iter()
                .next();
            let Some(ping) = next else {
                summary.stop_reason = StopReason::QueueEmpty;
                break;
            };

            debug.trace_payload(&ping);
            let request = UploadRequest::from_ping(&ping, &debug, self.settings.compress_uploads);
            debug!(
                "Uploading ping {} ({}) to {} (attempt {})",
                ping.id(),
                ping.document_type(),
                request.url,
                ping.attempt_count() + 1
            );

            let upload = tokio::time::timeout(
                self.settings.upload_timeout,
                self.config.uploader().upload(request),
            );

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("Upload of ping {} abandoned by shutdown", ping.id());
                    summary.stop_reason = StopReason::Cancelled;
                    break;
                }
                result = upload => match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        self.stats.record_timeout();
                        UploadOutcome::RecoverableFailure(format!(
                            "upload timed out after {:?}",
                            self.settings.upload_timeout
                        ))
                    }
                },
            };

            match outcome {
                UploadOutcome::Success => {
                    self.queue
                        .ack_success(ping.id())
                        .await
                        .map_err(|e| self.queue_failure(e))?;
                    self.stats.record_uploaded();
                    summary.uploaded += 1;
                    info!("Uploaded ping {} ({})", ping.id(), ping.document_type());
                }
                UploadOutcome::UnrecoverableFailure(reason) => {
                    self.queue
                        .ack_unrecoverable_failure(ping.id())
                        .await
                        .map_err(|e| self.queue_failure(e))?;
                    self.stats.record_unrecoverable();
                    summary.unrecoverable += 1;
                    warn!("Deleting ping {} after unrecoverable failure: {reason}", ping.id());
                }
                UploadOutcome::RecoverableFailure(reason) => {
                    let disposition = self
                        .queue
                        .ack_recoverable_failure(ping.id())
                        .await
                        .map_err(|e| self.queue_failure(e))?;
                    self.stats.record_recoverable();

                    match disposition {
                        RetryDisposition::Retained { attempt_count } => {
                            summary.recoverable += 1;
                            warn!(
                                "Recoverable failure for ping {} (attempt {attempt_count}): {reason}",
                                ping.id()
                            );
                        }
                        RetryDisposition::Dropped { attempt_count } => {
                            self.stats.record_dropped_after_retries();
                            summary.dropped_after_retries += 1;
                            warn!(
                                "Ping {} dropped after {attempt_count} attempts: {reason}",
                                ping.id()
                            );
                        }
                    }

                    summary.stop_reason = StopReason::RecoverableFailure;
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Requests a run from the background worker. Requests arriving while a
    /// run is pending are merged into it.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Abandons any in-flight upload and stops the background worker. The
    /// ping being uploaded stays queued.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> UploadStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue(&self) -> &Arc<PendingPingQueue<S>> {
        &self.queue
    }

    /// Spawns the periodic worker. It runs every `upload_interval` or on
    /// `trigger`, backs off after runs that hit a recoverable failure, and
    /// exits on shutdown or a fatal storage fault.
    pub fn spawn_worker(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Backoff::new(self.settings.backoff.clone());
            let mut retry_at: Option<Instant> = None;

            loop {
                let delay = retry_at
                    .map(|at| at.saturating_duration_since(Instant::now()))
                    .unwrap_or(self.settings.upload_interval);

                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                    () = self.trigger.notified(), if retry_at.is_none() => {}
                }

                match self.run_once().await {
                    Ok(summary) if summary.stop_reason == StopReason::RecoverableFailure => {
                        let wait = backoff.record_failure();
                        debug!("Backing off uploads for {wait:?}");
                        retry_at = Some(Instant::now() + wait);
                    }
                    Ok(summary) => {
                        if summary.attempted() > 0 {
                            debug!("Upload run finished: {summary:?}");
                        }
                        backoff.reset();
                        retry_at = None;
                        if summary.stop_reason == StopReason::Cancelled {
                            break;
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Upload worker stopping: {e}");
                        break;
                    }
                    Err(e) => {
                        warn!("Upload run failed: {e}");
                    }
                }
            }

            debug!("Upload worker exited");
        })
    }

    fn ensure_active(&self) -> Result<(), SchedulerError> {
        if self.is_suspended() {
            Err(SchedulerError::Suspended)
        } else {
            Ok(())
        }
    }

    fn queue_failure(&self, error: QueueError) -> SchedulerError {
        if error.is_fatal() {
            if !self.suspended.swap(true, Ordering::SeqCst) {
                error!("Suspending uploads after storage fault: {error}");
            }
            SchedulerError::StorageFault(error)
        } else {
            SchedulerError::Queue(error)
        }
    }
}
