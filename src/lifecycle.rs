//! Wires the measurement buffer, assembler, pending queue and upload
//! scheduler into one client-facing handle.

use crate::assembler::{AssemblyError, PingAssembler};
use crate::buffer::{MeasurementBuffer, MeasurementSnapshot};
use crate::config::{Configuration, LifecycleSettings};
use crate::domain::{LifecycleError, MetricValue, PingType, RecordedEvent};
use crate::queue::PendingPingQueue;
use crate::storage::{FileStore, StorageDirectory, load_or_create_client_id};
use crate::upload::{RunSummary, UploadScheduler, UploadStatsSnapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ping that recorded events are sent in.
pub const EVENTS_PING: &str = "events";

/// Submission reason for pings forced out by the event threshold.
pub const MAX_CAPACITY_REASON: &str = "max_capacity";

pub struct PingLifecycle<S: StorageDirectory> {
    config: Configuration,
    buffer: MeasurementBuffer,
    assembler: PingAssembler,
    ping_types: RwLock<HashMap<String, PingType>>,
    client_id: Uuid,
    queue: Arc<PendingPingQueue<S>>,
    scheduler: Arc<UploadScheduler<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped_oversized: AtomicU64,
}

impl PingLifecycle<FileStore> {
    /// Opens a lifecycle backed by a directory store at `settings.storage_path`.
    pub async fn open_at_storage_path(
        config: Configuration,
        settings: &LifecycleSettings,
    ) -> Result<Self, LifecycleError> {
        let store = FileStore::open(settings.storage_path.clone()).await?;
        Self::open(config, settings, store).await
    }
}

impl<S: StorageDirectory> PingLifecycle<S> {
    /// Loads the client id and rehydrates the pending queue from `store`.
    /// Uploads do not start until [`flush`](Self::flush) or
    /// [`start_background_uploads`](Self::start_background_uploads).
    pub async fn open(
        config: Configuration,
        settings: &LifecycleSettings,
        store: S,
    ) -> Result<Self, LifecycleError> {
        let client_id = load_or_create_client_id(&store).await?;
        let queue = Arc::new(PendingPingQueue::open(store, settings.queue_config()).await?);
        let scheduler = Arc::new(UploadScheduler::new(
            queue.clone(),
            config.clone(),
            settings.scheduler_config(),
        ));

        info!(
            "Ping lifecycle opened for '{}' with {} pending ping(s)",
            config.application_id(),
            queue.rehydration_report().restored
        );

        let events = PingType::new(EVENTS_PING, true);
        let ping_types = HashMap::from([(events.name().to_string(), events)]);

        Ok(Self {
            config,
            buffer: MeasurementBuffer::new(),
            assembler: PingAssembler::new(settings.max_ping_size),
            ping_types: RwLock::new(ping_types),
            client_id,
            queue,
            scheduler,
            worker: Mutex::new(None),
            dropped_oversized: AtomicU64::new(0),
        })
    }

    /// Registers a ping type, replacing any earlier registration of the same
    /// name. Unregistered pings are still accepted but never carry the
    /// client id.
    pub fn register_ping_type(&self, ping_type: PingType) {
        debug!(
            "Registered ping '{}' (client id: {})",
            ping_type.name(),
            ping_type.include_client_id()
        );
        self.ping_types
            .write()
            .insert(ping_type.name().to_string(), ping_type);
    }

    pub fn record_metric(&self, ping: &str, metric_id: impl Into<String>, value: MetricValue) {
        self.buffer.set_metric(ping, metric_id, value);
    }

    pub fn add_to_counter(&self, ping: &str, metric_id: impl Into<String>, amount: i64) {
        self.buffer.add_to_counter(ping, metric_id, amount);
    }

    /// Records an event in the events ping. Reaching `max_events` assembles
    /// and queues that ping immediately; its id is returned.
    pub async fn record_event(&self, event: RecordedEvent) -> Result<Option<Uuid>, LifecycleError> {
        self.record_event_in(EVENTS_PING, event).await
    }

    pub async fn record_event_in(
        &self,
        ping: &str,
        event: RecordedEvent,
    ) -> Result<Option<Uuid>, LifecycleError> {
        match self.buffer.record_event(ping, event, self.config.max_events()) {
            Some(snapshot) => {
                self.enqueue_snapshot(ping, snapshot, Some(MAX_CAPACITY_REASON))
                    .await
            }
            None => Ok(None),
        }
    }

    /// Assembles whatever is buffered for `document_type` and queues it.
    /// Returns `None` when nothing was buffered or the ping was dropped for
    /// exceeding the size ceiling.
    pub async fn submit_ping(
        &self,
        document_type: &str,
        reason: Option<&str>,
    ) -> Result<Option<Uuid>, LifecycleError> {
        let Some(snapshot) = self.buffer.take_snapshot(document_type) else {
            debug!("Ping '{document_type}' has nothing buffered, not submitting");
            return Ok(None);
        };

        self.enqueue_snapshot(document_type, snapshot, reason).await
    }

    /// Uploads pending pings now, on the calling task.
    pub async fn flush(&self) -> Result<RunSummary, LifecycleError> {
        Ok(self.scheduler.run_once().await?)
    }

    /// Starts the periodic upload worker. Calling it again while the worker is
    /// alive does nothing.
    pub fn start_background_uploads(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *worker = Some(self.scheduler.clone().spawn_worker());
        debug!("Background upload worker started");
    }

    /// Cancels any in-flight upload and waits for the worker to exit. Pending
    /// pings stay on disk for the next process.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Upload worker ended abnormally: {e}");
            }
        }

        info!("Ping lifecycle shut down");
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn queue(&self) -> &Arc<PendingPingQueue<S>> {
        &self.queue
    }

    pub fn scheduler(&self) -> &Arc<UploadScheduler<S>> {
        &self.scheduler
    }

    pub fn buffered_events(&self, ping: &str) -> usize {
        self.buffer.event_count(ping)
    }

    pub fn is_buffer_empty(&self, ping: &str) -> bool {
        self.buffer.is_empty(ping)
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    pub fn upload_stats(&self) -> UploadStatsSnapshot {
        self.scheduler.stats()
    }

    pub fn dropped_oversized(&self) -> u64 {
        self.dropped_oversized.load(Ordering::Relaxed)
    }

    async fn enqueue_snapshot(
        &self,
        document_type: &str,
        snapshot: MeasurementSnapshot,
        reason: Option<&str>,
    ) -> Result<Option<Uuid>, LifecycleError> {
        let ping_type = self
            .ping_types
            .read()
            .get(document_type)
            .cloned()
            .unwrap_or_else(|| PingType::new(document_type, false));

        let ping = match self.assembler.assemble_for(
            &ping_type,
            &snapshot,
            &self.config,
            reason,
            self.client_id,
        ) {
            Ok(ping) => ping,
            Err(AssemblyError::PayloadTooLarge { size, limit, .. }) => {
                self.dropped_oversized.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Dropping ping '{document_type}': {size} bytes exceeds the {limit} byte limit"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let id = ping.id();
        if let Err(e) = self.queue.enqueue(ping).await {
            // Keep the measurements for the next submission
            self.buffer.restore(document_type, snapshot);
            warn!("Could not queue ping '{document_type}', measurements kept: {e}");
            return Err(e.into());
        }
        self.scheduler.trigger();
        Ok(Some(id))
    }
}

impl<S: StorageDirectory> Drop for PingLifecycle<S> {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
