use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals of upload outcomes for the lifetime of a scheduler.
#[derive(Debug, Default)]
pub struct UploadStats {
    uploaded: AtomicU64,
    recoverable_failures: AtomicU64,
    unrecoverable_failures: AtomicU64,
    dropped_after_retries: AtomicU64,
    timeouts: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStatsSnapshot {
    pub uploaded: u64,
    pub recoverable_failures: u64,
    pub unrecoverable_failures: u64,
    pub dropped_after_retries: u64,
    pub timeouts: u64,
}

impl UploadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recoverable(&self) {
        self.recoverable_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unrecoverable(&self) {
        self.unrecoverable_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_after_retries(&self) {
        self.dropped_after_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UploadStatsSnapshot {
        UploadStatsSnapshot {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            recoverable_failures: self.recoverable_failures.load(Ordering::Relaxed),
            unrecoverable_failures: self.unrecoverable_failures.load(Ordering::Relaxed),
            dropped_after_retries: self.dropped_after_retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}
