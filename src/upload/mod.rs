pub mod backoff;
pub mod outcome;
pub mod request;
pub mod scheduler;
pub mod stats;
pub mod uploader;

pub use backoff::{Backoff, BackoffConfig, BackoffStrategy};
pub use outcome::UploadOutcome;
pub use request::UploadRequest;
pub use scheduler::{RunSummary, SchedulerConfig, SchedulerError, StopReason, UploadScheduler};
pub use stats::{UploadStats, UploadStatsSnapshot};
pub use uploader::PingUploader;
