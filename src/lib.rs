#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
#![allow(
    clippy::cast_possible_truncation, // Millisecond durations and byte counts stay far below u64::MAX
    clippy::cast_precision_loss,      // Jitter math on delays
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,  // e.g. QueueError in queue module
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

pub mod assembler;
pub mod buffer;
pub mod config;
pub mod debug;
pub mod domain;
pub mod lifecycle;
pub mod logging;
pub mod queue;
pub mod storage;
pub mod upload;

// Re-export main types for easy access
pub use config::{Configuration, ConfigurationBuilder, Settings, default_user_agent};
pub use domain::{LifecycleError, MetricValue, PendingPing, PingType, RecordedEvent};
pub use lifecycle::PingLifecycle;
pub use queue::PendingPingQueue;
pub use upload::{PingUploader, UploadOutcome, UploadRequest, UploadScheduler};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
