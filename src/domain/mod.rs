//! Domain layer for ping-lifecycle.
//!
//! Contains the canonical types shared across all modules:
//! - `PendingPing`: an assembled ping owned by the pending queue
//! - `MetricValue` / `RecordedEvent`: buffered measurements
//! - `PingType`: a registered ping and whether it carries the client id
//! - `LifecycleError`: top-level error type

pub mod error;
pub mod measurement;
pub mod ping;
pub mod ping_type;

pub use error::LifecycleError;
pub use measurement::{MetricValue, RecordedEvent};
pub use ping::{PendingPing, PingMetadata};
pub use ping_type::PingType;
