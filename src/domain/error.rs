use crate::assembler::AssemblyError;
use crate::config::ConfigError;
use crate::queue::QueueError;
use crate::storage::StorageError;
use crate::upload::SchedulerError;
use thiserror::Error;

/// Top-level error type for the ping lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}
