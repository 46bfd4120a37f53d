//! Durable key-value storage for pending pings.
//!
//! Every mutation is atomic on its own: after a crash a key holds either its
//! previous bytes or its new bytes, never a torn mix.

pub mod client_id;
pub mod file;
pub mod memory;
#[cfg(feature = "sled-store")]
pub mod sled_store;

pub use client_id::{CLIENT_ID_KEY, load_or_create_client_id};
pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sled-store")]
pub use sled_store::SledStore;

use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Invalid storage path: {0}")]
    InvalidStoragePath(String),
    #[cfg(feature = "sled-store")]
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),
}

pub trait StorageDirectory: Send + Sync + 'static {
    /// Stores `bytes` under `key`, replacing any previous value. The write is
    /// durable once the returned future resolves.
    fn put(&self, key: &str, bytes: Vec<u8>)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_keys(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

/// Keys become file names, so only a conservative character set is allowed.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
