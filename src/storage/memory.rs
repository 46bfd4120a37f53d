use super::{StorageDirectory, StorageError, validate_key};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Volatile store. Clones share the same map, so dropping a queue and
/// reopening it over a clone behaves like a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with an I/O error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::IoError(std::io::Error::other(
                "memory store marked as failing",
            )));
        }
        Ok(())
    }
}

impl StorageDirectory for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.check()?;
        validate_key(key)?;
        self.records.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check()?;
        validate_key(key)?;
        Ok(self.records.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        validate_key(key)?;
        self.records.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        Ok(self.records.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok, block_on};

    #[test]
    fn test_clones_share_records() {
        let store = MemoryStore::new();
        let restarted = store.clone();

        assert_ok!(block_on(store.put("a", b"one".to_vec())));
        assert_eq!(block_on(restarted.get("a")).unwrap(), Some(b"one".to_vec()));

        assert_ok!(block_on(restarted.delete("a")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failing_store_rejects_every_operation() {
        let store = MemoryStore::new();
        assert_ok!(block_on(store.put("a", b"one".to_vec())));

        store.set_failing(true);
        assert_err!(block_on(store.get("a")));
        assert_err!(block_on(store.list_keys()));
        assert_err!(block_on(store.delete("a")));

        store.set_failing(false);
        assert_eq!(store.len(), 1);
    }
}
