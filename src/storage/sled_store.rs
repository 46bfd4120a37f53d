use super::{StorageDirectory, StorageError, validate_key};
use std::path::Path;

/// Pending pings kept in an embedded sled tree.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

/// Flushes block on fsync, so writes run on the blocking pool.
async fn run_blocking<F>(op: F) -> Result<(), StorageError>
where
    F: FnOnce() -> Result<(), StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::IoError(std::io::Error::other(e)))?
}

impl StorageDirectory for SledStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        validate_key(key)?;
        let db = self.db.clone();
        let key = key.to_string();
        run_blocking(move || {
            db.insert(key.as_bytes(), bytes)?;
            db.flush()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        Ok(self.db.get(key.as_bytes())?.map(|value| value.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let db = self.db.clone();
        let key = key.to_string();
        run_blocking(move || {
            db.remove(key.as_bytes())?;
            db.flush()?;
            Ok(())
        })
        .await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for key in self.db.iter().keys() {
            let key = key?;
            if let Ok(key) = std::str::from_utf8(&key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::open(temp_dir.path().join("db")).unwrap();

        store.put("a", b"payload".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"payload".to_vec()));
        assert_eq!(store.list_keys().await.unwrap(), vec!["a".to_string()]);

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }
}
