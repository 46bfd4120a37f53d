use super::{StorageDirectory, StorageError, validate_key};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const RECORD_EXTENSION: &str = "ping";
const TEMP_EXTENSION: &str = "tmp";

/// One file per key inside a single directory.
///
/// Writes go to `<key>.tmp`, are fsynced, then renamed over `<key>.ping`, so a
/// crash leaves either the old record or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        if !fs::metadata(&root).await?.is_dir() {
            return Err(StorageError::InvalidStoragePath(root.display().to_string()));
        }

        let store = Self { root };
        store.remove_stale_temp_files().await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{TEMP_EXTENSION}"))
    }

    /// Half-written records from a crash mid-`put` are never visible as keys;
    /// they are swept on open.
    async fn remove_stale_temp_files(&self) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut removed = 0u32;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION) {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if removed > 0 {
            tracing::warn!("Removed {removed} incomplete record(s) from {}", self.root.display());
        }
        Ok(())
    }

    async fn sync_directory(&self) -> Result<(), StorageError> {
        #[cfg(unix)]
        {
            fs::File::open(&self.root).await?.sync_all().await?;
        }
        Ok(())
    }
}

impl StorageDirectory for FileStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        validate_key(key)?;

        let temp_path = self.temp_path(key);
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, self.record_path(key)).await?;
        self.sync_directory().await?;

        tracing::debug!("Stored record {key} ({} bytes)", bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;

        match fs::read(self.record_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => {
                self.sync_directory().await?;
                tracing::debug!("Deleted record {key}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && validate_key(stem).is_ok()
            {
                keys.push(stem.to_string());
            }
        }

        Ok(keys)
    }
}
