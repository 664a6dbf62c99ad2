//! File-backed Credential Storage
//!
//! One JSON file per key inside a tokens directory. Writes go to a sibling
//! temporary file that is renamed over the target, and every read or write
//! for the store happens under a shared reader/writer lock, so a reader never
//! observes a half-written record.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// File-based secure storage implementation
///
/// Layout: `{dir}/{key}.json`. The directory is created on first write.
pub struct FileSecureStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl FileSecureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid credential key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", key))
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let temp_path = self.temp_path_for(key);

        let _guard = self.lock.write().await;

        fs::create_dir_all(&self.dir).await?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(BridgeError::Io(e));
        }

        debug!(key = key, "Stored credential record");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        let _guard = self.lock.read().await;

        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(key = key, "Loaded credential record");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = key, "Credential record not found");
                Ok(None)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read credential record");
                Err(BridgeError::Io(e))
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let _guard = self.lock.write().await;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted credential record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}
