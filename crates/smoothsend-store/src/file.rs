//! JSON file storage. The whole state is rewritten on every change.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::*;
use smoothsend_types::{Result, SmoothSendError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    session: Option<Session>,
    #[serde(default)]
    transfers: Vec<StoredTransfer>,
}

/// Store backed by a single JSON file.
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<FileState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(FileState::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SmoothSendError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileState::default()),
            Err(e) => Err(SmoothSendError::Io(e.to_string())),
        }
    }

    async fn write(&self, state: &FileState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| SmoothSendError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| SmoothSendError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SmoothSendError::Io(e.to_string()))?;
        debug!(path = %self.path.display(), "store written");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SmoothSendError::Io(e.to_string()))?;
        }
        Ok(())
    }

    async fn load_session(&self) -> Result<Option<Session>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.session)
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        state.session = Some(session.clone());
        self.write(&state).await
    }

    async fn clear_session(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        state.session = None;
        self.write(&state).await
    }

    async fn record_transfer(&self, transfer: &StoredTransfer) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = self.read().await?;
        if let Some(existing) = state.transfers.iter_mut().find(|t| t.tx_hash == transfer.tx_hash) {
            *existing = transfer.clone();
        } else {
            state.transfers.push(transfer.clone());
        }
        self.write(&state).await
    }

    async fn list_transfers(&self, sender: Option<&str>) -> Result<Vec<StoredTransfer>> {
        let _guard = self.lock.lock().await;
        Ok(filter_transfers(&self.read().await?.transfers, sender))
    }
}
