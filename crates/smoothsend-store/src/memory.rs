//! In-memory storage for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::*;
use smoothsend_types::{Result, SmoothSendError};

/// In-memory store (for testing and ephemeral use).
pub struct MemoryStore {
    session: Mutex<Option<Session>>,
    transfers: Mutex<Vec<StoredTransfer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            transfers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> SmoothSendError {
    SmoothSendError::Other("memory store lock poisoned".into())
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().map_err(poisoned)?.clone())
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        *self.session.lock().map_err(poisoned)? = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        *self.session.lock().map_err(poisoned)? = None;
        Ok(())
    }

    async fn record_transfer(&self, transfer: &StoredTransfer) -> Result<()> {
        let mut store = self.transfers.lock().map_err(poisoned)?;
        if let Some(existing) = store.iter_mut().find(|t| t.tx_hash == transfer.tx_hash) {
            *existing = transfer.clone();
        } else {
            store.push(transfer.clone());
        }
        Ok(())
    }

    async fn list_transfers(&self, sender: Option<&str>) -> Result<Vec<StoredTransfer>> {
        let store = self.transfers.lock().map_err(poisoned)?;
        Ok(filter_transfers(&store, sender))
    }
}
