//! Session and transfer-history storage for the SmoothSend SDK.
//!
//! Defines the `SessionStore` trait that all storage backends must implement.
//! Provides a `MemoryStore` for testing and a JSON `FileStore` for persistence
//! across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smoothsend_types::{Hex, Network, Result};

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A connected wallet. Passed explicitly to every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub address: Hex,
    pub wallet: String,
    pub network: Network,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(address: &str, wallet: &str, network: Network) -> Self {
        Self {
            address: address.to_string(),
            wallet: wallet.to_string(),
            network,
            connected_at: Utc::now(),
        }
    }
}

/// A completed transfer, kept for the activity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransfer {
    pub tx_hash: Hex,
    pub sender: Hex,
    pub recipient: Hex,
    /// Minor units.
    pub amount: u64,
    pub relayer_fee: Option<String>,
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

/// The storage boundary for sessions and history.
///
/// All methods are async to support both in-memory and persistent backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    // --- Lifecycle ---
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    // --- Session ---
    async fn load_session(&self) -> Result<Option<Session>>;
    async fn save_session(&self, session: &Session) -> Result<()>;
    async fn clear_session(&self) -> Result<()>;

    // --- History ---
    async fn record_transfer(&self, transfer: &StoredTransfer) -> Result<()>;
    /// Newest first.
    async fn list_transfers(&self, sender: Option<&str>) -> Result<Vec<StoredTransfer>>;
}

/// Newest-first listing filtered by sender, shared by the backends.
pub(crate) fn filter_transfers(all: &[StoredTransfer], sender: Option<&str>) -> Vec<StoredTransfer> {
    let mut out: Vec<StoredTransfer> = all
        .iter()
        .filter(|t| sender.map_or(true, |s| smoothsend_types::addresses_equal(&t.sender, s)))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}
