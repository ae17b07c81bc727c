//! Wallet signing capability and provider discovery.
//!
//! A wallet is reduced to one operation: sign an unsigned transaction and
//! return an authenticator bound to that transaction's digest. Providers are
//! registered explicitly in a `WalletRegistry`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smoothsend_tx::UnsignedTransaction;
use thiserror::Error;

pub mod mock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("user rejected the signing request")]
    UserRejected,
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// Opaque signature material plus the digest of the bytes it signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthenticator {
    pub bytes: Vec<u8>,
    pub digest: [u8; 32],
}

impl SignedAuthenticator {
    /// True if this authenticator was produced for `tx`.
    pub fn matches(&self, tx: &UnsignedTransaction) -> bool {
        tx.signing_digest().map(|d| d == self.digest).unwrap_or(false)
    }
}

/// A connected wallet that can sign transactions.
///
/// `sign` may wait indefinitely on the user. Callers invoke it at most once
/// per transfer attempt.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn name(&self) -> &str;

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedAuthenticator, SignerError>;
}

/// Discovery entry for a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub name: String,
}

/// Registered wallet providers, keyed by name.
#[derive(Clone, Default)]
pub struct WalletRegistry {
    wallets: BTreeMap<String, Arc<dyn WalletSigner>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same name.
    pub fn register(&mut self, wallet: Arc<dyn WalletSigner>) {
        tracing::debug!(wallet = wallet.name(), "wallet registered");
        self.wallets.insert(wallet.name().to_string(), wallet);
    }

    pub fn available(&self) -> Vec<WalletInfo> {
        self.wallets
            .keys()
            .map(|name| WalletInfo { name: name.clone() })
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn WalletSigner>, SignerError> {
        self.wallets
            .get(name)
            .cloned()
            .ok_or_else(|| SignerError::Unavailable(format!("wallet {name} not installed")))
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

impl std::fmt::Debug for WalletRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.wallets.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSigner;
    use smoothsend_tx::{EntryFunctionId, MoveArg};

    fn tx(amount: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            sender: format!("0x{:0>64}", "1"),
            function: EntryFunctionId {
                module_address: format!("0x{:0>64}", "6d"),
                module_name: "smoothsend".into(),
                function_name: "send_with_fee".into(),
            },
            type_arguments: vec!["0x3::test_coins::USDC".into()],
            arguments: vec![
                MoveArg::Address(format!("0x{:0>64}", "5d")),
                MoveArg::Address(format!("0x{:0>64}", "2")),
                MoveArg::U64(amount),
                MoveArg::U64(1000),
            ],
            fee_payer: Some(format!("0x{:0>64}", "5d")),
        }
    }

    #[tokio::test]
    async fn test_authenticator_binds_to_transaction() {
        let signer = MockSigner::new("Petra");
        let auth = signer.sign(&tx(5)).await.unwrap();
        assert!(auth.matches(&tx(5)));
        assert!(!auth.matches(&tx(6)));
    }

    #[test]
    fn test_registry_discovery() {
        let mut registry = WalletRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MockSigner::new("Petra")));
        registry.register(Arc::new(MockSigner::new("Martian")));

        let names: Vec<_> = registry.available().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["Martian".to_string(), "Petra".to_string()]);
        assert_eq!(registry.get("Petra").unwrap().name(), "Petra");
        assert!(matches!(registry.get("Pontem"), Err(SignerError::Unavailable(_))));
    }
}
