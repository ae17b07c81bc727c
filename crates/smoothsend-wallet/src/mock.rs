//! Deterministic signer for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use smoothsend_tx::UnsignedTransaction;

use crate::{SignedAuthenticator, SignerError, WalletSigner};

/// Ed25519-shaped authenticator variant tag.
const AUTH_VARIANT: u8 = 0;

/// Signs with a key derived from the wallet name. Counts every call.
#[derive(Debug)]
pub struct MockSigner {
    name: String,
    public_key: [u8; 32],
    reject: AtomicBool,
    calls: AtomicUsize,
}

impl MockSigner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            public_key: Sha256::digest(name.as_bytes()).into(),
            reject: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every subsequent request as if the user clicked "reject".
    pub fn rejecting(self) -> Self {
        self.reject.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedAuthenticator, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(SignerError::UserRejected);
        }
        let digest = tx
            .signing_digest()
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;

        let mut sig = Sha256::new();
        sig.update(self.public_key);
        sig.update(digest);
        let sig: [u8; 32] = sig.finalize().into();

        let mut bytes = Vec::with_capacity(1 + 32 + 64);
        bytes.push(AUTH_VARIANT);
        bytes.extend_from_slice(&self.public_key);
        bytes.extend_from_slice(&sig);
        bytes.extend_from_slice(&sig);
        Ok(SignedAuthenticator { bytes, digest })
    }
}
