//! End-to-end gasless transfer orchestration.
//!
//! Validate -> quote -> re-validate with the quoted fee -> build -> sign ->
//! serialize -> submit -> confirm. Each transition updates the progress
//! tracker; any failure aborts the run and resets progress to step 0.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use smoothsend_store::{Session, SessionStore, StoredTransfer};
use smoothsend_tx::{BuildError, RelayerApi, RelayerError, TransferBuilder};
use smoothsend_types::{format_units, Hex, Network, SmoothSendConfig, TransferInput};
use smoothsend_validator::{max_transferable, Validator};
use smoothsend_wallet::WalletRegistry;
use tokio::sync::watch;
use tracing::{info, warn};

pub mod classify;
pub mod error;
pub mod progress;
pub mod quote;
pub mod submit;

pub use classify::{classify, AbortCause, Classified, ErrorCategory};
pub use error::TransferError;
pub use progress::{ProgressError, ProgressState, ProgressTracker, RunGuard, RunStatus, Step};
pub use quote::{QuoteDesk, QuoteOutcome, QuoteSlot};
pub use submit::Submitter;

/// A confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: Hex,
    pub sender: Hex,
    pub recipient: Hex,
    /// Minor units.
    pub amount: u64,
    pub decimals: u8,
    pub asset_symbol: String,
    pub relayer_fee: Option<String>,
    pub gas_fee_paid_by: Option<String>,
    pub network: Network,
}

impl TransferReceipt {
    /// e.g. "Sent 5 USDC".
    pub fn summary(&self) -> String {
        format!(
            "Sent {} {}",
            format_units(self.amount, self.decimals),
            self.asset_symbol
        )
    }

    pub fn explorer_url(&self) -> String {
        self.network.explorer_url(&self.tx_hash)
    }
}

/// The transfer engine. One run at a time.
pub struct TransferEngine {
    config: SmoothSendConfig,
    relayer: Arc<dyn RelayerApi>,
    wallets: WalletRegistry,
    validator: Validator,
    builder: TransferBuilder,
    submitter: Submitter,
    progress: ProgressTracker,
    history: Option<Arc<dyn SessionStore>>,
}

impl TransferEngine {
    pub fn new(
        config: SmoothSendConfig,
        relayer: Arc<dyn RelayerApi>,
        wallets: WalletRegistry,
    ) -> Result<Self, BuildError> {
        let builder = TransferBuilder::from_config(&config)?;
        Ok(Self {
            validator: Validator::from_config(&config),
            submitter: Submitter::new(relayer.clone(), config.contract.clone()),
            progress: ProgressTracker::new(),
            history: None,
            config,
            relayer,
            wallets,
            builder,
        })
    }

    /// Record confirmed transfers in `store`.
    pub fn with_history(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn progress(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    /// A debounced quoting desk for the transfer form.
    pub fn quote_desk(&self) -> QuoteDesk {
        QuoteDesk::new(
            self.relayer.clone(),
            self.validator.clone(),
            self.config.quote_debounce,
        )
    }

    /// Suggested amount for the "max" button, in major units.
    pub fn max_amount(&self, balance: u64) -> String {
        format_units(
            max_transferable(balance, self.config.transfer_ceiling),
            self.config.asset_decimals,
        )
    }

    /// Run one transfer for the connected `session`.
    ///
    /// The sender is always the session's address. `balance` is the live
    /// balance slot; it is read at validation and again after the quote.
    pub async fn execute(
        &self,
        session: &Session,
        input: &TransferInput,
        balance: &watch::Receiver<Option<u64>>,
    ) -> Result<TransferReceipt, TransferError> {
        let guard = self
            .progress
            .begin_guarded()
            .map_err(|_| TransferError::Busy)?;

        match self.run(session, input, balance).await {
            Ok(receipt) => {
                self.progress.succeed(&receipt.tx_hash)?;
                guard.disarm();
                info!(tx_hash = %receipt.tx_hash, amount = receipt.amount, "transfer confirmed");
                self.record(&receipt).await;
                Ok(receipt)
            }
            Err(e) => {
                let classified = self.classify(&e);
                warn!(
                    error = %e,
                    category = ?classified.category,
                    step = ?self.progress.snapshot().current_step(),
                    "transfer failed"
                );
                self.progress.fail(&classified.user_message);
                guard.disarm();
                Err(e)
            }
        }
    }

    /// Classify `error` against the configured transfer module.
    pub fn classify(&self, error: &TransferError) -> Classified {
        classify(error, &self.config.contract)
    }

    async fn run(
        &self,
        session: &Session,
        input: &TransferInput,
        balance: &watch::Receiver<Option<u64>>,
    ) -> Result<TransferReceipt, TransferError> {
        let ceiling = self.config.transfer_ceiling;
        let input = TransferInput {
            sender: session.address.clone(),
            ..input.clone()
        };

        let wallet = self.wallets.get(&session.wallet)?;
        let request = self
            .validator
            .into_request(&input, current_balance(balance)?, ceiling, None)
            .map_err(TransferError::Validation)?;

        self.progress.advance(Step::Quote)?;
        let quote = self
            .relayer
            .quote(&request)
            .await
            .map_err(TransferError::Quote)?;

        // balance may have moved while the quote was in flight
        let request = self
            .validator
            .into_request(
                &input,
                current_balance(balance)?,
                ceiling,
                quote.relayer_fee.as_deref(),
            )
            .map_err(TransferError::Validation)?;

        self.progress.advance(Step::BuildTransaction)?;
        let tx = self.builder.build(&request, &quote)?;

        self.progress.advance(Step::Sign)?;
        let auth = wallet.sign(&tx).await?;

        self.progress.advance(Step::Serialize)?;
        let submit_request = Submitter::serialize(&tx, &auth)?;

        self.progress.advance(Step::Submit)?;
        let result = self.submitter.post(&submit_request).await?;

        self.progress.advance(Step::Confirm)?;
        let tx_hash = result.transaction_hash.filter(|h| !h.is_empty()).ok_or_else(|| {
            TransferError::Submission(RelayerError::Malformed("missing transaction hash".into()))
        })?;

        Ok(TransferReceipt {
            tx_hash,
            sender: request.sender,
            recipient: request.recipient,
            amount: request.amount,
            decimals: self.config.asset_decimals,
            asset_symbol: self.config.asset_symbol.clone(),
            relayer_fee: result.relayer_fee.or(quote.relayer_fee),
            gas_fee_paid_by: result.gas_fee_paid_by,
            network: session.network,
        })
    }

    async fn record(&self, receipt: &TransferReceipt) {
        let Some(store) = &self.history else {
            return;
        };
        let entry = StoredTransfer {
            tx_hash: receipt.tx_hash.clone(),
            sender: receipt.sender.clone(),
            recipient: receipt.recipient.clone(),
            amount: receipt.amount,
            relayer_fee: receipt.relayer_fee.clone(),
            network: receipt.network,
            created_at: Utc::now(),
        };
        if let Err(e) = store.record_transfer(&entry).await {
            warn!(tx_hash = %receipt.tx_hash, error = %e, "failed to record transfer");
        }
    }
}

fn current_balance(balance: &watch::Receiver<Option<u64>>) -> Result<u64, TransferError> {
    let value = *balance.borrow();
    value.ok_or(TransferError::BalanceUnavailable)
}
