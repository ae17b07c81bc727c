//! Debounced live quoting for an editable transfer form.
//!
//! Every edit bumps a generation counter and waits out the debounce window;
//! only the latest edit fires a request. A response is applied only if the
//! form still holds the same (sender, recipient, amount, asset) it was
//! requested for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smoothsend_tx::{RelayerApi, RelayerError};
use smoothsend_types::{FeeQuote, QuoteKey, TransferInput, ValidationError};
use smoothsend_validator::Validator;
use tokio::sync::watch;
use tracing::debug;

/// Current quote for the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QuoteSlot {
    #[default]
    Empty,
    Pending(QuoteKey),
    Ready(FeeQuote),
    Failed { key: QuoteKey, error: RelayerError },
}

impl QuoteSlot {
    pub fn key(&self) -> Option<&QuoteKey> {
        match self {
            QuoteSlot::Empty => None,
            QuoteSlot::Pending(key) => Some(key),
            QuoteSlot::Ready(quote) => Some(&quote.key),
            QuoteSlot::Failed { key, .. } => Some(key),
        }
    }

    pub fn quote(&self) -> Option<&FeeQuote> {
        match self {
            QuoteSlot::Ready(quote) => Some(quote),
            _ => None,
        }
    }
}

/// What happened to one edit.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    /// Input failed validation; the slot was cleared and nothing was sent.
    Invalid(Vec<ValidationError>),
    /// A newer edit arrived inside the debounce window.
    Superseded,
    /// The response arrived after the form moved on and was dropped.
    Stale,
    Applied(FeeQuote),
    Failed(RelayerError),
}

pub struct QuoteDesk {
    relayer: Arc<dyn RelayerApi>,
    validator: Validator,
    debounce: Duration,
    generation: AtomicU64,
    slot: watch::Sender<QuoteSlot>,
}

impl QuoteDesk {
    pub fn new(relayer: Arc<dyn RelayerApi>, validator: Validator, debounce: Duration) -> Self {
        let (slot, _) = watch::channel(QuoteSlot::Empty);
        Self {
            relayer,
            validator,
            debounce,
            generation: AtomicU64::new(0),
            slot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteSlot> {
        self.slot.subscribe()
    }

    pub fn current(&self) -> QuoteSlot {
        self.slot.borrow().clone()
    }

    /// Handle one form edit. Resolves once this edit is settled.
    pub async fn on_input(&self, input: &TransferInput, balance: u64, ceiling: u64) -> QuoteOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let request = match self.validator.into_request(input, balance, ceiling, None) {
            Ok(request) => request,
            Err(errors) => {
                self.slot.send_replace(QuoteSlot::Empty);
                return QuoteOutcome::Invalid(errors);
            }
        };
        let key = request.key();
        self.slot.send_replace(QuoteSlot::Pending(key.clone()));

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return QuoteOutcome::Superseded;
        }

        debug!(amount = request.amount, recipient = %request.recipient, "requesting quote");
        let result = self.relayer.quote(&request).await;

        let mut applied = false;
        self.slot.send_if_modified(|slot| {
            if slot.key() != Some(&key) {
                return false;
            }
            *slot = match &result {
                Ok(quote) => QuoteSlot::Ready(quote.clone()),
                Err(error) => QuoteSlot::Failed {
                    key: key.clone(),
                    error: error.clone(),
                },
            };
            applied = true;
            true
        });

        if !applied {
            debug!(amount = request.amount, "discarding stale quote");
            return QuoteOutcome::Stale;
        }
        match result {
            Ok(quote) => QuoteOutcome::Applied(quote),
            Err(error) => QuoteOutcome::Failed(error),
        }
    }
}
