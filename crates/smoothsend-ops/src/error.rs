use smoothsend_tx::{BuildError, CodecError, RelayerError};
use smoothsend_types::ValidationError;
use smoothsend_wallet::SignerError;
use thiserror::Error;

use crate::classify::AbortCause;
use crate::progress::ProgressError;

/// Every way a transfer run can end without a transaction hash.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransferError {
    #[error("validation failed: {}", first_violation(.0))]
    Validation(Vec<ValidationError>),

    #[error("a transfer is already in progress")]
    Busy,

    #[error("balance has not been loaded yet")]
    BalanceUnavailable,

    #[error("quote failed: {0}")]
    Quote(RelayerError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("encoding failed: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("submission failed: {0}")]
    Submission(RelayerError),

    #[error("contract aborted: {}", .0.constant_name())]
    ContractAbort(AbortCause),

    #[error("authenticator was produced for a different transaction")]
    AuthenticatorMismatch,

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

fn first_violation(errors: &[ValidationError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no violations".to_string())
}
