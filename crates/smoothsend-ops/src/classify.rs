//! Maps transfer failures to a category and a message safe to show a user.
//!
//! Relayer and node errors carry on-chain aborts in many phrasings:
//! `Move abort in 0x..::smoothsend: 6`, `abort_code: 6`,
//! `E_SELF_TRANSFER(0x10006)`, `ESELF_TRANSFER`. Numeric codes may carry a
//! category prefix in the upper bits; the reason is the low 16 bits. Codes
//! only mean something when the abort came from the configured transfer
//! module: `0x1::coin` reuses the same small numbers for its own reasons.

use serde::{Deserialize, Serialize};
use smoothsend_tx::RelayerError;
use smoothsend_types::{addresses_equal, AddressField, ValidationError};
use smoothsend_wallet::SignerError;

use crate::TransferError;

pub const GENERIC_FAILURE: &str = "Transaction failed. Please try again.";
pub const NETWORK_FAILURE: &str = "Network error. Please check your connection and try again.";
pub const QUOTE_FAILURE: &str = "Unable to get a fee quote. Please try again.";

/// On-chain abort reasons of the gasless transfer module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortCause {
    CoinNotSupported = 1,
    RelayerNotWhitelisted = 2,
    InsufficientBalance = 3,
    NotAdmin = 4,
    AmountZero = 5,
    SelfTransfer = 6,
    Overflow = 7,
    RelayerFeeZero = 8,
    InvalidAddress = 9,
}

impl AbortCause {
    pub const ALL: [AbortCause; 9] = [
        AbortCause::CoinNotSupported,
        AbortCause::RelayerNotWhitelisted,
        AbortCause::InsufficientBalance,
        AbortCause::NotAdmin,
        AbortCause::AmountZero,
        AbortCause::SelfTransfer,
        AbortCause::Overflow,
        AbortCause::RelayerFeeZero,
        AbortCause::InvalidAddress,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    /// Reason code, with any category prefix stripped.
    pub fn from_code(code: u64) -> Option<Self> {
        let reason = code & 0xFFFF;
        Self::ALL.into_iter().find(|c| c.code() == reason)
    }

    pub fn constant_name(self) -> &'static str {
        match self {
            AbortCause::CoinNotSupported => "E_COIN_NOT_SUPPORTED",
            AbortCause::RelayerNotWhitelisted => "E_RELAYER_NOT_WHITELISTED",
            AbortCause::InsufficientBalance => "E_INSUFFICIENT_BALANCE",
            AbortCause::NotAdmin => "E_NOT_ADMIN",
            AbortCause::AmountZero => "E_AMOUNT_ZERO",
            AbortCause::SelfTransfer => "E_SELF_TRANSFER",
            AbortCause::Overflow => "E_OVERFLOW",
            AbortCause::RelayerFeeZero => "E_RELAYER_FEE_ZERO",
            AbortCause::InvalidAddress => "E_INVALID_ADDRESS",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            AbortCause::CoinNotSupported => "Unsupported token",
            AbortCause::RelayerNotWhitelisted => "Service temporarily unavailable",
            AbortCause::InsufficientBalance => "Insufficient balance",
            AbortCause::NotAdmin => "Unauthorized action",
            AbortCause::AmountZero => "Amount must be greater than zero",
            AbortCause::SelfTransfer => "Invalid recipient address",
            AbortCause::Overflow => "Amount too large",
            AbortCause::RelayerFeeZero => "Invalid fee calculation",
            AbortCause::InvalidAddress => "Invalid address format",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Validation,
    Network,
    UserRejected,
    ContractAbort(AbortCause),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classified {
    pub category: ErrorCategory,
    pub user_message: String,
}

impl Classified {
    fn new(category: ErrorCategory, user_message: impl Into<String>) -> Self {
        Self {
            category,
            user_message: user_message.into(),
        }
    }

    fn abort(cause: AbortCause) -> Self {
        Self::new(ErrorCategory::ContractAbort(cause), cause.user_message())
    }

    fn unknown() -> Self {
        Self::new(ErrorCategory::Unknown, GENERIC_FAILURE)
    }
}

/// Classify `error`. `contract` is the transfer module, `0x..::smoothsend`.
pub fn classify(error: &TransferError, contract: &str) -> Classified {
    match error {
        TransferError::Validation(errors) => Classified::new(
            ErrorCategory::Validation,
            errors
                .first()
                .map(validation_message)
                .unwrap_or(GENERIC_FAILURE),
        ),
        TransferError::Busy => Classified::new(
            ErrorCategory::Validation,
            "A transfer is already in progress",
        ),
        TransferError::BalanceUnavailable => Classified::new(
            ErrorCategory::Network,
            "Balance is still loading. Please try again.",
        ),
        TransferError::Quote(e) => classify_relayer(e, contract, QUOTE_FAILURE),
        TransferError::Submission(e) => classify_relayer(e, contract, GENERIC_FAILURE),
        TransferError::Signer(SignerError::UserRejected) => Classified::new(
            ErrorCategory::UserRejected,
            "Transaction was cancelled in your wallet",
        ),
        TransferError::Signer(SignerError::Unavailable(_)) => Classified::new(
            ErrorCategory::Unknown,
            "Wallet unavailable. Please reconnect and try again.",
        ),
        TransferError::ContractAbort(cause) => Classified::abort(*cause),
        TransferError::Build(_)
        | TransferError::Codec(_)
        | TransferError::AuthenticatorMismatch
        | TransferError::Progress(_) => Classified::unknown(),
    }
}

fn classify_relayer(error: &RelayerError, contract: &str, fallback: &str) -> Classified {
    if let Some(cause) = error
        .relayer_message()
        .and_then(|message| decode_abort(message, contract))
    {
        return Classified::abort(cause);
    }
    if error.is_transient() {
        return Classified::new(ErrorCategory::Network, NETWORK_FAILURE);
    }
    let category = if fallback == QUOTE_FAILURE {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    };
    Classified::new(category, fallback)
}

pub fn validation_message(error: &ValidationError) -> &'static str {
    match error {
        ValidationError::InvalidAddress {
            field: AddressField::Sender,
        } => "Invalid sender address format",
        ValidationError::InvalidAddress {
            field: AddressField::Recipient,
        } => "Invalid recipient address format",
        ValidationError::ZeroAmount => "Amount must be greater than zero",
        ValidationError::SelfTransfer => "Cannot send to yourself or the relayer",
        ValidationError::Overflow => "Amount too large",
        ValidationError::ExceedsCeiling { .. } => "Amount exceeds the per-transfer limit",
        ValidationError::InsufficientBalance { .. } => "Insufficient balance",
    }
}

/// True if `message` reports an on-chain abort or execution failure.
pub fn is_contract_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("move abort") || lower.contains("execution_failure") || lower.contains("abort_code")
}

/// Extract an abort cause from a relayer or node error message.
///
/// An abort located in a module other than `contract` yields `None`.
pub fn decode_abort(message: &str, contract: &str) -> Option<AbortCause> {
    if let Some(location) = abort_location(message) {
        if !same_module(location, contract) {
            return None;
        }
    }
    if let Some(cause) = named_constant(message) {
        return Some(cause);
    }
    if !is_contract_error(message) {
        return None;
    }

    let trailing = if message.contains("Move abort") {
        trailing_number(message)
    } else {
        None
    };
    trailing
        .or_else(|| number_after(message, "abort_code"))
        .or_else(|| number_after(message, "error_code"))
        .or_else(|| number_after(message, "code"))
        .and_then(AbortCause::from_code)
}

/// `0x1::coin` out of `Move abort in 0x1::coin: ...`.
fn abort_location(message: &str) -> Option<&str> {
    const MARKER: &str = "Move abort in ";
    let start = message.find(MARKER)? + MARKER.len();
    let location = message[start..]
        .split_whitespace()
        .next()?
        .trim_end_matches([':', ',', '.']);
    location.contains("::").then_some(location)
}

fn same_module(location: &str, contract: &str) -> bool {
    match (location.split_once("::"), contract.trim().split_once("::")) {
        (Some((address, module)), Some((contract_address, contract_module))) => {
            module == contract_module && addresses_equal(address, contract_address)
        }
        _ => false,
    }
}

/// `E_SELF_TRANSFER` or `ESELF_TRANSFER`, as a whole word.
fn named_constant(message: &str) -> Option<AbortCause> {
    let words = message.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
    for word in words {
        for cause in AbortCause::ALL {
            let name = cause.constant_name();
            let compact = format!("E{}", &name[2..]);
            if word == name || word == compact {
                return Some(cause);
            }
        }
    }
    None
}

fn trailing_number(message: &str) -> Option<u64> {
    let token = message
        .trim_end()
        .rsplit(|c: char| c.is_whitespace() || c == ':' || c == '(')
        .next()?
        .trim_end_matches(|c: char| c == ')' || c == '.');
    parse_code(token)
}

/// First number following `key` and at least one `:` or whitespace.
fn number_after(message: &str, key: &str) -> Option<u64> {
    let mut rest = message;
    while let Some(pos) = rest.find(key) {
        let after = &rest[pos + key.len()..];
        let value = after.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        if value.len() < after.len() {
            let end = value
                .find(|c: char| !(c.is_ascii_alphanumeric()))
                .unwrap_or(value.len());
            if let Some(code) = parse_code(&value[..end]) {
                return Some(code);
            }
        }
        rest = after;
    }
    None
}

fn parse_code(token: &str) -> Option<u64> {
    match token.strip_prefix("0x") {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => token.parse().ok(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smoothsend_tx::extract_error_message;

    const CONTRACT: &str =
        "0x6d88ee2fde204e756874e13f5d5eddebd50725805c0a332ade87d1ef03f9148b::smoothsend";

    #[test]
    fn test_decode_phrasings() {
        let cases = [
            format!("Move abort in {CONTRACT}: 6"),
            "Transaction failed: abort_code: 6".to_string(),
            "execution_failure error_code 6".to_string(),
            format!("Move abort in {CONTRACT}: E_SELF_TRANSFER(0x10006): Cannot transfer tokens to yourself"),
            "ESELF_TRANSFER".to_string(),
            "Move abort: code 0x10006".to_string(),
            "VM status: ABORTED, abort_code: 0x10006".to_string(),
            format!("Move abort in {}: 0x10006", CONTRACT.replace("0x6d88", "0x6D88")),
        ];
        for msg in cases {
            assert_eq!(decode_abort(&msg, CONTRACT), Some(AbortCause::SelfTransfer), "{msg}");
        }
    }

    #[test]
    fn test_decode_every_code() {
        for cause in AbortCause::ALL {
            let msg = format!("Move abort in {CONTRACT}: {}", cause.code());
            assert_eq!(decode_abort(&msg, CONTRACT), Some(cause));
            assert_eq!(decode_abort(cause.constant_name(), CONTRACT), Some(cause));
        }
    }

    #[test]
    fn test_decode_ignores_unrelated_numbers() {
        assert_eq!(decode_abort("HTTP 502", CONTRACT), None);
        assert_eq!(decode_abort("status code: 500", CONTRACT), None);
        assert_eq!(decode_abort(&format!("Move abort in {CONTRACT}: 42"), CONTRACT), None);
        assert_eq!(decode_abort(&format!("Move abort in {CONTRACT}"), CONTRACT), None);
        assert_eq!(decode_abort("E_SELF_TRANSFERS", CONTRACT), None);
    }

    #[test]
    fn test_aborts_from_other_modules_are_not_ours() {
        for msg in [
            "Move abort in 0x1::coin: 0x10006",
            "Move abort in 0x1::coin: EINSUFFICIENT_BALANCE(0x10006): Not enough coins",
            "Move abort in 0x1::smoothsend: 6",
            "Move abort in 0x6d88ee2fde204e756874e13f5d5eddebd50725805c0a332ade87d1ef03f9148b::other: 6",
        ] {
            assert_eq!(decode_abort(msg, CONTRACT), None, "{msg}");
        }

        let err = TransferError::Submission(RelayerError::Rejected(
            "Move abort in 0x1::coin: 0x10006".into(),
        ));
        assert_eq!(classify(&err, CONTRACT), Classified::unknown());
    }

    #[test]
    fn test_html_gateway_error_is_network() {
        let page = "<html><head><title>502 Bad Gateway</title></head><body>nginx</body></html>";
        let err = TransferError::Submission(RelayerError::Http {
            status: 502,
            message: extract_error_message(502, page),
        });
        let classified = classify(&err, CONTRACT);
        assert_eq!(classified.category, ErrorCategory::Network);
        assert_eq!(classified.user_message, NETWORK_FAILURE);
        assert!(!classified.user_message.contains('<'));
    }

    #[test]
    fn test_submission_abort_is_contract_abort() {
        let err = TransferError::Submission(RelayerError::Rejected(format!(
            "Move abort in {CONTRACT}: 6"
        )));
        let classified = classify(&err, CONTRACT);
        assert_eq!(
            classified.category,
            ErrorCategory::ContractAbort(AbortCause::SelfTransfer)
        );
        assert_eq!(classified.user_message, "Invalid recipient address");
    }

    #[test]
    fn test_raw_rejections_are_not_surfaced() {
        let err = TransferError::Submission(RelayerError::Rejected(
            "INVALID_SIGNATURE: 0xdeadbeef".into(),
        ));
        let classified = classify(&err, CONTRACT);
        assert_eq!(classified.category, ErrorCategory::Unknown);
        assert_eq!(classified.user_message, GENERIC_FAILURE);
    }

    #[test]
    fn test_other_categories() {
        assert_eq!(
            classify(&TransferError::Signer(SignerError::UserRejected), CONTRACT).category,
            ErrorCategory::UserRejected
        );
        let validation = classify(
            &TransferError::Validation(vec![ValidationError::ZeroAmount, ValidationError::SelfTransfer]),
            CONTRACT,
        );
        assert_eq!(validation.category, ErrorCategory::Validation);
        assert_eq!(validation.user_message, "Amount must be greater than zero");

        let quote = classify(&TransferError::Quote(RelayerError::Network("timeout".into())), CONTRACT);
        assert_eq!(quote.category, ErrorCategory::Network);

        let quote = classify(&TransferError::Quote(RelayerError::Rejected("no price".into())), CONTRACT);
        assert_eq!(quote, Classified::new(ErrorCategory::Network, QUOTE_FAILURE));
    }
}
