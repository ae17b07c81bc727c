use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod units;

pub use config::{ConfigError, Network, SmoothSendConfig};
pub use units::{format_units, parse_integer, parse_units};

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// SmoothSend SDK error types.
#[derive(Debug, Error)]
pub enum SmoothSendError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SmoothSendError>;

/// A single validator violation. Variants are declared in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address format")]
    InvalidAddress { field: AddressField },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("cannot transfer to yourself or the relayer")]
    SelfTransfer,

    #[error("amount plus fee would overflow")]
    Overflow,

    #[error("amount exceeds the per-transfer limit of {ceiling} minor units")]
    ExceedsCeiling { ceiling: u64 },

    #[error("insufficient balance: {balance} minor units available")]
    InsufficientBalance { balance: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressField {
    Sender,
    Recipient,
}

impl std::fmt::Display for AddressField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressField::Sender => f.write_str("sender"),
            AddressField::Recipient => f.write_str("recipient"),
        }
    }
}

/// Raw transfer form state, exactly as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInput {
    pub sender: String,
    pub recipient: String,
    /// Decimal amount in major units ("5", "0.25").
    pub amount: String,
    pub asset: String,
}

/// A validated transfer, amount in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: Hex,
    pub recipient: Hex,
    pub asset: String,
    pub amount: u64,
}

impl TransferRequest {
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            sender: normalize_address(&self.sender).unwrap_or_else(|_| self.sender.clone()),
            recipient: normalize_address(&self.recipient)
                .unwrap_or_else(|_| self.recipient.clone()),
            amount: self.amount,
            asset: self.asset.clone(),
        }
    }
}

/// The (sender, recipient, amount, asset) tuple a quote was requested for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteKey {
    pub sender: Hex,
    pub recipient: Hex,
    pub amount: u64,
    pub asset: String,
}

/// Relayer fee breakdown, as reported alongside a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    #[serde(rename = "gasInAPT")]
    pub gas_in_apt: Option<String>,
    #[serde(rename = "gasInUSD")]
    pub gas_in_usd: Option<String>,
    pub markup_percentage: Option<f64>,
    #[serde(rename = "finalFeeUSDC")]
    pub final_fee_usdc: Option<String>,
}

/// Entry-function call the relayer expects, echoed with a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub function_arguments: Vec<String>,
}

/// An advisory fee quote. The relayer re-checks the fee at submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeQuote {
    pub key: QuoteKey,
    /// Raw relayer fee in minor units, kept unparsed until the builder needs it.
    pub relayer_fee: Option<String>,
    pub gas_units: Option<String>,
    pub gas_price_per_unit: Option<String>,
    pub total_gas_fee: Option<String>,
    pub apt_price: Option<String>,
    pub breakdown: Option<FeeBreakdown>,
    pub transaction_data: Option<TransactionData>,
    pub message: Option<String>,
}

/// Relayer acknowledgement of an accepted submission. Rejections and aborts
/// travel as errors instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub success: bool,
    pub transaction_hash: Option<Hex>,
    pub gas_fee_paid_by: Option<String>,
    pub relayer_fee: Option<String>,
}

/// Basic account address check: 0x prefix followed by 1..=64 hex digits.
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(digits) => {
            !digits.is_empty()
                && digits.len() <= ADDRESS_LENGTH * 2
                && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Normalize to the long form: lowercase, left-padded to 64 hex digits.
pub fn normalize_address(address: &str) -> Result<Hex> {
    let trimmed = address.trim();
    if !is_valid_address(trimmed) {
        return Err(SmoothSendError::InvalidAddress(address.to_string()));
    }
    let digits = &trimmed[2..];
    Ok(format!(
        "0x{:0>width$}",
        digits.to_ascii_lowercase(),
        width = ADDRESS_LENGTH * 2
    ))
}

/// Compare two addresses by their normalized form. Malformed addresses never match.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    match (normalize_address(a), normalize_address(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse an address into its 32 raw bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; ADDRESS_LENGTH]> {
    let normalized = normalize_address(address)?;
    let bytes = hex::decode(&normalized[2..]).map_err(|e| SmoothSendError::InvalidHex(e.to_string()))?;
    let mut out = [0u8; ADDRESS_LENGTH];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x1"));
        assert!(is_valid_address(
            "0x5dfe1626d0397e882d80267b614cae3ebdae56a80809f3ddb7ada9d58366060a"
        ));
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0x"));
        assert!(!is_valid_address("5dfe1626"));
        assert!(!is_valid_address("0xzz"));
        assert!(!is_valid_address(&format!("0x{}", "a".repeat(65))));
    }

    #[test]
    fn test_short_and_long_forms_compare_equal() {
        let long = "0x0000000000000000000000000000000000000000000000000000000000000001";
        assert!(addresses_equal("0x1", long));
        assert!(addresses_equal("0xABC", "0xabc"));
        assert!(!addresses_equal("0x1", "0x2"));
        assert!(!addresses_equal("nope", "nope"));
    }

    #[test]
    fn test_address_to_bytes() {
        let bytes = address_to_bytes("0x1").unwrap();
        assert_eq!(bytes[31], 1);
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert!(address_to_bytes("0x").is_err());
    }

    #[test]
    fn test_quote_key_uses_normalized_addresses() {
        let request = TransferRequest {
            sender: "0xA".into(),
            recipient: "0xb".into(),
            asset: "0x1::usdc::USDC".into(),
            amount: 5,
        };
        let key = request.key();
        assert!(key.sender.ends_with('a'));
        assert_eq!(key.sender.len(), 66);
        assert_eq!(key.amount, 5);
    }
}
