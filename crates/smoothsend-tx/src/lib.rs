//! Gasless transfer transaction builder and relayer client.
//!
//! - Build the `send_with_fee` entry-function call from a request + quote
//! - Encode it to canonical bytes for signing and transport
//! - Quote, submit, and query the relayer service

use serde::{Deserialize, Serialize};
use smoothsend_types::{normalize_address, parse_integer, FeeQuote, Hex, SmoothSendConfig, TransferRequest};
use thiserror::Error;
use tracing::debug;

pub mod codec;
pub mod mock;
pub mod relayer_client;

pub use codec::CodecError;
pub use relayer_client::{
    extract_error_message, BalanceInfo, HealthReport, RelayerApi, RelayerClient, RelayerError,
    RelayerStats, SubmitRequest,
};

/// Entry function of the gasless transfer module.
pub const SEND_WITH_FEE: &str = "send_with_fee";

/// Fully qualified entry function: `0xADDR::module::function`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryFunctionId {
    pub module_address: Hex,
    pub module_name: String,
    pub function_name: String,
}

impl std::fmt::Display for EntryFunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.module_address, self.module_name, self.function_name)
    }
}

/// A typed entry-function argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveArg {
    Address(Hex),
    U64(u64),
}

/// Unsigned gasless transfer. Built fresh for every attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: Hex,
    pub function: EntryFunctionId,
    pub type_arguments: Vec<String>,
    /// Ordered: relayer, recipient, amount, relayer fee.
    pub arguments: Vec<MoveArg>,
    /// Account that pays gas on the sender's behalf.
    pub fee_payer: Option<Hex>,
}

impl UnsignedTransaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn signing_digest(&self) -> Result<[u8; 32], CodecError> {
        Ok(codec::signing_digest(&self.to_bytes()?))
    }

    /// Relayer fee argument, if present.
    pub fn relayer_fee(&self) -> Option<u64> {
        match self.arguments.get(3) {
            Some(MoveArg::U64(fee)) => Some(*fee),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("quote has no relayer fee")]
    MissingFee,
    #[error("quote relayer fee is not an integer: {0}")]
    InvalidFee(String),
    #[error("quote relayer fee is zero")]
    ZeroFee,
    #[error("quote was issued for a different transfer")]
    QuoteMismatch,
    #[error("amount plus relayer fee overflows u64")]
    Overflow,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid contract module: {0}")]
    InvalidContract(String),
}

/// Builds gasless transfer transactions against one contract and relayer.
#[derive(Debug, Clone)]
pub struct TransferBuilder {
    module_address: Hex,
    module_name: String,
    coin_type: String,
    relayer: Hex,
}

impl TransferBuilder {
    /// `contract` is `0xADDR::module`.
    pub fn new(contract: &str, coin_type: &str, relayer: &str) -> Result<Self, BuildError> {
        let (addr, module) = contract
            .split_once("::")
            .filter(|(_, m)| !m.is_empty() && !m.contains("::"))
            .ok_or_else(|| BuildError::InvalidContract(contract.to_string()))?;
        let module_address =
            normalize_address(addr).map_err(|_| BuildError::InvalidContract(contract.to_string()))?;
        let relayer =
            normalize_address(relayer).map_err(|_| BuildError::InvalidAddress(relayer.to_string()))?;
        Ok(Self {
            module_address,
            module_name: module.to_string(),
            coin_type: coin_type.to_string(),
            relayer,
        })
    }

    pub fn from_config(config: &SmoothSendConfig) -> Result<Self, BuildError> {
        Self::new(&config.contract, &config.coin_type, &config.relayer_address)
    }

    pub fn relayer(&self) -> &str {
        &self.relayer
    }

    /// Build the unsigned transaction. Pure: identical inputs give identical output.
    ///
    /// The fee is taken verbatim from `quote`, which must have been issued
    /// for exactly this request.
    pub fn build(
        &self,
        request: &TransferRequest,
        quote: &FeeQuote,
    ) -> Result<UnsignedTransaction, BuildError> {
        if quote.key != request.key() {
            return Err(BuildError::QuoteMismatch);
        }

        let raw_fee = quote.relayer_fee.as_deref().ok_or(BuildError::MissingFee)?;
        let fee = parse_integer(raw_fee)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| BuildError::InvalidFee(raw_fee.to_string()))?;
        if fee == 0 {
            return Err(BuildError::ZeroFee);
        }
        request.amount.checked_add(fee).ok_or(BuildError::Overflow)?;

        let sender = normalize_address(&request.sender)
            .map_err(|_| BuildError::InvalidAddress(request.sender.clone()))?;
        let recipient = normalize_address(&request.recipient)
            .map_err(|_| BuildError::InvalidAddress(request.recipient.clone()))?;

        if let Some(data) = &quote.transaction_data {
            debug!(suggested = %data.function, "relayer suggested entry function");
        }

        Ok(UnsignedTransaction {
            sender,
            function: EntryFunctionId {
                module_address: self.module_address.clone(),
                module_name: self.module_name.clone(),
                function_name: SEND_WITH_FEE.to_string(),
            },
            type_arguments: vec![self.coin_type.clone()],
            arguments: vec![
                MoveArg::Address(self.relayer.clone()),
                MoveArg::Address(recipient),
                MoveArg::U64(request.amount),
                MoveArg::U64(fee),
            ],
            fee_payer: Some(self.relayer.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x6d88ee2fde204e756874e13f5d5eddebd50725805c0a332ade87d1ef03f9148b::smoothsend";
    const COIN: &str = "0x3c27315fb69ba6e4b960f1507d1cefcc9a4247869f26a8d59d6b7869d23782c::test_coins::USDC";
    const RELAYER: &str = "0x5dfe1626d0397e882d80267b614cae3ebdae56a80809f3ddb7ada9d58366060a";
    const SENDER: &str = "0x083f4f675b622bfa85c599047b35f9397134f48026f6e90945b1e4a8881db39b";
    const RECIPIENT: &str = "0x5d39e7e11ebab92bcf930f3723c2498eb7accea57fce3c064ab1dba2df5ff29a";

    fn request() -> TransferRequest {
        TransferRequest {
            sender: SENDER.into(),
            recipient: RECIPIENT.into(),
            asset: COIN.into(),
            amount: 5_000_000,
        }
    }

    fn quote(fee: Option<&str>) -> FeeQuote {
        FeeQuote {
            key: request().key(),
            relayer_fee: fee.map(|f| f.to_string()),
            gas_units: Some("12".into()),
            gas_price_per_unit: Some("100".into()),
            total_gas_fee: Some("1200".into()),
            apt_price: Some("8.5".into()),
            breakdown: None,
            transaction_data: None,
            message: None,
        }
    }

    fn builder() -> TransferBuilder {
        TransferBuilder::new(CONTRACT, COIN, RELAYER).unwrap()
    }

    #[test]
    fn test_build_encodes_fee_and_relayer() {
        let tx = builder().build(&request(), &quote(Some("1000"))).unwrap();
        assert_eq!(tx.function.to_string(), format!("{CONTRACT}::send_with_fee"));
        assert_eq!(tx.type_arguments, vec![COIN.to_string()]);
        assert_eq!(
            tx.arguments,
            vec![
                MoveArg::Address(RELAYER.into()),
                MoveArg::Address(RECIPIENT.into()),
                MoveArg::U64(5_000_000),
                MoveArg::U64(1000),
            ]
        );
        assert_eq!(tx.fee_payer.as_deref(), Some(RELAYER));
        assert_eq!(tx.relayer_fee(), Some(1000));
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = builder();
        let first = b.build(&request(), &quote(Some("1000"))).unwrap();
        let second = b.build(&request(), &quote(Some("1000"))).unwrap();
        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
        assert_eq!(first.signing_digest().unwrap(), second.signing_digest().unwrap());
    }

    #[test]
    fn test_build_rejects_bad_fee() {
        let b = builder();
        assert_eq!(b.build(&request(), &quote(None)), Err(BuildError::MissingFee));
        assert_eq!(
            b.build(&request(), &quote(Some("0.01"))),
            Err(BuildError::InvalidFee("0.01".into()))
        );
        assert_eq!(
            b.build(&request(), &quote(Some("lots"))),
            Err(BuildError::InvalidFee("lots".into()))
        );
        assert_eq!(b.build(&request(), &quote(Some("0"))), Err(BuildError::ZeroFee));
        assert_eq!(
            b.build(&request(), &quote(Some("18446744073709551615"))),
            Err(BuildError::Overflow)
        );
    }

    #[test]
    fn test_build_rejects_quote_for_other_request() {
        let mut other = request();
        other.amount = 6_000_000;
        assert_eq!(
            builder().build(&other, &quote(Some("1000"))),
            Err(BuildError::QuoteMismatch)
        );
    }

    #[test]
    fn test_invalid_contract() {
        assert!(matches!(
            TransferBuilder::new("0x1", COIN, RELAYER),
            Err(BuildError::InvalidContract(_))
        ));
        assert!(matches!(
            TransferBuilder::new("0x1::a::b", COIN, RELAYER),
            Err(BuildError::InvalidContract(_))
        ));
        assert!(matches!(
            TransferBuilder::new(CONTRACT, COIN, "relayer"),
            Err(BuildError::InvalidAddress(_))
        ));
    }
}
