//! Pre-flight validation for gasless transfers.
//!
//! - Address format (sender and recipient)
//! - Zero amount
//! - Self-transfer, including transfers to or from the relayer
//! - Overflow of amount + fee past `u64::MAX` (unparseable input fails closed)
//! - Per-transfer ceiling and available balance
//!
//! Everything here is pure. Violations are returned in priority order; the
//! first one is the top-line error shown to the user.

use serde::{Deserialize, Serialize};
use smoothsend_types::{
    addresses_equal, is_valid_address, parse_integer, parse_units, AddressField, SmoothSendConfig,
    TransferInput, TransferRequest, ValidationError,
};

/// Validation rules bound to one relayer and asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validator {
    relayer_address: String,
    decimals: u8,
}

impl Validator {
    pub fn new(relayer_address: &str, decimals: u8) -> Self {
        Self {
            relayer_address: relayer_address.to_string(),
            decimals,
        }
    }

    pub fn from_config(config: &SmoothSendConfig) -> Self {
        Self::new(&config.relayer_address, config.asset_decimals)
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Run every rule and collect all violations. Empty means valid.
    ///
    /// `balance` and `ceiling` are in minor units. `estimated_fee` is the
    /// relayer fee in minor units as reported by the last quote, if any.
    pub fn validate(
        &self,
        input: &TransferInput,
        balance: u64,
        ceiling: u64,
        estimated_fee: Option<&str>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !is_valid_address(input.sender.trim()) {
            errors.push(ValidationError::InvalidAddress {
                field: AddressField::Sender,
            });
        }
        if !is_valid_address(input.recipient.trim()) {
            errors.push(ValidationError::InvalidAddress {
                field: AddressField::Recipient,
            });
        }

        let amount = match parse_amount(&input.amount, self.decimals) {
            ParsedAmount::Empty | ParsedAmount::Value(0) => {
                errors.push(ValidationError::ZeroAmount);
                None
            }
            ParsedAmount::Value(v) => Some(v),
            ParsedAmount::Unrepresentable => None,
        };

        if is_self_transfer(&input.sender, &input.recipient, &self.relayer_address) {
            errors.push(ValidationError::SelfTransfer);
        }

        if is_overflow_risk(&input.amount, self.decimals, estimated_fee) {
            errors.push(ValidationError::Overflow);
        }

        if let Some(amount) = amount.and_then(|v| u64::try_from(v).ok()) {
            if amount > ceiling {
                errors.push(ValidationError::ExceedsCeiling { ceiling });
            }
            if amount > balance {
                errors.push(ValidationError::InsufficientBalance { balance });
            }
        }

        errors
    }

    /// Validate and, if clean, produce the typed request.
    pub fn into_request(
        &self,
        input: &TransferInput,
        balance: u64,
        ceiling: u64,
        estimated_fee: Option<&str>,
    ) -> Result<TransferRequest, Vec<ValidationError>> {
        let errors = self.validate(input, balance, ceiling, estimated_fee);
        if !errors.is_empty() {
            return Err(errors);
        }
        let amount = match parse_amount(&input.amount, self.decimals) {
            ParsedAmount::Value(v) => u64::try_from(v).map_err(|_| vec![ValidationError::Overflow])?,
            _ => return Err(vec![ValidationError::Overflow]),
        };
        Ok(TransferRequest {
            sender: input.sender.trim().to_string(),
            recipient: input.recipient.trim().to_string(),
            asset: input.asset.clone(),
            amount,
        })
    }
}

/// Largest amount the user may send right now, in minor units.
pub fn max_transferable(balance: u64, ceiling: u64) -> u64 {
    balance.min(ceiling)
}

/// True if the transfer goes to oneself, or touches the relayer's account.
pub fn is_self_transfer(sender: &str, recipient: &str, relayer: &str) -> bool {
    addresses_equal(sender, recipient)
        || addresses_equal(sender, relayer)
        || addresses_equal(recipient, relayer)
}

/// True if amount + fee could exceed `u64::MAX`, or if either cannot be parsed.
pub fn is_overflow_risk(amount: &str, decimals: u8, fee: Option<&str>) -> bool {
    let amount = match parse_amount(amount, decimals) {
        ParsedAmount::Value(v) => v,
        ParsedAmount::Empty => 0,
        ParsedAmount::Unrepresentable => return true,
    };
    let fee = match fee {
        Some(raw) => match parse_integer(raw) {
            Some(v) => v,
            None => return true,
        },
        None => 0,
    };
    match amount.checked_add(fee) {
        Some(total) => total > u64::MAX as u128,
        None => true,
    }
}

enum ParsedAmount {
    Empty,
    Value(u128),
    Unrepresentable,
}

fn parse_amount(raw: &str, decimals: u8) -> ParsedAmount {
    if raw.trim().is_empty() {
        return ParsedAmount::Empty;
    }
    match parse_units(raw, decimals) {
        Ok(v) => ParsedAmount::Value(v),
        Err(_) => ParsedAmount::Unrepresentable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "0x083f4f675b622bfa85c599047b35f9397134f48026f6e90945b1e4a8881db39b";
    const RECIPIENT: &str = "0x5d39e7e11ebab92bcf930f3723c2498eb7accea57fce3c064ab1dba2df5ff29a";
    const RELAYER: &str = "0x5dfe1626d0397e882d80267b614cae3ebdae56a80809f3ddb7ada9d58366060a";
    const USDC: u64 = 1_000_000;

    fn validator() -> Validator {
        Validator::new(RELAYER, 6)
    }

    fn input(sender: &str, recipient: &str, amount: &str) -> TransferInput {
        TransferInput {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
            asset: "0x3::test_coins::USDC".into(),
        }
    }

    #[test]
    fn test_valid_amounts_pass() {
        let v = validator();
        let (balance, ceiling) = (50 * USDC, 10 * USDC);
        for amount in ["0.000001", "1", "5", "9.999999", "10"] {
            let errors = v.validate(&input(SENDER, RECIPIENT, amount), balance, ceiling, Some("1000"));
            assert!(errors.is_empty(), "{amount}: {errors:?}");
        }
        for minor in (1..=10 * USDC).step_by(333_333) {
            let amount = smoothsend_types::format_units(minor, 6);
            assert!(v
                .validate(&input(SENDER, RECIPIENT, &amount), balance, ceiling, None)
                .is_empty());
        }
    }

    #[test]
    fn test_zero_amount() {
        let v = validator();
        for amount in ["0", "0.0", "", "  "] {
            let errors = v.validate(&input(SENDER, RECIPIENT, amount), 50 * USDC, 10 * USDC, None);
            assert_eq!(errors, vec![ValidationError::ZeroAmount], "{amount:?}");
        }
    }

    #[test]
    fn test_self_transfer() {
        let v = validator();
        let errors = v.validate(&input(SENDER, SENDER, "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(errors, vec![ValidationError::SelfTransfer]);

        let short_form = "0x83f4f675b622bfa85c599047b35f9397134f48026f6e90945b1e4a8881db39b";
        let errors = v.validate(&input(SENDER, short_form, "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(errors, vec![ValidationError::SelfTransfer]);
    }

    #[test]
    fn test_relayer_endpoints_rejected() {
        let v = validator();
        let to_relayer = v.validate(&input(SENDER, RELAYER, "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(to_relayer, vec![ValidationError::SelfTransfer]);
        let from_relayer = v.validate(&input(RELAYER, RECIPIENT, "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(from_relayer, vec![ValidationError::SelfTransfer]);
    }

    #[test]
    fn test_address_format() {
        let v = validator();
        let errors = v.validate(&input(SENDER, "5d39e7e1", "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(
            errors,
            vec![ValidationError::InvalidAddress {
                field: AddressField::Recipient
            }]
        );
        let errors = v.validate(&input("", "0xnothex", "5"), 50 * USDC, 10 * USDC, None);
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            ValidationError::InvalidAddress {
                field: AddressField::Sender
            }
        );
    }

    #[test]
    fn test_ceiling_and_balance() {
        let v = validator();
        let over_ceiling = v.validate(&input(SENDER, RECIPIENT, "15"), 50 * USDC, 10 * USDC, None);
        assert_eq!(
            over_ceiling,
            vec![ValidationError::ExceedsCeiling { ceiling: 10 * USDC }]
        );

        let over_balance = v.validate(&input(SENDER, RECIPIENT, "9"), 8 * USDC, 10 * USDC, None);
        assert_eq!(
            over_balance,
            vec![ValidationError::InsufficientBalance { balance: 8 * USDC }]
        );

        let both = v.validate(&input(SENDER, RECIPIENT, "15"), 8 * USDC, 10 * USDC, None);
        assert_eq!(
            both,
            vec![
                ValidationError::ExceedsCeiling { ceiling: 10 * USDC },
                ValidationError::InsufficientBalance { balance: 8 * USDC },
            ]
        );
    }

    #[test]
    fn test_overflow_fails_closed() {
        let v = validator();
        let max = u64::MAX;
        // amount at the top of u64, fee pushes it over
        let amount = smoothsend_types::format_units(max, 6);
        let errors = v.validate(&input(SENDER, RECIPIENT, &amount), max, max, Some("1"));
        assert_eq!(errors, vec![ValidationError::Overflow]);

        let errors = v.validate(&input(SENDER, RECIPIENT, "abc"), 50 * USDC, 10 * USDC, None);
        assert_eq!(errors, vec![ValidationError::Overflow]);

        let errors = v.validate(&input(SENDER, RECIPIENT, "5"), 50 * USDC, 10 * USDC, Some("1e3"));
        assert_eq!(errors, vec![ValidationError::Overflow]);

        assert!(is_overflow_risk("1.0000001", 6, None));
        assert!(!is_overflow_risk("5", 6, Some("1000")));
    }

    #[test]
    fn test_priority_order() {
        let v = validator();
        let errors = v.validate(&input(SENDER, SENDER, "0"), 0, 10 * USDC, Some("x"));
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroAmount,
                ValidationError::SelfTransfer,
                ValidationError::Overflow,
            ]
        );
    }

    #[test]
    fn test_into_request() {
        let v = validator();
        let request = v
            .into_request(&input(SENDER, RECIPIENT, " 5 "), 50 * USDC, 10 * USDC, None)
            .unwrap();
        assert_eq!(request.amount, 5 * USDC);
        assert_eq!(request.recipient, RECIPIENT);

        let err = v
            .into_request(&input(SENDER, RECIPIENT, "0"), 50 * USDC, 10 * USDC, None)
            .unwrap_err();
        assert_eq!(err, vec![ValidationError::ZeroAmount]);
    }

    #[test]
    fn test_max_transferable() {
        assert_eq!(max_transferable(8 * USDC, 10 * USDC), 8 * USDC);
        assert_eq!(max_transferable(50 * USDC, 10 * USDC), 10 * USDC);
    }
}
