//! Exact conversion between major-unit decimal strings and minor units.
//!
//! No floating point is involved: "5.25" with 6 decimals is 5_250_000.

use crate::{Result, SmoothSendError};

/// Parse a major-unit decimal string into minor units.
///
/// Accepts plain digits with an optional fractional part of at most
/// `decimals` digits. Signs, exponents, whitespace inside the number and
/// excess precision are rejected. The result is a `u128` so callers can
/// detect values beyond `u64::MAX` themselves.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128> {
    let amount = amount.trim();
    let invalid = || SmoothSendError::InvalidAmount(amount.to_string());

    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(invalid());
    }

    let scale = 10u128.checked_pow(decimals as u32).ok_or_else(invalid)?;
    let whole_val = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| invalid())?
    };
    let frac_val = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse::<u128>().map_err(|_| invalid())?
    };

    whole_val
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(invalid)
}

/// Parse a base-10 integer string (minor units, as the relayer reports fees).
pub fn parse_integer(value: &str) -> Option<u128> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse::<u128>().ok()
}

/// Format minor units as a major-unit decimal string without trailing zeros.
pub fn format_units(amount: u64, decimals: u8) -> String {
    let amount = amount as u128;
    // past 10^38 the scale leaves u128, and any u64 is already below it
    let (whole, frac) = match 10u128.checked_pow(decimals as u32) {
        Some(scale) => (amount / scale, amount % scale),
        None => (0, amount),
    };
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("5", 6).unwrap(), 5_000_000);
        assert_eq!(parse_units("0.25", 6).unwrap(), 250_000);
        assert_eq!(parse_units(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_units("10.", 6).unwrap(), 10_000_000);
        assert_eq!(parse_units("0", 6).unwrap(), 0);
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
    }

    #[test]
    fn test_parse_units_rejects_malformed() {
        for bad in ["", ".", "-1", "+1", "1e6", "abc", "1.0000001", "1,5", "1 5"] {
            assert!(parse_units(bad, 6).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_parse_units_exceeding_u64_is_reported_not_truncated() {
        let v = parse_units("18446744073709.551616", 6).unwrap();
        assert!(v > u64::MAX as u128);
        assert!(parse_units(&"9".repeat(60), 6).is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("1000"), Some(1000));
        assert_eq!(parse_integer(" 42 "), Some(42));
        assert_eq!(parse_integer("10.5"), None);
        assert_eq!(parse_integer("-3"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(5_000_000, 6), "5");
        assert_eq!(format_units(1_500_000, 6), "1.5");
        assert_eq!(format_units(1, 6), "0.000001");
        assert_eq!(format_units(0, 6), "0");
        assert_eq!(format_units(42, 0), "42");
    }

    #[test]
    fn test_format_units_wide_decimals() {
        assert_eq!(format_units(5, 39), format!("0.{}5", "0".repeat(38)));
        assert_eq!(format_units(0, 255), "0");
        assert_eq!(format_units(u64::MAX, 20), "0.18446744073709551615");
    }
}
