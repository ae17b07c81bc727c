//! Runtime configuration, loaded once at startup and validated before use.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SMOOTHSEND_API_URL` | Relayer base URL | required |
//! | `SMOOTHSEND_NETWORK` | `mainnet`, `testnet` or `devnet` | `testnet` |
//! | `SMOOTHSEND_COIN_TYPE` | Transferred asset's coin type | required |
//! | `SMOOTHSEND_CONTRACT` | Gasless transfer module (`0x..::module`) | required |
//! | `SMOOTHSEND_RELAYER_ADDRESS` | Relayer account address | required |
//! | `SMOOTHSEND_ASSET_SYMBOL` | Display symbol | `USDC` |
//! | `SMOOTHSEND_ASSET_DECIMALS` | Asset decimals | `6` |
//! | `SMOOTHSEND_TRANSFER_CEILING` | Per-transfer limit, major units | `10` |
//! | `SMOOTHSEND_REQUEST_TIMEOUT_MS` | HTTP timeout | `30000` |
//! | `SMOOTHSEND_QUOTE_DEBOUNCE_MS` | Live-quote quiescence window | `500` |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{is_valid_address, parse_units};

pub const API_URL_ENV: &str = "SMOOTHSEND_API_URL";
pub const NETWORK_ENV: &str = "SMOOTHSEND_NETWORK";
pub const COIN_TYPE_ENV: &str = "SMOOTHSEND_COIN_TYPE";
pub const CONTRACT_ENV: &str = "SMOOTHSEND_CONTRACT";
pub const RELAYER_ADDRESS_ENV: &str = "SMOOTHSEND_RELAYER_ADDRESS";
pub const ASSET_SYMBOL_ENV: &str = "SMOOTHSEND_ASSET_SYMBOL";
pub const ASSET_DECIMALS_ENV: &str = "SMOOTHSEND_ASSET_DECIMALS";
pub const TRANSFER_CEILING_ENV: &str = "SMOOTHSEND_TRANSFER_CEILING";
pub const REQUEST_TIMEOUT_ENV: &str = "SMOOTHSEND_REQUEST_TIMEOUT_MS";
pub const QUOTE_DEBOUNCE_ENV: &str = "SMOOTHSEND_QUOTE_DEBOUNCE_MS";

const DEFAULT_ASSET_SYMBOL: &str = "USDC";
const DEFAULT_ASSET_DECIMALS: u8 = 6;
const DEFAULT_TRANSFER_CEILING: &str = "10";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_QUOTE_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required variable `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{var}`: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        }
    }

    /// Explorer page for a transaction hash on this network.
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        format!(
            "https://explorer.aptoslabs.com/txn/{}?network={}",
            tx_hash,
            self.as_str()
        )
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(ConfigError::Invalid {
                var: NETWORK_ENV,
                reason: format!("unknown network `{other}`"),
            }),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated SDK configuration.
#[derive(Debug, Clone)]
pub struct SmoothSendConfig {
    pub api_url: Url,
    pub network: Network,
    /// Fully qualified coin type, e.g. `0x3c27..::test_coins::USDC`.
    pub coin_type: String,
    /// Gasless transfer module, e.g. `0x6d88..::smoothsend`.
    pub contract: String,
    pub relayer_address: String,
    pub asset_symbol: String,
    pub asset_decimals: u8,
    /// Per-transfer ceiling in minor units.
    pub transfer_ceiling: u64,
    pub request_timeout: Duration,
    pub quote_debounce: Duration,
}

impl SmoothSendConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let api_url_raw = required(API_URL_ENV)?;
        let api_url = Url::parse(api_url_raw.trim()).map_err(|e| ConfigError::Invalid {
            var: API_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: API_URL_ENV,
                reason: format!("unsupported scheme `{}`", api_url.scheme()),
            });
        }

        let network = match get(NETWORK_ENV) {
            Some(v) => v.parse()?,
            None => Network::default(),
        };

        let coin_type = required(COIN_TYPE_ENV)?.trim().to_string();
        check_qualified(COIN_TYPE_ENV, &coin_type, 3)?;

        let contract = required(CONTRACT_ENV)?.trim().to_string();
        check_qualified(CONTRACT_ENV, &contract, 2)?;

        let relayer_address = required(RELAYER_ADDRESS_ENV)?.trim().to_string();
        if !is_valid_address(&relayer_address) {
            return Err(ConfigError::Invalid {
                var: RELAYER_ADDRESS_ENV,
                reason: "not a 0x-prefixed hex address".into(),
            });
        }

        let asset_symbol = get(ASSET_SYMBOL_ENV)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_ASSET_SYMBOL.to_string());

        let asset_decimals = match get(ASSET_DECIMALS_ENV) {
            Some(v) => v.trim().parse::<u8>().ok().filter(|d| *d <= 18).ok_or_else(|| {
                ConfigError::Invalid {
                    var: ASSET_DECIMALS_ENV,
                    reason: format!("expected 0..=18, got `{v}`"),
                }
            })?,
            None => DEFAULT_ASSET_DECIMALS,
        };

        let ceiling_raw = get(TRANSFER_CEILING_ENV).unwrap_or_else(|| DEFAULT_TRANSFER_CEILING.into());
        let transfer_ceiling = parse_units(&ceiling_raw, asset_decimals)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| ConfigError::Invalid {
                var: TRANSFER_CEILING_ENV,
                reason: format!("`{ceiling_raw}` is not a positive amount"),
            })?;

        let request_timeout = Duration::from_millis(parse_millis(
            REQUEST_TIMEOUT_ENV,
            get(REQUEST_TIMEOUT_ENV),
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?);
        let quote_debounce = Duration::from_millis(parse_millis(
            QUOTE_DEBOUNCE_ENV,
            get(QUOTE_DEBOUNCE_ENV),
            DEFAULT_QUOTE_DEBOUNCE_MS,
        )?);

        Ok(Self {
            api_url,
            network,
            coin_type,
            contract,
            relayer_address,
            asset_symbol,
            asset_decimals,
            transfer_ceiling,
            request_timeout,
            quote_debounce,
        })
    }

    /// Base URL without a trailing slash, ready for endpoint concatenation.
    pub fn base_url(&self) -> String {
        self.api_url.as_str().trim_end_matches('/').to_string()
    }
}

/// `0xADDR::a::b` style identifiers: a valid address plus `segments - 1` names.
fn check_qualified(var: &'static str, value: &str, segments: usize) -> Result<(), ConfigError> {
    let parts: Vec<&str> = value.split("::").collect();
    let well_formed = parts.len() == segments
        && is_valid_address(parts[0])
        && parts[1..]
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            var,
            reason: format!("expected {segments} `::`-separated segments starting with an address"),
        })
    }
}

fn parse_millis(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("`{v}` is not a number of milliseconds"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (API_URL_ENV, "https://relayer.example.com/".to_string()),
            (
                COIN_TYPE_ENV,
                "0x3c27315fb69ba6e4b960f1507d1cefcc9a4247869f26a8d59d6b7869d23782c::test_coins::USDC"
                    .to_string(),
            ),
            (
                CONTRACT_ENV,
                "0x6d88ee2fde204e756874e13f5d5eddebd50725805c0a332ade87d1ef03f9148b::smoothsend"
                    .to_string(),
            ),
            (
                RELAYER_ADDRESS_ENV,
                "0x5dfe1626d0397e882d80267b614cae3ebdae56a80809f3ddb7ada9d58366060a".to_string(),
            ),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<SmoothSendConfig, ConfigError> {
        SmoothSendConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.asset_symbol, "USDC");
        assert_eq!(config.asset_decimals, 6);
        assert_eq!(config.transfer_ceiling, 10_000_000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.quote_debounce, Duration::from_millis(500));
        assert_eq!(config.base_url(), "https://relayer.example.com");
    }

    #[test]
    fn test_missing_required() {
        let mut env = base_env();
        env.remove(RELAYER_ADDRESS_ENV);
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(RELAYER_ADDRESS_ENV));

        let mut env = base_env();
        env.insert(API_URL_ENV, "  ".into());
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(API_URL_ENV));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            (API_URL_ENV, "not a url"),
            (API_URL_ENV, "ftp://relayer.example.com"),
            (NETWORK_ENV, "moonnet"),
            (COIN_TYPE_ENV, "USDC"),
            (CONTRACT_ENV, "0x6d88::"),
            (RELAYER_ADDRESS_ENV, "relayer"),
            (ASSET_DECIMALS_ENV, "40"),
            (TRANSFER_CEILING_ENV, "0"),
            (TRANSFER_CEILING_ENV, "ten"),
            (REQUEST_TIMEOUT_ENV, "soon"),
        ];
        for (var, value) in cases {
            let mut env = base_env();
            env.insert(var, value.to_string());
            match load(&env) {
                Err(ConfigError::Invalid { var: got, .. }) => assert_eq!(got, var),
                other => panic!("{var}={value}: expected invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert(NETWORK_ENV, "Mainnet".into());
        env.insert(TRANSFER_CEILING_ENV, "2.5".into());
        env.insert(QUOTE_DEBOUNCE_ENV, "250".into());
        let config = load(&env).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.transfer_ceiling, 2_500_000);
        assert_eq!(config.quote_debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(
            Network::Testnet.explorer_url("0xabc"),
            "https://explorer.aptoslabs.com/txn/0xabc?network=testnet"
        );
    }
}
