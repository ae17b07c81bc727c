//! HTTP client for the SmoothSend relayer service.
//!
//! Endpoints:
//! - GET /api/v1/relayer/health
//! - GET /api/v1/relayer/balance/{address}
//! - POST /api/v1/relayer/quote
//! - POST /api/v1/relayer/gasless-wallet-serialized
//! - GET /api/v1/relayer/stats

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use smoothsend_types::{
    is_valid_address, parse_units, FeeBreakdown, FeeQuote, SmoothSendConfig, SubmissionResult,
    TransactionData, TransferRequest,
};
use thiserror::Error;
use tracing::{debug, warn};

const HEALTH_PATH: &str = "/api/v1/relayer/health";
const BALANCE_PATH: &str = "/api/v1/relayer/balance";
const QUOTE_PATH: &str = "/api/v1/relayer/quote";
const SUBMIT_PATH: &str = "/api/v1/relayer/gasless-wallet-serialized";
const STATS_PATH: &str = "/api/v1/relayer/stats";

/// Longest plain-text error body surfaced from a failed response.
const MAX_ERROR_TEXT: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayerError {
    #[error("relayer request failed: {0}")]
    Network(String),
    #[error("relayer returned status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to parse relayer response: {0}")]
    Malformed(String),
    #[error("relayer rejected request: {0}")]
    Rejected(String),
    #[error("invalid request: {0}")]
    InvalidInput(String),
}

impl RelayerError {
    /// Errors that clear up on their own: transport failures and 5xx/408/429.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayerError::Network(_) | RelayerError::Malformed(_) => true,
            RelayerError::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            RelayerError::Rejected(_) | RelayerError::InvalidInput(_) => false,
        }
    }

    /// Best-effort relayer-provided message, if any.
    pub fn relayer_message(&self) -> Option<&str> {
        match self {
            RelayerError::Http { message, .. } | RelayerError::Rejected(message) => Some(message),
            _ => None,
        }
    }
}

/// Body of the serialized submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub transaction_bytes: Vec<u8>,
    pub authenticator_bytes: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub relayer_balance: Option<String>,
    #[serde(default)]
    pub network_status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Account balance of the transferred asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceInfo {
    /// Minor units.
    pub amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayerStats {
    pub relayer_address: Option<String>,
    pub is_active: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub balance: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub apt_balance: Option<String>,
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    #[serde(deserialize_with = "lenient_string")]
    pub total_volume: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub total_revenue: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub average_gas_cost: Option<String>,
}

impl RelayerStats {
    /// Successful share of all transactions, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            return 0.0;
        }
        self.successful_transactions as f64 * 100.0 / self.total_transactions as f64
    }
}

/// The relayer's HTTP surface. `RelayerClient` talks to the network;
/// `mock::MockRelayer` stands in for it in tests.
#[async_trait]
pub trait RelayerApi: Send + Sync {
    async fn health(&self) -> Result<HealthReport, RelayerError>;

    async fn balance(&self, address: &str) -> Result<BalanceInfo, RelayerError>;

    /// One quote request. Idempotent and safe to retry.
    async fn quote(&self, request: &TransferRequest) -> Result<FeeQuote, RelayerError>;

    /// One submission. Never retried by the client.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, RelayerError>;

    async fn stats(&self) -> Result<RelayerStats, RelayerError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequestBody<'a> {
    from_address: &'a str,
    to_address: &'a str,
    amount: String,
    coin_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponseBody {
    success: Option<bool>,
    quote: Option<QuoteBody>,
    transaction_data: Option<TransactionData>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    #[serde(default, deserialize_with = "lenient_string")]
    relayer_fee: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gas_units: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gas_price_per_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    total_gas_fee: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    apt_price: Option<String>,
    #[serde(default)]
    breakdown: Option<FeeBreakdown>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponseBody {
    success: Option<bool>,
    txn_hash: Option<String>,
    hash: Option<String>,
    error: Option<String>,
    message: Option<String>,
    gas_fee_paid_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    relayer_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponseBody {
    success: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    balance: Option<String>,
    decimals: Option<u8>,
    error: Option<String>,
}

/// Relayer client.
pub struct RelayerClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    default_decimals: u8,
}

impl RelayerClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            default_decimals: 6,
        }
    }

    pub fn from_config(config: &SmoothSendConfig) -> Self {
        let mut client = Self::new(
            &config.base_url(),
            Some(config.request_timeout.as_millis() as u64),
        );
        client.default_decimals = config.asset_decimals;
        client
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "relayer GET");
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RelayerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "relayer POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayerError::Network(e.to_string()))?;
        read_json(resp).await
    }
}

#[async_trait]
impl RelayerApi for RelayerClient {
    /// GET /api/v1/relayer/health
    async fn health(&self) -> Result<HealthReport, RelayerError> {
        self.get_json(HEALTH_PATH).await
    }

    /// GET /api/v1/relayer/balance/{address}
    async fn balance(&self, address: &str) -> Result<BalanceInfo, RelayerError> {
        if !is_valid_address(address) {
            return Err(RelayerError::InvalidInput(format!("bad address {address}")));
        }
        let body: BalanceResponseBody = self.get_json(&format!("{BALANCE_PATH}/{address}")).await?;
        balance_from_body(body, self.default_decimals)
    }

    /// POST /api/v1/relayer/quote
    async fn quote(&self, request: &TransferRequest) -> Result<FeeQuote, RelayerError> {
        let body = QuoteRequestBody {
            from_address: &request.sender,
            to_address: &request.recipient,
            amount: request.amount.to_string(),
            coin_type: &request.asset,
        };
        let resp: QuoteResponseBody = self.post_json(QUOTE_PATH, &body).await?;
        quote_from_body(request, resp)
    }

    /// POST /api/v1/relayer/gasless-wallet-serialized
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, RelayerError> {
        let resp: SubmitResponseBody = self.post_json(SUBMIT_PATH, request).await?;
        submission_from_body(resp)
    }

    /// GET /api/v1/relayer/stats
    async fn stats(&self) -> Result<RelayerStats, RelayerError> {
        self.get_json(STATS_PATH).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RelayerError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| RelayerError::Network(e.to_string()))?;

    if !status.is_success() {
        let message = extract_error_message(status.as_u16(), &text);
        warn!(status = status.as_u16(), %message, "relayer returned error status");
        return Err(RelayerError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_json::from_str(text).map_err(|e| RelayerError::Malformed(e.to_string()))
}

/// Reduce a failed response body to a short message.
///
/// JSON bodies give their `error` or `message` field. HTML pages and empty
/// bodies become `HTTP <status>`. Other text is truncated.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let generic = format!("HTTP {status}");
    let trimmed = body.trim();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str::<serde_json::Value>(trimmed)
            .ok()
            .and_then(|v| {
                ["error", "message"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
            })
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(generic);
    }

    if trimmed.is_empty() || looks_like_html(trimmed) {
        return generic;
    }

    match trimmed.char_indices().nth(MAX_ERROR_TEXT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_ascii_lowercase();
    head.starts_with('<') || head.contains("<html") || head.contains("<!doctype") || head.contains("<body")
}

fn quote_from_body(request: &TransferRequest, resp: QuoteResponseBody) -> Result<FeeQuote, RelayerError> {
    if resp.success != Some(true) {
        let reason = resp
            .error
            .or(resp.message)
            .unwrap_or_else(|| "quote failed".to_string());
        return Err(RelayerError::Rejected(reason));
    }
    let quote = resp
        .quote
        .ok_or_else(|| RelayerError::Malformed("missing quote".into()))?;
    Ok(FeeQuote {
        key: request.key(),
        relayer_fee: quote.relayer_fee,
        gas_units: quote.gas_units,
        gas_price_per_unit: quote.gas_price_per_unit,
        total_gas_fee: quote.total_gas_fee,
        apt_price: quote.apt_price,
        breakdown: quote.breakdown,
        transaction_data: resp.transaction_data,
        message: resp.message,
    })
}

fn submission_from_body(resp: SubmitResponseBody) -> Result<SubmissionResult, RelayerError> {
    if resp.success != Some(true) {
        let reason = resp
            .error
            .or(resp.message)
            .unwrap_or_else(|| "transaction failed".to_string());
        return Err(RelayerError::Rejected(reason));
    }
    let hash = resp
        .txn_hash
        .or(resp.hash)
        .ok_or_else(|| RelayerError::Malformed("missing transaction hash".into()))?;
    Ok(SubmissionResult {
        success: true,
        transaction_hash: Some(hash),
        gas_fee_paid_by: resp.gas_fee_paid_by,
        relayer_fee: resp.relayer_fee,
    })
}

fn balance_from_body(body: BalanceResponseBody, default_decimals: u8) -> Result<BalanceInfo, RelayerError> {
    if body.success != Some(true) {
        return Err(RelayerError::Rejected(
            body.error.unwrap_or_else(|| "balance unavailable".to_string()),
        ));
    }
    let raw = body
        .balance
        .ok_or_else(|| RelayerError::Malformed("missing balance".into()))?;
    let decimals = body.decimals.unwrap_or(default_decimals);
    let amount = parse_units(&raw, decimals)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| RelayerError::Malformed(format!("unparseable balance {raw}")))?;
    Ok(BalanceInfo { amount, decimals })
}

/// Accept a JSON string or number, keeping the number's textual form.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
