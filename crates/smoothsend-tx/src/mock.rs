//! In-memory relayer for tests and offline development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use smoothsend_types::{normalize_address, FeeQuote, SubmissionResult, TransferRequest};

use crate::relayer_client::{
    BalanceInfo, HealthReport, RelayerApi, RelayerError, RelayerStats, SubmitRequest,
};

#[derive(Debug)]
struct State {
    fee: String,
    quote_error: Option<RelayerError>,
    quote_delay: Option<Duration>,
    submit_outcome: Result<String, RelayerError>,
    balances: HashMap<String, u64>,
    decimals: u8,
    healthy: bool,
    stats: RelayerStats,
    quote_calls: Vec<TransferRequest>,
    submissions: Vec<SubmitRequest>,
    balance_calls: usize,
    health_calls: usize,
}

/// Scriptable relayer. Every call is recorded.
#[derive(Debug)]
pub struct MockRelayer {
    state: Mutex<State>,
}

impl Default for MockRelayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRelayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                fee: "1000".to_string(),
                quote_error: None,
                quote_delay: None,
                submit_outcome: Ok("0xfeed".to_string()),
                balances: HashMap::new(),
                decimals: 6,
                healthy: true,
                stats: RelayerStats::default(),
                quote_calls: Vec::new(),
                submissions: Vec::new(),
                balance_calls: 0,
                health_calls: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_fee(self, fee: &str) -> Self {
        self.state().fee = fee.to_string();
        self
    }

    pub fn with_balance(self, address: &str, amount: u64) -> Self {
        self.set_balance(address, amount);
        self
    }

    pub fn with_quote_delay(self, delay: Duration) -> Self {
        self.state().quote_delay = Some(delay);
        self
    }

    pub fn set_balance(&self, address: &str, amount: u64) {
        let key = normalize_address(address).unwrap_or_else(|_| address.to_string());
        self.state().balances.insert(key, amount);
    }

    pub fn set_quote_error(&self, error: Option<RelayerError>) {
        self.state().quote_error = error;
    }

    /// `Ok(hash)` for an accepted submission, `Err` for a failure.
    pub fn set_submit_outcome(&self, outcome: Result<String, RelayerError>) {
        self.state().submit_outcome = outcome;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state().healthy = healthy;
    }

    pub fn set_stats(&self, stats: RelayerStats) {
        self.state().stats = stats;
    }

    pub fn quote_calls(&self) -> Vec<TransferRequest> {
        self.state().quote_calls.clone()
    }

    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.state().submissions.clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.state().balance_calls
    }

    pub fn health_calls(&self) -> usize {
        self.state().health_calls
    }
}

#[async_trait]
impl RelayerApi for MockRelayer {
    async fn health(&self) -> Result<HealthReport, RelayerError> {
        let mut state = self.state();
        state.health_calls += 1;
        if !state.healthy {
            return Err(RelayerError::Network("connection refused".into()));
        }
        Ok(HealthReport {
            status: "healthy".into(),
            timestamp: None,
            relayer_balance: None,
            network_status: Some("connected".into()),
            error: None,
        })
    }

    async fn balance(&self, address: &str) -> Result<BalanceInfo, RelayerError> {
        let key = normalize_address(address)
            .map_err(|_| RelayerError::InvalidInput(format!("bad address {address}")))?;
        let mut state = self.state();
        state.balance_calls += 1;
        Ok(BalanceInfo {
            amount: state.balances.get(&key).copied().unwrap_or(0),
            decimals: state.decimals,
        })
    }

    async fn quote(&self, request: &TransferRequest) -> Result<FeeQuote, RelayerError> {
        let delay = {
            let mut state = self.state();
            state.quote_calls.push(request.clone());
            state.quote_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if let Some(err) = &state.quote_error {
            return Err(err.clone());
        }
        Ok(FeeQuote {
            key: request.key(),
            relayer_fee: Some(state.fee.clone()),
            gas_units: Some("7".into()),
            gas_price_per_unit: Some("100".into()),
            total_gas_fee: Some("700".into()),
            apt_price: Some("8.00".into()),
            breakdown: None,
            transaction_data: None,
            message: None,
        })
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, RelayerError> {
        let mut state = self.state();
        state.submissions.push(request.clone());
        let hash = state.submit_outcome.clone()?;
        Ok(SubmissionResult {
            success: true,
            transaction_hash: Some(hash),
                gas_fee_paid_by: Some("relayer".into()),
            relayer_fee: Some(state.fee.clone()),
        })
    }

    async fn stats(&self) -> Result<RelayerStats, RelayerError> {
        Ok(self.state().stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let relayer = MockRelayer::new().with_fee("250").with_balance("0x1", 42);
        let request = TransferRequest {
            sender: "0x1".into(),
            recipient: "0x2".into(),
            asset: "USDC".into(),
            amount: 10,
        };

        let quote = relayer.quote(&request).await.unwrap();
        assert_eq!(quote.relayer_fee.as_deref(), Some("250"));
        assert_eq!(relayer.quote_calls(), vec![request]);

        let balance = relayer
            .balance("0x0000000000000000000000000000000000000000000000000000000000000001")
            .await
            .unwrap();
        assert_eq!(balance.amount, 42);

        relayer.set_submit_outcome(Err(RelayerError::Rejected("Move abort: 6".into())));
        let submit = SubmitRequest {
            transaction_bytes: vec![1],
            authenticator_bytes: vec![2],
            function_name: None,
        };
        assert!(relayer.submit(&submit).await.is_err());
        assert_eq!(relayer.submissions().len(), 1);
    }
}
