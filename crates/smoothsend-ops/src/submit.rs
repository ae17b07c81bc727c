//! Serialization and one-shot submission of signed transfers.

use std::sync::Arc;

use smoothsend_tx::{codec, RelayerApi, SubmitRequest, UnsignedTransaction};
use smoothsend_types::SubmissionResult;
use smoothsend_wallet::SignedAuthenticator;
use tracing::{info, warn};

use crate::classify::decode_abort;
use crate::TransferError;

pub struct Submitter {
    relayer: Arc<dyn RelayerApi>,
    /// Transfer module whose aborts are decoded, `0x..::smoothsend`.
    contract: String,
}

impl Submitter {
    pub fn new(relayer: Arc<dyn RelayerApi>, contract: impl Into<String>) -> Self {
        Self {
            relayer,
            contract: contract.into(),
        }
    }

    /// Encode `tx` and pair it with `auth`, which must have signed exactly these bytes.
    pub fn serialize(
        tx: &UnsignedTransaction,
        auth: &SignedAuthenticator,
    ) -> Result<SubmitRequest, TransferError> {
        let transaction_bytes = codec::encode(tx)?;
        if codec::signing_digest(&transaction_bytes) != auth.digest {
            return Err(TransferError::AuthenticatorMismatch);
        }
        Ok(SubmitRequest {
            transaction_bytes,
            authenticator_bytes: auth.bytes.clone(),
            function_name: Some(tx.function.to_string()),
        })
    }

    /// Post once. Never resubmits; decoded on-chain aborts become `ContractAbort`.
    pub async fn post(&self, request: &SubmitRequest) -> Result<SubmissionResult, TransferError> {
        match self.relayer.submit(request).await {
            Ok(result) => {
                info!(
                    tx_hash = result.transaction_hash.as_deref().unwrap_or_default(),
                    gas_fee_paid_by = result.gas_fee_paid_by.as_deref().unwrap_or_default(),
                    "transfer submitted"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "relayer rejected submission");
                match e
                    .relayer_message()
                    .and_then(|message| decode_abort(message, &self.contract))
                {
                    Some(cause) => Err(TransferError::ContractAbort(cause)),
                    None => Err(TransferError::Submission(e)),
                }
            }
        }
    }

    pub async fn submit(
        &self,
        tx: &UnsignedTransaction,
        auth: &SignedAuthenticator,
    ) -> Result<SubmissionResult, TransferError> {
        let request = Self::serialize(tx, auth)?;
        self.post(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AbortCause;
    use smoothsend_tx::mock::MockRelayer;
    use smoothsend_tx::{EntryFunctionId, MoveArg, RelayerError};
    use smoothsend_wallet::mock::MockSigner;
    use smoothsend_wallet::WalletSigner;

    const CONTRACT: &str =
        "0x6d88ee2fde204e756874e13f5d5eddebd50725805c0a332ade87d1ef03f9148b::smoothsend";

    fn tx(amount: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            sender: format!("0x{:0>64}", "1"),
            function: EntryFunctionId {
                module_address: format!("0x{:0>64}", "6d"),
                module_name: "smoothsend".into(),
                function_name: "send_with_fee".into(),
            },
            type_arguments: vec!["0x3::test_coins::USDC".into()],
            arguments: vec![
                MoveArg::Address(format!("0x{:0>64}", "5d")),
                MoveArg::Address(format!("0x{:0>64}", "2")),
                MoveArg::U64(amount),
                MoveArg::U64(1000),
            ],
            fee_payer: Some(format!("0x{:0>64}", "5d")),
        }
    }

    #[tokio::test]
    async fn test_submit_posts_encoded_bytes_once() {
        let relayer = Arc::new(MockRelayer::new());
        relayer.set_submit_outcome(Ok("0xabc".into()));
        let submitter = Submitter::new(relayer.clone(), CONTRACT);
        let auth = MockSigner::new("Petra").sign(&tx(5)).await.unwrap();

        let result = submitter.submit(&tx(5), &auth).await.unwrap();
        assert_eq!(result.transaction_hash.as_deref(), Some("0xabc"));

        let sent = relayer.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].transaction_bytes, codec::encode(&tx(5)).unwrap());
        assert_eq!(sent[0].authenticator_bytes, auth.bytes);
        assert_eq!(
            sent[0].function_name.as_deref(),
            Some(format!("0x{:0>64}::smoothsend::send_with_fee", "6d").as_str())
        );
    }

    #[tokio::test]
    async fn test_authenticator_for_other_tx_is_refused() {
        let relayer = Arc::new(MockRelayer::new());
        let submitter = Submitter::new(relayer.clone(), CONTRACT);
        let auth = MockSigner::new("Petra").sign(&tx(5)).await.unwrap();

        assert_eq!(
            submitter.submit(&tx(6), &auth).await,
            Err(TransferError::AuthenticatorMismatch)
        );
        assert!(relayer.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_abort_in_rejection_is_decoded() {
        let relayer = Arc::new(MockRelayer::new());
        relayer.set_submit_outcome(Err(RelayerError::Rejected(format!(
            "Move abort in {CONTRACT}: E_SELF_TRANSFER(0x10006)"
        ))));
        let submitter = Submitter::new(relayer, CONTRACT);
        let auth = MockSigner::new("Petra").sign(&tx(5)).await.unwrap();

        assert_eq!(
            submitter.submit(&tx(5), &auth).await,
            Err(TransferError::ContractAbort(AbortCause::SelfTransfer))
        );
    }
}
