use crate::{BankVerifier, VerifyError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use verifier_core::models::ReceiptFacts;

/// Offline stand-in for a bank client. Returns a canned receipt for any
/// reference, with a short simulated network delay.
#[derive(Clone, Default)]
pub struct MockVerifier;

impl MockVerifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {})
    }
}

#[async_trait]
impl BankVerifier for MockVerifier {
    async fn verify(&self, reference: &str, _suffix: &str) -> Result<ReceiptFacts, VerifyError> {
        sleep(Duration::from_millis(50)).await;
        Ok(ReceiptFacts {
            payer_name: Some("Mock Payer".to_string()),
            payer_account: Some("1****0000".to_string()),
            receiver_name: Some("Mock Receiver".to_string()),
            receiver_account: Some("1****9999".to_string()),
            amount: Some(Decimal::new(10000, 2)),
            transaction_date: None,
            reference: Some(reference.to_string()),
            narrative: Some("mock receipt".to_string()),
        })
    }
}
