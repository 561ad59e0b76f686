//! Bank of Abyssinia receipt verification.
//!
//! Unlike the scraped banks, Abyssinia exposes a JSON slip API. The endpoint
//! is flaky, so fetches run under a short fixed-delay retry loop.

use crate::fetch::{fetch_with_policy, RetryPolicy};
use crate::{BankVerifier, VerifyError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use verifier_core::models::ReceiptFacts;
use verifier_core::text::{parse_amount, parse_date_any};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct SlipResponse {
    header: SlipHeader,
    #[serde(default)]
    body: Vec<SlipEntry>,
}

#[derive(Debug, Deserialize)]
struct SlipHeader {
    #[serde(default)]
    status: String,
}

/// One transaction entry. Field names mirror the API's display labels.
#[derive(Debug, Deserialize)]
struct SlipEntry {
    #[serde(rename = "Payer's Name", default)]
    payer_name: String,
    #[serde(rename = "Source Account", default)]
    source_account: String,
    #[serde(rename = "Receiver's Account", default)]
    receiver_account: String,
    #[serde(rename = "Receiver's Name", default)]
    receiver_name: String,
    #[serde(rename = "Transferred Amount", default)]
    transferred_amount: String,
    #[serde(rename = "Transaction Date", default)]
    transaction_date: String,
    #[serde(rename = "Transaction Reference", default)]
    transaction_reference: String,
    #[serde(rename = "Narrative", default)]
    narrative: String,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Map a slip API response onto canonical facts.
///
/// A non-"success" header status is a provider-reported failure, distinct
/// from a well-formed response that is merely missing required fields.
pub fn extract_response(json: &str) -> Result<ReceiptFacts, VerifyError> {
    let slip: SlipResponse = serde_json::from_str(json)
        .map_err(|_| VerifyError::Extraction("Error parsing JSON data".to_string()))?;

    if slip.header.status != "success" {
        tracing::warn!(status = %slip.header.status, "Abyssinia API returned non-success status");
        return Err(VerifyError::ProviderStatus(slip.header.status));
    }
    let Some(entry) = slip.body.into_iter().next() else {
        return Err(VerifyError::Extraction(
            "No transaction data found".to_string(),
        ));
    };

    let amount = parse_amount(&entry.transferred_amount);
    let reference = non_empty(entry.transaction_reference);
    if reference.is_none() || amount.is_none() {
        return Err(VerifyError::Extraction(
            "Missing essential fields in transaction data".to_string(),
        ));
    }

    Ok(ReceiptFacts {
        payer_name: non_empty(entry.payer_name),
        payer_account: non_empty(entry.source_account),
        receiver_name: non_empty(entry.receiver_name),
        receiver_account: non_empty(entry.receiver_account),
        amount,
        transaction_date: non_empty(entry.transaction_date)
            .and_then(|raw| parse_date_any(&raw, &DATE_FORMATS)),
        reference,
        narrative: non_empty(entry.narrative),
    })
}

#[derive(Clone)]
pub struct AbyssiniaClient {
    pub base_url: String,
    policy: RetryPolicy,
    http_client: reqwest::Client,
}

impl AbyssiniaClient {
    pub fn new(base_url: String, policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            base_url,
            policy,
            http_client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl BankVerifier for AbyssiniaClient {
    async fn verify(&self, reference: &str, suffix: &str) -> Result<ReceiptFacts, VerifyError> {
        let url = format!("{}{}{}", self.base_url, reference, suffix);
        tracing::info!(%url, attempts = self.policy.max_attempts, "fetching Abyssinia slip");

        let response = fetch_with_policy(self.policy, || {
            self.http_client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .header("Accept", "application/json")
        })
        .await?;

        let json = response.text().await?;
        extract_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample(status: &str) -> String {
        format!(
            r#"{{
                "header": {{"status": "{status}"}},
                "body": [{{
                    "Payer's Name": "Abebe Kebede",
                    "Source Account": "144455667",
                    "Source Account Name": "Abebe Kebede",
                    "Receiver's Account": "1******96",
                    "Receiver's Name": "Hmmk Trading",
                    "Transferred Amount": "1,234.56 ETB",
                    "Transaction Date": "2023-06-26 14:30:00",
                    "Transaction Reference": "BOA778899",
                    "Narrative": "invoice 42"
                }}]
            }}"#
        )
    }

    #[test]
    fn maps_successful_slip() {
        let facts = extract_response(&sample("success")).unwrap();
        assert_eq!(facts.reference.as_deref(), Some("BOA778899"));
        assert_eq!(facts.amount, Some(Decimal::new(123456, 2)));
        assert_eq!(facts.receiver_account.as_deref(), Some("1******96"));
        assert_eq!(facts.receiver_name.as_deref(), Some("Hmmk Trading"));
        assert_eq!(facts.narrative.as_deref(), Some("invoice 42"));
        assert!(facts.transaction_date.is_some());
    }

    #[test]
    fn non_success_status_is_provider_failure() {
        let err = extract_response(&sample("failed")).unwrap_err();
        assert_eq!(err.to_string(), "API status: failed");
    }

    #[test]
    fn empty_body_is_extraction_failure() {
        let json = r#"{"header": {"status": "success"}, "body": []}"#;
        let err = extract_response(json).unwrap_err();
        assert_eq!(err.to_string(), "No transaction data found");
    }

    #[test]
    fn missing_reference_is_extraction_failure() {
        let json = sample("success").replace("BOA778899", "");
        let err = extract_response(&json).unwrap_err();
        assert_eq!(err.to_string(), "Missing essential fields in transaction data");
    }

    #[test]
    fn malformed_json_is_extraction_failure() {
        let err = extract_response("<html>gateway timeout</html>").unwrap_err();
        assert_eq!(err.to_string(), "Error parsing JSON data");
    }
}
