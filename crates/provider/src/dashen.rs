//! Dashen Bank receipt verification.
//!
//! Dashen serves super-app receipts as PDF keyed by the transaction
//! reference alone. Receipts carry the receiver as a display name only; no
//! receiver account number is printed, so masked-account validation cannot
//! apply to this bank.

use crate::cbe::PDF_DATE_FORMATS;
use crate::fetch::{fetch_with_policy, RetryPolicy};
use crate::{BankVerifier, VerifyError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use verifier_core::models::ReceiptFacts;
use verifier_core::signature::sha256_hex;
use verifier_core::text::{capture, normalize_whitespace, parse_amount, parse_date_any, title_case};

static SENDER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Sender\s*Name\s*:?\s*(.*?)\s+(?:Sender\s*Account|Account)").unwrap()
});
static SENDER_ACCOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Sender\s*Account\s*(?:Number)?\s*:?\s*([A-Z0-9*\-]+)").unwrap()
});
static SERVICE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Service\s*Type\s*:?\s*(.*?)\s+(?:Narrative|Description)").unwrap()
});
static NARRATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Narrative\s*:?\s*(.*?)\s+(?:Receiver|Phone)").unwrap());
static RECEIVER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Receiver\s*Name\s*:?\s*(.*?)\s+(?:Phone|Institution)").unwrap()
});
static TRANSACTION_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Transaction\s*Reference\s*:?\s*([A-Z0-9\-]+)").unwrap());
static TRANSACTION_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Transaction\s*Date\s*(?:&\s*Time)?\s*:?\s*([\d/\-,: ]+(?:[APM]{2})?)").unwrap()
});
static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Transaction\s*Amount\s*(?:ETB|Birr)?\s*([\d,]+\.?\d*)").unwrap()
});

/// Extract canonical facts from the text of a Dashen receipt PDF.
///
/// Minimal field set: transaction reference and amount.
pub fn extract_receipt(pdf_text: &str) -> Result<ReceiptFacts, VerifyError> {
    let text = normalize_whitespace(pdf_text);

    let reference = capture(&text, &TRANSACTION_REF);
    let amount = capture(&text, &AMOUNT).and_then(|raw| parse_amount(&raw));
    if reference.is_none() || amount.is_none() {
        return Err(VerifyError::Extraction(
            "Could not extract required fields (Reference and Amount) from PDF.".to_string(),
        ));
    }

    Ok(ReceiptFacts {
        payer_name: capture(&text, &SENDER_NAME).map(|n| title_case(&n)),
        payer_account: capture(&text, &SENDER_ACCOUNT),
        receiver_name: capture(&text, &RECEIVER_NAME).map(|n| title_case(&n)),
        receiver_account: None,
        amount,
        transaction_date: capture(&text, &TRANSACTION_DATE)
            .and_then(|raw| parse_date_any(&raw, &PDF_DATE_FORMATS)),
        reference,
        narrative: capture(&text, &NARRATIVE).or_else(|| capture(&text, &SERVICE_TYPE)),
    })
}

#[derive(Clone)]
pub struct DashenClient {
    pub base_url: String,
    policy: RetryPolicy,
    http_client: reqwest::Client,
}

impl DashenClient {
    pub fn new(base_url: String, policy: RetryPolicy) -> Result<Arc<Self>, VerifyError> {
        // Same self-signed certificate situation as CBE.
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Arc::new(Self {
            base_url,
            policy,
            http_client,
        }))
    }
}

#[async_trait]
impl BankVerifier for DashenClient {
    async fn verify(&self, reference: &str, _suffix: &str) -> Result<ReceiptFacts, VerifyError> {
        let url = format!("{}{}", self.base_url, reference);
        tracing::info!(%url, "fetching Dashen receipt");

        let response = fetch_with_policy(self.policy, || {
            self.http_client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .header("Accept", "application/pdf")
        })
        .await?;

        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), digest = %sha256_hex(&body), "Dashen receipt PDF fetched");

        let pdf_text = pdf_extract::extract_text_from_mem(&body)
            .map_err(|_| VerifyError::Extraction("Error parsing PDF data".to_string()))?;
        extract_receipt(&pdf_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const SAMPLE: &str = "Dashen Bank Share Company \
        Sender Name ABEBE KEBEDE Sender Account Number 5****0011 \
        Transaction Channel Super App Service Type Wallet Transfer \
        Narrative payment for order 42 Receiver Name HMMK TRADING \
        Phone No. +251900000000 Institution Name Dashen Bank \
        Transaction Reference DB-FT99812 Transfer Reference TR-001 \
        Transaction Date & Time 2023-06-26 14:30:00 \
        Transaction Amount ETB 250.50 Total ETB 252.00";

    #[test]
    fn extracts_receipt_fields() {
        let facts = extract_receipt(SAMPLE).unwrap();
        assert_eq!(facts.reference.as_deref(), Some("DB-FT99812"));
        assert_eq!(facts.amount, Some(Decimal::new(25050, 2)));
        assert_eq!(facts.payer_name.as_deref(), Some("Abebe Kebede"));
        assert_eq!(facts.payer_account.as_deref(), Some("5****0011"));
        assert_eq!(facts.receiver_name.as_deref(), Some("Hmmk Trading"));
        assert_eq!(facts.receiver_account, None);
        assert_eq!(facts.narrative.as_deref(), Some("payment for order 42"));
    }

    #[test]
    fn reference_and_amount_are_mandatory() {
        let err = extract_receipt("Dashen Bank receipt with no fields").unwrap_err();
        assert!(err.to_string().contains("Reference and Amount"));
    }

    #[test]
    fn trust_all_client_builds() {
        let client = DashenClient::new(
            "https://receipt.dashensuperapp.com/receipt/".to_string(),
            RetryPolicy::single(std::time::Duration::from_secs(5)),
        );
        assert!(client.is_ok());
    }
}
