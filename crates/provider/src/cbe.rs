//! CBE (Commercial Bank of Ethiopia) receipt verification.
//!
//! CBE serves receipts as PDF from an endpoint keyed by the transaction
//! reference concatenated with the last digits of the account. The endpoint
//! presents a self-signed certificate, so the client accepts invalid certs.

use crate::fetch::{fetch_with_policy, RetryPolicy};
use crate::{BankVerifier, VerifyError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use verifier_core::models::ReceiptFacts;
use verifier_core::signature::sha256_hex;
use verifier_core::text::{
    capture, capture_all, normalize_whitespace, parse_amount, parse_date_any, title_case,
};

static PAYER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Payer\s*:?\s*(.*?)\s+Account").unwrap());
static RECEIVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Receiver\s*:?\s*(.*?)\s+Account").unwrap());
static MASKED_ACCOUNTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Account\s*:?\s*([A-Z0-9]?\*{4}\d{4})").unwrap());
static REASON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Reason\s*/\s*Type of service\s*:?\s*(.*?)\s+Transferred Amount").unwrap()
});
static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Transferred Amount\s*:?\s*([\d,]+\.\d{2})\s*ETB").unwrap());
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Reference No\.?\s*\(VAT Invoice No\)\s*:?\s*([A-Z0-9]+)").unwrap()
});
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Payment Date & Time\s*:?\s*([\d/,: ]+[APM]{2})").unwrap()
});

pub(crate) const PDF_DATE_FORMATS: [&str; 5] = [
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y, %I:%M:%S %p",
    "%d/%m/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
];

/// Extract canonical facts from the text of a CBE receipt PDF.
///
/// CBE receipts always carry the full field set, so anything missing means
/// the document was not a receipt and extraction fails outright.
pub fn extract_receipt(pdf_text: &str) -> Result<ReceiptFacts, VerifyError> {
    let text = normalize_whitespace(pdf_text);

    let payer_name = capture(&text, &PAYER).map(|n| title_case(&n));
    let receiver_name = capture(&text, &RECEIVER).map(|n| title_case(&n));

    // Masked accounts appear in document order: payer first, receiver second.
    let accounts = capture_all(&text, &MASKED_ACCOUNTS);
    let payer_account = accounts.first().cloned();
    let receiver_account = accounts.get(1).cloned();

    let amount = capture(&text, &AMOUNT).and_then(|raw| parse_amount(&raw));
    let reference = capture(&text, &REFERENCE);
    let transaction_date =
        capture(&text, &DATE).and_then(|raw| parse_date_any(&raw, &PDF_DATE_FORMATS));
    let narrative = capture(&text, &REASON);

    let complete = payer_name.is_some()
        && payer_account.is_some()
        && receiver_name.is_some()
        && receiver_account.is_some()
        && amount.is_some()
        && transaction_date.is_some()
        && reference.is_some();
    if !complete {
        return Err(VerifyError::Extraction(
            "Could not extract all required fields from PDF.".to_string(),
        ));
    }

    Ok(ReceiptFacts {
        payer_name,
        payer_account,
        receiver_name,
        receiver_account,
        amount,
        transaction_date,
        reference,
        narrative,
    })
}

#[derive(Clone)]
pub struct CbeClient {
    pub base_url: String,
    policy: RetryPolicy,
    http_client: reqwest::Client,
}

impl CbeClient {
    pub fn new(base_url: String, policy: RetryPolicy) -> Result<Arc<Self>, VerifyError> {
        // CBE's receipt host uses a self-signed certificate.
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
impl BankVerifier for CbeClient {
    async fn verify(&self, reference: &str, suffix: &str) -> Result<ReceiptFacts, VerifyError> {
        let url = format!("{}?id={}{}", self.base_url, reference, suffix);
        tracing::info!(%url, "fetching CBE receipt");

        let response = fetch_with_policy(self.policy, || {
            self.http_client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
                .header("Accept", "application/pdf")
        })
        .await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.bytes().await?;
        if !content_type.contains("pdf") && body.len() < 100 {
            return Err(VerifyError::Extraction("Response is not a PDF".to_string()));
        }
        tracing::debug!(bytes = body.len(), digest = %sha256_hex(&body), "CBE receipt PDF fetched");

        let pdf_text = pdf_extract::extract_text_from_mem(&body)
            .map_err(|_| VerifyError::Extraction("Error parsing PDF data".to_string()))?;
        extract_receipt(&pdf_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const SAMPLE: &str = "Commercial Bank of Ethiopia \
        Payer : ABEBE KEBEDE Account : 1****0011 \
        Receiver : HMMK TRADING Account : 1****5017 \
        Reason / Type of service : Transfer to merchant Transferred Amount : 100.00 ETB \
        Reference No. (VAT Invoice No) : FT1234 \
        Payment Date & Time : 6/26/2023, 2:30:00 PM";

    #[test]
    fn extracts_full_receipt() {
        let facts = extract_receipt(SAMPLE).unwrap();
        assert_eq!(facts.payer_name.as_deref(), Some("Abebe Kebede"));
        assert_eq!(facts.payer_account.as_deref(), Some("1****0011"));
        assert_eq!(facts.receiver_name.as_deref(), Some("Hmmk Trading"));
        assert_eq!(facts.receiver_account.as_deref(), Some("1****5017"));
        assert_eq!(facts.amount, Some(Decimal::new(10000, 2)));
        assert_eq!(facts.reference.as_deref(), Some("FT1234"));
        assert_eq!(facts.narrative.as_deref(), Some("Transfer to merchant"));
        let date = facts.transaction_date.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2023-06-26 14:30");
    }

    #[test]
    fn thousands_separator_in_amount() {
        let text = SAMPLE.replace("100.00 ETB", "1,234.56 ETB");
        let facts = extract_receipt(&text).unwrap();
        assert_eq!(facts.amount, Some(Decimal::new(123456, 2)));
    }

    #[test]
    fn missing_reference_fails_extraction() {
        let text = SAMPLE.replace("Reference No. (VAT Invoice No) : FT1234 ", "");
        let err = extract_receipt(&text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not extract all required fields from PDF."
        );
    }

    #[test]
    fn non_receipt_document_fails_extraction() {
        assert!(extract_receipt("statement of account, nothing here").is_err());
    }

    #[test]
    fn trust_all_client_builds() {
        let client = CbeClient::new(
            "https://apps.cbe.com.et:100/".to_string(),
            RetryPolicy::single(std::time::Duration::from_secs(5)),
        );
        assert!(client.is_ok());
    }
}
