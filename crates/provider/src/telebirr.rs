//! Telebirr receipt verification.
//!
//! Telebirr publishes receipts as an HTML table on the Ethio Telecom
//! transaction-info page. A community proxy serves the same receipt and is
//! used as an ordered fallback when the primary page yields nothing usable.

use crate::fetch::{fetch_with_policy, RetryPolicy};
use crate::{BankVerifier, VerifyError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use verifier_core::models::ReceiptFacts;
use verifier_core::text::{capture, normalize_whitespace, parse_amount, parse_date_any};

const LABEL_PAYER_NAME: &str = "የከፋይ ስም/Payer Name";
const LABEL_PAYER_ACCOUNT: &str = "የከፋይ ቴሌብር ቁ./Payer telebirr no.";
const LABEL_CREDITED_NAME: &str = "የገንዘብ ተቀባይ ስም/Credited Party name";
const LABEL_CREDITED_ACCOUNT: &str = "የገንዘብ ተቀባይ ቴሌብር ቁ./Credited party account no";
const LABEL_BANK_ACCOUNT: &str = "የባንክ አካውንት ቁጥር/Bank account number";

static RECEIPT_NO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<td[^>]*class="[^"]*receipttableTd[^"]*receipttableTd2[^"]*"[^>]*>\s*([A-Z0-9]+)\s*</td>"#)
        .unwrap()
});
static PAYMENT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}-\d{2}-\d{4}\s+\d{2}:\d{2}:\d{2})").unwrap());
static SETTLED_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)የተከፈለው\s+መጠን/Settled\s+Amount.*?</td>\s*<td[^>]*>\s*(\d+(?:\.\d{2})?\s+Birr)")
        .unwrap()
});
static SETTLED_AMOUNT_LOOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Settled\s+Amount.*?(\d+(?:\.\d{2})?\s+Birr)").unwrap());
static BANK_ACCOUNT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s+(.*)$").unwrap());

const DATE_FORMATS: [&str; 1] = ["%d-%m-%Y %H:%M:%S"];

/// The value cell following a bilingual label cell in the receipt table.
fn cell_after(text: &str, label: &str) -> Option<String> {
    let pattern = format!(
        r"(?i){}.*?</td>\s*<td[^>]*>\s*([^<]+)",
        regex::escape(label)
    );
    let rx = Regex::new(&pattern).ok()?;
    capture(text, &rx)
}

/// Extract canonical facts from a Telebirr receipt page.
///
/// Tolerates missing optional fields; the caller decides whether the
/// minimal field set (receipt number and settled amount) is present.
pub fn extract_receipt(html: &str) -> ReceiptFacts {
    let text = normalize_whitespace(html);

    let mut receiver_name = cell_after(&text, LABEL_CREDITED_NAME);
    let mut receiver_account = cell_after(&text, LABEL_CREDITED_ACCOUNT);

    // When the money landed in a bank account rather than a wallet, the
    // receipt carries one combined "<number> <holder name>" cell; the
    // credited-party cell then names the bank, not the receiver.
    if let Some(combined) = cell_after(&text, LABEL_BANK_ACCOUNT) {
        if let Some(parts) = BANK_ACCOUNT_SPLIT.captures(combined.trim()) {
            receiver_account = Some(parts[1].trim().to_string());
            receiver_name = Some(parts[2].trim().to_string());
        }
    }

    let amount = capture(&text, &SETTLED_AMOUNT)
        .or_else(|| capture(&text, &SETTLED_AMOUNT_LOOSE))
        .and_then(|raw| parse_amount(&raw));

    ReceiptFacts {
        payer_name: cell_after(&text, LABEL_PAYER_NAME),
        payer_account: cell_after(&text, LABEL_PAYER_ACCOUNT),
        receiver_name,
        receiver_account,
        amount,
        transaction_date: capture(&text, &PAYMENT_DATE)
            .and_then(|raw| parse_date_any(&raw, &DATE_FORMATS)),
        reference: capture(&text, &RECEIPT_NO),
        narrative: None,
    }
}

fn has_minimum_fields(facts: &ReceiptFacts) -> bool {
    facts.reference.is_some() && facts.amount.is_some()
}

#[derive(Clone)]
pub struct TelebirrClient {
    pub primary_url: String,
    pub fallback_url: String,
    pub skip_primary: bool,
    policy: RetryPolicy,
    http_client: reqwest::Client,
}

impl TelebirrClient {
    pub fn new(
        primary_url: String,
        fallback_url: String,
        skip_primary: bool,
        policy: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            primary_url,
            fallback_url,
            skip_primary,
            policy,
            http_client: reqwest::Client::new(),
        })
    }

    async fn fetch_primary(&self, reference: &str) -> Result<ReceiptFacts, VerifyError> {
        let url = format!("{}{}", self.primary_url, reference);
        tracing::info!(%url, "fetching Telebirr receipt from primary source");
        let response =
            fetch_with_policy(self.policy, || self.http_client.get(&url)).await?;
        let html = response.text().await?;
        Ok(extract_receipt(&html))
    }

    async fn fetch_fallback(&self, reference: &str) -> Result<ReceiptFacts, VerifyError> {
        let url = format!("{}{}", self.fallback_url, reference);
        tracing::info!(%url, "fetching Telebirr receipt from fallback proxy");
        let response = fetch_with_policy(self.policy, || {
            self.http_client
                .get(&url)
                .header("Accept", "application/json")
                .header("User-Agent", "VerifierAPI/1.0")
        })
        .await?;
        let html = response.text().await?;
        Ok(extract_receipt(&html))
    }
}

#[async_trait]
impl BankVerifier for TelebirrClient {
    async fn verify(&self, reference: &str, _suffix: &str) -> Result<ReceiptFacts, VerifyError> {
        if !self.skip_primary {
            match self.fetch_primary(reference).await {
                Ok(facts) if has_minimum_fields(&facts) => return Ok(facts),
                Ok(_) => {
                    tracing::warn!(%reference, "primary Telebirr receipt incomplete, trying fallback proxy");
                }
                Err(err) => {
                    tracing::warn!(%reference, error = %err, "primary Telebirr fetch failed, trying fallback proxy");
                }
            }
        } else {
            tracing::info!("skipping primary Telebirr source per configuration");
        }

        match self.fetch_fallback(reference).await {
            Ok(facts) if has_minimum_fields(&facts) => {
                tracing::info!(%reference, "verified Telebirr receipt via fallback proxy");
                Ok(facts)
            }
            Ok(_) => Err(VerifyError::ReceiptNotFound),
            Err(err) => {
                tracing::error!(%reference, error = %err, "both Telebirr sources failed");
                Err(VerifyError::ReceiptNotFound)
            }
        }
    }
}
