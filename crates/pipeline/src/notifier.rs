//! Outbound callback delivery.
//!
//! A verified payment is reported to the downstream system as a signed JSON
//! POST. Delivery success is a 2xx response; everything else is a delivery
//! failure and is not retried here. The caller leaves the reference
//! unconsumed so the whole request can be retried safely.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use verifier_core::signature::callback_signature;

const SIGNATURE_HEADER: &str = "x-api-signature";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub sender_id: String,
    pub reference: String,
    pub bank_type: String,
    pub amount: Decimal,
    pub merchant_reference_id: String,
}

#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn notify(&self, payload: &CallbackPayload) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpCallbackNotifier {
    pub url: String,
    secret: String,
    http_client: reqwest::Client,
}

impl HttpCallbackNotifier {
    pub fn new(url: String, secret: String) -> Arc<Self> {
        Arc::new(Self {
            url,
            secret,
            http_client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl CallbackSink for HttpCallbackNotifier {
    async fn notify(&self, payload: &CallbackPayload) -> Result<()> {
        let signature = callback_signature(
            &payload.reference,
            &self.secret,
            &payload.sender_id,
            &payload.merchant_reference_id,
        );

        tracing::info!(url = %self.url, reference = %payload.reference, "sending callback");
        let response = self
            .http_client
            .post(&self.url)
            .header(SIGNATURE_HEADER, signature)
            .json(payload)
            .timeout(CALLBACK_TIMEOUT)
            .send()
            .await
            .context("Failed to send callback")?;

        let status = response.status();
        tracing::info!(status = status.as_u16(), "callback response");
        if !status.is_success() {
            bail!("callback returned status {status}");
        }
        Ok(())
    }
}
