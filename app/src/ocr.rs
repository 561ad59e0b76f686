//! Receipt screenshot recognition through a vision chat endpoint.
//!
//! The model is asked for a strict JSON object naming the bank and the
//! transaction reference; everything else (amounts, names) still comes from
//! the bank's own receipt source through the normal pipeline.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const OCR_TIMEOUT: Duration = Duration::from_secs(30);

const PROMPT: &str = "This image is a payment receipt or payment confirmation screenshot from an \
Ethiopian bank or wallet. Identify the issuing provider (one of TELEBIRR, CBE, ABYSSINIA, DASHEN) \
and the transaction reference number. Respond with strict JSON only, no prose: \
{\"bank_type\": \"...\", \"reference\": \"...\"}";

#[derive(Debug, Deserialize)]
pub struct OcrResult {
    pub bank_type: String,
    pub reference: String,
}

pub struct OcrClient {
    endpoint: String,
    model: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl OcrClient {
    pub fn new(api_key: String) -> Self {
        let endpoint =
            std::env::var("VERIFIER_OCR_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model =
            std::env::var("VERIFIER_OCR_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            endpoint,
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    pub async fn recognize(&self, image: &[u8], mime: &str) -> Result<OcrResult> {
        let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(image));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROMPT },
                    { "type": "image_url", "image_url": { "url": data_uri } }
                ]
            }],
            "max_tokens": 100,
        });

        tracing::info!(endpoint = %self.endpoint, model = %self.model, "recognizing receipt screenshot");
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(OCR_TIMEOUT)
            .send()
            .await
            .context("Failed to reach OCR endpoint")?;

        let status = response.status();
        if !status.is_success() {
            bail!("OCR endpoint returned status {status}");
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OCR endpoint response")?;
        let content = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("OCR endpoint returned no choices"))?;

        parse_model_reply(content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Models often wrap the JSON answer in a markdown code fence despite the
/// strict-JSON instruction, so strip one before parsing.
fn parse_model_reply(content: &str) -> Result<OcrResult> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let result: OcrResult = serde_json::from_str(trimmed)
        .with_context(|| format!("OCR reply was not the expected JSON: {trimmed}"))?;
    if result.reference.trim().is_empty() {
        bail!("OCR could not read a transaction reference from the image");
    }
    Ok(result)
}

pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_reply_parses() {
        let result = parse_model_reply(r#"{"bank_type":"CBE","reference":"FT1234"}"#).unwrap();
        assert_eq!(result.bank_type, "CBE");
        assert_eq!(result.reference, "FT1234");
    }

    #[test]
    fn fenced_reply_parses() {
        let fenced = "```json\n{\"bank_type\": \"TELEBIRR\", \"reference\": \"CEP5HC2Y0N\"}\n```";
        let result = parse_model_reply(fenced).unwrap();
        assert_eq!(result.bank_type, "TELEBIRR");
        assert_eq!(result.reference, "CEP5HC2Y0N");
    }

    #[test]
    fn empty_reference_is_an_error() {
        assert!(parse_model_reply(r#"{"bank_type":"CBE","reference":""}"#).is_err());
    }

    #[test]
    fn mime_falls_back_to_jpeg() {
        assert_eq!(mime_for_path(Path::new("shot.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("shot.jpg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("shot")), "image/jpeg");
    }
}
