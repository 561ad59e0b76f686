use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "et-receipt-verifier";
const KEYCHAIN_SERVICE: &str = "et.receipt-verifier.credentials";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub telebirr: TelebirrConfig,
    #[serde(default)]
    pub cbe: CbeConfig,
    #[serde(default)]
    pub abyssinia: AbyssiniaConfig,
    #[serde(default)]
    pub dashen: DashenConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            callback: CallbackConfig::default(),
            telebirr: TelebirrConfig::default(),
            cbe: CbeConfig::default(),
            abyssinia: AbyssiniaConfig::default(),
            dashen: DashenConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallbackConfig {
    /// Downstream endpoint that receives verified-payment callbacks.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelebirrConfig {
    #[serde(default = "default_telebirr_primary")]
    pub primary_url: String,
    #[serde(default = "default_telebirr_fallback")]
    pub fallback_url: String,
    /// Go straight to the fallback proxy when the primary host is blocked.
    #[serde(default)]
    pub skip_primary: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TelebirrConfig {
    fn default() -> Self {
        Self {
            primary_url: default_telebirr_primary(),
            fallback_url: default_telebirr_fallback(),
            skip_primary: false,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CbeConfig {
    #[serde(default = "default_cbe_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CbeConfig {
    fn default() -> Self {
        Self {
            url: default_cbe_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbyssiniaConfig {
    #[serde(default = "default_abyssinia_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_abyssinia_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_abyssinia_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for AbyssiniaConfig {
    fn default() -> Self {
        Self {
            url: default_abyssinia_url(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_abyssinia_attempts(),
            retry_delay_ms: default_abyssinia_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashenConfig {
    #[serde(default = "default_dashen_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DashenConfig {
    fn default() -> Self {
        Self {
            url: default_dashen_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_data_dir() -> String {
    "verifier_data".to_string()
}

fn default_telebirr_primary() -> String {
    "https://transactioninfo.ethiotelecom.et/receipt/".to_string()
}

fn default_telebirr_fallback() -> String {
    "https://leul.et/verify.php?reference=".to_string()
}

fn default_cbe_url() -> String {
    "https://apps.cbe.com.et:100/".to_string()
}

fn default_abyssinia_url() -> String {
    "https://cs.bankofabyssinia.com/api/onlineSlip/getDetails/?id=".to_string()
}

fn default_dashen_url() -> String {
    "https://receipt.dashensuperapp.com/receipt/".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_abyssinia_attempts() -> usize {
    3
}

fn default_abyssinia_retry_delay_ms() -> u64 {
    1_000
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_bank_endpoints() {
        let cfg = AppConfig::default();
        assert!(cfg.telebirr.primary_url.starts_with("https://"));
        assert!(cfg.cbe.url.contains("cbe.com.et"));
        assert_eq!(cfg.abyssinia.max_attempts, 3);
        assert!(cfg.callback.url.is_none());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"callback":{"url":"https://example.com/cb"}}"#).unwrap();
        assert_eq!(cfg.callback.url.as_deref(), Some("https://example.com/cb"));
        assert_eq!(cfg.dashen.url, default_dashen_url());
        assert_eq!(cfg.telebirr.timeout_ms, 30_000);
    }
}
