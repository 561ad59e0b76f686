use async_trait::async_trait;
use verifier_core::models::ReceiptFacts;

/// One receipt-verification client per bank, polymorphic over a single
/// capability: fetch the receipt for a reference and extract canonical facts.
#[async_trait]
pub trait BankVerifier: Send + Sync {
    /// Fetch and extract the receipt identified by `reference`.
    ///
    /// `suffix` disambiguates masked account numbers where the bank requires
    /// a secondary identifier (CBE and Abyssinia); other banks ignore it.
    async fn verify(&self, reference: &str, suffix: &str) -> Result<ReceiptFacts, VerifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Error fetching receipt: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error fetching receipt after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },

    #[error("{0}")]
    Extraction(String),

    #[error("API status: {0}")]
    ProviderStatus(String),

    #[error("Telebirr receipt not found")]
    ReceiptNotFound,
}

pub mod abyssinia;
pub mod cbe;
pub mod dashen;
pub mod fetch;
pub mod mock;
pub mod telebirr;
