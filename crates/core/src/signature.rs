use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Integrity signature for the outbound callback, carried in the
/// `x-api-signature` header.
///
/// Base64 of SHA-256 over `reference || secret || sender_id || merchant_ref`.
pub fn callback_signature(
    reference: &str,
    secret: &str,
    sender_id: &str,
    merchant_reference_id: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(sender_id.as_bytes());
    hasher.update(merchant_reference_id.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Hex SHA-256 of raw fetched content, used for debug logging and audit
/// fingerprints.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
