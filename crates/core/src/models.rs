use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Banks whose receipts this service can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankType {
    Telebirr,
    Cbe,
    Abyssinia,
    Dashen,
}

impl BankType {
    pub const ALL: [BankType; 4] = [
        BankType::Telebirr,
        BankType::Cbe,
        BankType::Abyssinia,
        BankType::Dashen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BankType::Telebirr => "TELEBIRR",
            BankType::Cbe => "CBE",
            BankType::Abyssinia => "ABYSSINIA",
            BankType::Dashen => "DASHEN",
        }
    }
}

impl fmt::Display for BankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unsupported bank type: {0}")]
pub struct UnsupportedBank(pub String);

impl FromStr for BankType {
    type Err = UnsupportedBank;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TELEBIRR" => Ok(BankType::Telebirr),
            "CBE" => Ok(BankType::Cbe),
            // "ABISSINIA" shows up in caller payloads often enough to accept
            "ABYSSINIA" | "ABISSINIA" => Ok(BankType::Abyssinia),
            "DASHEN" => Ok(BankType::Dashen),
            other => Err(UnsupportedBank(other.to_string())),
        }
    }
}

/// Inbound verification request. The bank tag stays a raw string until
/// dispatch so an unknown tag can be echoed back in the failure message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub bank_type: String,
    pub reference: String,
    #[serde(default)]
    pub suffix: Option<String>,
    pub sender_id: String,
    #[serde(default)]
    pub merchant_reference_id: Option<String>,
}

/// Terminal outcome of one verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub message: String,
}

impl VerifyOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Canonical, bank-agnostic facts extracted from one receipt.
///
/// Any field a bank's receipt does not carry stays `None`; each provider
/// client enforces its own minimal field set before returning these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptFacts {
    pub payer_name: Option<String>,
    pub payer_account: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_account: Option<String>,
    pub amount: Option<Decimal>,
    pub transaction_date: Option<NaiveDateTime>,
    pub reference: Option<String>,
    pub narrative: Option<String>,
}

/// A receiving account the operator controls, administered externally and
/// stamped by the rotation selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverAccount {
    pub bank_type: BankType,
    pub account_number: String,
    pub account_name: String,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Persisted outcome of a successful verification. At most one row exists
/// per (bank_type, reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub sender_id: String,
    pub reference: String,
    pub bank_type: BankType,
    pub amount: Option<Decimal>,
    pub payer_name: Option<String>,
    pub transaction_date: Option<NaiveDateTime>,
    pub receiver_account: Option<String>,
    pub receiver_name: Option<String>,
    pub merchant_reference_id: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// Audit row for a verification attempt that was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedVerification {
    pub sender_id: String,
    pub reference: String,
    pub bank_type: String,
    pub reason: String,
    pub merchant_reference_id: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_type_parses_case_insensitively() {
        assert_eq!("telebirr".parse::<BankType>().unwrap(), BankType::Telebirr);
        assert_eq!("Cbe".parse::<BankType>().unwrap(), BankType::Cbe);
        assert_eq!("DASHEN".parse::<BankType>().unwrap(), BankType::Dashen);
    }

    #[test]
    fn abyssinia_accepts_legacy_spelling() {
        assert_eq!(
            "abissinia".parse::<BankType>().unwrap(),
            BankType::Abyssinia
        );
    }

    #[test]
    fn unknown_bank_tag_is_echoed_uppercased() {
        let err = "zemen".parse::<BankType>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported bank type: ZEMEN");
    }
}
