use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub bank_type: String,
    pub reference: String,
    pub state: String,
    pub error: Option<String>,
    pub sender_id: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str, bank_type: &str, reference: &str, state: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            bank_type: bank_type.to_string(),
            reference: reference.to_string(),
            state: state.to_string(),
            error: None,
            sender_id: None,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_sender(mut self, sender_id: String) -> Self {
        self.sender_id = Some(sender_id);
        self
    }
}

fn audit_log_path() -> PathBuf {
    std::env::var("VERIFIER_AUDIT_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("verifier_audit.jsonl"))
}

pub fn write_audit_event(event: &AuditEvent) -> Result<()> {
    let path = audit_log_path();
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

    let json = serde_json::to_string(event)?;
    writeln!(file, "{}", json)?;
    tracing::debug!(event_type=%event.event_type, reference=%event.reference, "Audit event written");
    Ok(())
}
