//! Verification pipeline: dedup check, receipt extraction, receiver
//! validation, signed callback, and exactly-once persistence.

mod audit;
pub mod notifier;
pub mod store;

use audit::{write_audit_event, AuditEvent};
use chrono::Utc;
use notifier::{CallbackPayload, CallbackSink};
use provider::BankVerifier;
use std::collections::HashMap;
use std::sync::Arc;
use store::Store;
use verifier_core::models::{
    BankType, FailedVerification, ReceiptFacts, VerifiedPayment, VerifyOutcome, VerifyRequest,
};
use verifier_core::validation::validate_receiver;

pub struct VerificationPipeline {
    store: Store,
    providers: HashMap<BankType, Arc<dyn BankVerifier>>,
    notifier: Arc<dyn CallbackSink>,
}

impl VerificationPipeline {
    pub fn new(store: Store, notifier: Arc<dyn CallbackSink>) -> Self {
        Self {
            store,
            providers: HashMap::new(),
            notifier,
        }
    }

    pub fn register_provider(&mut self, bank: BankType, client: Arc<dyn BankVerifier>) {
        self.providers.insert(bank, client);
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one verification attempt end to end.
    ///
    /// Always returns a terminal outcome; no failure escapes as a fault.
    pub async fn process(&self, request: &VerifyRequest) -> VerifyOutcome {
        match self.run(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(reference = %request.reference, error = %err, "verification aborted");
                VerifyOutcome::failure("Internal verification error")
            }
        }
    }

    async fn run(&self, request: &VerifyRequest) -> anyhow::Result<VerifyOutcome> {
        tracing::info!(
            bank = %request.bank_type,
            reference = %request.reference,
            "processing verification"
        );

        let bank: BankType = match request.bank_type.parse() {
            Ok(bank) => bank,
            Err(err) => return Ok(VerifyOutcome::failure(err.to_string())),
        };

        // Dedup before any extraction work.
        if self.store.payment_exists(bank, &request.reference)? {
            tracing::warn!(reference = %request.reference, %bank, "reference already verified");
            return Ok(VerifyOutcome::failure("Reference already processed"));
        }

        let Some(client) = self.providers.get(&bank) else {
            return Ok(VerifyOutcome::failure(format!(
                "Unsupported bank type: {bank}"
            )));
        };

        let suffix = request.suffix.as_deref().unwrap_or("");
        let facts = match client.verify(&request.reference, suffix).await {
            Ok(facts) => facts,
            Err(err) => {
                let reason = err.to_string();
                self.record_rejection(request, bank, "extraction_failed", &reason)?;
                return Ok(VerifyOutcome::failure(reason));
            }
        };

        let allowed = self.store.accounts_for(bank)?;
        if let Err(reason) = validate_receiver(bank, &facts, &allowed) {
            tracing::warn!(reference = %request.reference, %reason, "receiver validation failed");
            self.record_rejection(request, bank, "receiver_mismatch", &reason)?;
            return Ok(VerifyOutcome::failure(reason));
        }

        let payload = CallbackPayload {
            sender_id: request.sender_id.clone(),
            reference: request.reference.clone(),
            bank_type: bank.to_string(),
            amount: facts.amount.unwrap_or_default(),
            merchant_reference_id: request
                .merchant_reference_id
                .clone()
                .unwrap_or_default(),
        };
        if let Err(err) = self.notifier.notify(&payload).await {
            // The reference stays unrecorded so the whole request can be
            // retried once the downstream system recovers.
            tracing::error!(reference = %request.reference, error = %err, "callback failed");
            let _ = write_audit_event(
                &AuditEvent::new("callback_failed", bank.as_str(), &request.reference, "failed")
                    .with_error(err.to_string()),
            );
            return Ok(VerifyOutcome::failure("Internal callback failed"));
        }

        let payment = build_payment(request, bank, &facts);
        if !self.store.insert_payment_if_absent(&payment)? {
            // Lost the dedup race; the write-time uniqueness check caught it.
            tracing::warn!(reference = %request.reference, %bank, "concurrent verification won the insert");
            return Ok(VerifyOutcome::failure("Reference already processed"));
        }

        let _ = write_audit_event(
            &AuditEvent::new("payment_recorded", bank.as_str(), &request.reference, "verified")
                .with_sender(request.sender_id.clone()),
        );
        Ok(VerifyOutcome::success("Verification successful and recorded"))
    }

    fn record_rejection(
        &self,
        request: &VerifyRequest,
        bank: BankType,
        event_type: &str,
        reason: &str,
    ) -> anyhow::Result<()> {
        self.store.record_failure(&FailedVerification {
            sender_id: request.sender_id.clone(),
            reference: request.reference.clone(),
            bank_type: bank.to_string(),
            reason: reason.to_string(),
            merchant_reference_id: request.merchant_reference_id.clone(),
            failed_at: Utc::now(),
        })?;
        let _ = write_audit_event(
            &AuditEvent::new(event_type, bank.as_str(), &request.reference, "rejected")
                .with_error(reason.to_string())
                .with_sender(request.sender_id.clone()),
        );
        Ok(())
    }
}

fn build_payment(request: &VerifyRequest, bank: BankType, facts: &ReceiptFacts) -> VerifiedPayment {
    VerifiedPayment {
        sender_id: request.sender_id.clone(),
        reference: request.reference.clone(),
        bank_type: bank,
        amount: facts.amount,
        payer_name: facts.payer_name.clone(),
        transaction_date: facts.transaction_date,
        receiver_account: facts.receiver_account.clone(),
        receiver_name: facts.receiver_name.clone(),
        merchant_reference_id: request.merchant_reference_id.clone(),
        verified_at: Utc::now(),
    }
}
