//! Sled-backed persistence for verified payments, receiver accounts, and the
//! failed-verification audit trail.
//!
//! Values are stored as JSON. The (bank, reference) uniqueness contract is
//! enforced at write time with `compare_and_swap`, so a race past the upfront
//! dedup check still cannot produce two rows.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sled::Db;
use verifier_core::models::{BankType, FailedVerification, ReceiverAccount, VerifiedPayment};

const ROTATION_CAS_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct Store {
    db: Db,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// In-memory store for tests.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    fn payments_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("verified_payments")?)
    }

    fn accounts_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("receiver_accounts")?)
    }

    fn failures_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("failed_verifications")?)
    }

    fn payment_key(bank: BankType, reference: &str) -> String {
        format!("{}:{}", bank, reference)
    }

    fn account_key(bank: BankType, account_number: &str) -> String {
        format!("{}:{}", bank, account_number)
    }

    pub fn payment_exists(&self, bank: BankType, reference: &str) -> Result<bool> {
        let key = Self::payment_key(bank, reference);
        Ok(self.payments_tree()?.contains_key(key.as_bytes())?)
    }

    /// Insert the payment unless a row for (bank, reference) already exists.
    ///
    /// Returns `false` when the key was taken, which a caller must treat the
    /// same as the upfront dedup failure.
    pub fn insert_payment_if_absent(&self, payment: &VerifiedPayment) -> Result<bool> {
        let key = Self::payment_key(payment.bank_type, &payment.reference);
        let value = serde_json::to_vec(payment)?;
        let outcome = self.payments_tree()?.compare_and_swap(
            key.as_bytes(),
            None as Option<&[u8]>,
            Some(value),
        )?;
        Ok(outcome.is_ok())
    }

    pub fn list_payments(&self) -> Result<Vec<VerifiedPayment>> {
        let mut out = Vec::new();
        for item in self.payments_tree()?.iter() {
            let (_k, v) = item?;
            out.push(serde_json::from_slice::<VerifiedPayment>(&v)?);
        }
        out.sort_by_key(|p| p.verified_at);
        out.reverse();
        Ok(out)
    }

    pub fn upsert_account(&self, account: &ReceiverAccount) -> Result<()> {
        let key = Self::account_key(account.bank_type, &account.account_number);
        self.accounts_tree()?
            .insert(key.as_bytes(), serde_json::to_vec(account)?)?;
        Ok(())
    }

    pub fn accounts_for(&self, bank: BankType) -> Result<Vec<ReceiverAccount>> {
        let prefix = format!("{}:", bank);
        let mut out = Vec::new();
        for item in self.accounts_tree()?.scan_prefix(prefix.as_bytes()) {
            let (_k, v) = item?;
            out.push(serde_json::from_slice::<ReceiverAccount>(&v)?);
        }
        Ok(out)
    }

    /// Hand out the least-recently-used account for `bank` and stamp it.
    ///
    /// Selection and stamp are committed together with a conditional swap;
    /// losing the swap to a concurrent caller re-runs the selection so two
    /// callers cannot be handed the same stale row.
    pub fn next_account(&self, bank: BankType) -> Result<Option<ReceiverAccount>> {
        let tree = self.accounts_tree()?;
        let prefix = format!("{}:", bank);

        for _ in 0..ROTATION_CAS_ATTEMPTS {
            let mut oldest: Option<(sled::IVec, sled::IVec, ReceiverAccount)> = None;
            for item in tree.scan_prefix(prefix.as_bytes()) {
                let (k, v) = item?;
                let account: ReceiverAccount = serde_json::from_slice(&v)?;
                let is_older = match &oldest {
                    None => true,
                    Some((_, _, current)) => {
                        stamp_of(&account) < stamp_of(current)
                    }
                };
                if is_older {
                    oldest = Some((k, v, account));
                }
            }

            let Some((key, old_value, mut account)) = oldest else {
                return Ok(None);
            };

            account.last_used_at = Some(Utc::now());
            let new_value = serde_json::to_vec(&account)?;
            let swapped =
                tree.compare_and_swap(&key, Some(&old_value), Some(new_value))?;
            if swapped.is_ok() {
                return Ok(Some(account));
            }
            // Lost the stamp race; pick again.
        }

        Err(anyhow!("account rotation contended for {bank}"))
    }

    pub fn record_failure(&self, failure: &FailedVerification) -> Result<()> {
        use rand::{distributions::Alphanumeric, Rng};
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        // Keys sort chronologically so listing can walk backwards.
        let key = format!("{}-{}", failure.failed_at.format("%Y%m%dT%H%M%S%.9f"), nonce);
        self.failures_tree()?
            .insert(key.as_bytes(), serde_json::to_vec(failure)?)?;
        Ok(())
    }

    pub fn list_failures(&self) -> Result<Vec<FailedVerification>> {
        let mut out = Vec::new();
        for item in self.failures_tree()?.iter().rev() {
            let (_k, v) = item?;
            out.push(serde_json::from_slice::<FailedVerification>(&v)?);
        }
        Ok(out)
    }
}

fn stamp_of(account: &ReceiverAccount) -> DateTime<Utc> {
    account.last_used_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
}
