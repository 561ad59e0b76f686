//! Receiver-account validation.
//!
//! Policy: multi-account masked matching. Every configured account for the
//! bank is tried; a row matches when the masked account-number rule for that
//! bank holds AND the display names are equal ignoring case. An empty account
//! table for a bank deliberately skips validation (default-allow for
//! operators that have not configured receivers yet).

mod rules;

pub use rules::{account_matches, validate_receiver};
