use crate::models::{BankType, ReceiptFacts, ReceiverAccount};

/// Check the extracted receiver fields against the operator's configured
/// accounts for `bank`.
///
/// Returns `Err(reason)` on mismatch. An empty `allowed` slice passes.
pub fn validate_receiver(
    bank: BankType,
    facts: &ReceiptFacts,
    allowed: &[ReceiverAccount],
) -> Result<(), String> {
    if allowed.is_empty() {
        return Ok(());
    }

    let received_account = facts.receiver_account.as_deref().unwrap_or("");
    let received_name = facts.receiver_name.as_deref();

    let matched = allowed.iter().any(|acc| {
        let account_ok = account_matches(bank, &acc.account_number, received_account);
        let name_ok = match received_name {
            Some(name) if !acc.account_name.trim().is_empty() => {
                name.eq_ignore_ascii_case(&acc.account_name)
            }
            _ => false,
        };
        account_ok && name_ok
    });

    if matched {
        Ok(())
    } else {
        Err(format!(
            "Receiver details mismatch against all configured accounts for {bank}"
        ))
    }
}

/// Masked account-number comparison.
///
/// Banks redact the middle of receiver accounts on receipts; only a fixed
/// prefix and suffix stay visible, and the visible lengths differ per bank:
///
/// - Telebirr: first 4 and last 4 (`251923231698` vs `2519****1698`)
/// - CBE:      first 1 and last 4 (`1000352945017` vs `1****5017`)
/// - Abyssinia: first 1 and last 2 (`111448396` vs `1******96`)
/// - Dashen receipts carry no receiver account, so only exact equality
///   can match there.
pub fn account_matches(bank: BankType, stored: &str, received: &str) -> bool {
    let stored = stored.trim();
    let received = received.trim();
    if stored.is_empty() || received.is_empty() {
        return false;
    }
    if stored.eq_ignore_ascii_case(received) {
        return true;
    }

    let (prefix_len, suffix_len, min_len) = match bank {
        BankType::Telebirr => (4, 4, 8),
        BankType::Cbe => (1, 4, 5),
        BankType::Abyssinia => (1, 2, 3),
        BankType::Dashen => return false,
    };
    if stored.len() < min_len {
        return false;
    }
    // The mask compare slices by byte offset; a non-ASCII stored number
    // cannot take part in it.
    if !stored.is_ascii() {
        return false;
    }
    received.starts_with(&stored[..prefix_len]) && received.ends_with(&stored[stored.len() - suffix_len..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(bank: BankType, number: &str, name: &str) -> ReceiverAccount {
        ReceiverAccount {
            bank_type: bank,
            account_number: number.to_string(),
            account_name: name.to_string(),
            last_used_at: None,
        }
    }

    fn facts(account_no: &str, name: &str) -> ReceiptFacts {
        ReceiptFacts {
            receiver_account: Some(account_no.to_string()),
            receiver_name: Some(name.to_string()),
            ..ReceiptFacts::default()
        }
    }

    #[test]
    fn telebirr_masked_prefix_and_suffix() {
        assert!(account_matches(
            BankType::Telebirr,
            "251923231698",
            "2519****1698"
        ));
        assert!(!account_matches(
            BankType::Telebirr,
            "251923231698",
            "2519****1697"
        ));
    }

    #[test]
    fn cbe_masked_first_one_last_four() {
        assert!(account_matches(BankType::Cbe, "1000352945017", "1****5017"));
        assert!(!account_matches(BankType::Cbe, "1000352945017", "2****5017"));
    }

    #[test]
    fn abyssinia_masked_first_one_last_two() {
        assert!(account_matches(BankType::Abyssinia, "111448396", "1******96"));
        assert!(!account_matches(BankType::Abyssinia, "111448396", "1******95"));
    }

    #[test]
    fn dashen_only_exact_match() {
        assert!(account_matches(BankType::Dashen, "5017", "5017"));
        assert!(!account_matches(BankType::Dashen, "5017444", "5****444"));
    }

    #[test]
    fn exact_match_ignores_case_for_any_bank() {
        assert!(account_matches(BankType::Cbe, "ab123", "AB123"));
    }

    #[test]
    fn non_ascii_stored_number_never_mask_matches() {
        // Ethiopic digits; byte offsets here fall inside characters.
        assert!(!account_matches(
            BankType::Telebirr,
            "፩፪፫፬፭፮፯፰",
            "፩***፰"
        ));
        assert!(account_matches(BankType::Cbe, "፩፪፫", "፩፪፫"));
    }

    #[test]
    fn blank_sides_never_match() {
        assert!(!account_matches(BankType::Telebirr, "", "2519****1698"));
        assert!(!account_matches(BankType::Telebirr, "251923231698", "  "));
    }

    #[test]
    fn empty_account_table_is_default_allow() {
        let result = validate_receiver(BankType::Cbe, &facts("whatever", "whoever"), &[]);
        assert!(result.is_ok());
    }

    #[test]
    fn name_comparison_is_case_insensitive() {
        let allowed = [account(BankType::Cbe, "1000352945017", "Hmmk Trading")];
        assert!(validate_receiver(BankType::Cbe, &facts("1****5017", "HMMK TRADING"), &allowed).is_ok());
    }

    #[test]
    fn account_match_alone_is_not_enough() {
        let allowed = [account(BankType::Cbe, "1000352945017", "Hmmk Trading")];
        let err =
            validate_receiver(BankType::Cbe, &facts("1****5017", "Someone Else"), &allowed)
                .unwrap_err();
        assert_eq!(
            err,
            "Receiver details mismatch against all configured accounts for CBE"
        );
    }

    #[test]
    fn any_configured_account_may_match() {
        let allowed = [
            account(BankType::Telebirr, "251900000001", "First Wallet"),
            account(BankType::Telebirr, "251923231698", "Second Wallet"),
        ];
        assert!(validate_receiver(
            BankType::Telebirr,
            &facts("2519****1698", "second wallet"),
            &allowed
        )
        .is_ok());
    }

    #[test]
    fn missing_receiver_fields_mismatch_when_accounts_configured() {
        let allowed = [account(BankType::Cbe, "1000352945017", "Hmmk Trading")];
        let result = validate_receiver(BankType::Cbe, &ReceiptFacts::default(), &allowed);
        assert!(result.is_err());
    }
}
