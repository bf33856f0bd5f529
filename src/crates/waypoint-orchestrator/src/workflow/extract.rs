//! Transfer entity extraction
//!
//! Regex rules that pull an amount and a recipient out of free text.
//! Recipient resolution prefers an explicit account number, then a
//! possessive ("kiran's account"), then a plain "to <name>".

use regex::Regex;
use std::sync::OnceLock;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:send|transfer|pay)?\s*\$?(\d+(?:[.,]\d{1,2})?)").unwrap())
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)account\s*(\d+)").unwrap())
}

fn possessive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\w+)'s\s+account").unwrap())
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)to\s+(\w+)").unwrap())
}

/// Extracted transfer slots; either may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferDetails {
    pub amount: Option<f64>,
    pub recipient: Option<String>,
}

/// Pull transfer details out of a message.
pub fn transfer_details(message: &str) -> TransferDetails {
    TransferDetails {
        amount: parse_amount(message),
        recipient: parse_recipient(message),
    }
}

/// Parse a message as just an amount ("1000", "$1,000.50").
///
/// Used for slot-completion turns where the previous turn already named
/// the recipient.
pub fn parse_amount(message: &str) -> Option<f64> {
    amount_re()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
}

fn parse_recipient(message: &str) -> Option<String> {
    if let Some(caps) = account_re().captures(message) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if let Some(caps) = possessive_re().captures(message) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    name_re()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        // "to account" without a number is not a recipient
        .filter(|name| !name.eq_ignore_ascii_case("account"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_amount_and_name() {
        let details = transfer_details("Transfer 1000 to kiran");
        assert_eq!(details.amount, Some(1000.0));
        assert_eq!(details.recipient.as_deref(), Some("kiran"));
    }

    #[test]
    fn prefers_account_number_over_name() {
        let details = transfer_details("send 250 to account 456");
        assert_eq!(details.amount, Some(250.0));
        assert_eq!(details.recipient.as_deref(), Some("456"));
    }

    #[test]
    fn handles_possessive_recipient() {
        let details = transfer_details("pay 75 to kiran's account");
        assert_eq!(details.recipient.as_deref(), Some("kiran"));
    }

    #[test]
    fn decimal_and_comma_amounts_parse() {
        assert_eq!(parse_amount("transfer 99.50 to bob"), Some(99.5));
        assert_eq!(parse_amount("transfer 99,50 to bob"), Some(99.5));
    }

    #[test]
    fn missing_slots_stay_none() {
        let details = transfer_details("send money to kiran");
        assert_eq!(details.amount, None);
        assert_eq!(details.recipient.as_deref(), Some("kiran"));

        let details = transfer_details("transfer 500");
        assert_eq!(details.amount, Some(500.0));
        assert_eq!(details.recipient, None);
    }

    #[test]
    fn bare_number_parses_as_amount() {
        assert_eq!(parse_amount("1000"), Some(1000.0));
        assert_eq!(parse_amount("$1000"), Some(1000.0));
        assert_eq!(parse_amount("no digits here"), None);
    }
}
