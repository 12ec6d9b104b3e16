//! PII masking for text that leaves the process.
//!
//! Epic descriptions and attachments regularly contain customer data pasted in by
//! reporters. Before any of it reaches an LLM provider the sanitizer replaces:
//! - e-mail addresses with `[EMAIL]`
//! - bearer / API tokens with `Bearer [TOKEN]`
//! - card numbers (13-19 digits passing the Luhn check) with `[CARD]`
//! - phone numbers with `[PHONE]`

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("valid email regex")
});

static BEARER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").expect("valid bearer regex")
});

static CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").expect("valid card regex"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{9,14}\b)|(?:\+?\d{1,3}[ .-]?)?\(?\d{2,4}\)?[ .-]\d{3,4}[ .-]\d{3,5}\b")
        .expect("valid phone regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedactionReport {
    pub emails: usize,
    pub tokens: usize,
    pub cards: usize,
    pub phones: usize,
}

impl RedactionReport {
    pub fn total(&self) -> usize {
        self.emails + self.tokens + self.cards + self.phones
    }
}

#[derive(Debug, Clone, Default)]
pub struct PiiSanitizer;

impl PiiSanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn sanitize(&self, text: &str) -> String {
        self.sanitize_with_report(text).0
    }

    pub fn sanitize_with_report(&self, text: &str) -> (String, RedactionReport) {
        let mut report = RedactionReport::default();

        let masked = BEARER_RE.replace_all(text, |_: &Captures| {
            report.tokens += 1;
            "Bearer [TOKEN]"
        });
        let masked = EMAIL_RE.replace_all(&masked, |_: &Captures| {
            report.emails += 1;
            "[EMAIL]"
        });
        let masked = CARD_RE.replace_all(&masked, |caps: &Captures| {
            let candidate = &caps[0];
            if passes_luhn(candidate) {
                report.cards += 1;
                "[CARD]".to_string()
            } else {
                candidate.to_string()
            }
        });
        let masked = PHONE_RE
            .replace_all(&masked, |_: &Captures| {
                report.phones += 1;
                "[PHONE]"
            })
            .into_owned();

        if report.total() > 0 {
            debug!(
                emails = report.emails,
                tokens = report.tokens,
                cards = report.cards,
                phones = report.phones,
                "Masked PII before LLM call"
            );
        }
        (masked, report)
    }
}

fn passes_luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_emails_and_tokens() {
        let sanitizer = PiiSanitizer::new();
        let (text, report) = sanitizer.sanitize_with_report(
            "Contact jane.doe@example.com, header Authorization: Bearer abc.DEF-123",
        );
        assert_eq!(
            text,
            "Contact [EMAIL], header Authorization: Bearer [TOKEN]"
        );
        assert_eq!(report.emails, 1);
        assert_eq!(report.tokens, 1);
    }

    #[test]
    fn masks_luhn_valid_cards_only() {
        let sanitizer = PiiSanitizer::new();
        assert_eq!(
            sanitizer.sanitize("Pay with 4111 1111 1111 1111 today"),
            "Pay with [CARD] today"
        );
        assert_eq!(
            sanitizer.sanitize("Order 1234567890123 shipped"),
            "Order 1234567890123 shipped"
        );
    }

    #[test]
    fn masks_phone_numbers() {
        let sanitizer = PiiSanitizer::new();
        assert_eq!(
            sanitizer.sanitize("Call +62 812-3456-7890 or (555) 123-4567"),
            "Call [PHONE] or [PHONE]"
        );
    }

    #[test]
    fn leaves_ordinary_requirements_alone() {
        let sanitizer = PiiSanitizer::new();
        let text = "Account locks after 5 failed attempts within 15 minutes (QA-12).";
        let (masked, report) = sanitizer.sanitize_with_report(text);
        assert_eq!(masked, text);
        assert_eq!(report.total(), 0);
    }
}
