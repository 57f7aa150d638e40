//! Handle canonicalization.
//!
//! Phone numbers and email addresses show up in many spellings across the SMS
//! and iMessage tables (`+1 (415) 555-1234`, `4155551234`, `tel:+14155551234`,
//! `Jane@iCloud.com`). Everything that compares or hashes handles goes through
//! [`canonical_handle`].
//!
//! CHANGELOG:
//! - 10/16/2026 - Moved normalize_phone out of the contacts manager, added email handling

use regex::Regex;
use std::sync::OnceLock;

/// Scheme prefixes stripped before classification.
const HANDLE_PREFIXES: [&str; 4] = ["tel:", "mailto:", "e:", "p:"];

/// Shortest digit run treated as a phone number.
const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Phone,
    Email,
    /// Short codes, business ids and anything else.
    Other,
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
    PHONE
        .get_or_init(|| Regex::new(r"^\+?[\d\s().\-]+$").ok())
        .as_ref()
}

fn matches(re: Option<&Regex>, text: &str) -> bool {
    re.map_or(false, |re| re.is_match(text))
}

fn strip_prefix(handle: &str) -> &str {
    let trimmed = handle.trim();
    for prefix in HANDLE_PREFIXES {
        if let Some(head) = trimmed.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return trimmed[prefix.len()..].trim();
            }
        }
    }
    trimmed
}

/// Normalize phone number for comparison (digits only).
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Decide what kind of endpoint a handle is.
pub fn classify_handle(handle: &str) -> HandleKind {
    let bare = strip_prefix(handle);
    if matches(email_regex(), bare) {
        HandleKind::Email
    } else if matches(phone_regex(), bare) && normalize_phone(bare).len() >= MIN_PHONE_DIGITS {
        HandleKind::Phone
    } else {
        HandleKind::Other
    }
}

/// Canonical form of a handle.
///
/// - phones: `+<digits>`, with a leading `1` added to 10-digit numbers
/// - emails: lower-cased
/// - anything else: trimmed, prefix stripped, otherwise untouched
pub fn canonical_handle(handle: &str) -> String {
    let bare = strip_prefix(handle);
    match classify_handle(bare) {
        HandleKind::Phone => {
            let digits = normalize_phone(bare);
            if digits.len() == 10 && !bare.starts_with('+') {
                format!("+1{}", digits)
            } else {
                format!("+{}", digits)
            }
        }
        HandleKind::Email => bare.to_lowercase(),
        HandleKind::Other => bare.to_string(),
    }
}
