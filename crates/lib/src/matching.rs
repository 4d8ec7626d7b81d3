//! Recipient identity and the equivalence rule used to dedup conversations.
//!
//! Two recipients are the "same conversation" when their local uids are equal
//! and their remote uids match under a pluggable rule. The default rule is
//! phone-aware: differently formatted numbers for the same line compare equal.

use serde::{Deserialize, Serialize};

/// Number of trailing digits compared when both remote uids are phone numbers.
/// Matches the significant-suffix convention used by mobile call/SMS history.
const PHONE_SUFFIX_DIGITS: usize = 7;

/// A conversation party: the local account address plus the remote target uid
/// (phone number, IM handle, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub local_uid: String,
    pub remote_uid: String,
}

impl Recipient {
    pub fn new(local_uid: impl Into<String>, remote_uid: impl Into<String>) -> Self {
        Self {
            local_uid: local_uid.into(),
            remote_uid: remote_uid.into(),
        }
    }
}

/// Equivalence predicate over recipients. Local uids always compare exactly;
/// implementations decide how remote uids match.
pub trait RecipientMatcher: Send + Sync {
    fn matches(&self, a: &Recipient, b: &Recipient) -> bool;
}

/// Which matcher a manager uses. Config-selectable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingMode {
    /// Phone-aware suffix matching (default).
    #[default]
    Phone,
    /// Exact string equality on remote uids.
    Exact,
}

/// Remote uids match only when byte-for-byte equal.
#[derive(Debug, Default)]
pub struct ExactMatcher;

impl RecipientMatcher for ExactMatcher {
    fn matches(&self, a: &Recipient, b: &Recipient) -> bool {
        a.local_uid == b.local_uid && a.remote_uid == b.remote_uid
    }
}

/// Phone-aware matching: when both remote uids look like phone numbers, the
/// normalized numbers match if their significant suffixes (last 7 digits)
/// are equal. Non-phone uids fall back to exact comparison.
#[derive(Debug, Default)]
pub struct PhoneAwareMatcher;

impl RecipientMatcher for PhoneAwareMatcher {
    fn matches(&self, a: &Recipient, b: &Recipient) -> bool {
        if a.local_uid != b.local_uid {
            return false;
        }
        match (
            normalize_phone(&a.remote_uid),
            normalize_phone(&b.remote_uid),
        ) {
            (Some(pa), Some(pb)) => phone_suffix(&pa) == phone_suffix(&pb),
            _ => a.remote_uid == b.remote_uid,
        }
    }
}

/// Build the matcher for a config mode.
pub fn matcher_for_mode(mode: MatchingMode) -> Box<dyn RecipientMatcher> {
    match mode {
        MatchingMode::Phone => Box::new(PhoneAwareMatcher),
        MatchingMode::Exact => Box::new(ExactMatcher),
    }
}

/// Strip separators from a phone-number-shaped uid and return its digits.
/// Returns None when the uid does not look like a phone number (so callers
/// fall back to exact comparison). A leading `+` is allowed; separators are
/// spaces, dashes, dots, and parentheses.
fn normalize_phone(uid: &str) -> Option<String> {
    let trimmed = uid.trim();
    let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest.is_empty() {
        return None;
    }
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !matches!(c, ' ' | '-' | '.' | '(' | ')') {
            return None;
        }
    }
    if digits.len() < 4 {
        // Too short to be a dialable number; treat as an opaque uid.
        return None;
    }
    Some(digits)
}

fn phone_suffix(digits: &str) -> &str {
    let start = digits.len().saturating_sub(PHONE_SUFFIX_DIGITS);
    &digits[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(local: &str, remote: &str) -> Recipient {
        Recipient::new(local, remote)
    }

    #[test]
    fn exact_matcher_compares_strings() {
        let m = ExactMatcher;
        assert!(m.matches(&r("a", "x"), &r("a", "x")));
        assert!(!m.matches(&r("a", "x"), &r("a", "y")));
        assert!(!m.matches(&r("a", "x"), &r("b", "x")));
    }

    #[test]
    fn phone_matcher_ignores_formatting() {
        let m = PhoneAwareMatcher;
        assert!(m.matches(&r("ring/tel", "+358 401 234567"), &r("ring/tel", "0401234567")));
        assert!(m.matches(&r("ring/tel", "(040) 123-4567"), &r("ring/tel", "+3584 0123 4567")));
    }

    #[test]
    fn phone_matcher_distinguishes_different_numbers() {
        let m = PhoneAwareMatcher;
        assert!(!m.matches(&r("ring/tel", "+358401234567"), &r("ring/tel", "+358407654321")));
    }

    #[test]
    fn phone_matcher_requires_matching_local_uid() {
        let m = PhoneAwareMatcher;
        assert!(!m.matches(&r("ring/tel", "0401234567"), &r("ofono/sim2", "0401234567")));
    }

    #[test]
    fn phone_matcher_falls_back_to_exact_for_im_handles() {
        let m = PhoneAwareMatcher;
        assert!(m.matches(&r("gabble/jabber", "friend@example.org"), &r("gabble/jabber", "friend@example.org")));
        assert!(!m.matches(&r("gabble/jabber", "friend@example.org"), &r("gabble/jabber", "Friend@example.org")));
    }

    #[test]
    fn short_numeric_uids_are_not_phone_numbers() {
        // e.g. short codes or conference room numbers; keep them exact.
        let m = PhoneAwareMatcher;
        assert!(!m.matches(&r("ring/tel", "112"), &r("ring/tel", "11-2")));
        assert!(m.matches(&r("ring/tel", "112"), &r("ring/tel", "112")));
    }
}
