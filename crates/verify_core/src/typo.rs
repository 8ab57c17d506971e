//! Typo detection against common provider misspellings
//!
//! A fixed misspelling-to-canonical map for the big consumer mailbox hosts.
//! A hit produces a corrected address suggestion and a "Did you mean …?"
//! note; the verdict itself is never altered.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

static TYPO_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Gmail
        ("gmial.com", "gmail.com"),
        ("gmal.com", "gmail.com"),
        ("gamil.com", "gmail.com"),
        ("gnail.com", "gmail.com"),
        ("gmaill.com", "gmail.com"),
        ("gmai.com", "gmail.com"),
        ("gmail.co", "gmail.com"),
        ("gmail.cm", "gmail.com"),
        ("gmail.con", "gmail.com"),
        ("googlemail.co", "googlemail.com"),
        // Yahoo
        ("yaho.com", "yahoo.com"),
        ("yahooo.com", "yahoo.com"),
        ("yhoo.com", "yahoo.com"),
        ("yahoo.co", "yahoo.com"),
        ("yahoo.con", "yahoo.com"),
        // Outlook
        ("outlok.com", "outlook.com"),
        ("outloo.com", "outlook.com"),
        ("outlookk.com", "outlook.com"),
        ("outlook.co", "outlook.com"),
        ("outlock.com", "outlook.com"),
        // Hotmail
        ("hotmial.com", "hotmail.com"),
        ("hotmal.com", "hotmail.com"),
        ("hotnail.com", "hotmail.com"),
        ("hotmai.com", "hotmail.com"),
        ("hotmail.co", "hotmail.com"),
        ("hotmail.con", "hotmail.com"),
        // iCloud
        ("iclod.com", "icloud.com"),
        ("icoud.com", "icloud.com"),
        ("icloud.co", "icloud.com"),
        ("icloud.con", "icloud.com"),
        // AOL
        ("aoll.com", "aol.com"),
        ("aol.co", "aol.com"),
        // Proton
        ("protonmial.com", "protonmail.com"),
        ("protonmal.com", "protonmail.com"),
        ("proton.mee", "proton.me"),
        // Live
        ("lvie.com", "live.com"),
        ("live.co", "live.com"),
        ("liive.com", "live.com"),
    ])
});

/// Canonical domain for a known misspelling.
pub fn suggest_domain(domain: &str) -> Option<&'static str> {
    let suggestion = TYPO_MAP.get(domain).copied();
    if let Some(canonical) = suggestion {
        debug!("typo suggestion: {} -> {}", domain, canonical);
    }
    suggestion
}

/// Corrected full address and its user-facing note.
pub fn suggest_email(local: &str, domain: &str) -> Option<(String, String)> {
    let canonical = suggest_domain(domain)?;
    Some((
        format!("{local}@{canonical}"),
        format!("Did you mean {canonical}?"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_misspellings_are_corrected() {
        assert_eq!(suggest_domain("gmial.com"), Some("gmail.com"));
        assert_eq!(suggest_domain("hotmial.com"), Some("hotmail.com"));
        assert_eq!(suggest_domain("outlok.com"), Some("outlook.com"));
    }

    #[test]
    fn canonical_domains_pass_through() {
        assert_eq!(suggest_domain("gmail.com"), None);
        assert_eq!(suggest_domain("example.com"), None);
    }

    #[test]
    fn suggestion_carries_note() {
        let (email, note) = suggest_email("user", "gmial.com").unwrap();
        assert_eq!(email, "user@gmail.com");
        assert_eq!(note, "Did you mean gmail.com?");
    }
}
