//! Email address normalization and syntax validation
//!
//! Input strings are trimmed, lower-cased and stripped of a `mailto:` prefix
//! before being split at the last `@`. Syntax checks are RFC-5321-shaped for
//! the local part plus LDH rules for domain labels; a syntactically bad
//! address never errors the pipeline, it just fails `is_valid`.

use email_address::EmailAddress;
use tracing::debug;

/// Maximum total length of an address we will consider.
pub const MAX_EMAIL_LEN: usize = 254;

/// A normalized, pre-validated email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Normalized full address (`local@domain`)
    pub address: String,
    pub local: String,
    pub domain: String,
    pub is_valid: bool,
}

impl ParsedEmail {
    /// Normalize and validate one raw input string.
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize(raw);

        let Some((local, domain)) = normalized.rsplit_once('@') else {
            debug!("no @ separator in input");
            return Self::invalid(normalized);
        };
        let (local, domain) = (local.to_string(), domain.to_string());

        let is_valid = normalized.len() <= MAX_EMAIL_LEN
            && is_valid_local(&local)
            && is_valid_domain(&domain)
            // RFC 5321 shape check on the whole address as a backstop
            && EmailAddress::is_valid(&normalized);

        Self {
            address: normalized,
            local,
            domain,
            is_valid,
        }
    }

    fn invalid(address: String) -> Self {
        Self {
            address,
            local: String::new(),
            domain: String::new(),
            is_valid: false,
        }
    }
}

/// Lower-case, trim, strip a `mailto:` prefix.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    trimmed
        .strip_prefix("mailto:")
        .map(str::to_string)
        .unwrap_or(trimmed)
}

/// Dot-atom local part: atoms of printable atext separated by single dots.
fn is_valid_local(local: &str) -> bool {
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '.' | '!'
                    | '#'
                    | '$'
                    | '%'
                    | '&'
                    | '\''
                    | '*'
                    | '+'
                    | '-'
                    | '/'
                    | '='
                    | '?'
                    | '^'
                    | '_'
                    | '`'
                    | '{'
                    | '|'
                    | '}'
                    | '~'
            )
    })
}

/// LDH domain: dot-separated labels of letters, digits and interior hyphens.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_case_whitespace_and_mailto() {
        let parsed = ParsedEmail::parse("  MAILTO:Alice@Example.COM  ");
        assert_eq!(parsed.address, "alice@example.com");
        assert_eq!(parsed.local, "alice");
        assert_eq!(parsed.domain, "example.com");
        assert!(parsed.is_valid);
    }

    #[test]
    fn splits_at_last_at_sign() {
        let parsed = ParsedEmail::parse("\"odd\"@weird@example.com");
        assert_eq!(parsed.domain, "example.com");
        assert_eq!(parsed.local, "\"odd\"@weird");
        assert!(!parsed.is_valid);
    }

    #[test]
    fn empty_string_is_invalid() {
        let parsed = ParsedEmail::parse("");
        assert!(!parsed.is_valid);
        assert!(parsed.domain.is_empty());
    }

    #[test]
    fn missing_domain_is_invalid() {
        assert!(!ParsedEmail::parse("alice@").is_valid);
        assert!(!ParsedEmail::parse("@example.com").is_valid);
        assert!(!ParsedEmail::parse("alice").is_valid);
    }

    #[test]
    fn rejects_bad_labels() {
        assert!(!ParsedEmail::parse("a@-example.com").is_valid);
        assert!(!ParsedEmail::parse("a@example-.com").is_valid);
        assert!(!ParsedEmail::parse("a@exa_mple.com").is_valid);
        assert!(!ParsedEmail::parse("a@example..com").is_valid);
    }

    #[test]
    fn rejects_dotted_local_edges() {
        assert!(!ParsedEmail::parse(".alice@example.com").is_valid);
        assert!(!ParsedEmail::parse("alice.@example.com").is_valid);
        assert!(!ParsedEmail::parse("ali..ce@example.com").is_valid);
    }

    #[test]
    fn accepts_plus_tags_and_digits() {
        assert!(ParsedEmail::parse("alice+tag@example.com").is_valid);
        assert!(ParsedEmail::parse("a1.b2@sub.example.co.uk").is_valid);
    }

    #[test]
    fn enforces_total_length() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!ParsedEmail::parse(&long).is_valid);
    }
}
