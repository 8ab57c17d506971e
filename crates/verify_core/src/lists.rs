//! Static domain and word tables consumed by the engine
//!
//! These are data, not logic: the disposable-domain set (Bloom-filtered for
//! O(1) membership), role-based local parts, parked-page indicator phrases,
//! the DKIM selector scan list, DNSBL zones, consumer-provider domains and
//! the MX hostname suffixes used for provider-hosted domain detection.

use fastbloom::BloomFilter;
use once_cell::sync::Lazy;
use tracing::debug;

/// Well-known disposable email domains. A deployment can extend this list;
/// membership is checked through a Bloom filter the same way the full
/// mailchecker dataset would be.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "20minutemail.com",
    "33mail.com",
    "anonaddy.me",
    "burnermail.io",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.biz",
    "guerrillamail.com",
    "guerrillamail.net",
    "guerrillamail.org",
    "inboxkitten.com",
    "maildrop.cc",
    "mailinator.com",
    "mailinator.net",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "nada.email",
    "sharklasers.com",
    "spamgourmet.com",
    "tempail.com",
    "temp-mail.io",
    "temp-mail.org",
    "tempmail.dev",
    "tempmailo.com",
    "throwawaymail.com",
    "trash-mail.com",
    "trashmail.com",
    "yopmail.com",
    "yopmail.fr",
    "yopmail.net",
];

/// Local parts that indicate a role account rather than a person.
pub const ROLE_LOCAL_PARTS: &[&str] = &[
    "abuse",
    "admin",
    "administrator",
    "billing",
    "contact",
    "enquiries",
    "help",
    "hello",
    "hostmaster",
    "info",
    "inquiries",
    "it",
    "jobs",
    "legal",
    "mail",
    "marketing",
    "newsletter",
    "no-reply",
    "noreply",
    "office",
    "postmaster",
    "press",
    "privacy",
    "root",
    "sales",
    "security",
    "service",
    "support",
    "team",
    "webmaster",
];

/// Phrases that flag a domain's website as a parking page. Matched
/// case-folded against the first 10 KiB of the response body.
pub const PARKED_PHRASES: &[&str] = &[
    "buy this domain",
    "this domain is for sale",
    "domain is parked",
    "domain parking",
    "parked domain",
    "parked free, courtesy of",
    "is parked free",
    "purchase this domain",
    "this domain may be for sale",
    "this webpage was generated by the domain owner",
    "sedoparking",
    "get your own domain",
    "coming soon - future home",
];

/// DKIM selectors probed during the selector scan.
pub const DKIM_SELECTORS: &[&str] = &[
    "default",
    "google",
    "selector1",
    "selector2",
    "k1",
    "k2",
    "k3",
    "dkim",
    "s1",
    "s2",
    "mail",
    "smtp",
    "mx",
];

/// DNS blacklists queried with the reversed IPv4 of the first MX host.
pub const DNSBL_ZONES: &[&str] = &["zen.spamhaus.org", "bl.spamcop.net", "b.barracudacentral.org"];

/// Mailbox hosts for the account-authority providers, by consumer domain.
pub const MICROSOFT_DOMAINS: &[&str] = &["outlook.com", "hotmail.com", "live.com", "msn.com"];
pub const GOOGLE_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];
pub const APPLE_DOMAINS: &[&str] = &["icloud.com", "me.com", "mac.com"];

/// Consumer mailbox hosts known to block RCPT-based probing.
pub const MAJOR_PROVIDER_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "msn.com",
    "yahoo.com",
    "ymail.com",
    "rocketmail.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.de",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "yandex.ru",
];

/// MX hostname suffixes that reveal which provider hosts a custom domain.
pub const MICROSOFT_MX_SUFFIXES: &[&str] = &[".mail.protection.outlook.com", ".olc.protection.outlook.com"];
pub const GOOGLE_MX_SUFFIXES: &[&str] = &[
    "aspmx.l.google.com",
    ".aspmx.l.google.com",
    ".googlemail.com",
    "smtp.google.com",
];
pub const APPLE_MX_SUFFIXES: &[&str] = &[".mail.icloud.com"];
pub const YAHOO_MX_SUFFIXES: &[&str] = &[".yahoodns.net"];

/// Reply-text fragments that mark a 5xx RCPT refusal as "user unknown"
/// rather than a policy rejection.
pub const USER_UNKNOWN_PHRASES: &[&str] = &[
    "5.1.1",
    "user unknown",
    "unknown user",
    "does not exist",
    "mailbox not found",
    "mailbox unavailable",
    "no such user",
    "no such recipient",
    "recipient not found",
    "recipient rejected",
    "invalid recipient",
    "invalid mailbox",
    "address rejected",
    "undeliverable",
    "user not found",
];

static DISPOSABLE_FILTER: Lazy<BloomFilter> = Lazy::new(|| {
    debug!(
        "building disposable-domain filter over {} entries",
        DISPOSABLE_DOMAINS.len()
    );
    BloomFilter::with_false_pos(0.0001).items(DISPOSABLE_DOMAINS.iter().map(|d| d.to_string()))
});

/// Bloom-filtered membership check against the disposable-domain set.
pub fn is_disposable_domain(domain: &str) -> bool {
    DISPOSABLE_FILTER.contains(&domain.to_lowercase())
}

/// Role-account check on a normalized local part.
pub fn is_role_local(local: &str) -> bool {
    ROLE_LOCAL_PARTS.contains(&local)
}

pub fn is_major_provider_domain(domain: &str) -> bool {
    MAJOR_PROVIDER_DOMAINS.contains(&domain)
}

pub fn disposable_domain_count() -> usize {
    DISPOSABLE_DOMAINS.len()
}
