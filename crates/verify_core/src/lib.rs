//! # verify_core
//!
//! Email mailbox verification engine. Given a batch of raw email strings it
//! fans out lookups across DNS, SMTP and a handful of provider endpoints,
//! coalesces per-domain work, and fuses the collected evidence into a
//! status + confidence verdict with explanatory notes.
//!
//! ## Features
//!
//! - **MX resolution** with RFC 5321 implicit-MX fallback and a TTL cache
//! - **SMTP mailbox probing** with opportunistic STARTTLS, two-probe
//!   catch-all detection and greylist retry
//! - **Domain signals**: SPF/DMARC/DKIM/MTA-STS/BIMI, website liveness,
//!   RDAP domain age, DNSBL membership
//! - **Provider probes** (Microsoft, Google, Apple, Gravatar, GitHub,
//!   keys.openpgp.org, HIBP) with per-provider pacing
//! - **Multi-layer admission control**: RPM buckets with violation backoff,
//!   daily quotas, a global ceiling and per-identity concurrency permits
//!
//! ## Example
//!
//! ```rust,no_run
//! use verify_core::{EngineConfig, VerificationEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = VerificationEngine::new(EngineConfig::default())?;
//!     let results = engine.verify_batch(&["alice@example.com".to_string()]).await;
//!     println!("{:?}", results[0].status);
//!     Ok(())
//! }
//! ```

pub mod behavior;
pub mod bounce;
pub mod cache;
pub mod dns;
pub mod email;
pub mod fusion;
pub mod lists;
pub mod patterns;
pub mod pipeline;
pub mod providers;
pub mod ratelimit;
pub mod signals;
pub mod smtp;
pub mod typo;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the verification engine.
///
/// Every knob is surfaced through the API crate's runtime config; the
/// defaults here are the operational defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// DNS query timeout in milliseconds
    pub dns_timeout_ms: u64,
    /// Maximum number of DNS lookup attempts
    pub dns_attempts: usize,
    /// Bound on simultaneous outbound operations per request
    pub dns_concurrency: usize,
    /// MX cache TTL in seconds
    pub mx_cache_ttl_secs: u64,
    /// Domain-intel cache TTL in seconds
    pub intel_cache_ttl_secs: u64,
    /// DKIM selector-scan cache TTL in seconds
    pub dkim_cache_ttl_secs: u64,
    /// Per-I/O-operation SMTP timeout in milliseconds
    pub smtp_timeout_ms: u64,
    /// SMTP port (25 in production; overridable so tests can target a mock)
    pub smtp_port: u16,
    /// Domain presented in EHLO
    pub smtp_helo_domain: String,
    /// Address used in MAIL FROM
    pub smtp_mail_from: String,
    /// Sleep before the single greylist retry, in milliseconds
    pub smtp_greylist_retry_ms: u64,
    /// Timeout for outbound HTTP probes in milliseconds
    pub http_timeout_ms: u64,
    /// HIBP API key; the HIBP probe is skipped when absent
    pub hibp_api_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 4_000,
            dns_attempts: 2,
            dns_concurrency: 20,
            mx_cache_ttl_secs: 600,
            intel_cache_ttl_secs: 600,
            dkim_cache_ttl_secs: 1_800,
            smtp_timeout_ms: 8_000,
            smtp_port: 25,
            smtp_helo_domain: "verifier.example.com".to_string(),
            smtp_mail_from: "probe@verifier.example.com".to_string(),
            smtp_greylist_retry_ms: 5_000,
            http_timeout_ms: 6_000,
            hibp_api_key: None,
        }
    }
}

/// Final verdict for one email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    Valid,
    Risky,
    Invalid,
    Unknown,
}

/// Outcome class of an SMTP mailbox probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmtpVerdict {
    Accepted,
    Rejected,
    CatchAll,
    Greylisted,
    Error,
}

/// Full output of the SMTP prober for one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpProbeOutcome {
    pub verdict: SmtpVerdict,
    /// Last relevant reply code (RCPT reply where one was reached)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Server banner text, when a banner was read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Host that produced this verdict (last host tried on error paths)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// RCPT latency for the real recipient, milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_latency_ms: Option<u64>,
    /// RCPT latency for the random recipient, milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_latency_ms: Option<u64>,
    /// Set when an `accepted` was downgraded because the host has a
    /// historical catch-all accept rate
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suspected_catch_all: bool,
}

impl SmtpProbeOutcome {
    pub fn error(host: Option<String>) -> Self {
        Self {
            verdict: SmtpVerdict::Error,
            code: None,
            banner: None,
            host,
            real_latency_ms: None,
            random_latency_ms: None,
            suspected_catch_all: false,
        }
    }
}

/// Result of an MX lookup, including the implicit-MX fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MxLookup {
    pub has_mx: bool,
    /// Exchange hosts ordered by ascending priority
    pub hosts: Vec<String>,
    /// True when no MX records exist but A/AAAA do (RFC 5321 §5.1)
    pub via_implicit_mx: bool,
}

/// Per-provider existence evidence. `None` means the probe did not run or
/// was inconclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderChecks {
    pub microsoft: Option<bool>,
    pub google: Option<bool>,
    pub apple: Option<bool>,
    pub gravatar: Option<bool>,
    pub github: Option<bool>,
    pub pgp: Option<bool>,
    pub hibp: Option<bool>,
}

impl ProviderChecks {
    /// Any of the three account-authority providers confirmed the mailbox.
    pub fn any_authority_true(&self) -> bool {
        self.microsoft == Some(true) || self.google == Some(true) || self.apple == Some(true)
    }

    /// Any of the three account-authority providers denied the mailbox.
    pub fn any_authority_false(&self) -> bool {
        self.microsoft == Some(false) || self.google == Some(false) || self.apple == Some(false)
    }

    /// Any provider at all returned a positive.
    pub fn any_true(&self) -> bool {
        self.any_authority_true()
            || self.gravatar == Some(true)
            || self.github == Some(true)
            || self.pgp == Some(true)
            || self.hibp == Some(true)
    }
}

/// The four domain-intel facts surfaced on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainIntelSummary {
    pub website_alive: Option<bool>,
    pub is_parked: Option<bool>,
    pub domain_age_days: Option<i64>,
    pub blacklisted: Option<bool>,
}

/// Everything the signal collectors learned about a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSignals {
    pub spf_present: Option<bool>,
    pub dmarc_present: Option<bool>,
    pub mta_sts_present: Option<bool>,
    pub bimi_present: Option<bool>,
    /// DKIM selectors that returned any TXT record
    pub dkim_selectors: Vec<String>,
    pub website_alive: Option<bool>,
    pub is_parked: Option<bool>,
    pub domain_age_days: Option<i64>,
    pub blacklisted: Option<bool>,
}

impl DomainSignals {
    pub fn summary(&self) -> DomainIntelSummary {
        DomainIntelSummary {
            website_alive: self.website_alive,
            is_parked: self.is_parked,
            domain_age_days: self.domain_age_days,
            blacklisted: self.blacklisted,
        }
    }
}

/// Composite verdict for one input address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub email: String,
    pub domain: String,
    /// `None` means the MX lookup was inconclusive
    pub mx: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpProbeOutcome>,
    pub status: VerifyStatus,
    /// 0..=97; the engine never claims 100%
    pub confidence: u8,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_email: Option<String>,
    pub provider_checks: ProviderChecks,
    pub domain_intel: DomainIntelSummary,
}

/// Errors surfaced by engine construction and admission. Per-email collector
/// failures never become errors; they degrade to `unknown` evidence.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("DNS resolver initialization failed: {0}")]
    ResolverInit(String),
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;

pub use pipeline::{EngineStats, VerificationEngine};
pub use ratelimit::{Admission, AdmissionError, Identity, IdentityKind, LimitsConfig, RateGates};
