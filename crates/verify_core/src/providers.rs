//! Provider existence probes
//!
//! HTTP probes against endpoints that reveal whether an account exists:
//! Microsoft GetCredentialType, Google's Android auth endpoint, Apple's
//! federate endpoint, Gravatar, the GitHub user search, keys.openpgp.org
//! and Have I Been Pwned. Every probe returns `Option<bool>` where `None`
//! means inconclusive, and each provider family is serialized behind a
//! minimum inter-call spacing to respect upstream limits.
//!
//! These endpoints are undocumented and advisory; their outcomes feed the
//! fusion engine as evidence, never as ground truth.

use crate::lists::{
    APPLE_DOMAINS, APPLE_MX_SUFFIXES, GOOGLE_DOMAINS, GOOGLE_MX_SUFFIXES, MICROSOFT_DOMAINS,
    MICROSOFT_MX_SUFFIXES, YAHOO_MX_SUFFIXES,
};
use crate::{EngineConfig, VerifyError};
use md5::{Digest, Md5};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const MICROSOFT_URL: &str = "https://login.microsoftonline.com/common/GetCredentialType";
const GOOGLE_URL: &str = "https://android.clients.google.com/auth";
const APPLE_URL: &str = "https://appleid.apple.com/appleauth/auth/federate";
const GRAVATAR_URL: &str = "https://gravatar.com/avatar";
const GITHUB_URL: &str = "https://api.github.com/search/users";
const PGP_URL: &str = "https://keys.openpgp.org/vks/v1/by-email";
const HIBP_URL: &str = "https://haveibeenpwned.com/api/v3/breachedaccount";

/// Which account authority hosts a domain's mail, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostedProvider {
    Microsoft,
    Google,
    Apple,
    Yahoo,
}

/// Detect the hosting provider from the consumer-domain sets and, for
/// custom domains, from MX hostname suffixes.
pub fn detect_hosted_provider(domain: &str, mx_hosts: &[String]) -> Option<HostedProvider> {
    if MICROSOFT_DOMAINS.contains(&domain) {
        return Some(HostedProvider::Microsoft);
    }
    if GOOGLE_DOMAINS.contains(&domain) {
        return Some(HostedProvider::Google);
    }
    if APPLE_DOMAINS.contains(&domain) {
        return Some(HostedProvider::Apple);
    }

    for host in mx_hosts {
        let host = host.trim_end_matches('.');
        if matches_suffix(host, MICROSOFT_MX_SUFFIXES) {
            return Some(HostedProvider::Microsoft);
        }
        if matches_suffix(host, GOOGLE_MX_SUFFIXES) {
            return Some(HostedProvider::Google);
        }
        if matches_suffix(host, APPLE_MX_SUFFIXES) {
            return Some(HostedProvider::Apple);
        }
        if matches_suffix(host, YAHOO_MX_SUFFIXES) {
            return Some(HostedProvider::Yahoo);
        }
    }
    None
}

fn matches_suffix(host: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| {
        if let Some(stripped) = suffix.strip_prefix('.') {
            host.ends_with(suffix) || host == stripped
        } else {
            host == *suffix
        }
    })
}

/// FIFO spacing gate: callers queue on the mutex and each sleeps until the
/// provider's minimum interval has passed since the previous call.
struct Pacer {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            if next_allowed > Instant::now() {
                tokio::time::sleep_until(next_allowed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct ProviderProbes {
    http: reqwest::Client,
    hibp_api_key: Option<String>,
    microsoft_pacer: Pacer,
    google_pacer: Pacer,
    apple_pacer: Pacer,
    gravatar_pacer: Pacer,
    github_pacer: Pacer,
    pgp_pacer: Pacer,
    hibp_pacer: Pacer,
}

impl ProviderProbes {
    pub fn new(config: &EngineConfig) -> Result<Self, VerifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .user_agent(concat!("email-verifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            hibp_api_key: config.hibp_api_key.clone(),
            microsoft_pacer: Pacer::new(Duration::from_millis(500)),
            google_pacer: Pacer::new(Duration::from_millis(3_000)),
            apple_pacer: Pacer::new(Duration::from_millis(2_000)),
            gravatar_pacer: Pacer::new(Duration::from_millis(200)),
            github_pacer: Pacer::new(Duration::from_millis(6_500)),
            pgp_pacer: Pacer::new(Duration::from_millis(300)),
            hibp_pacer: Pacer::new(Duration::from_millis(1_600)),
        })
    }

    pub fn has_hibp_key(&self) -> bool {
        self.hibp_api_key.is_some()
    }

    /// Microsoft GetCredentialType: `IfExistsResult` 0/5/6 means the
    /// account exists, 1 means it does not.
    pub async fn microsoft(&self, email: &str) -> Option<bool> {
        self.microsoft_pacer.pace().await;
        let response = self
            .http
            .post(MICROSOFT_URL)
            .json(&json!({ "username": email, "isOtherIdpSupported": true }))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!("microsoft probe returned {}", response.status());
            return None;
        }
        let body: Value = response.json().await.ok()?;
        classify_microsoft(&body)
    }

    /// Google's Android auth endpoint. `BadAuthentication` proves existence
    /// only for consumer gmail/googlemail addresses; for hosted domains the
    /// same reply is ambiguous.
    pub async fn google(&self, email: &str, domain: &str) -> Option<bool> {
        self.google_pacer.pace().await;
        let params = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", email),
            ("has_permission", "1"),
            ("service", "ac2dm"),
            ("source", "android"),
            ("androidId", "3281f33679ccc6c6"),
            ("app", "com.google.android.gsf"),
            ("client_sig", "38918a453d07199354f8b19af05ec6562ced5788"),
            ("callerPkg", "com.google.android.gsf"),
            ("callerSig", "38918a453d07199354f8b19af05ec6562ced5788"),
            ("EncryptedPasswd", "deliberately-wrong"),
        ];
        let response = self.http.post(GOOGLE_URL).form(&params).send().await.ok()?;
        let body = response.text().await.ok()?;
        classify_google(&body, domain)
    }

    /// Apple federate: a 200 with `hasSWP` means the account exists.
    pub async fn apple(&self, email: &str) -> Option<bool> {
        self.apple_pacer.pace().await;
        let response = self
            .http
            .post(APPLE_URL)
            .json(&json!({ "accountName": email, "rememberMe": false }))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!("apple probe returned {}", response.status());
            return None;
        }
        let body: Value = response.json().await.ok()?;
        Some(body.get("hasSWP").and_then(Value::as_bool) == Some(true))
    }

    /// Gravatar avatar HEAD with `d=404`: 200 means an avatar exists.
    pub async fn gravatar(&self, email: &str) -> Option<bool> {
        self.gravatar_pacer.pace().await;
        let hash = gravatar_hash(email);
        let url = format!("{GRAVATAR_URL}/{hash}?d=404");
        let response = self.http.head(&url).send().await.ok()?;
        classify_by_status(response.status().as_u16())
    }

    /// GitHub user search by email.
    pub async fn github(&self, email: &str) -> Option<bool> {
        self.github_pacer.pace().await;
        let url = format!("{GITHUB_URL}?q={}+in:email", email);
        let response = self.http.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            debug!("github probe returned {}", response.status());
            return None;
        }
        let body: Value = response.json().await.ok()?;
        let count = body.get("total_count").and_then(Value::as_u64)?;
        Some(count > 0)
    }

    /// keys.openpgp.org lookup by email.
    pub async fn pgp(&self, email: &str) -> Option<bool> {
        self.pgp_pacer.pace().await;
        let url = format!("{PGP_URL}/{email}");
        let response = self.http.head(&url).send().await.ok()?;
        classify_by_status(response.status().as_u16())
    }

    /// HIBP breached-account lookup. Requires an API key.
    pub async fn hibp(&self, email: &str) -> Option<bool> {
        let key = self.hibp_api_key.as_deref()?;
        self.hibp_pacer.pace().await;
        let url = format!("{HIBP_URL}/{email}?truncateResponse=true");
        let response = self
            .http
            .get(&url)
            .header("hibp-api-key", key)
            .send()
            .await
            .ok()?;
        classify_by_status(response.status().as_u16())
    }
}

/// 200 means exists, 404 means not found, anything else is inconclusive.
fn classify_by_status(status: u16) -> Option<bool> {
    match status {
        200 => Some(true),
        404 => Some(false),
        _ => None,
    }
}

fn classify_microsoft(body: &Value) -> Option<bool> {
    match body.get("IfExistsResult").and_then(Value::as_i64)? {
        0 | 5 | 6 => Some(true),
        1 => Some(false),
        _ => None,
    }
}

fn classify_google(body: &str, domain: &str) -> Option<bool> {
    if body.contains("NeedsBrowser") || body.contains("DeviceManagementRequiredOrSyncDisabled") {
        return Some(true);
    }
    if body.contains("BadAuthentication") {
        // The wrong-password path only proves existence for consumer gmail;
        // Workspace domains return it for unknown users too.
        return if domain == "gmail.com" || domain == "googlemail.com" {
            Some(true)
        } else {
            None
        };
    }
    if body.contains("INVALID_EMAIL") {
        return Some(false);
    }
    None
}

/// MD5 of the lowercased, trimmed address, per the Gravatar contract.
fn gravatar_hash(email: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn microsoft_if_exists_codes() {
        assert_eq!(classify_microsoft(&json!({"IfExistsResult": 0})), Some(true));
        assert_eq!(classify_microsoft(&json!({"IfExistsResult": 5})), Some(true));
        assert_eq!(classify_microsoft(&json!({"IfExistsResult": 6})), Some(true));
        assert_eq!(classify_microsoft(&json!({"IfExistsResult": 1})), Some(false));
        assert_eq!(classify_microsoft(&json!({"IfExistsResult": 2})), None);
        assert_eq!(classify_microsoft(&json!({})), None);
    }

    #[test]
    fn google_needs_browser_means_exists() {
        assert_eq!(classify_google("Error=NeedsBrowser", "example.com"), Some(true));
        assert_eq!(
            classify_google("Error=DeviceManagementRequiredOrSyncDisabled", "corp.com"),
            Some(true)
        );
    }

    #[test]
    fn google_bad_auth_only_counts_for_consumer_gmail() {
        assert_eq!(classify_google("Error=BadAuthentication", "gmail.com"), Some(true));
        assert_eq!(
            classify_google("Error=BadAuthentication", "googlemail.com"),
            Some(true)
        );
        assert_eq!(classify_google("Error=BadAuthentication", "corp.com"), None);
    }

    #[test]
    fn google_invalid_email_means_missing() {
        assert_eq!(classify_google("Error=INVALID_EMAIL", "gmail.com"), Some(false));
        assert_eq!(classify_google("Error=ServiceUnavailable", "gmail.com"), None);
    }

    #[test]
    fn gravatar_hash_is_md5_of_folded_address() {
        // Reference hash from the Gravatar documentation example.
        assert_eq!(
            gravatar_hash("MyEmailAddress@example.com "),
            "0bc83cb571cd1c50ba6f3e8a78ef1346"
        );
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_by_status(200), Some(true));
        assert_eq!(classify_by_status(404), Some(false));
        assert_eq!(classify_by_status(429), None);
        assert_eq!(classify_by_status(500), None);
    }

    #[test]
    fn hosted_provider_by_consumer_domain() {
        assert_eq!(
            detect_hosted_provider("outlook.com", &[]),
            Some(HostedProvider::Microsoft)
        );
        assert_eq!(
            detect_hosted_provider("gmail.com", &[]),
            Some(HostedProvider::Google)
        );
        assert_eq!(
            detect_hosted_provider("icloud.com", &[]),
            Some(HostedProvider::Apple)
        );
        assert_eq!(detect_hosted_provider("example.com", &[]), None);
    }

    #[test]
    fn hosted_provider_by_mx_suffix() {
        assert_eq!(
            detect_hosted_provider("contoso.com", &["contoso-com.mail.protection.outlook.com".into()]),
            Some(HostedProvider::Microsoft)
        );
        assert_eq!(
            detect_hosted_provider("startup.io", &["aspmx.l.google.com".into()]),
            Some(HostedProvider::Google)
        );
        assert_eq!(
            detect_hosted_provider("studio.example", &["mx01.mail.icloud.com".into()]),
            Some(HostedProvider::Apple)
        );
        assert_eq!(
            detect_hosted_provider("family.example", &["mta7.am0.yahoodns.net".into()]),
            Some(HostedProvider::Yahoo)
        );
        assert_eq!(
            detect_hosted_provider("selfhosted.example", &["mail.selfhosted.example".into()]),
            None
        );
    }

    #[tokio::test]
    async fn pacer_enforces_minimum_spacing() {
        let pacer = Pacer::new(Duration::from_millis(40));
        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
