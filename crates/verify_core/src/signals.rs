//! Best-effort domain signal collectors
//!
//! Each collector is independent, carries its own timeout and degrades to
//! `None` ("no signal") on any failure: SPF/DMARC/MTA-STS/BIMI TXT probes,
//! the DKIM selector scan, website liveness with parked-page detection,
//! RDAP domain age and DNSBL membership. Results are assembled into a
//! `DomainSignals` and cached per domain.

use crate::cache::TtlCache;
use crate::dns::Resolver;
use crate::lists::{DKIM_SELECTORS, DNSBL_ZONES, PARKED_PHRASES};
use crate::{DomainSignals, EngineConfig, VerifyError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Only this much of a website body is scanned for parked indicators.
const PARKED_SCAN_LIMIT: usize = 10 * 1024;

const RDAP_BASE: &str = "https://rdap.org/domain";

pub struct SignalCollector {
    resolver: Arc<Resolver>,
    http: reqwest::Client,
    outbound: Arc<Semaphore>,
    intel_cache: TtlCache<String, DomainSignals>,
    dkim_cache: TtlCache<String, Vec<String>>,
}

impl SignalCollector {
    pub fn new(
        config: &EngineConfig,
        resolver: Arc<Resolver>,
        outbound: Arc<Semaphore>,
    ) -> Result<Self, VerifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .user_agent(concat!("email-verifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            resolver,
            http,
            outbound,
            intel_cache: TtlCache::new(Duration::from_secs(config.intel_cache_ttl_secs)),
            dkim_cache: TtlCache::new(Duration::from_secs(config.dkim_cache_ttl_secs)),
        })
    }

    /// One permit per real outbound query, so a whole collector pass stays
    /// inside the shared concurrency bound instead of counting as one slot.
    async fn bounded<F, T>(&self, op: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.outbound.acquire().await.ok();
        op.await
    }

    /// Gather all signals for a domain. `mx_hosts` feeds the DNSBL check,
    /// which tests the reversed IPv4 of the first exchange.
    pub async fn collect(&self, domain: &str, mx_hosts: &[String]) -> DomainSignals {
        let dkim_selectors = self.dkim_scan(domain).await;

        if let Some(mut cached) = self.intel_cache.get(&domain.to_string()) {
            debug!("domain-intel cache hit for {}", domain);
            cached.dkim_selectors = dkim_selectors;
            return cached;
        }

        let (auth, site, age, listed) = tokio::join!(
            self.auth_records(domain),
            self.website_check(domain),
            self.rdap_age_days(domain),
            self.dnsbl_check(mx_hosts),
        );
        let (spf_present, dmarc_present, mta_sts_present, bimi_present) = auth;
        let (website_alive, is_parked) = site;

        let signals = DomainSignals {
            spf_present,
            dmarc_present,
            mta_sts_present,
            bimi_present,
            dkim_selectors: Vec::new(),
            website_alive,
            is_parked,
            domain_age_days: age,
            blacklisted: listed,
        };
        self.intel_cache.insert(domain.to_string(), signals.clone());

        DomainSignals {
            dkim_selectors,
            ..signals
        }
    }

    async fn auth_records(
        &self,
        domain: &str,
    ) -> (Option<bool>, Option<bool>, Option<bool>, Option<bool>) {
        let dmarc_domain = format!("_dmarc.{domain}");
        let mta_sts_domain = format!("_mta-sts.{domain}");
        let bimi_domain = format!("_bimi.{domain}");
        let (spf, dmarc, mta_sts, bimi) = tokio::join!(
            self.bounded(self.resolver.txt_records(domain)),
            self.bounded(self.resolver.txt_records(&dmarc_domain)),
            self.bounded(self.resolver.txt_records(&mta_sts_domain)),
            self.bounded(self.resolver.txt_records(&bimi_domain)),
        );
        (
            spf.map(|records| has_record_prefix(&records, "v=spf1")),
            dmarc.map(|records| has_record_prefix(&records, "v=dmarc1")),
            mta_sts.map(|records| has_record_prefix(&records, "v=stsv1")),
            bimi.map(|records| has_record_prefix(&records, "v=bimi1")),
        )
    }

    /// Selectors under `_domainkey` that return any TXT record. Cached
    /// longer than the rest of the intel; selector sets rarely change.
    async fn dkim_scan(&self, domain: &str) -> Vec<String> {
        if let Some(cached) = self.dkim_cache.get(&domain.to_string()) {
            return cached;
        }

        let lookups = DKIM_SELECTORS.iter().map(|selector| async move {
            let name = format!("{selector}._domainkey.{domain}");
            match self.bounded(self.resolver.txt_records(&name)).await {
                Some(records) if !records.is_empty() => Some(selector.to_string()),
                _ => None,
            }
        });
        let found: Vec<String> = futures::future::join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!("DKIM scan for {} found {} selectors", domain, found.len());
        self.dkim_cache.insert(domain.to_string(), found.clone());
        found
    }

    /// `alive` iff a plain-HTTP GET (redirects followed) lands on a 2xx;
    /// `parked` iff the first 10 KiB of the body matches a parked phrase.
    async fn website_check(&self, domain: &str) -> (Option<bool>, Option<bool>) {
        // One permit covers the request and its body read.
        let _permit = self.outbound.acquire().await.ok();
        let url = format!("http://{domain}");
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!("website check failed for {}: {}", domain, err);
                return (None, None);
            }
        };

        let alive = response.status().is_success();
        if !alive {
            return (Some(false), Some(false));
        }

        match response.bytes().await {
            Ok(body) => {
                let head = &body[..body.len().min(PARKED_SCAN_LIMIT)];
                let text = String::from_utf8_lossy(head).to_lowercase();
                (Some(true), Some(body_looks_parked(&text)))
            }
            Err(err) => {
                debug!("website body read failed for {}: {}", domain, err);
                (Some(true), None)
            }
        }
    }

    /// Domain age in whole days via the RDAP registration event.
    async fn rdap_age_days(&self, domain: &str) -> Option<i64> {
        let _permit = self.outbound.acquire().await.ok();
        let url = format!("{RDAP_BASE}/{domain}");
        let response = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("RDAP returned {} for {}", response.status(), domain);
                return None;
            }
            Err(err) => {
                debug!("RDAP request failed for {}: {}", domain, err);
                return None;
            }
        };
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!("RDAP body parse failed for {}: {}", domain, err);
                return None;
            }
        };
        registration_age_days(&body, Utc::now())
    }

    async fn dnsbl_check(&self, mx_hosts: &[String]) -> Option<bool> {
        let first_host = mx_hosts.first()?;
        let ip = self.bounded(self.resolver.first_ipv4(first_host)).await?;

        let mut any_answer = false;
        for zone in DNSBL_ZONES {
            match self.bounded(self.resolver.dnsbl_listed(ip, zone)).await {
                Some(true) => return Some(true),
                Some(false) => any_answer = true,
                None => {}
            }
        }
        any_answer.then_some(false)
    }

    pub fn intel_cache_len(&self) -> usize {
        self.intel_cache.len()
    }

    pub fn dkim_cache_len(&self) -> usize {
        self.dkim_cache.len()
    }

    pub fn sweep_caches(&self) {
        self.intel_cache.sweep();
        self.dkim_cache.sweep();
    }
}

fn has_record_prefix(records: &[String], prefix: &str) -> bool {
    records
        .iter()
        .any(|record| record.trim().to_lowercase().starts_with(prefix))
}

fn body_looks_parked(folded_body: &str) -> bool {
    PARKED_PHRASES
        .iter()
        .any(|phrase| folded_body.contains(phrase))
}

/// Extract `events[].eventAction == "registration"` and convert its
/// `eventDate` to an age in whole days.
fn registration_age_days(body: &Value, now: DateTime<Utc>) -> Option<i64> {
    let events = body.get("events")?.as_array()?;
    let registration = events.iter().find(|event| {
        event
            .get("eventAction")
            .and_then(Value::as_str)
            .map(|action| action.eq_ignore_ascii_case("registration"))
            .unwrap_or(false)
    })?;
    let date = registration.get("eventDate")?.as_str()?;
    let parsed = DateTime::parse_from_rfc3339(date).ok()?;
    Some((now - parsed.with_timezone(&Utc)).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn record_prefix_is_case_insensitive() {
        let records = vec!["V=SPF1 include:_spf.example.com ~all".to_string()];
        assert!(has_record_prefix(&records, "v=spf1"));
        assert!(!has_record_prefix(&records, "v=dmarc1"));
        assert!(!has_record_prefix(&[], "v=spf1"));
    }

    #[test]
    fn parked_phrases_match_in_body() {
        assert!(body_looks_parked("<html>buy this domain today!</html>"));
        assert!(body_looks_parked("domain is parked free, courtesy of reg"));
        assert!(!body_looks_parked("<html>welcome to our company</html>"));
    }

    #[test]
    fn registration_age_parses_rdap_events() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        let body = json!({
            "events": [
                {"eventAction": "last changed", "eventDate": "2024-03-01T00:00:00Z"},
                {"eventAction": "registration", "eventDate": "2024-03-01T00:00:00Z"}
            ]
        });
        assert_eq!(registration_age_days(&body, now), Some(10));
    }

    #[test]
    fn registration_age_handles_missing_event() {
        let now = Utc::now();
        assert_eq!(registration_age_days(&json!({}), now), None);
        let body = json!({"events": [{"eventAction": "expiration", "eventDate": "2030-01-01T00:00:00Z"}]});
        assert_eq!(registration_age_days(&body, now), None);
        let body = json!({"events": [{"eventAction": "registration", "eventDate": "not a date"}]});
        assert_eq!(registration_age_days(&body, now), None);
    }
}
