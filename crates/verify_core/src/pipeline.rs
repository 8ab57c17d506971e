//! Batch orchestration
//!
//! Per request: parse and normalize, build per-domain single-flight cells so
//! N addresses on one domain do each lookup once, run the bulk-anomaly pass,
//! then fan out per-email work under a global outbound-concurrency bound.
//! Within one email MX precedes SMTP precedes provider probes; SMTP sessions
//! are serialized per target host.

use crate::behavior::ServerBehaviorCache;
use crate::bounce::BounceReports;
use crate::dns::Resolver;
use crate::email::ParsedEmail;
use crate::fusion::{fuse, Evidence};
use crate::patterns::{analyze_local, bulk_anomalies};
use crate::providers::{detect_hosted_provider, HostedProvider, ProviderProbes};
use crate::signals::SignalCollector;
use crate::smtp::{HostLocks, SmtpProber};
use crate::{
    lists, typo, DomainSignals, EngineConfig, MxLookup, ProviderChecks, Result, SmtpVerdict,
    VerifyResult,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, instrument};

/// Request-scoped single-flight map: one lazily-run future result per key,
/// shared by every caller in the batch.
struct SingleFlight<T> {
    cells: HashMap<String, Arc<OnceCell<T>>>,
}

impl<T: Clone> SingleFlight<T> {
    fn new<'a>(keys: impl Iterator<Item = &'a str>) -> Self {
        Self {
            cells: keys
                .map(|key| (key.to_string(), Arc::new(OnceCell::new())))
                .collect(),
        }
    }

    async fn get_or_run<F, Fut>(&self, key: &str, run: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self.cells.get(key)?;
        Some(cell.get_or_init(run).await.clone())
    }
}

/// Counters for the metrics endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EngineStats {
    pub mx_cache_entries: usize,
    pub intel_cache_entries: usize,
    pub dkim_cache_entries: usize,
    pub behavior_hosts: usize,
    pub bounce_entries: usize,
    pub disposable_domains: usize,
}

pub struct VerificationEngine {
    config: EngineConfig,
    resolver: Arc<Resolver>,
    signals: SignalCollector,
    prober: SmtpProber,
    behavior: Arc<ServerBehaviorCache>,
    providers: ProviderProbes,
    bounce: Arc<BounceReports>,
    outbound: Arc<Semaphore>,
}

impl VerificationEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let resolver = Arc::new(Resolver::new(&config)?);
        let behavior = Arc::new(ServerBehaviorCache::new());
        let outbound = Arc::new(Semaphore::new(config.dns_concurrency.max(1)));
        let signals = SignalCollector::new(&config, Arc::clone(&resolver), Arc::clone(&outbound))?;
        let prober = SmtpProber::new(&config, Arc::clone(&behavior), Arc::clone(&outbound));
        let providers = ProviderProbes::new(&config)?;

        info!(
            "verification engine ready (outbound concurrency {}, smtp port {})",
            config.dns_concurrency, config.smtp_port
        );

        Ok(Self {
            config,
            resolver,
            signals,
            prober,
            behavior,
            providers,
            bounce: Arc::new(BounceReports::new()),
            outbound,
        })
    }

    /// The bounce-report store shared with the report endpoint.
    pub fn bounce_reports(&self) -> Arc<BounceReports> {
        Arc::clone(&self.bounce)
    }

    /// Verify a batch. Every input yields a result, in input order; no
    /// collector failure is fatal to an address.
    #[instrument(skip_all, fields(batch = raw.len()))]
    pub async fn verify_batch(&self, raw: &[String]) -> Vec<VerifyResult> {
        let parsed: Vec<ParsedEmail> = raw.iter().map(|input| ParsedEmail::parse(input)).collect();
        let anomalies = bulk_anomalies(&parsed);

        let domains: HashSet<&str> = parsed
            .iter()
            .filter(|email| email.is_valid)
            .map(|email| email.domain.as_str())
            .collect();
        let mx_flight: SingleFlight<Option<MxLookup>> = SingleFlight::new(domains.iter().copied());
        let intel_flight: SingleFlight<DomainSignals> = SingleFlight::new(domains.iter().copied());
        let host_locks = HostLocks::default();
        let batch_size = parsed.len();

        let tasks = parsed.iter().enumerate().map(|(index, email)| {
            let mx_flight = &mx_flight;
            let intel_flight = &intel_flight;
            let host_locks = &host_locks;
            let anomalous = anomalies.contains(&index);
            async move {
                self.verify_one(email, mx_flight, intel_flight, host_locks, anomalous, batch_size)
                    .await
            }
        });
        futures::future::join_all(tasks).await
    }

    async fn verify_one(
        &self,
        email: &ParsedEmail,
        mx_flight: &SingleFlight<Option<MxLookup>>,
        intel_flight: &SingleFlight<DomainSignals>,
        host_locks: &HostLocks,
        bulk_anomaly: bool,
        batch_size: usize,
    ) -> VerifyResult {
        if !email.is_valid {
            let fusion = fuse(&Evidence::default());
            return VerifyResult {
                email: email.address.clone(),
                domain: email.domain.clone(),
                mx: None,
                smtp: None,
                status: fusion.status,
                confidence: fusion.confidence,
                notes: fusion.notes,
                suggested_email: None,
                provider_checks: ProviderChecks::default(),
                domain_intel: Default::default(),
            };
        }

        let domain = email.domain.as_str();

        // MX first; everything downstream hangs off it.
        let mx_lookup = mx_flight
            .get_or_run(domain, || async {
                let _permit = self.outbound.acquire().await.ok();
                self.resolver.lookup_mx(domain).await
            })
            .await
            .flatten();
        let mx_hosts: Vec<String> = mx_lookup
            .as_ref()
            .map(|lookup| lookup.hosts.clone())
            .unwrap_or_default();

        // The collector takes its own permits, one per outbound query.
        let signals = intel_flight
            .get_or_run(domain, || {
                let hosts = mx_hosts.clone();
                async move { self.signals.collect(domain, &hosts).await }
            })
            .await
            .unwrap_or_default();

        // SMTP probe; the prober locks each host it actually contacts.
        let smtp = match &mx_lookup {
            Some(lookup) if lookup.has_mx && !lookup.hosts.is_empty() => Some(
                self.prober
                    .probe(&email.address, domain, &lookup.hosts, host_locks)
                    .await,
            ),
            _ => None,
        };

        let providers = self
            .run_provider_probes(email, domain, &mx_hosts, smtp.as_ref().map(|o| o.verdict), batch_size)
            .await;

        let analysis = analyze_local(&email.local);
        let evidence = Evidence {
            syntax_valid: true,
            mx: mx_lookup.as_ref().map(|lookup| lookup.has_mx),
            via_implicit_mx: mx_lookup
                .as_ref()
                .map(|lookup| lookup.via_implicit_mx)
                .unwrap_or(false),
            smtp: smtp.as_ref().map(|outcome| outcome.verdict),
            smtp_downgraded: smtp
                .as_ref()
                .map(|outcome| outcome.suspected_catch_all)
                .unwrap_or(false),
            providers,
            signals: signals.clone(),
            major_provider: lists::is_major_provider_domain(domain),
            disposable: lists::is_disposable_domain(domain),
            role_account: lists::is_role_local(&email.local),
            looks_human: analysis.looks_human,
            pattern_flags: analysis.flags,
            bulk_anomaly,
            bounce_reporters: self.bounce.unique_reporters(&email.address),
        };
        let fusion = fuse(&evidence);

        let mut notes = fusion.notes;
        let suggested_email = match typo::suggest_email(&email.local, domain) {
            Some((suggestion, note)) => {
                notes.push(note);
                Some(suggestion)
            }
            None => None,
        };

        VerifyResult {
            email: email.address.clone(),
            domain: email.domain.clone(),
            mx: evidence.mx,
            smtp,
            status: fusion.status,
            confidence: fusion.confidence,
            notes,
            suggested_email,
            provider_checks: evidence.providers,
            domain_intel: signals.summary(),
        }
    }

    /// Gate and run the provider probes. Authority providers only run for
    /// domains they host, on inconclusive SMTP or as a veto on rejection;
    /// the secondary probes run on inconclusive SMTP only. GitHub is too
    /// rate-limited for batches; HIBP needs a key.
    async fn run_provider_probes(
        &self,
        email: &ParsedEmail,
        domain: &str,
        mx_hosts: &[String],
        smtp: Option<SmtpVerdict>,
        batch_size: usize,
    ) -> ProviderChecks {
        let inconclusive = matches!(smtp, None | Some(SmtpVerdict::Error));
        let authority_gate = inconclusive || smtp == Some(SmtpVerdict::Rejected);
        let hosted = detect_hosted_provider(domain, mx_hosts);

        let address = email.address.as_str();
        let (microsoft, google, apple, gravatar, github, pgp, hibp) = tokio::join!(
            self.gated(
                hosted == Some(HostedProvider::Microsoft) && authority_gate,
                self.providers.microsoft(address),
            ),
            self.gated(
                hosted == Some(HostedProvider::Google) && authority_gate,
                self.providers.google(address, domain),
            ),
            self.gated(
                hosted == Some(HostedProvider::Apple) && authority_gate,
                self.providers.apple(address),
            ),
            self.gated(inconclusive, self.providers.gravatar(address)),
            self.gated(inconclusive && batch_size == 1, self.providers.github(address)),
            self.gated(inconclusive, self.providers.pgp(address)),
            self.gated(
                inconclusive && self.providers.has_hibp_key(),
                self.providers.hibp(address),
            ),
        );

        ProviderChecks {
            microsoft,
            google,
            apple,
            gravatar,
            github,
            pgp,
            hibp,
        }
    }

    async fn gated<F>(&self, condition: bool, probe: F) -> Option<bool>
    where
        F: Future<Output = Option<bool>>,
    {
        if !condition {
            return None;
        }
        let _permit = self.outbound.acquire().await.ok();
        probe.await
    }

    /// Drop expired entries across every process-wide store. Wired to a
    /// ~60-second timer by the API crate.
    pub fn sweep(&self) {
        self.resolver.sweep_caches();
        self.signals.sweep_caches();
        self.behavior.sweep();
        self.bounce.sweep();
        debug!("engine cache sweep complete");
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            mx_cache_entries: self.resolver.mx_cache_len(),
            intel_cache_entries: self.signals.intel_cache_len(),
            dkim_cache_entries: self.signals.dkim_cache_len(),
            behavior_hosts: self.behavior.len(),
            bounce_entries: self.bounce.len(),
            disposable_domains: lists::disposable_domain_count(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VerifyStatus;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn single_flight_runs_once_per_key() {
        let flight: SingleFlight<u32> = SingleFlight::new(["a.example", "b.example"].into_iter());
        let runs = AtomicUsize::new(0);

        let tasks = (0..10).map(|_| {
            let flight = &flight;
            let runs = &runs;
            async move {
                flight
                    .get_or_run("a.example", || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        7u32
                    })
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| *r == Some(7)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_flight_is_per_key() {
        let flight: SingleFlight<u32> = SingleFlight::new(["a.example", "b.example"].into_iter());
        let a = flight.get_or_run("a.example", || async { 1 }).await;
        let b = flight.get_or_run("b.example", || async { 2 }).await;
        let missing = flight.get_or_run("c.example", || async { 3 }).await;
        assert_eq!(a, Some(1));
        assert_eq!(b, Some(2));
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn syntactically_invalid_batch_needs_no_network() {
        let engine = VerificationEngine::new(EngineConfig::default()).unwrap();
        let results = engine
            .verify_batch(&["".to_string(), "not-an-email".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, VerifyStatus::Invalid);
            assert_eq!(result.confidence, 0);
            assert_eq!(result.notes, vec!["Invalid syntax".to_string()]);
        }
    }

    #[tokio::test]
    async fn results_preserve_input_order() {
        let engine = VerificationEngine::new(EngineConfig::default()).unwrap();
        let results = engine
            .verify_batch(&["@@".to_string(), "".to_string()])
            .await;
        assert_eq!(results[0].email, "@@");
        assert_eq!(results[1].email, "");
    }
}
