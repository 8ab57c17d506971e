//! DNS resolution using hickory-resolver
//!
//! Wraps a `TokioAsyncResolver` with the lookups the engine needs: MX with
//! the RFC 5321 §5.1 implicit-MX fallback, TXT for the signal collectors,
//! and reversed-IPv4 DNSBL queries. Definitive MX results are cached per
//! domain with a fixed TTL.

use crate::cache::TtlCache;
use crate::{EngineConfig, MxLookup, VerifyError};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Resolver {
    resolver: TokioAsyncResolver,
    mx_cache: TtlCache<String, MxLookup>,
}

impl Resolver {
    pub fn new(config: &EngineConfig) -> Result<Self, VerifyError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_millis(config.dns_timeout_ms);
        opts.attempts = config.dns_attempts;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), opts);

        info!(
            "DNS resolver initialized - timeout: {}ms, attempts: {}, mx cache ttl: {}s",
            config.dns_timeout_ms, config.dns_attempts, config.mx_cache_ttl_secs
        );

        Ok(Self {
            resolver,
            mx_cache: TtlCache::new(Duration::from_secs(config.mx_cache_ttl_secs)),
        })
    }

    /// MX hosts ordered by ascending priority, falling back to the domain
    /// itself when A/AAAA records exist without MX. Returns `None` when the
    /// lookup was inconclusive (timeout or server failure), which propagates
    /// to the caller as an Unknown verdict.
    pub async fn lookup_mx(&self, domain: &str) -> Option<MxLookup> {
        if let Some(cached) = self.mx_cache.get(&domain.to_string()) {
            debug!("MX cache hit for {}", domain);
            return Some(cached);
        }

        let result = match self.resolver.mx_lookup(domain).await {
            Ok(response) => {
                let mut records: Vec<(u16, String)> = response
                    .iter()
                    .map(|mx| {
                        let host = mx
                            .exchange()
                            .to_utf8()
                            .trim_end_matches('.')
                            .to_lowercase();
                        (mx.preference(), host)
                    })
                    .filter(|(_, host)| !host.is_empty())
                    .collect();
                records.sort_by_key(|(pref, _)| *pref);
                let hosts: Vec<String> = records.into_iter().map(|(_, host)| host).collect();

                if hosts.is_empty() {
                    self.implicit_mx(domain).await?
                } else {
                    MxLookup {
                        has_mx: true,
                        hosts,
                        via_implicit_mx: false,
                    }
                }
            }
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => self.implicit_mx(domain).await?,
                _ => {
                    warn!("MX lookup failed for {}: {}", domain, err);
                    return None;
                }
            },
        };

        self.mx_cache.insert(domain.to_string(), result.clone());
        Some(result)
    }

    /// A/AAAA fallback: an address record implicitly designates the domain
    /// as its own mail exchange.
    async fn implicit_mx(&self, domain: &str) -> Option<MxLookup> {
        let has_address = match self.resolver.ipv4_lookup(domain).await {
            Ok(response) => response.iter().next().is_some(),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => false,
                _ => return None,
            },
        };

        let has_address = if has_address {
            true
        } else {
            match self.resolver.ipv6_lookup(domain).await {
                Ok(response) => response.iter().next().is_some(),
                Err(err) => match err.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => false,
                    _ => return None,
                },
            }
        };

        if has_address {
            debug!("implicit MX for {} via A/AAAA", domain);
            Some(MxLookup {
                has_mx: true,
                hosts: vec![domain.to_string()],
                via_implicit_mx: true,
            })
        } else {
            Some(MxLookup {
                has_mx: false,
                hosts: Vec::new(),
                via_implicit_mx: false,
            })
        }
    }

    /// TXT records at a name. `Some(vec![])` means a definitive empty
    /// answer; `None` means the query itself failed.
    pub async fn txt_records(&self, name: &str) -> Option<Vec<String>> {
        match self.resolver.txt_lookup(name).await {
            Ok(response) => {
                let records: Vec<String> = response
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|data| String::from_utf8_lossy(data).to_string())
                            .collect::<Vec<_>>()
                            .concat()
                    })
                    .collect();
                Some(records)
            }
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Some(Vec::new()),
                _ => {
                    debug!("TXT lookup failed for {}: {}", name, err);
                    None
                }
            },
        }
    }

    /// First IPv4 address of a host, for DNSBL queries.
    pub async fn first_ipv4(&self, host: &str) -> Option<Ipv4Addr> {
        match self.resolver.ipv4_lookup(host).await {
            Ok(response) => response.iter().next().map(|a| a.0),
            Err(_) => None,
        }
    }

    /// Query one DNSBL zone for a reversed IPv4. Any successful resolution
    /// means listed; NXDOMAIN means clean; other failures are inconclusive.
    pub async fn dnsbl_listed(&self, ip: Ipv4Addr, zone: &str) -> Option<bool> {
        let octets = ip.octets();
        let query = format!(
            "{}.{}.{}.{}.{}",
            octets[3], octets[2], octets[1], octets[0], zone
        );
        match self.resolver.ipv4_lookup(&query).await {
            Ok(response) => Some(response.iter().next().is_some()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Some(false),
                _ => {
                    debug!("DNSBL query failed for {}: {}", query, err);
                    None
                }
            },
        }
    }

    /// Entries currently held in the MX cache.
    pub fn mx_cache_len(&self) -> usize {
        self.mx_cache.len()
    }

    pub fn sweep_caches(&self) {
        self.mx_cache.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolver_creation_succeeds() {
        let resolver = Resolver::new(&EngineConfig::default());
        assert!(resolver.is_ok());
    }

    #[test]
    fn dnsbl_query_name_reverses_octets() {
        // The query shape is fixed; spot-check the formatting logic inline.
        let ip = Ipv4Addr::new(192, 0, 2, 44);
        let octets = ip.octets();
        let query = format!(
            "{}.{}.{}.{}.{}",
            octets[3], octets[2], octets[1], octets[0], "zen.spamhaus.org"
        );
        assert_eq!(query, "44.2.0.192.zen.spamhaus.org");
    }
}
