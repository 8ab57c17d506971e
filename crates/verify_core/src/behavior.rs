//! Per-MX-host behavior statistics
//!
//! Rolling counters of probe outcomes per mail host. A host that has
//! accepted (or caught) more than 90% of at least ten probes is treated as a
//! suspected catch-all, and later `accepted` verdicts against it are
//! downgraded. Entries idle for seven days are evicted.

use crate::SmtpVerdict;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const MIN_PROBES_FOR_SIGNAL: u64 = 10;
const CATCH_ALL_ACCEPT_RATE: f64 = 0.9;
const IDLE_EVICTION: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, Default)]
struct HostStats {
    total: u64,
    accepted: u64,
    rejected: u64,
    catch_all: u64,
}

struct HostEntry {
    stats: HostStats,
    last_seen: Instant,
}

#[derive(Default)]
pub struct ServerBehaviorCache {
    hosts: Mutex<HashMap<String, HostEntry>>,
}

impl ServerBehaviorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one probe outcome against a host. Error verdicts are not
    /// counted; they say nothing about the host's accept behavior.
    pub fn record(&self, host: &str, verdict: SmtpVerdict) {
        let mut hosts = self.hosts.lock().expect("behavior lock poisoned");
        let entry = hosts.entry(host.to_string()).or_insert_with(|| HostEntry {
            stats: HostStats::default(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        match verdict {
            SmtpVerdict::Accepted => {
                entry.stats.total += 1;
                entry.stats.accepted += 1;
            }
            SmtpVerdict::Rejected => {
                entry.stats.total += 1;
                entry.stats.rejected += 1;
            }
            SmtpVerdict::CatchAll => {
                entry.stats.total += 1;
                entry.stats.catch_all += 1;
            }
            SmtpVerdict::Greylisted | SmtpVerdict::Error => {}
        }
    }

    /// True when the host's history says it accepts essentially everything.
    pub fn is_suspected_catch_all(&self, host: &str) -> bool {
        let hosts = self.hosts.lock().expect("behavior lock poisoned");
        let Some(entry) = hosts.get(host) else {
            return false;
        };
        if entry.stats.total < MIN_PROBES_FOR_SIGNAL {
            return false;
        }
        let accept_rate =
            (entry.stats.accepted + entry.stats.catch_all) as f64 / entry.stats.total as f64;
        if accept_rate > CATCH_ALL_ACCEPT_RATE {
            debug!(
                "host {} suspected catch-all (accept rate {:.2} over {} probes)",
                host, accept_rate, entry.stats.total
            );
            true
        } else {
            false
        }
    }

    /// Evict entries idle past the retention window.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut hosts = self.hosts.lock().expect("behavior lock poisoned");
        hosts.retain(|_, entry| now.duration_since(entry.last_seen) < IDLE_EVICTION);
    }

    pub fn len(&self) -> usize {
        self.hosts.lock().expect("behavior lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
