//! Crowd-sourced bounce reports
//!
//! Addresses are stored only as SHA-256 hashes of their lowercased form,
//! together with the set of reporting IPs. An address reported by at least
//! two distinct IPs feeds a note into the fusion step. Entries idle for
//! thirty days are evicted.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const IDLE_EVICTION: Duration = Duration::from_secs(30 * 24 * 3_600);

/// Reporters needed before the signal counts.
pub const MIN_UNIQUE_REPORTERS: u32 = 2;

struct ReportEntry {
    reporters: HashSet<String>,
    last_seen: Instant,
}

#[derive(Default)]
pub struct BounceReports {
    entries: Mutex<HashMap<String, ReportEntry>>,
}

impl BounceReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one report of a bounced address from a reporting IP.
    pub fn report(&self, email: &str, reporter_ip: &str) {
        let key = hash_email(email);
        let mut entries = self.entries.lock().expect("bounce lock poisoned");
        let entry = entries.entry(key).or_insert_with(|| ReportEntry {
            reporters: HashSet::new(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        if entry.reporters.insert(reporter_ip.to_string()) {
            debug!("bounce report recorded ({} unique reporters)", entry.reporters.len());
        }
    }

    /// Distinct reporters seen for an address.
    pub fn unique_reporters(&self, email: &str) -> u32 {
        let key = hash_email(email);
        let entries = self.entries.lock().expect("bounce lock poisoned");
        entries
            .get(&key)
            .map(|entry| entry.reporters.len() as u32)
            .unwrap_or(0)
    }

    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("bounce lock poisoned");
        entries.retain(|_, entry| now.duration_since(entry.last_seen) < IDLE_EVICTION);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("bounce lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SHA-256 of the lowercased, trimmed address; the raw address is never kept.
fn hash_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reports_accumulate_unique_reporters() {
        let reports = BounceReports::new();
        reports.report("user@example.com", "192.0.2.1");
        reports.report("user@example.com", "192.0.2.1");
        assert_eq!(reports.unique_reporters("user@example.com"), 1);

        reports.report("user@example.com", "192.0.2.2");
        assert_eq!(reports.unique_reporters("user@example.com"), 2);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let reports = BounceReports::new();
        reports.report("User@Example.COM", "192.0.2.1");
        assert_eq!(reports.unique_reporters("user@example.com"), 1);
    }

    #[test]
    fn unreported_addresses_have_no_reporters() {
        let reports = BounceReports::new();
        assert_eq!(reports.unique_reporters("nobody@example.com"), 0);
    }

    #[test]
    fn hash_is_stable_and_not_the_address() {
        let hash = hash_email("user@example.com");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, "user@example.com");
        assert_eq!(hash, hash_email("  USER@example.com  "));
    }
}
