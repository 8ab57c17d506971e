//! Multi-layer admission control
//!
//! Four independent gates checked in order, failing fast with a specific
//! reason: a per-identity RPM bucket with exponential backoff for repeat
//! violators, the batch-size cap, per-identity and global daily email
//! quotas with atomic reserve-then-proceed semantics, and a per-identity
//! concurrency permit that refuses immediately rather than queueing.
//!
//! Identity is the agent UID when an authenticated agent is present, else
//! the client IP. Agents get the higher threshold set.

use chrono::{NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

const RPM_WINDOW: Duration = Duration::from_secs(60);
const MAX_BACKOFF: Duration = Duration::from_secs(3_600);
const IDLE_EVICTION: Duration = Duration::from_secs(24 * 3_600);

/// Thresholds for every admission layer. All settable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum addresses in a single request
    pub max_batch_size: usize,
    pub ip_rpm: u32,
    pub ip_daily_emails: u64,
    pub ip_max_concurrent: usize,
    pub agent_rpm: u32,
    pub agent_daily_emails: u64,
    pub agent_max_concurrent: usize,
    /// Ceiling across all identities
    pub global_daily_emails: u64,
    /// Separate small limiter for the bounce-report endpoint
    pub bounce_rpm: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            ip_rpm: 10,
            ip_daily_emails: 1_000,
            ip_max_concurrent: 2,
            agent_rpm: 60,
            agent_daily_emails: 20_000,
            agent_max_concurrent: 5,
            global_daily_emails: 200_000,
            bounce_rpm: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Agent,
    Ip,
}

/// Who is asking: an authenticated agent UID or a client IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub kind: IdentityKind,
    pub key: String,
}

impl Identity {
    pub fn agent(uid: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Agent,
            key: uid.into(),
        }
    }

    pub fn ip(addr: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Ip,
            key: addr.into(),
        }
    }
}

/// Why a request was refused at admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded; retry after {retry_after:?}")]
    RpmExceeded { retry_after: Duration },
    #[error("batch exceeds the maximum of {max} addresses")]
    BatchTooLarge { max: usize },
    #[error("daily email quota exhausted; retry after {retry_after:?}")]
    DailyExhausted { retry_after: Duration },
    #[error("global daily capacity reached")]
    GlobalExhausted,
    #[error("too many concurrent requests for this identity")]
    TooManyConcurrent,
}

/// A granted admission: how many addresses were reserved and the held
/// concurrency permit. Dropping the permit releases the slot, so release
/// is tied to scope exit.
#[derive(Debug)]
pub struct Admission {
    pub granted: usize,
    _permit: OwnedSemaphorePermit,
}

/// Today's consumption for the usage endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub emails_verified: u64,
    pub requests: u64,
    pub daily_limit: u64,
    pub remaining: u64,
}

struct IdentityState {
    window_start: Instant,
    window_count: u32,
    violations: u32,
    day: NaiveDate,
    day_used: u64,
    day_requests: u64,
    semaphore: Arc<Semaphore>,
    last_seen: Instant,
}

impl IdentityState {
    fn new(max_concurrent: usize) -> Self {
        Self {
            window_start: Instant::now(),
            window_count: 0,
            violations: 0,
            day: Utc::now().date_naive(),
            day_used: 0,
            day_requests: 0,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            last_seen: Instant::now(),
        }
    }

    /// Roll the daily bucket at UTC midnight; violations reset with it.
    fn roll_day(&mut self, today: NaiveDate) {
        if self.day != today {
            self.day = today;
            self.day_used = 0;
            self.day_requests = 0;
            self.violations = 0;
        }
    }
}

struct GlobalState {
    day: NaiveDate,
    used: u64,
}

struct BounceWindow {
    window_start: Instant,
    count: u32,
}

pub struct RateGates {
    config: LimitsConfig,
    identities: Mutex<HashMap<Identity, IdentityState>>,
    global: Mutex<GlobalState>,
    bounce: Mutex<HashMap<String, BounceWindow>>,
}

impl RateGates {
    pub fn new(config: LimitsConfig) -> Self {
        Self {
            config,
            identities: Mutex::new(HashMap::new()),
            global: Mutex::new(GlobalState {
                day: Utc::now().date_naive(),
                used: 0,
            }),
            bounce: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LimitsConfig {
        &self.config
    }

    fn rpm_limit(&self, kind: IdentityKind) -> u32 {
        match kind {
            IdentityKind::Agent => self.config.agent_rpm,
            IdentityKind::Ip => self.config.ip_rpm,
        }
    }

    fn daily_limit(&self, kind: IdentityKind) -> u64 {
        match kind {
            IdentityKind::Agent => self.config.agent_daily_emails,
            IdentityKind::Ip => self.config.ip_daily_emails,
        }
    }

    fn max_concurrent(&self, kind: IdentityKind) -> usize {
        match kind {
            IdentityKind::Agent => self.config.agent_max_concurrent,
            IdentityKind::Ip => self.config.ip_max_concurrent,
        }
    }

    /// Run every admission layer in order. On success the returned
    /// `Admission` carries the reserved address count (excess beyond the
    /// daily remainder is silently dropped from the batch) and holds the
    /// concurrency permit for the identity.
    pub fn admit(
        &self,
        identity: &Identity,
        requested: usize,
    ) -> Result<Admission, AdmissionError> {
        let today = Utc::now().date_naive();
        let now = Instant::now();

        let mut identities = self.identities.lock().expect("rate lock poisoned");
        let state = identities
            .entry(identity.clone())
            .or_insert_with(|| IdentityState::new(self.max_concurrent(identity.kind)));
        state.last_seen = now;
        state.roll_day(today);

        // Layer 1: per-identity RPM with violation backoff.
        if now.duration_since(state.window_start) >= RPM_WINDOW {
            state.window_start = now;
            state.window_count = 0;
        }
        if state.window_count >= self.rpm_limit(identity.kind) {
            state.violations += 1;
            let retry_after = backoff(state.violations);
            warn!(
                "RPM exceeded for {:?} (violation #{}, retry in {:?})",
                identity.key, state.violations, retry_after
            );
            return Err(AdmissionError::RpmExceeded { retry_after });
        }
        state.window_count += 1;

        // Layer 2: batch size cap.
        if requested > self.config.max_batch_size {
            return Err(AdmissionError::BatchTooLarge {
                max: self.config.max_batch_size,
            });
        }

        // Layer 3: per-identity daily quota, reserve-then-proceed.
        let daily_limit = self.daily_limit(identity.kind);
        let remaining = daily_limit.saturating_sub(state.day_used);
        if remaining == 0 {
            return Err(AdmissionError::DailyExhausted {
                retry_after: until_utc_midnight(),
            });
        }
        let granted = (requested as u64).min(remaining);
        state.day_used += granted;
        state.day_requests += 1;

        // Layer 4: global daily ceiling. On overflow the per-identity
        // reservation is returned before refusing.
        {
            let mut global = self.global.lock().expect("global lock poisoned");
            if global.day != today {
                global.day = today;
                global.used = 0;
            }
            if global.used + granted > self.config.global_daily_emails {
                state.day_used -= granted;
                state.day_requests -= 1;
                return Err(AdmissionError::GlobalExhausted);
            }
            global.used += granted;
        }

        // Layer 5: concurrency permit, no queueing.
        let semaphore = Arc::clone(&state.semaphore);
        drop(identities);
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.unreserve(identity, granted);
                return Err(AdmissionError::TooManyConcurrent);
            }
        };

        debug!(
            "admitted {:?}: granted {} of {} requested",
            identity.key, granted, requested
        );
        Ok(Admission {
            granted: granted as usize,
            _permit: permit,
        })
    }

    fn unreserve(&self, identity: &Identity, granted: u64) {
        let mut identities = self.identities.lock().expect("rate lock poisoned");
        if let Some(state) = identities.get_mut(identity) {
            state.day_used = state.day_used.saturating_sub(granted);
            state.day_requests = state.day_requests.saturating_sub(1);
        }
        let mut global = self.global.lock().expect("global lock poisoned");
        global.used = global.used.saturating_sub(granted);
    }

    /// Today's consumption for an identity.
    pub fn usage(&self, identity: &Identity) -> Usage {
        let daily_limit = self.daily_limit(identity.kind);
        let mut identities = self.identities.lock().expect("rate lock poisoned");
        let today = Utc::now().date_naive();
        match identities.get_mut(identity) {
            Some(state) => {
                state.roll_day(today);
                Usage {
                    emails_verified: state.day_used,
                    requests: state.day_requests,
                    daily_limit,
                    remaining: daily_limit.saturating_sub(state.day_used),
                }
            }
            None => Usage {
                emails_verified: 0,
                requests: 0,
                daily_limit,
                remaining: daily_limit,
            },
        }
    }

    /// Small fixed-window limiter for the bounce-report endpoint.
    pub fn check_bounce(&self, ip: &str) -> Result<(), AdmissionError> {
        let now = Instant::now();
        let mut windows = self.bounce.lock().expect("bounce lock poisoned");
        let window = windows.entry(ip.to_string()).or_insert(BounceWindow {
            window_start: now,
            count: 0,
        });
        if now.duration_since(window.window_start) >= RPM_WINDOW {
            window.window_start = now;
            window.count = 0;
        }
        if window.count >= self.config.bounce_rpm {
            let elapsed = now.duration_since(window.window_start);
            return Err(AdmissionError::RpmExceeded {
                retry_after: RPM_WINDOW.saturating_sub(elapsed),
            });
        }
        window.count += 1;
        Ok(())
    }

    /// Evict idle identity buckets and stale bounce windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        {
            let mut identities = self.identities.lock().expect("rate lock poisoned");
            identities.retain(|_, state| {
                now.duration_since(state.last_seen) < IDLE_EVICTION
                    || Arc::strong_count(&state.semaphore) > 1
            });
        }
        let mut windows = self.bounce.lock().expect("bounce lock poisoned");
        windows.retain(|_, window| now.duration_since(window.window_start) < RPM_WINDOW);
    }

    pub fn tracked_identities(&self) -> usize {
        self.identities.lock().expect("rate lock poisoned").len()
    }
}

/// `min(60s · 2^(violations−1), 3600s)`
fn backoff(violations: u32) -> Duration {
    let exponent = violations.saturating_sub(1).min(6);
    let secs = 60u64 << exponent;
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

fn until_utc_midnight() -> Duration {
    let now = Utc::now();
    let tomorrow = now.date_naive() + TimeDelta::days(1);
    let midnight = tomorrow.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();
    (midnight - now).to_std().unwrap_or(Duration::ZERO)
}
