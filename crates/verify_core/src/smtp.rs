//! SMTP mailbox probing
//!
//! One TCP connection per target host walks the session
//! `banner → EHLO → [STARTTLS → EHLO] → MAIL → RCPT(real) → RCPT(random) → QUIT`.
//! The second RCPT uses a high-entropy nonexistent local part; a server that
//! accepts both recipients is a catch-all. A 4xx on the real recipient means
//! greylisting and earns one retry on the same host after a delay. A 5xx is
//! a rejection only when the reply text matches a known user-unknown phrase,
//! so policy refusals don't masquerade as missing mailboxes.
//!
//! Certificate validation is disabled on STARTTLS: this is a probe, nothing
//! is ever sent.

use crate::behavior::ServerBehaviorCache;
use crate::lists::USER_UNKNOWN_PHRASES;
use crate::{EngineConfig, SmtpProbeOutcome, SmtpVerdict};
use anyhow::{bail, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_native_tls::native_tls;
use tokio_native_tls::TlsStream;
use tracing::{debug, warn};

/// Request-scoped per-host locks. Sessions are serialized on the host
/// actually being contacted, so two domains sharing a backup MX never probe
/// it concurrently.
#[derive(Default)]
pub struct HostLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl HostLocks {
    pub fn lock_for(&self, host: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inner = self.inner.lock().expect("host lock map poisoned");
        Arc::clone(
            inner
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// A parsed SMTP reply, possibly spanning multiple `NNN-` lines.
#[derive(Debug, Clone)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// EHLO capability test against the first token of each reply line.
    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .map(|token| token.eq_ignore_ascii_case(cap))
                .unwrap_or(false)
        })
    }

    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

enum StreamState {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Invalid,
}

/// A line-buffered SMTP connection whose transport can be swapped from
/// plaintext to TLS mid-stream.
struct SmtpConnection {
    state: StreamState,
    buffer: Vec<u8>,
    io_timeout: Duration,
}

impl SmtpConnection {
    async fn connect(host: &str, port: u16, io_timeout: Duration) -> Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect((host, port)))
            .await
            .with_context(|| format!("connect to {host}:{port} timed out"))?
            .with_context(|| format!("connect to {host}:{port} failed"))?;
        Ok(Self {
            state: StreamState::Plain(stream),
            buffer: Vec::new(),
            io_timeout,
        })
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.io_timeout;
        let fut = async {
            match &mut self.state {
                StreamState::Plain(s) => s.write_all(data).await,
                StreamState::Tls(s) => s.write_all(data).await,
                StreamState::Invalid => Err(std::io::Error::other("invalid stream state")),
            }
        };
        timeout(io_timeout, fut)
            .await
            .context("write timed out")?
            .context("write failed")?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<usize> {
        let io_timeout = self.io_timeout;
        let mut buf = [0u8; 512];
        let fut = async {
            match &mut self.state {
                StreamState::Plain(s) => s.read(&mut buf).await,
                StreamState::Tls(s) => s.read(&mut buf).await,
                StreamState::Invalid => Err(std::io::Error::other("invalid stream state")),
            }
        };
        let read = timeout(io_timeout, fut)
            .await
            .context("read timed out")?
            .context("read failed")?;
        if read == 0 {
            bail!("connection closed by peer");
        }
        self.buffer.extend_from_slice(&buf[..read]);
        Ok(read)
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if line.ends_with(b"\n") {
                    line.pop();
                }
                if line.ends_with(b"\r") {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).to_string());
            }
            self.read_chunk().await?;
        }
    }

    /// Read one full reply, consuming `NNN-` continuation lines until the
    /// terminal `NNN ` line.
    async fn read_reply(&mut self) -> Result<SmtpReply> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            let line = self.read_line().await?;
            if line.len() < 3 {
                bail!("malformed reply line: {line}");
            }
            let parsed: u16 = line[..3]
                .parse()
                .with_context(|| format!("bad reply code in: {line}"))?;
            code.get_or_insert(parsed);
            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or("").to_string());
            if is_last {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }

    async fn command(&mut self, cmd: &str) -> Result<SmtpReply> {
        debug!("C: {}", cmd);
        self.write_all(format!("{cmd}\r\n").as_bytes()).await?;
        let reply = self.read_reply().await?;
        debug!("S: {} {}", reply.code, reply.text());
        Ok(reply)
    }

    /// Swap the transport to TLS. The read buffer is reset so the line
    /// framer re-attaches cleanly to the upgraded socket.
    async fn upgrade_tls(&mut self, host: &str) -> Result<()> {
        let mut state = StreamState::Invalid;
        std::mem::swap(&mut self.state, &mut state);
        let plain = match state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(());
            }
            StreamState::Invalid => bail!("invalid stream state"),
        };

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .context("TLS connector build failed")?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls = timeout(self.io_timeout, connector.connect(host, plain))
            .await
            .context("TLS handshake timed out")?
            .context("TLS handshake failed")?;

        self.buffer.clear();
        self.state = StreamState::Tls(Box::new(tls));
        Ok(())
    }

    /// Best-effort QUIT; the verdict is already decided by now.
    async fn quit(&mut self) {
        if self.write_all(b"QUIT\r\n").await.is_ok() {
            let _ = self.read_reply().await;
        }
    }
}

/// 5xx replies count as "mailbox does not exist" only with matching text.
pub fn is_user_unknown(reply_text: &str) -> bool {
    let folded = reply_text.to_lowercase();
    USER_UNKNOWN_PHRASES
        .iter()
        .any(|phrase| folded.contains(phrase))
}

/// High-entropy local part for the second (random) RCPT probe.
fn random_local() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let tag: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("xvrf-{ts}-{tag}-nonexist")
}

pub struct SmtpProber {
    io_timeout: Duration,
    port: u16,
    helo_domain: String,
    mail_from: String,
    greylist_retry: Duration,
    behavior: Arc<ServerBehaviorCache>,
    outbound: Arc<Semaphore>,
}

impl SmtpProber {
    pub fn new(
        config: &EngineConfig,
        behavior: Arc<ServerBehaviorCache>,
        outbound: Arc<Semaphore>,
    ) -> Self {
        Self {
            io_timeout: Duration::from_millis(config.smtp_timeout_ms),
            port: config.smtp_port,
            helo_domain: config.smtp_helo_domain.clone(),
            mail_from: config.smtp_mail_from.clone(),
            greylist_retry: Duration::from_millis(config.smtp_greylist_retry_ms),
            behavior,
            outbound,
        }
    }

    /// Probe the mailbox against up to the first two MX hosts. The first
    /// non-error verdict wins; all error paths converge on an `error`
    /// outcome naming the last host tried. Each attempt holds that host's
    /// lock (fallback hosts included) and one outbound permit.
    pub async fn probe(
        &self,
        email: &str,
        domain: &str,
        hosts: &[String],
        locks: &HostLocks,
    ) -> SmtpProbeOutcome {
        let mut last_host: Option<String> = None;
        for host in hosts.iter().take(2) {
            last_host = Some(host.clone());
            let lock = locks.lock_for(host);
            let _serial = lock.lock().await;
            let _permit = self.outbound.acquire().await.ok();
            let outcome = self.probe_host(host, email, domain).await;
            if outcome.verdict != SmtpVerdict::Error {
                return self.finalize(host, outcome);
            }
            debug!("host {} gave no verdict for {}, trying next", host, email);
        }
        SmtpProbeOutcome::error(last_host)
    }

    /// Downgrade `accepted` against a host with a catch-all history.
    fn finalize(&self, host: &str, mut outcome: SmtpProbeOutcome) -> SmtpProbeOutcome {
        self.behavior.record(host, outcome.verdict);
        if outcome.verdict == SmtpVerdict::Accepted && self.behavior.is_suspected_catch_all(host) {
            outcome.verdict = SmtpVerdict::CatchAll;
            outcome.suspected_catch_all = true;
        }
        outcome
    }

    /// One host: run the session, with a single delayed retry on greylist.
    async fn probe_host(&self, host: &str, email: &str, domain: &str) -> SmtpProbeOutcome {
        let first = match self.run_session(host, email, domain).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("SMTP session with {} failed: {:#}", host, err);
                return SmtpProbeOutcome::error(Some(host.to_string()));
            }
        };

        if first.verdict != SmtpVerdict::Greylisted {
            return first;
        }

        debug!("greylisted by {}, retrying after {:?}", host, self.greylist_retry);
        tokio::time::sleep(self.greylist_retry).await;
        match self.run_session(host, email, domain).await {
            Ok(retry) if retry.verdict != SmtpVerdict::Error => retry,
            _ => first,
        }
    }

    async fn run_session(
        &self,
        host: &str,
        email: &str,
        domain: &str,
    ) -> Result<SmtpProbeOutcome> {
        let mut conn = SmtpConnection::connect(host, self.port, self.io_timeout).await?;

        let banner = conn.read_reply().await?;
        if banner.code != 220 {
            bail!("unexpected banner {} from {}", banner.code, host);
        }
        let banner_text = banner.text();

        let ehlo = conn.command(&format!("EHLO {}", self.helo_domain)).await?;
        if !ehlo.is_positive() {
            bail!("EHLO refused with {}", ehlo.code);
        }

        if ehlo.has_capability("STARTTLS") {
            let reply = conn.command("STARTTLS").await?;
            if reply.is_positive() {
                conn.upgrade_tls(host).await?;
                let ehlo_tls = conn.command(&format!("EHLO {}", self.helo_domain)).await?;
                if !ehlo_tls.is_positive() {
                    bail!("EHLO over TLS refused with {}", ehlo_tls.code);
                }
            }
            // refusal mid-session falls through to plaintext MAIL
        }

        let mail = conn
            .command(&format!("MAIL FROM:<{}>", self.mail_from))
            .await?;
        if !mail.is_positive() {
            bail!("MAIL FROM refused with {}", mail.code);
        }

        let started = Instant::now();
        let real = conn.command(&format!("RCPT TO:<{email}>")).await?;
        let real_latency = started.elapsed().as_millis() as u64;

        let mut outcome = SmtpProbeOutcome {
            verdict: SmtpVerdict::Error,
            code: Some(real.code),
            banner: Some(banner_text),
            host: Some(host.to_string()),
            real_latency_ms: Some(real_latency),
            random_latency_ms: None,
            suspected_catch_all: false,
        };

        if real.is_positive() {
            let probe_addr = format!("{}@{}", random_local(), domain);
            let started = Instant::now();
            let random = conn.command(&format!("RCPT TO:<{probe_addr}>")).await?;
            outcome.random_latency_ms = Some(started.elapsed().as_millis() as u64);
            outcome.verdict = if random.is_positive() {
                SmtpVerdict::CatchAll
            } else {
                SmtpVerdict::Accepted
            };
        } else if real.is_transient() {
            outcome.verdict = SmtpVerdict::Greylisted;
        } else if real.is_permanent() {
            outcome.verdict = if is_user_unknown(&real.text()) {
                SmtpVerdict::Rejected
            } else {
                SmtpVerdict::Error
            };
        } else {
            bail!("unexpected RCPT reply {}", real.code);
        }

        conn.quit().await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Scripted mock server: maps command prefixes to canned replies.
    async fn spawn_mock(script: Vec<(&'static str, &'static str)>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    write_half.write_all(b"220 mock ESMTP ready\r\n").await.ok();
                    let mut line = String::new();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            break;
                        }
                        let upper = line.to_uppercase();
                        if upper.starts_with("QUIT") {
                            write_half.write_all(b"221 bye\r\n").await.ok();
                            break;
                        }
                        let reply = script
                            .iter()
                            .find(|(prefix, _)| upper.starts_with(prefix))
                            .map(|(_, reply)| *reply)
                            .unwrap_or("250 ok\r\n");
                        write_half.write_all(reply.as_bytes()).await.ok();
                    }
                });
            }
        });
        port
    }

    fn prober(port: u16) -> SmtpProber {
        let config = EngineConfig {
            smtp_port: port,
            smtp_timeout_ms: 2_000,
            smtp_greylist_retry_ms: 10,
            ..EngineConfig::default()
        };
        SmtpProber::new(
            &config,
            Arc::new(ServerBehaviorCache::new()),
            Arc::new(Semaphore::new(20)),
        )
    }

    #[tokio::test]
    async fn accepted_when_real_ok_and_random_refused() {
        let port = spawn_mock(vec![
            ("EHLO", "250-mock\r\n250 SIZE 1000000\r\n"),
            ("MAIL", "250 ok\r\n"),
            ("RCPT TO:<ALICE", "250 ok\r\n"),
            ("RCPT TO:<XVRF", "550 5.1.1 no such user\r\n"),
        ])
        .await;
        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Accepted);
        assert_eq!(outcome.code, Some(250));
        assert!(outcome.real_latency_ms.is_some());
        assert!(outcome.random_latency_ms.is_some());
    }

    #[tokio::test]
    async fn catch_all_when_both_rcpts_accepted() {
        let port = spawn_mock(vec![
            ("EHLO", "250 mock\r\n"),
            ("MAIL", "250 ok\r\n"),
            ("RCPT", "250 ok\r\n"),
        ])
        .await;
        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::CatchAll);
    }

    #[tokio::test]
    async fn rejected_only_with_user_unknown_text() {
        let port = spawn_mock(vec![
            ("EHLO", "250 mock\r\n"),
            ("MAIL", "250 ok\r\n"),
            ("RCPT TO:<ALICE", "550 5.1.1 user unknown\r\n"),
        ])
        .await;
        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Rejected);
        assert_eq!(outcome.code, Some(550));
    }

    #[tokio::test]
    async fn policy_rejection_is_an_error_not_rejected() {
        let port = spawn_mock(vec![
            ("EHLO", "250 mock\r\n"),
            ("MAIL", "250 ok\r\n"),
            ("RCPT TO:<ALICE", "554 5.7.1 relay access denied by policy\r\n"),
        ])
        .await;
        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Error);
    }

    #[tokio::test]
    async fn greylist_retries_once_and_takes_second_verdict() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let attempt = CALLS.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    write_half.write_all(b"220 mock\r\n").await.ok();
                    let mut line = String::new();
                    let mut real_seen = false;
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            break;
                        }
                        let upper = line.to_uppercase();
                        let reply: &[u8] = if upper.starts_with("QUIT") {
                            write_half.write_all(b"221 bye\r\n").await.ok();
                            break;
                        } else if upper.starts_with("RCPT TO:<ALICE") {
                            real_seen = true;
                            if attempt == 0 {
                                b"451 4.7.1 greylisted, try again later\r\n"
                            } else {
                                b"250 ok\r\n"
                            }
                        } else if upper.starts_with("RCPT") && real_seen {
                            b"550 no such user\r\n"
                        } else {
                            b"250 mock\r\n"
                        };
                        write_half.write_all(reply).await.ok();
                    }
                });
            }
        });

        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Accepted);
        assert!(CALLS.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn multi_line_replies_are_joined() {
        let port = spawn_mock(vec![
            ("EHLO", "250-mock greets you\r\n250-PIPELINING\r\n250 HELP\r\n"),
            ("MAIL", "250 ok\r\n"),
            ("RCPT TO:<ALICE", "250 ok\r\n"),
            ("RCPT TO:<XVRF", "550 no such user\r\n"),
        ])
        .await;
        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Accepted);
    }

    #[tokio::test]
    async fn unreachable_host_converges_on_error() {
        // Port from an immediately-dropped listener: nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = prober(port)
            .probe(
                "alice@example.com",
                "example.com",
                &["127.0.0.1".into()],
                &HostLocks::default(),
            )
            .await;
        assert_eq!(outcome.verdict, SmtpVerdict::Error);
        assert_eq!(outcome.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn host_locks_hand_out_shared_mutexes() {
        let locks = HostLocks::default();
        let first = locks.lock_for("mx.example.com");
        let second = locks.lock_for("mx.example.com");
        let other = locks.lock_for("mx2.example.com");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn fallback_host_sessions_are_serialized() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Live "backup MX" on a loopback alias; it counts overlapping
        // sessions. Each reply is delayed so unserialized probes would
        // visibly overlap.
        let live = TcpListener::bind("127.0.0.2:0").await.unwrap();
        let port = live.local_addr().unwrap().port();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                while let Ok((stream, _)) = live.accept().await {
                    let active = Arc::clone(&active);
                    let peak = Arc::clone(&peak);
                    tokio::spawn(async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let (read_half, mut write_half) = stream.into_split();
                        let mut reader = BufReader::new(read_half);
                        write_half.write_all(b"220 backup\r\n").await.ok();
                        let mut line = String::new();
                        loop {
                            line.clear();
                            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                                break;
                            }
                            let upper = line.to_uppercase();
                            let reply: &[u8] = if upper.starts_with("QUIT") {
                                // Count the session over before releasing the
                                // client, or the next session races the drop.
                                active.fetch_sub(1, Ordering::SeqCst);
                                write_half.write_all(b"221 bye\r\n").await.ok();
                                break;
                            } else if upper.starts_with("RCPT TO:<XVRF") {
                                b"550 no such user\r\n"
                            } else {
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                b"250 ok\r\n"
                            };
                            write_half.write_all(reply).await.ok();
                        }
                    });
                }
            });
        }

        // Nothing listens on the primary host, so both probes fall back to
        // the shared backup.
        let hosts: Vec<String> = vec!["127.0.0.3".into(), "127.0.0.2".into()];
        let prober = Arc::new(prober(port));
        let locks = Arc::new(HostLocks::default());

        let probes = ["alice@one.example", "bob@two.example"].map(|email| {
            let prober = Arc::clone(&prober);
            let locks = Arc::clone(&locks);
            let hosts = hosts.clone();
            let domain = email.split('@').nth(1).unwrap().to_string();
            tokio::spawn(async move { prober.probe(email, &domain, &hosts, &locks).await })
        });
        for handle in probes {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.verdict, SmtpVerdict::Accepted);
            assert_eq!(outcome.host.as_deref(), Some("127.0.0.2"));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn user_unknown_phrases_match() {
        assert!(is_user_unknown("5.1.1 User Unknown"));
        assert!(is_user_unknown("Recipient rejected: mailbox not found"));
        assert!(!is_user_unknown("5.7.1 relay access denied"));
        assert!(!is_user_unknown("spam policy violation"));
    }

    #[test]
    fn random_local_is_high_entropy() {
        let a = random_local();
        let b = random_local();
        assert!(a.starts_with("xvrf-"));
        assert!(a.ends_with("-nonexist"));
        assert_ne!(a, b);
    }
}
