//! Evidence fusion: status, confidence and notes
//!
//! A pure function from collected evidence to the final verdict. The status
//! ladder runs first-match-wins; confidence starts from an SMTP baseline,
//! takes signal adjustments and provider floors/ceilings, and is clamped to
//! [0, 97] — the engine never claims certainty.

use crate::{DomainSignals, ProviderChecks, SmtpVerdict, VerifyStatus};

/// Everything the fusion step consumes for one address.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    pub syntax_valid: bool,
    /// `None` means the MX lookup was inconclusive
    pub mx: Option<bool>,
    pub via_implicit_mx: bool,
    pub smtp: Option<SmtpVerdict>,
    /// An `accepted` was downgraded by the server-behavior cache
    pub smtp_downgraded: bool,
    pub providers: ProviderChecks,
    pub signals: DomainSignals,
    pub major_provider: bool,
    pub disposable: bool,
    pub role_account: bool,
    pub looks_human: bool,
    pub pattern_flags: Vec<&'static str>,
    pub bulk_anomaly: bool,
    /// Unique bounce reporters for this address
    pub bounce_reporters: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fusion {
    pub status: VerifyStatus,
    pub confidence: u8,
    pub notes: Vec<String>,
}

const CONFIDENCE_CEILING: i32 = 97;
const INVALID_CONFIDENCE_CAP: i32 = 5;

/// SMTP baseline scores.
const BASE_ACCEPTED: i32 = 85;
const BASE_REJECTED: i32 = 3;
const BASE_CATCH_ALL: i32 = 45;
const BASE_GREYLISTED: i32 = 40;
const BASE_INCONCLUSIVE_MAJOR: i32 = 65;
const BASE_INCONCLUSIVE: i32 = 35;

/// Provider floors and the authority ceiling.
const FLOOR_MICROSOFT: i32 = 93;
const FLOOR_GOOGLE: i32 = 94;
const FLOOR_APPLE: i32 = 93;
const FLOOR_GRAVATAR: i32 = 80;
const FLOOR_GITHUB: i32 = 82;
const FLOOR_PGP: i32 = 80;
const FLOOR_HIBP: i32 = 78;
const CEIL_AUTHORITY_DENIED: i32 = 5;

pub fn fuse(evidence: &Evidence) -> Fusion {
    let mut notes: Vec<String> = Vec::new();

    // Rule 1: syntax gates everything.
    if !evidence.syntax_valid {
        return Fusion {
            status: VerifyStatus::Invalid,
            confidence: 0,
            notes: vec!["Invalid syntax".to_string()],
        };
    }

    let status = status_ladder(evidence, &mut notes);
    let confidence = confidence_score(evidence, status, &mut notes);

    Fusion {
        status,
        confidence,
        notes,
    }
}

/// Rules 2..12 of the status ladder, first match wins. Notes for the
/// deciding signals are appended as they are inspected.
fn status_ladder(evidence: &Evidence, notes: &mut Vec<String>) -> VerifyStatus {
    let smtp = evidence.smtp;
    let providers = &evidence.providers;
    let smtp_inconclusive = matches!(smtp, None | Some(SmtpVerdict::Error));
    let risk_flags = evidence.disposable || evidence.role_account;

    append_signal_notes(evidence, notes);

    match evidence.mx {
        None => return VerifyStatus::Unknown,
        Some(false) => return VerifyStatus::Invalid,
        Some(true) => {}
    }

    if smtp == Some(SmtpVerdict::Rejected) && !providers.any_true() {
        return VerifyStatus::Invalid;
    }
    if providers.any_authority_false() {
        return VerifyStatus::Invalid;
    }
    if providers.any_authority_true() && !risk_flags {
        return VerifyStatus::Valid;
    }
    if matches!(smtp, Some(SmtpVerdict::CatchAll) | Some(SmtpVerdict::Greylisted)) {
        return VerifyStatus::Risky;
    }
    if risk_flags {
        return VerifyStatus::Risky;
    }
    if smtp == Some(SmtpVerdict::Accepted) {
        return VerifyStatus::Valid;
    }
    if providers.gravatar == Some(true)
        || providers.github == Some(true)
        || providers.pgp == Some(true)
        || providers.hibp == Some(true)
    {
        return VerifyStatus::Valid;
    }
    if evidence.major_provider && smtp_inconclusive {
        return VerifyStatus::Valid;
    }
    VerifyStatus::Unknown
}

fn append_signal_notes(evidence: &Evidence, notes: &mut Vec<String>) {
    match evidence.mx {
        None => notes.push("MX lookup was inconclusive".to_string()),
        Some(false) => notes.push("Domain has no MX records".to_string()),
        Some(true) if evidence.via_implicit_mx => {
            notes.push("No MX records; domain itself accepts mail (implicit MX)".to_string());
        }
        Some(true) => {}
    }

    match evidence.smtp {
        Some(SmtpVerdict::Accepted) => {
            notes.push("SMTP server accepted the mailbox".to_string());
        }
        Some(SmtpVerdict::Rejected) => {
            notes.push("SMTP server rejected the mailbox".to_string());
        }
        Some(SmtpVerdict::CatchAll) => {
            if evidence.smtp_downgraded {
                notes.push(
                    "Server historically accepts all probes; treating acceptance as catch-all"
                        .to_string(),
                );
            } else {
                notes.push("Domain accepts any recipient (catch-all)".to_string());
            }
        }
        Some(SmtpVerdict::Greylisted) => {
            notes.push("Greylisted by the receiving server".to_string());
        }
        Some(SmtpVerdict::Error) => {
            notes.push("SMTP check was inconclusive".to_string());
        }
        None => {}
    }

    let providers = &evidence.providers;
    for (result, exists_note, missing_note) in [
        (providers.microsoft, "Microsoft account exists", "No Microsoft account for this address"),
        (providers.google, "Google account exists", "No Google account for this address"),
        (providers.apple, "Apple account exists", "No Apple account for this address"),
    ] {
        match result {
            Some(true) => notes.push(exists_note.to_string()),
            Some(false) => notes.push(missing_note.to_string()),
            None => {}
        }
    }
    if providers.gravatar == Some(true) {
        notes.push("Gravatar profile found".to_string());
    }
    if providers.github == Some(true) {
        notes.push("GitHub account matches this address".to_string());
    }
    if providers.pgp == Some(true) {
        notes.push("Public PGP key published for this address".to_string());
    }
    if providers.hibp == Some(true) {
        notes.push("Address appears in known data breaches".to_string());
    }

    if evidence.disposable {
        notes.push("Disposable email domain".to_string());
    }
    if evidence.role_account {
        notes.push("Role-based address".to_string());
    }
    if evidence.bulk_anomaly {
        notes.push("Deviates from the dominant address pattern in this batch".to_string());
    }
    if evidence.bounce_reporters >= 2 {
        notes.push("Reported as bouncing by multiple independent sources".to_string());
    }
}

fn confidence_score(evidence: &Evidence, status: VerifyStatus, notes: &mut Vec<String>) -> u8 {
    let signals = &evidence.signals;
    let mut score = match evidence.smtp {
        Some(SmtpVerdict::Accepted) => BASE_ACCEPTED,
        Some(SmtpVerdict::Rejected) => BASE_REJECTED,
        Some(SmtpVerdict::CatchAll) => BASE_CATCH_ALL,
        Some(SmtpVerdict::Greylisted) => BASE_GREYLISTED,
        Some(SmtpVerdict::Error) | None => {
            if evidence.major_provider {
                BASE_INCONCLUSIVE_MAJOR
            } else {
                BASE_INCONCLUSIVE
            }
        }
    };

    // Signal adjustments.
    if evidence.via_implicit_mx && score > 50 {
        score -= 15;
    }
    if signals.spf_present == Some(true) && signals.dmarc_present == Some(true) {
        score += 3;
        notes.push("SPF and DMARC are configured".to_string());
    } else if signals.spf_present == Some(false) && signals.dmarc_present == Some(false) {
        score -= 10;
        notes.push("No SPF or DMARC records".to_string());
    }
    if !signals.dkim_selectors.is_empty() {
        notes.push("DKIM is configured".to_string());
    }
    if signals.website_alive == Some(false) {
        score -= 10;
        notes.push("Domain website is unreachable".to_string());
    }
    if signals.is_parked == Some(true) {
        score -= 15;
        notes.push("Domain website looks parked".to_string());
    }
    if signals.blacklisted == Some(true) {
        score -= 20;
        notes.push("Mail host is listed on a DNS blacklist".to_string());
    }
    if matches!(signals.domain_age_days, Some(age) if age < 30) {
        score -= 15;
        notes.push("Domain was registered less than 30 days ago".to_string());
    }
    if !evidence.looks_human {
        score -= 10;
        notes.push("Local part does not look like a personal address".to_string());
    }
    if !evidence.pattern_flags.is_empty() {
        score -= 5;
        for flag in &evidence.pattern_flags {
            notes.push(flag.to_string());
        }
    }
    if evidence.role_account {
        score -= 10;
    }

    // Provider floors, then the authority ceiling, then the risk caps.
    let providers = &evidence.providers;
    if providers.gravatar == Some(true) {
        score = score.max(FLOOR_GRAVATAR);
    }
    if providers.github == Some(true) {
        score = score.max(FLOOR_GITHUB);
    }
    if providers.pgp == Some(true) {
        score = score.max(FLOOR_PGP);
    }
    if providers.hibp == Some(true) {
        score = score.max(FLOOR_HIBP);
    }
    if providers.microsoft == Some(true) {
        score = score.max(FLOOR_MICROSOFT);
    }
    if providers.google == Some(true) {
        score = score.max(FLOOR_GOOGLE);
    }
    if providers.apple == Some(true) {
        score = score.max(FLOOR_APPLE);
    }
    if providers.any_authority_false() {
        score = score.min(CEIL_AUTHORITY_DENIED);
    }
    if evidence.disposable {
        score = score.min(25);
    }
    if status == VerifyStatus::Invalid {
        score = score.min(INVALID_CONFIDENCE_CAP);
    }

    score.clamp(0, CONFIDENCE_CEILING) as u8
}
