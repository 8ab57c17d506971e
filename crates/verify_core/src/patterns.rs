//! Local-part pattern analysis
//!
//! Shannon entropy, digit ratio and a short ordered list of business-email
//! shapes decide whether a local part looks like a person or a generator.
//! Batches additionally get per-domain bulk anomaly detection: when one
//! pattern dominates a domain's roster, the outliers are flagged.

use crate::email::ParsedEmail;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Ordered business-email shapes; the first match names the pattern.
static BUSINESS_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("firstname.lastname", r"^[a-z]{2,}\.[a-z]{2,}$"),
        ("f.lastname", r"^[a-z]\.[a-z]{2,}$"),
        ("firstname.l", r"^[a-z]{2,}\.[a-z]$"),
        ("firstname_lastname", r"^[a-z]{2,}_[a-z]{2,}$"),
        ("firstname-lastname", r"^[a-z]{2,}-[a-z]{2,}$"),
        ("firstnameNNN", r"^[a-z]{2,}[0-9]{1,4}$"),
        ("firstname", r"^[a-z]{2,}$"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("static pattern")))
    .collect()
});

pub const FLAG_AUTO_GENERATED: &str = "Local part looks auto-generated";
pub const FLAG_UNUSUALLY_SHORT: &str = "Local part is unusually short";
pub const FLAG_MOSTLY_NUMERIC: &str = "Local part is mostly numeric";

#[derive(Debug, Clone)]
pub struct LocalAnalysis {
    pub entropy: f64,
    pub digit_ratio: f64,
    pub matched_pattern: Option<&'static str>,
    pub flags: Vec<&'static str>,
    pub looks_human: bool,
}

/// Shannon entropy over the character distribution.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in text.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let len = text.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn digit_ratio(text: &str) -> f64 {
    let len = text.chars().count();
    if len == 0 {
        return 0.0;
    }
    let digits = text.chars().filter(char::is_ascii_digit).count();
    digits as f64 / len as f64
}

pub fn match_business_pattern(local: &str) -> Option<&'static str> {
    BUSINESS_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(local))
        .map(|(name, _)| *name)
}

pub fn analyze_local(local: &str) -> LocalAnalysis {
    let entropy = shannon_entropy(local);
    let digit_ratio = digit_ratio(local);
    let len = local.chars().count();
    let matched_pattern = match_business_pattern(local);

    let mut flags = Vec::new();
    if entropy > 3.5 && len > 10 {
        flags.push(FLAG_AUTO_GENERATED);
    }
    if len <= 2 {
        flags.push(FLAG_UNUSUALLY_SHORT);
    }
    if digit_ratio > 0.5 && len > 5 {
        flags.push(FLAG_MOSTLY_NUMERIC);
    }

    let looks_human = matched_pattern.is_some()
        || (entropy < 3.5 && (3..=30).contains(&len) && digit_ratio < 0.4);

    LocalAnalysis {
        entropy,
        digit_ratio,
        matched_pattern,
        flags,
        looks_human,
    }
}

/// Indices of batch entries that deviate from their domain's dominant
/// pattern. A domain group participates once it has three addresses; the
/// dominant pattern must cover at least half the group and at least three
/// locals before outliers are flagged.
pub fn bulk_anomalies(parsed: &[ParsedEmail]) -> HashSet<usize> {
    let mut by_domain: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, email) in parsed.iter().enumerate() {
        if email.is_valid {
            by_domain.entry(email.domain.as_str()).or_default().push(index);
        }
    }

    let mut anomalous = HashSet::new();
    for indices in by_domain.values() {
        if indices.len() < 3 {
            continue;
        }

        let mut pattern_counts: HashMap<&'static str, usize> = HashMap::new();
        let matches: Vec<Option<&'static str>> = indices
            .iter()
            .map(|&index| {
                let matched = match_business_pattern(&parsed[index].local);
                if let Some(name) = matched {
                    *pattern_counts.entry(name).or_default() += 1;
                }
                matched
            })
            .collect();

        // Tie-break by name so the dominant pick is deterministic.
        let Some((&dominant, &count)) = pattern_counts
            .iter()
            .max_by_key(|(&name, &count)| (count, std::cmp::Reverse(name)))
        else {
            continue;
        };
        if count < 3 || count * 2 < indices.len() {
            continue;
        }

        for (&index, matched) in indices.iter().zip(&matches) {
            if *matched != Some(dominant) {
                anomalous.insert(index);
            }
        }
    }
    anomalous
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entropy_of_uniform_string_is_zero() {
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert_eq!(shannon_entropy(""), 0.0);
    }

    #[test]
    fn entropy_grows_with_variety() {
        assert!(shannon_entropy("abcd") > shannon_entropy("aabb"));
        assert!(shannon_entropy("x7k2q9fw3jz8") > 3.0);
    }

    #[test]
    fn business_patterns_match_in_order() {
        assert_eq!(match_business_pattern("john.smith"), Some("firstname.lastname"));
        assert_eq!(match_business_pattern("j.smith"), Some("f.lastname"));
        assert_eq!(match_business_pattern("john.s"), Some("firstname.l"));
        assert_eq!(match_business_pattern("john_smith"), Some("firstname_lastname"));
        assert_eq!(match_business_pattern("john42"), Some("firstnameNNN"));
        assert_eq!(match_business_pattern("john"), Some("firstname"));
        assert_eq!(match_business_pattern("xk7!q"), None);
    }

    #[test]
    fn generated_locals_are_flagged() {
        let analysis = analyze_local("x7k2q9fw3jz8t5m");
        assert!(analysis.flags.contains(&FLAG_AUTO_GENERATED));
        assert!(!analysis.looks_human);
    }

    #[test]
    fn short_and_numeric_locals_are_flagged() {
        assert!(analyze_local("ab").flags.contains(&FLAG_UNUSUALLY_SHORT));
        assert!(analyze_local("12345678").flags.contains(&FLAG_MOSTLY_NUMERIC));
    }

    #[test]
    fn ordinary_names_look_human() {
        let analysis = analyze_local("alice.johnson");
        assert!(analysis.flags.is_empty());
        assert!(analysis.looks_human);
        assert_eq!(analysis.matched_pattern, Some("firstname.lastname"));
    }

    fn batch(addresses: &[&str]) -> Vec<ParsedEmail> {
        addresses.iter().map(|a| ParsedEmail::parse(a)).collect()
    }

    #[test]
    fn dominant_pattern_outlier_is_flagged() {
        let parsed = batch(&[
            "anna.bell@corp.example",
            "carl.doyle@corp.example",
            "erin.fox@corp.example",
            "greg.hill@corp.example",
            "iris.jett@corp.example",
            "xkq192@corp.example",
        ]);
        let anomalies = bulk_anomalies(&parsed);
        assert_eq!(anomalies, HashSet::from([5]));
    }

    #[test]
    fn small_groups_are_ignored() {
        let parsed = batch(&["a.b@x.example", "zz9@x.example"]);
        assert!(bulk_anomalies(&parsed).is_empty());
    }

    #[test]
    fn exactly_half_counts_as_dominant() {
        let parsed = batch(&[
            "anna.bell@corp.example",
            "carl.doyle@corp.example",
            "zed@corp.example",
            "quux77@corp.example",
            "plugh99@corp.example",
            "xyzzy12@corp.example",
        ]);
        // firstnameNNN covers 3 of 6, exactly the 50% bar, so the rest flag
        let anomalies = bulk_anomalies(&parsed);
        assert_eq!(anomalies, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn mixed_real_patterns_still_flag_nondominant() {
        // A local matching a different real pattern is still an outlier
        // against the dominant one.
        let parsed = batch(&[
            "anna.bell@corp.example",
            "carl.doyle@corp.example",
            "erin.fox@corp.example",
            "jill_smith@corp.example",
        ]);
        let anomalies = bulk_anomalies(&parsed);
        assert_eq!(anomalies, HashSet::from([3]));
    }
}
