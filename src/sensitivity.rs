//! Document sensitivity classification
//!
//! Scores the *original* (pre-redaction) text against two weighted pattern
//! tiers and buckets the total into `HIGH` / `MEDIUM` / `LOW`. Every
//! occurrence counts, so repeated high-risk markers accumulate.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Weight contributed by each high-risk occurrence
pub const HIGH_RISK_WEIGHT: u32 = 10;
/// Weight contributed by each medium-risk occurrence
pub const MEDIUM_RISK_WEIGHT: u32 = 5;
/// Score at or above which a document is `High`
pub const HIGH_THRESHOLD: u32 = 20;
/// Score at or above which a document is `Medium`
pub const MEDIUM_THRESHOLD: u32 = 10;

/// How risky a document's content is to send outside the trust boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensitivityLevel {
    Low,
    Medium,
    High,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    fn from_score(score: u32) -> Self {
        if score >= HIGH_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full scoring breakdown behind a `SensitivityLevel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensitivityAssessment {
    pub level: SensitivityLevel,
    pub score: u32,
    pub high_risk_hits: u32,
    pub medium_risk_hits: u32,
}

fn high_risk_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b",
            r"(?i)\btax\s*return\b",
            r"(?i)\bmedical\b",
            r"(?i)\bconfidential\b",
            r"(?i)\bcredit\s*report\b",
            r"(?i)\brouting\s*number\b",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid sensitivity pattern"))
        .collect()
    })
}

fn medium_risk_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\baccount\s*number\b",
            r"(?i)\bsalary\b",
            r"(?i)\bincome\b",
            r"(?i)\bdeposit\b",
            r"(?i)\bwithdrawal\b",
        ]
        .into_iter()
        .map(|p| Regex::new(p).expect("valid sensitivity pattern"))
        .collect()
    })
}

fn count_hits(patterns: &[Regex], text: &str) -> u32 {
    patterns
        .iter()
        .map(|re| re.find_iter(text).count() as u32)
        .sum()
}

/// Score `text` and return the full breakdown.
pub fn assess_detailed(text: &str) -> SensitivityAssessment {
    let high_risk_hits = count_hits(high_risk_patterns(), text);
    let medium_risk_hits = count_hits(medium_risk_patterns(), text);
    let score = high_risk_hits
        .saturating_mul(HIGH_RISK_WEIGHT)
        .saturating_add(medium_risk_hits.saturating_mul(MEDIUM_RISK_WEIGHT));

    SensitivityAssessment {
        level: SensitivityLevel::from_score(score),
        score,
        high_risk_hits,
        medium_risk_hits,
    }
}

/// Classify `text` into a `SensitivityLevel`.
pub fn assess(text: &str) -> SensitivityLevel {
    assess_detailed(text).level
}
