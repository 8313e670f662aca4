//! Post-redaction leak check

use super::RedactionSession;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Sensitive-looking pattern still present after redaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualFinding {
    /// Nine digits in SSN grouping
    SsnShaped,
    /// Ten or more consecutive digits
    LongDigitRun,
    /// A bare nine-digit number in a document that mentions routing
    RoutingContext,
}

impl ResidualFinding {
    /// Critical findings block external submission.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::SsnShaped | Self::LongDigitRun)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SsnShaped => "ssn_shaped",
            Self::LongDigitRun => "long_digit_run",
            Self::RoutingContext => "routing_context",
        }
    }
}

fn ssn_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b").unwrap())
}

fn long_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{10,}\b").unwrap())
}

fn nine_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{9}\b").unwrap())
}

/// Scan redacted `text` for patterns that should not have survived.
///
/// Tokens belonging to `session` are blanked first so their embedded
/// session id and sequence digits never count as findings. Each kind is
/// reported at most once.
pub fn scan_residual(text: &str, session: &RedactionSession) -> Vec<ResidualFinding> {
    let masked = session.mask_tokens(text);
    let mut findings = Vec::new();

    if ssn_shape().is_match(&masked) {
        findings.push(ResidualFinding::SsnShaped);
    }
    if long_digits().is_match(&masked) {
        findings.push(ResidualFinding::LongDigitRun);
    }
    if nine_digits().is_match(&masked) && masked.to_lowercase().contains("routing") {
        findings.push(ResidualFinding::RoutingContext);
    }
    findings
}
