//! Redaction engine
//!
//! Replaces PII in extracted document text with session-scoped tokens of the
//! form `[<LABEL>-<session>-<seq>]` and keeps the reverse map in a
//! [`RedactionSession`] owned by the caller.
//!
//! Detectors run in a fixed precedence order. Each one scans the output of
//! the previous step and skips any match that overlaps a token this session
//! already emitted, so a value is tokenized at most once.

mod names;
mod residual;
mod session;

pub use residual::{scan_residual, ResidualFinding};
pub use session::{RedactionSession, SessionId};

use regex::Regex;
use serde::{Deserialize, Serialize};
use session::overlaps;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Kinds of personally identifying data the engine knows how to remove.
///
/// Variant order is detection precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    PersonName,
    Ssn,
    AccountNumber,
    RoutingNumber,
    Phone,
    Email,
    Address,
    EinTin,
}

impl PiiCategory {
    /// Every category, in precedence order
    pub const PRECEDENCE: [PiiCategory; 8] = [
        Self::PersonName,
        Self::Ssn,
        Self::AccountNumber,
        Self::RoutingNumber,
        Self::Phone,
        Self::Email,
        Self::Address,
        Self::EinTin,
    ];

    /// Label embedded in tokens
    pub fn label(&self) -> &'static str {
        match self {
            Self::PersonName => "NAME",
            Self::Ssn => "SSN",
            Self::AccountNumber => "ACCT",
            Self::RoutingNumber => "ROUTING",
            Self::Phone => "PHONE",
            Self::Email => "EMAIL",
            Self::Address => "ADDRESS",
            Self::EinTin => "EIN",
        }
    }

    /// Stable snake_case name, used in audit details and config
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonName => "person_name",
            Self::Ssn => "ssn",
            Self::AccountNumber => "account_number",
            Self::RoutingNumber => "routing_number",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Address => "address",
            Self::EinTin => "ein_tin",
        }
    }

    /// Categories that are always redacted, whatever the document type
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            Self::PersonName | Self::Ssn | Self::AccountNumber | Self::RoutingNumber | Self::EinTin
        )
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of enabled categories; iterates in precedence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet(BTreeSet<PiiCategory>);

impl CategorySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        PiiCategory::PRECEDENCE.into_iter().collect()
    }

    /// Names, SSN, account, routing and EIN/TIN
    pub fn mandatory() -> Self {
        PiiCategory::PRECEDENCE
            .into_iter()
            .filter(PiiCategory::is_mandatory)
            .collect()
    }

    pub fn with(mut self, category: PiiCategory) -> Self {
        self.0.insert(category);
        self
    }

    pub fn contains(&self, category: PiiCategory) -> bool {
        self.0.contains(&category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PiiCategory> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PiiCategory> for CategorySet {
    fn from_iter<I: IntoIterator<Item = PiiCategory>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PiiCategory> for CategorySet {
    fn extend<I: IntoIterator<Item = PiiCategory>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

// ─── Patterns ──────────────────────────────────────────────────

fn ssn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b").unwrap())
}

fn card_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,7}\b").unwrap())
}

fn account_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{8,17}\b").unwrap())
}

fn routing_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}[- ]?\d{3}[- ]?\d{3}\b").unwrap())
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\(\d{3}\)|\b\d{3})[ .-]?\d{3}[ .-]?\d{4}\b").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap()
    })
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b\d+[ \t]+(?:[a-z]+[ \t]+){0,4}?(?:street|st|avenue|ave|road|rd|lane|ln|drive|dr|boulevard|blvd|way|court|ct)\b\.?",
        )
        .unwrap()
    })
}

fn ein_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{2}[-\s]?\d{7}\b").unwrap())
}

/// Words that put a line into routing-number context
const ROUTING_CONTEXT: &[&str] = &["routing", "aba", "rtn", "transit"];

/// Minimum digit count for an account or card number
const MIN_ACCOUNT_DIGITS: usize = 8;

// ─── Redactor ──────────────────────────────────────────────────

/// Stateless redaction entry point.
///
/// All per-document state lives in the returned [`RedactionSession`], so a
/// single `Redactor` can be shared across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Redact `text` under a freshly generated session id.
    pub fn redact(&self, text: &str, categories: &CategorySet) -> (String, RedactionSession) {
        self.redact_with_session(text, categories, SessionId::generate())
    }

    /// Redact `text` under a caller-chosen session id.
    ///
    /// Same text, categories and id always yield the same output and tokens.
    pub fn redact_with_session(
        &self,
        text: &str,
        categories: &CategorySet,
        id: SessionId,
    ) -> (String, RedactionSession) {
        let mut session = RedactionSession::new(id);
        let mut current = text.to_string();

        for category in categories.iter() {
            current = match category {
                PiiCategory::PersonName => names::redact_names(&current, &mut session),
                PiiCategory::Ssn => substitute(&current, ssn_regex(), category, &mut session, |_| true),
                PiiCategory::AccountNumber => {
                    let carded = substitute(&current, card_regex(), category, &mut session, has_account_digits);
                    substitute(&carded, account_regex(), category, &mut session, has_account_digits)
                }
                PiiCategory::RoutingNumber => redact_routing(&current, &mut session),
                PiiCategory::Phone => substitute(&current, phone_regex(), category, &mut session, |_| true),
                PiiCategory::Email => substitute(&current, email_regex(), category, &mut session, |_| true),
                PiiCategory::Address => {
                    substitute(&current, address_regex(), category, &mut session, |_| true)
                }
                PiiCategory::EinTin => substitute(&current, ein_regex(), category, &mut session, |_| true),
            };
        }

        tracing::debug!(
            session_id = %session.id(),
            tokens = session.len(),
            "Redaction pass finished"
        );
        (current, session)
    }
}

fn has_account_digits(candidate: &str) -> bool {
    candidate.chars().filter(char::is_ascii_digit).count() >= MIN_ACCOUNT_DIGITS
}

/// Replace accepted, non-overlapping matches of `re` with fresh tokens.
fn substitute(
    text: &str,
    re: &Regex,
    category: PiiCategory,
    session: &mut RedactionSession,
    accept: impl Fn(&str) -> bool,
) -> String {
    let protected = session.token_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in re.find_iter(text) {
        if overlaps(&protected, &m.range()) || !accept(m.as_str()) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&session.record(category, m.as_str()));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

fn redact_routing(text: &str, session: &mut RedactionSession) -> String {
    text.split('\n')
        .map(|line| {
            let lower = line.to_lowercase();
            if ROUTING_CONTEXT.iter().any(|k| lower.contains(k)) {
                substitute(line, routing_regex(), PiiCategory::RoutingNumber, session, |_| true)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
