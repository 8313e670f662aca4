//! Redaction session: the reversible token map for one document

use super::PiiCategory;
use std::collections::BTreeMap;
use std::ops::Range;

/// Short opaque identifier embedded in every token of a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh 8-character hex identifier
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..8].to_string())
    }

    /// Accept a caller-chosen identifier (ASCII alphanumeric, 1..=32 chars).
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty() && s.len() <= 32 && s.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
struct TokenEntry {
    category: PiiCategory,
    token: String,
    original: String,
}

/// Token map for a single redaction pass.
///
/// Entries are kept in detection order. `Debug` never prints originals.
#[derive(Clone)]
pub struct RedactionSession {
    id: SessionId,
    entries: Vec<TokenEntry>,
}

impl std::fmt::Debug for RedactionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactionSession")
            .field("id", &self.id)
            .field("tokens", &self.entries.len())
            .finish()
    }
}

impl RedactionSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Number of substitutions recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(token, original)` pairs in detection order
    pub fn token_map(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.token.as_str(), e.original.as_str()))
    }

    /// Tokens in detection order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.token.as_str())
    }

    /// Look up the original value behind a token
    pub fn original(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.token == token)
            .map(|e| e.original.as_str())
    }

    /// Substitution counts per category, for audit aggregates
    pub fn category_counts(&self) -> BTreeMap<PiiCategory, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.entries {
            *counts.entry(e.category).or_insert(0) += 1;
        }
        counts
    }

    /// Record a substitution and return its token.
    pub(crate) fn record(&mut self, category: PiiCategory, original: &str) -> String {
        let mut token = format!("[{}-{}-{}]", category.label(), self.id, self.entries.len());
        if category == PiiCategory::Email {
            if let Some((_, domain)) = original.split_once('@') {
                token.push('@');
                token.push_str(domain);
            }
        }
        self.entries.push(TokenEntry {
            category,
            token: token.clone(),
            original: original.to_string(),
        });
        token
    }

    /// Byte ranges in `text` currently occupied by this session's tokens
    pub(crate) fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans: Vec<Range<usize>> = self
            .entries
            .iter()
            .flat_map(|e| {
                text.match_indices(e.token.as_str())
                    .map(|(start, m)| start..start + m.len())
            })
            .collect();
        spans.sort_by_key(|r| r.start);
        spans
    }

    /// Replace every known token in `text` with its original value.
    ///
    /// Tokens from other sessions, or unknown to this one, are left as-is.
    pub fn restore(&self, text: &str) -> String {
        let mut restored = text.to_string();
        for e in self.entries.iter().rev() {
            if restored.contains(e.token.as_str()) {
                restored = restored.replace(e.token.as_str(), &e.original);
            }
        }
        restored
    }

    /// Blank out this session's tokens so follow-up scans ignore them.
    pub(crate) fn mask_tokens(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for e in &self.entries {
            if masked.contains(e.token.as_str()) {
                masked = masked.replace(e.token.as_str(), " ");
            }
        }
        masked
    }
}

pub(crate) fn overlaps(spans: &[Range<usize>], candidate: &Range<usize>) -> bool {
    spans
        .iter()
        .any(|s| s.start < candidate.end && candidate.start < s.end)
}
