//! Tamper detection
//!
//! Two independent signals feed a [`TamperReport`]:
//!
//! - **Metadata**: creation and modification timestamps that differ.
//! - **Page fingerprints**: per-page hashes of extracted text and of the raw
//!   content stream. Two pages with the same text but different drawing
//!   content suggest an overlay or a swapped page.
//!
//! Detection never fails. Page access errors are recorded in the report's
//! `object_summary.error` and the metadata verdict stands.

use crate::error::Result;
use crate::types::short_digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default cap on fingerprinted pages
pub const DEFAULT_MAX_PAGES: usize = 50;

const CREATION_KEYS: &[&str] = &["creationDate", "CreationDate", "creation_date"];
const MODIFICATION_KEYS: &[&str] = &["modDate", "ModDate", "modification_date"];

// ─── Inputs ────────────────────────────────────────────────────

/// Document-level metadata as reported by the PDF reader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PdfMetadata(BTreeMap<String, String>);

impl PdfMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }

    pub fn creation_date(&self) -> Option<&str> {
        self.first_of(CREATION_KEYS)
    }

    pub fn modification_date(&self) -> Option<&str> {
        self.first_of(MODIFICATION_KEYS)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PdfMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Page media box in PDF points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Raw material for one page's fingerprint
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub text: String,
    pub content_stream: Vec<u8>,
    pub image_count: u32,
    pub xobject_count: u32,
    pub page_size: PageSize,
}

/// Accessor for page-level content.
///
/// Implemented over whatever PDF reader the caller uses. Errors are reported
/// as [`DocGuardError::Document`](crate::DocGuardError::Document).
pub trait PageSource: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> Result<usize>;

    /// Content of the page at zero-based `index`
    fn page(&self, index: usize) -> Result<PageContent>;

    fn is_encrypted(&self) -> bool {
        false
    }

    /// Whether the reader had to repair the cross-reference table on open
    fn was_repaired(&self) -> bool {
        false
    }
}

/// `PageSource` over pages already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPages {
    pages: Vec<PageContent>,
    encrypted: bool,
    repaired: bool,
}

impl InMemoryPages {
    pub fn new(pages: Vec<PageContent>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn repaired(mut self, repaired: bool) -> Self {
        self.repaired = repaired;
        self
    }
}

impl PageSource for InMemoryPages {
    fn page_count(&self) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn page(&self, index: usize) -> Result<PageContent> {
        self.pages.get(index).cloned().ok_or_else(|| {
            crate::DocGuardError::Document(format!("page index {} out of range", index))
        })
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn was_repaired(&self) -> bool {
        self.repaired
    }
}

// ─── Report ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperSeverity {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFingerprint {
    /// 1-based
    pub page_number: usize,
    pub text_hash: String,
    pub content_hash: String,
    pub image_count: u32,
    pub xobject_count: u32,
    pub content_byte_length: usize,
    pub page_size: PageSize,
}

impl PageFingerprint {
    fn of(page_number: usize, page: &PageContent) -> Self {
        Self {
            page_number,
            text_hash: short_digest(page.text.trim().as_bytes()),
            content_hash: short_digest(&page.content_stream),
            image_count: page.image_count,
            xobject_count: page.xobject_count,
            content_byte_length: page.content_stream.len(),
            page_size: page.page_size,
        }
    }
}

/// Aggregate counts over the fingerprinted pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub pages_total: usize,
    pub pages_scanned: usize,
    pub total_images: u64,
    pub total_xobjects: u64,
    pub total_content_bytes: u64,
    pub encrypted: bool,
    pub repaired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperReport {
    /// `None` only while detection is in progress
    pub tampering_suspected: Option<bool>,
    pub severity: TamperSeverity,
    pub notes: Vec<String>,
    pub metadata_check: String,
    pub page_fingerprints: Vec<PageFingerprint>,
    pub object_summary: ObjectSummary,
}

impl Default for TamperReport {
    fn default() -> Self {
        Self {
            tampering_suspected: None,
            severity: TamperSeverity::Low,
            notes: Vec::new(),
            metadata_check: NO_METADATA.to_string(),
            page_fingerprints: Vec::new(),
            object_summary: ObjectSummary::default(),
        }
    }
}

const NO_METADATA: &str = "No modification metadata found.";

impl TamperReport {
    /// Whether tampering was flagged; unresolved counts as not flagged.
    pub fn is_suspected(&self) -> bool {
        self.tampering_suspected.unwrap_or(false)
    }

    fn flag(&mut self, severity: TamperSeverity) {
        self.tampering_suspected = Some(true);
        self.escalate(severity);
    }

    /// Raise severity; never lowers it.
    fn escalate(&mut self, severity: TamperSeverity) {
        self.severity = self.severity.max(severity);
    }

    fn resolve(mut self) -> Self {
        if self.tampering_suspected.is_none() {
            self.tampering_suspected = Some(false);
        }
        self
    }
}

// ─── Detector ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TamperDetector {
    max_pages: usize,
}

impl Default for TamperDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

impl TamperDetector {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    /// Check metadata and, when available, page content.
    ///
    /// The returned report is always resolved.
    pub fn detect(&self, metadata: &PdfMetadata, pages: Option<&dyn PageSource>) -> TamperReport {
        let mut report = TamperReport::default();
        let metadata_flagged = check_metadata(metadata, &mut report);

        if let Some(source) = pages {
            match self.fingerprint(source, &mut report) {
                Ok(()) => {
                    let pairs = cross_page_pairs(&report.page_fingerprints);
                    for (a, b) in &pairs {
                        report.notes.push(format!(
                            "Pages {} and {} have identical text but different content streams",
                            a, b
                        ));
                    }
                    if !pairs.is_empty() {
                        report.flag(TamperSeverity::Medium);
                        if metadata_flagged || pairs.len() > 1 {
                            report.escalate(TamperSeverity::High);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Page inspection failed");
                    report.notes.push(format!("Page inspection failed: {}", e));
                    report.object_summary.error = Some(e.to_string());
                }
            }
        }

        let report = report.resolve();
        tracing::debug!(
            suspected = report.is_suspected(),
            severity = ?report.severity,
            pages_scanned = report.object_summary.pages_scanned,
            "Tamper check finished"
        );
        report
    }

    fn fingerprint(&self, source: &dyn PageSource, report: &mut TamperReport) -> Result<()> {
        let summary = &mut report.object_summary;
        summary.encrypted = source.is_encrypted();
        summary.repaired = source.was_repaired();
        if summary.encrypted {
            report
                .notes
                .push("Document is encrypted; page content may be incomplete".to_string());
        }
        if summary.repaired {
            report
                .notes
                .push("Document structure was repaired when opened".to_string());
        }

        let total = source.page_count()?;
        report.object_summary.pages_total = total;
        let scan = total.min(self.max_pages);
        if scan < total {
            report.notes.push(format!(
                "Fingerprinted first {} of {} pages",
                scan, total
            ));
        }

        for index in 0..scan {
            let page = source.page(index)?;
            let fp = PageFingerprint::of(index + 1, &page);
            let summary = &mut report.object_summary;
            summary.pages_scanned += 1;
            summary.total_images += u64::from(fp.image_count);
            summary.total_xobjects += u64::from(fp.xobject_count);
            summary.total_content_bytes += fp.content_byte_length as u64;
            report.page_fingerprints.push(fp);
        }
        Ok(())
    }
}

/// Fill `metadata_check`; returns whether the dates disagree.
fn check_metadata(metadata: &PdfMetadata, report: &mut TamperReport) -> bool {
    let (Some(created), Some(modified)) = (metadata.creation_date(), metadata.modification_date())
    else {
        return false;
    };

    let differs = created != modified;
    report.metadata_check = format!(
        "Created: {}, Modified: {}. Possible tampering: {}",
        created, modified, differs
    );
    if differs {
        report.notes.push("Modification date differs from creation date".to_string());
        report.flag(TamperSeverity::Medium);
    } else {
        report.tampering_suspected = Some(false);
    }
    differs
}

/// Page-number pairs sharing a text hash but not a content hash.
///
/// Pages with blank text are skipped: every blank page hashes alike.
fn cross_page_pairs(fingerprints: &[PageFingerprint]) -> Vec<(usize, usize)> {
    let blank = short_digest(b"");
    let mut by_text: BTreeMap<&str, Vec<&PageFingerprint>> = BTreeMap::new();
    for fp in fingerprints.iter().filter(|fp| fp.text_hash != blank) {
        by_text.entry(fp.text_hash.as_str()).or_default().push(fp);
    }

    let mut pairs = Vec::new();
    for group in by_text.values() {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                if a.content_hash != b.content_hash {
                    pairs.push((a.page_number, b.page_number));
                }
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocGuardError;

    fn page(text: &str, content: &str) -> PageContent {
        PageContent {
            text: text.to_string(),
            content_stream: content.as_bytes().to_vec(),
            image_count: 1,
            xobject_count: 2,
            page_size: PageSize {
                width: 612.0,
                height: 792.0,
            },
        }
    }

    struct BrokenPages;

    impl PageSource for BrokenPages {
        fn page_count(&self) -> Result<usize> {
            Ok(3)
        }

        fn page(&self, index: usize) -> Result<PageContent> {
            if index == 1 {
                Err(DocGuardError::Document("corrupt xref".into()))
            } else {
                Ok(page("same", "BT /F1 Tj ET"))
            }
        }
    }

    #[test]
    fn test_no_inputs_resolves_to_clean() {
        let report = TamperDetector::default().detect(&PdfMetadata::new(), None);
        assert_eq!(report.tampering_suspected, Some(false));
        assert_eq!(report.severity, TamperSeverity::Low);
        assert_eq!(report.metadata_check, "No modification metadata found.");
        assert!(report.notes.is_empty());
    }

    #[test]
    fn test_matching_dates_not_suspected() {
        let meta = PdfMetadata::new()
            .with("creationDate", "D:20240101")
            .with("modDate", "D:20240101");
        let report = TamperDetector::default().detect(&meta, None);
        assert_eq!(report.tampering_suspected, Some(false));
        assert_eq!(
            report.metadata_check,
            "Created: D:20240101, Modified: D:20240101. Possible tampering: false"
        );
    }

    #[test]
    fn test_differing_dates_flag_medium() {
        let meta = PdfMetadata::new()
            .with("CreationDate", "D:20240101")
            .with("ModDate", "D:20240315");
        let report = TamperDetector::default().detect(&meta, None);
        assert_eq!(report.tampering_suspected, Some(true));
        assert_eq!(report.severity, TamperSeverity::Medium);
        assert!(report.metadata_check.ends_with("Possible tampering: true"));
    }

    #[test]
    fn test_only_one_date_is_no_metadata() {
        let meta = PdfMetadata::new().with("creation_date", "2024-01-01");
        let report = TamperDetector::default().detect(&meta, None);
        assert_eq!(report.metadata_check, "No modification metadata found.");
        assert_eq!(report.tampering_suspected, Some(false));
    }

    #[test]
    fn test_fingerprints_and_summary() {
        let pages = InMemoryPages::new(vec![page("one", "aaaa"), page("two", "bbbbbb")]);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.page_fingerprints.len(), 2);
        assert_eq!(report.page_fingerprints[0].page_number, 1);
        assert_eq!(report.page_fingerprints[0].text_hash.len(), 16);
        assert_eq!(report.object_summary.pages_scanned, 2);
        assert_eq!(report.object_summary.total_images, 2);
        assert_eq!(report.object_summary.total_xobjects, 4);
        assert_eq!(report.object_summary.total_content_bytes, 10);
        assert_eq!(report.tampering_suspected, Some(false));
    }

    #[test]
    fn test_same_text_different_content_is_suspected() {
        let pages = InMemoryPages::new(vec![
            page("Balance $100", "stream-a"),
            page("other", "stream-x"),
            page("Balance $100", "stream-b"),
        ]);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.tampering_suspected, Some(true));
        assert_eq!(report.severity, TamperSeverity::Medium);
        assert!(report
            .notes
            .iter()
            .any(|n| n.contains("Pages 1 and 3")));
    }

    #[test]
    fn test_identical_pages_are_not_suspected() {
        let pages = InMemoryPages::new(vec![page("same", "s"), page("same", "s")]);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.tampering_suspected, Some(false));
    }

    #[test]
    fn test_blank_pages_ignored_for_cross_page_check() {
        let pages = InMemoryPages::new(vec![page("  ", "img-1"), page("", "img-2")]);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.tampering_suspected, Some(false));
    }

    #[test]
    fn test_combined_signals_escalate_to_high() {
        let meta = PdfMetadata::new()
            .with("creationDate", "a")
            .with("modDate", "b");
        let pages = InMemoryPages::new(vec![page("x", "1"), page("x", "2")]);
        let report = TamperDetector::default().detect(&meta, Some(&pages));
        assert_eq!(report.severity, TamperSeverity::High);
    }

    #[test]
    fn test_multiple_pairs_escalate_to_high() {
        let pages = InMemoryPages::new(vec![page("x", "1"), page("x", "2"), page("x", "3")]);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.severity, TamperSeverity::High);
        assert_eq!(report.notes.len(), 3);
    }

    #[test]
    fn test_truncation_is_a_note() {
        let pages = InMemoryPages::new((0..5).map(|i| page(&i.to_string(), "c")).collect());
        let report = TamperDetector::new(2).detect(&PdfMetadata::new(), Some(&pages));
        assert_eq!(report.page_fingerprints.len(), 2);
        assert_eq!(report.object_summary.pages_total, 5);
        assert!(report.notes.contains(&"Fingerprinted first 2 of 5 pages".to_string()));
        assert!(report.object_summary.error.is_none());
    }

    #[test]
    fn test_encryption_and_repair_flags() {
        let pages = InMemoryPages::new(vec![page("a", "b")])
            .encrypted(true)
            .repaired(true);
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&pages));
        assert!(report.object_summary.encrypted);
        assert!(report.object_summary.repaired);
        assert_eq!(report.notes.len(), 2);
    }

    #[test]
    fn test_page_error_keeps_metadata_verdict() {
        let meta = PdfMetadata::new()
            .with("creationDate", "a")
            .with("modDate", "b");
        let report = TamperDetector::default().detect(&meta, Some(&BrokenPages));
        assert_eq!(report.tampering_suspected, Some(true));
        assert_eq!(report.severity, TamperSeverity::Medium);
        assert_eq!(
            report.object_summary.error.as_deref(),
            Some("Document read error: corrupt xref")
        );
        assert_eq!(report.object_summary.pages_scanned, 1);
    }

    #[test]
    fn test_page_error_without_metadata_is_low() {
        let report = TamperDetector::default().detect(&PdfMetadata::new(), Some(&BrokenPages));
        assert_eq!(report.tampering_suspected, Some(false));
        assert_eq!(report.severity, TamperSeverity::Low);
    }

    #[test]
    fn test_metadata_deserializes_from_map() {
        let meta: PdfMetadata =
            serde_json::from_str(r#"{"creationDate":"x","modDate":"y","producer":"z"}"#).unwrap();
        assert_eq!(meta.creation_date(), Some("x"));
        assert_eq!(meta.modification_date(), Some("y"));
        assert_eq!(meta.get("producer"), Some("z"));
    }
}
