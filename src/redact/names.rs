//! Personal-name heuristic
//!
//! Line based and approximate: it over-redacts capitalized headings and
//! misses names that do not follow a label or start a line. Recall changes
//! here alter what leaves the trust boundary, so the rules stay fixed.

use super::session::{overlaps, RedactionSession};
use super::PiiCategory;
use regex::Regex;
use std::sync::OnceLock;

/// Labels after which the rest of the line is expected to hold a name
const NAME_LABELS: &[&str] = &[
    "account holder:",
    "customer:",
    "name:",
    "account name:",
    "primary account holder:",
    "account owner:",
    "customer name:",
];

/// Words that mark a capitalized run as an institution rather than a person
const INSTITUTION_WORDS: &[&str] = &["bank", "corp", "inc", "llc", "company", "credit", "union"];

fn labeled_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]*)*)\b").unwrap())
}

fn line_start_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z][a-z]+[ \t]+[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)\b").unwrap()
    })
}

fn titled_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:Dear|Mr\.|Mrs\.|Ms\.|Dr\.)[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)\b")
            .unwrap()
    })
}

fn looks_like_institution(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    INSTITUTION_WORDS.iter().any(|w| lower.contains(w))
}

/// Find the name candidate on one line, if any.
fn name_on_line(line: &str) -> Option<&str> {
    let lower = line.to_lowercase();
    if NAME_LABELS.iter().any(|label| lower.contains(label)) {
        // Only the segment between the first and second colon is considered.
        let after_label = line.split(':').nth(1)?;
        return labeled_name_regex()
            .captures(after_label)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
    }

    for re in [line_start_name_regex(), titled_name_regex()] {
        if let Some(m) = re.captures(line).and_then(|c| c.get(1)) {
            // First pattern that fires decides, even when it is rejected.
            return (!looks_like_institution(m.as_str())).then_some(m.as_str());
        }
    }
    None
}

/// Replace detected names line by line, recording each in `session`.
pub(crate) fn redact_names(text: &str, session: &mut RedactionSession) -> String {
    text.split('\n')
        .map(|line| {
            let Some(name) = name_on_line(line) else {
                return line.to_string();
            };
            let protected = session.token_spans(line);
            let clashes = line
                .match_indices(name)
                .any(|(start, m)| overlaps(&protected, &(start..start + m.len())));
            if clashes {
                return line.to_string();
            }
            let token = session.record(PiiCategory::PersonName, name);
            line.replace(name, &token)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
