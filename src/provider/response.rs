//! Parsing provider completions into an analysis
//!
//! Models honor "return JSON only" loosely: replies may be wrapped in code
//! fences or prose. The first balanced `{...}` block is taken as the answer.

use crate::error::ProviderError;
use crate::types::AnalysisStatus;
use serde::Deserialize;

/// Provider-authored analysis fields
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub status: AnalysisStatus,
    pub summary: String,
    pub reasoning: String,
    pub income_analysis: Option<String>,
    pub risk_factors: Option<String>,
}

#[derive(Deserialize)]
struct RawAnalysis {
    status: String,
    summary: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    income_analysis: Option<serde_json::Value>,
    #[serde(default)]
    risk_factors: Option<serde_json::Value>,
}

/// Return the first balanced `{...}` block in `text`.
///
/// Braces inside JSON string literals are ignored.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a completion into a [`ParsedAnalysis`].
///
/// Any shape problem, including a status outside the three known values,
/// is a `MalformedResponse`.
pub fn parse_analysis(completion: &str) -> Result<ParsedAnalysis, ProviderError> {
    let block = extract_json_block(completion)
        .ok_or(ProviderError::MalformedResponse("no JSON object in completion"))?;
    let raw: RawAnalysis = serde_json::from_str(block)
        .map_err(|_| ProviderError::MalformedResponse("JSON object missing required fields"))?;
    let status = AnalysisStatus::parse(&raw.status)
        .ok_or(ProviderError::MalformedResponse("unknown analysis status"))?;

    Ok(ParsedAnalysis {
        status,
        summary: raw.summary,
        reasoning: raw.reasoning,
        income_analysis: raw.income_analysis.and_then(flatten_text),
        risk_factors: raw.risk_factors.and_then(flatten_text),
    })
}

/// Free-text fields sometimes come back as lists or objects.
fn flatten_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(flatten_text)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}
