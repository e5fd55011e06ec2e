// Structured verdict parsing for validation and consistency stages.
//
// LLMs asked for JSON frequently wrap it in prose or code fences, so
// parsing tries the raw text, then the first balanced object inside it,
// and finally falls back to a conservative verdict rather than failing
// the whole pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    NeedsRevision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredVerdict {
    pub status: ValidationStatus,
    pub score: u8,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl StructuredVerdict {
    /// Parse model output, falling back to a fixed needs_revision verdict
    /// when no JSON object can be recovered.
    pub fn parse_or_fallback(raw: &str) -> Self {
        if let Some(mut verdict) = try_parse::<StructuredVerdict>(raw) {
            // Models occasionally report scores above the 0-100 scale
            verdict.score = verdict.score.min(100);
            return verdict;
        }
        warn!("Validation output was not parseable JSON, using fallback verdict");
        Self {
            status: ValidationStatus::NeedsRevision,
            score: 50,
            issues: vec!["parse failure".to_string()],
            recommendations: vec!["manual review".to_string()],
        }
    }

    pub fn requires_revision(&self) -> bool {
        self.status != ValidationStatus::Valid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyVerdict {
    pub is_consistent: bool,
    #[serde(default)]
    pub mixed_words: Vec<String>,
    #[serde(default)]
    pub mixed_languages: Vec<String>,
    #[serde(default = "default_consistency_score")]
    pub consistency_score: u8,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn default_consistency_score() -> u8 {
    50
}

impl ConsistencyVerdict {
    /// Parse model output; when no JSON is recoverable, fall back to a
    /// keyword heuristic over the raw text.
    pub fn parse_or_fallback(raw: &str) -> Self {
        if let Some(mut verdict) = try_parse::<ConsistencyVerdict>(raw) {
            verdict.consistency_score = verdict.consistency_score.min(100);
            return verdict;
        }
        warn!("Consistency output was not parseable JSON, using keyword heuristic");
        Self {
            is_consistent: !raw.to_lowercase().contains("inconsistent"),
            mixed_words: Vec::new(),
            mixed_languages: Vec::new(),
            consistency_score: 50,
            recommendations: vec!["Manual review recommended".to_string()],
        }
    }
}

fn try_parse<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(parsed) = serde_json::from_str::<T>(raw.trim()) {
        return Some(parsed);
    }
    extract_json_object(raw).and_then(|snippet| serde_json::from_str::<T>(&snippet).ok())
}

/// Extract the first balanced `{...}` object from free-form text.
fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
