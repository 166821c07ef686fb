//! Core domain types for the MSP enrichment pipeline.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// InputRecord
// ---------------------------------------------------------------------------

/// One row of the source company list.
///
/// Only `name` is required; the remaining fields are carried through to the
/// output untouched when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Company name (required).
    pub name: String,
    /// Company website URL.
    #[serde(default)]
    pub website: String,
    /// LinkedIn company page URL.
    #[serde(default)]
    pub linkedin: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Postal address or location.
    #[serde(default)]
    pub address: String,
}

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// A single structured search result (title/link/snippet only — no scraping).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result page URL.
    pub url: String,
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Result snippet text.
    #[serde(default)]
    pub snippet: String,
}

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

/// A cached search response: the parsed hits for one query, plus when they
/// were fetched. Entries are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The original (un-normalized) query string.
    pub query: String,
    /// Ordered search hits as returned by the API.
    pub hits: Vec<SearchHit>,
    /// When the response was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry for `query` stamped with the current time.
    pub fn new(query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        Self {
            query: query.into(),
            hits,
            fetched_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SummaryRecord
// ---------------------------------------------------------------------------

/// Terminal state of one enriched row, written as a line of the output CSV.
/// Never mutated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// Generated company summary (empty on failure).
    #[serde(default)]
    pub summary: String,
    /// Up to five source URLs, joined with "; ".
    #[serde(default)]
    pub top_urls: String,
    /// Row outcome.
    pub status: RowOutcome,
    /// Error message when `status` is `failed`.
    #[serde(default)]
    pub error: String,
}

/// Outcome of processing a single input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOutcome {
    /// The row was searched, summarized, and written.
    Written,
    /// Search or summarization failed; the error column says why.
    Failed,
}

// ---------------------------------------------------------------------------
// PersonRecord
// ---------------------------------------------------------------------------

/// One discovered public LinkedIn profile, written as a line of the people
/// CSV. Built from search-result metadata only; the profile page itself is
/// never fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Company the profile was matched against.
    pub company: String,
    /// Company website as given in the input.
    #[serde(default)]
    pub website: String,
    /// Public profile URL.
    pub profile_url: String,
    /// Search-result title.
    #[serde(default)]
    pub title: String,
    /// Search-result snippet.
    #[serde(default)]
    pub snippet: String,
}

// ---------------------------------------------------------------------------
// Name normalization
// ---------------------------------------------------------------------------

/// Normalize a company name for identity comparisons: lowercase, trimmed,
/// internal whitespace collapsed to single spaces.
///
/// This is the resume/dedup key for the whole pipeline.
pub fn normalize_name(name: &str) -> String {
    static WS: OnceLock<regex::Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    ws.replace_all(name.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_name("  Acme   IT\tServices "), "acme it services");
        assert_eq!(normalize_name("ACME"), "acme");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn cache_entry_roundtrip() {
        let entry = CacheEntry::new(
            "\"Acme\" managed services",
            vec![SearchHit {
                url: "https://acme.example.com".into(),
                title: "Acme IT Services - Home".into(),
                snippet: "Managed IT for SMBs".into(),
            }],
        );
        let json = serde_json::to_string(&entry).expect("serialize");
        let parsed: CacheEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn row_outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RowOutcome::Written).unwrap(),
            r#""written""#
        );
        assert_eq!(
            serde_json::to_string(&RowOutcome::Failed).unwrap(),
            r#""failed""#
        );
    }

    #[test]
    fn summary_record_defaults_optional_fields() {
        let json = r#"{"name":"Acme","status":"written"}"#;
        let rec: SummaryRecord = serde_json::from_str(json).expect("deserialize");
        assert_eq!(rec.name, "Acme");
        assert!(rec.summary.is_empty());
        assert!(rec.error.is_empty());
        assert_eq!(rec.status, RowOutcome::Written);
    }
}
