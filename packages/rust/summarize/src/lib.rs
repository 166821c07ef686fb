//! OpenAI-backed company summarization.
//!
//! Builds an evidence-only prompt from a company name and its search hits,
//! calls the chat-completions API, and returns the generated profile text.
//! Rows with no usable evidence get a best-effort placeholder instead of an
//! API call.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use mspscout_shared::{MspScoutError, Result, SearchHit};

/// User-Agent string for summarization requests.
const USER_AGENT: &str = concat!("mspscout/", env!("CARGO_PKG_VERSION"));

/// Default API origin.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Request timeout in seconds. Generation is slower than search.
const TIMEOUT_SECS: u64 = 60;

/// Evidence hits included in the prompt.
const MAX_PROMPT_EVIDENCE: usize = 5;

/// Character caps applied to prompt evidence fields.
const TITLE_MAX_CHARS: usize = 160;
const SNIPPET_MAX_CHARS: usize = 300;

/// System message steering the model toward evidence-only profiles.
const SYSTEM_MESSAGE: &str = "You are a precise research assistant. Summarize only from given \
     evidence. Include focus areas, core services, notable technology/partner ecosystems \
     (e.g., Azure/AWS/GCP), and typical customer segments/regions. Keep it concise \
     (120-180 words).";

/// Returned when a row has no search evidence to summarize from.
const NO_EVIDENCE_SUMMARY: &str =
    "Insufficient public information found to summarize this company.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Evidence item as serialized into the user message.
#[derive(Debug, Serialize)]
struct EvidenceItem {
    title: String,
    snippet: String,
    url: String,
}

// ---------------------------------------------------------------------------
// SummarizerClient
// ---------------------------------------------------------------------------

/// Wrapper around the OpenAI chat-completions API.
pub struct SummarizerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl SummarizerClient {
    /// Create a client against the production API origin.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create a client against an arbitrary origin (mock servers in tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| MspScoutError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Generate a short profile of `company` from its search `hits`.
    ///
    /// Empty evidence short-circuits to a placeholder summary without any
    /// API call; API failures surface as [`MspScoutError::Summarize`].
    #[instrument(skip_all, fields(company = %company, evidence = hits.len()))]
    pub async fn summarize(&self, company: &str, hits: &[SearchHit]) -> Result<String> {
        if hits.is_empty() {
            debug!("no evidence, returning placeholder summary");
            return Ok(NO_EVIDENCE_SUMMARY.to_string());
        }

        let user_message = build_user_message(company, hits)?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: 0.2,
            max_tokens: 300,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MspScoutError::Summarize(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(MspScoutError::Summarize(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MspScoutError::Summarize(format!("malformed response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(MspScoutError::Summarize("no summary generated".into()));
        }

        debug!(chars = text.len(), "summary generated");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Prompt building
// ---------------------------------------------------------------------------

/// Serialize the company name and capped evidence as the JSON user message.
fn build_user_message(company: &str, hits: &[SearchHit]) -> Result<String> {
    let evidence: Vec<EvidenceItem> = hits
        .iter()
        .take(MAX_PROMPT_EVIDENCE)
        .map(|hit| EvidenceItem {
            title: truncate(&hit.title, TITLE_MAX_CHARS),
            snippet: truncate(&hit.snippet, SNIPPET_MAX_CHARS),
            url: hit.url.clone(),
        })
        .collect();

    serde_json::to_string(&serde_json::json!({
        "company": company,
        "evidence": evidence,
    }))
    .map_err(|e| MspScoutError::Summarize(format!("prompt serialize: {e}")))
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hit(url: &str, title: &str, snippet: &str) -> SearchHit {
        SearchHit {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn summarizes_from_evidence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "temperature": 0.2,
                "max_tokens": 300,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                "Acme IT Services is a managed service provider focused on SMB cloud support.",
            )))
            .mount(&server)
            .await;

        let client =
            SummarizerClient::with_base_url("sk-test", "gpt-4o-mini", &server.uri()).unwrap();
        let summary = client
            .summarize(
                "Acme IT Services",
                &[hit(
                    "https://acme.example.com",
                    "Acme IT Services - Home",
                    "Managed IT for SMBs",
                )],
            )
            .await
            .expect("summarize");

        assert!(summary.contains("Acme IT Services"));
    }

    #[tokio::test]
    async fn empty_evidence_short_circuits() {
        // No mock mounted: any API call would fail loudly.
        let client =
            SummarizerClient::with_base_url("sk-test", "gpt-4o-mini", "http://127.0.0.1:1")
                .unwrap();
        let summary = client.summarize("Ghost Corp", &[]).await.expect("placeholder");
        assert_eq!(summary, NO_EVIDENCE_SUMMARY);
    }

    #[tokio::test]
    async fn api_error_surfaces_as_summarize_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client =
            SummarizerClient::with_base_url("bad-key", "gpt-4o-mini", &server.uri()).unwrap();
        let err = client
            .summarize("Acme", &[hit("https://a.example.com", "t", "s")])
            .await
            .expect_err("must fail");

        assert!(matches!(err, MspScoutError::Summarize(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn blank_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("   ")))
            .mount(&server)
            .await;

        let client =
            SummarizerClient::with_base_url("sk-test", "gpt-4o-mini", &server.uri()).unwrap();
        let err = client
            .summarize("Acme", &[hit("https://a.example.com", "t", "s")])
            .await
            .expect_err("blank summary must fail");
        assert!(err.to_string().contains("no summary generated"));
    }

    #[test]
    fn user_message_caps_evidence() {
        let hits: Vec<SearchHit> = (0..8)
            .map(|i| {
                hit(
                    &format!("https://example.com/{i}"),
                    &"t".repeat(500),
                    &"s".repeat(500),
                )
            })
            .collect();

        let msg = build_user_message("Acme", &hits).expect("build");
        let parsed: serde_json::Value = serde_json::from_str(&msg).expect("valid json");
        let evidence = parsed["evidence"].as_array().expect("evidence array");

        assert_eq!(evidence.len(), MAX_PROMPT_EVIDENCE);
        assert_eq!(
            evidence[0]["title"].as_str().unwrap().chars().count(),
            TITLE_MAX_CHARS
        );
        assert_eq!(
            evidence[0]["snippet"].as_str().unwrap().chars().count(),
            SNIPPET_MAX_CHARS
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 100), "short");
    }
}
