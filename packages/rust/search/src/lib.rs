//! Google Programmable Search client with cache-backed lookups.
//!
//! Only structured API responses (title/link/snippet) are used — the
//! pipeline never scrapes result pages. Every query is checked against the
//! injected [`CacheStore`] first; the external API is called on misses only,
//! and unreadable cache entries are treated as misses and re-fetched.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use mspscout_cache::{CacheStore, cache_key};
use mspscout_shared::{CacheEntry, MspScoutError, Result, SearchHit};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("mspscout/", env!("CARGO_PKG_VERSION"), " (+no-scrape)");

/// Default API origin.
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Request timeout in seconds.
const TIMEOUT_SECS: u64 = 15;

/// Hard cap the Custom Search API enforces on `num`.
const MAX_NUM_RESULTS: u8 = 10;

/// Prefix distinguishing query cache entries from any future entry kinds.
const QUERY_KEY_PREFIX: &str = "q-";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Resolved Google Programmable Search credentials.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    /// API key (`GOOGLE_API_KEY`).
    pub api_key: String,
    /// Programmable Search engine ID (`GOOGLE_CSE_ID`).
    pub cse_id: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl From<CseItem> for SearchHit {
    fn from(item: CseItem) -> Self {
        Self {
            url: item.link,
            title: item.title,
            snippet: item.snippet,
        }
    }
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Cache-first wrapper around the Google Programmable Search JSON API.
pub struct SearchClient {
    client: Client,
    base_url: Url,
    credentials: GoogleCredentials,
    cache: Arc<dyn CacheStore>,
    cache_hits: AtomicUsize,
    api_calls: AtomicUsize,
}

impl SearchClient {
    /// Create a client against the production API origin.
    pub fn new(credentials: GoogleCredentials, cache: Arc<dyn CacheStore>) -> Result<Self> {
        Self::with_base_url(credentials, cache, DEFAULT_BASE_URL)
    }

    /// Create a client against an arbitrary origin (mock servers in tests).
    pub fn with_base_url(
        credentials: GoogleCredentials,
        cache: Arc<dyn CacheStore>,
        base_url: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MspScoutError::config(format!("invalid search base URL: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(3))
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                MspScoutError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            credentials,
            cache,
            cache_hits: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
        })
    }

    /// Queries served from the cache so far.
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// External API calls made so far.
    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Search for `query`, returning up to `num_results` ranked hits.
    ///
    /// Served from the cache when possible; a given query performs at most
    /// one external API call across repeated invocations.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn search(&self, query: &str, num_results: u8) -> Result<Vec<SearchHit>> {
        let key = cache_key(&format!("{QUERY_KEY_PREFIX}{query}"));

        match self.cache.get(&key) {
            Ok(Some(entry)) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(hits = entry.hits.len(), "serving query from cache");
                return Ok(entry.hits);
            }
            Ok(None) => {}
            Err(e) => {
                // Corrupt entry: treat as a miss and re-fetch.
                warn!(error = %e, "unreadable cache entry, re-fetching");
            }
        }

        let hits = self.fetch(query, num_results).await?;

        let entry = CacheEntry::new(query, hits.clone());
        if let Err(e) = self.cache.put(&key, &entry) {
            warn!(error = %e, "failed to cache search response");
        }

        Ok(hits)
    }

    /// Call the external API (no cache involvement).
    async fn fetch(&self, query: &str, num_results: u8) -> Result<Vec<SearchHit>> {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        let num = num_results.clamp(1, MAX_NUM_RESULTS);

        let mut url = self
            .base_url
            .join("/customsearch/v1")
            .map_err(|e| MspScoutError::config(format!("invalid search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("key", &self.credentials.api_key)
            .append_pair("cx", &self.credentials.cse_id)
            .append_pair("num", &num.to_string());

        debug!(num, "querying search API");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MspScoutError::search(query, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(MspScoutError::search(
                query,
                format!("HTTP {status}: {body}"),
            ));
        }

        let parsed: CseResponse = response
            .json()
            .await
            .map_err(|e| MspScoutError::search(query, format!("malformed response: {e}")))?;

        let hits: Vec<SearchHit> = parsed.items.into_iter().map(SearchHit::from).collect();
        debug!(hits = hits.len(), "search API returned");
        Ok(hits)
    }
}
