//! End-to-end enrichment loop: input CSV → search → summarize → output CSV.
//!
//! Rows move Pending → Searched → Summarized → Written, or Pending → Failed.
//! Per-row API errors are recorded against the row and never abort the run;
//! the output is appended one record at a time so interruption leaves a
//! valid partial file, and a resumed run skips rows already written.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use mspscout_search::SearchClient;
use mspscout_shared::{
    InputRecord, MspScoutError, Result, RowOutcome, SearchHit, SummaryRecord, normalize_name,
};
use mspscout_summarize::SummarizerClient;

use crate::csvio::{SummaryWriter, read_input, read_output};
use crate::queries::build_queries;

/// Source URLs recorded per row in the output.
const TOP_URLS_KEPT: usize = 5;

// ---------------------------------------------------------------------------
// Configuration & results
// ---------------------------------------------------------------------------

/// Configuration for one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Source company list.
    pub input: PathBuf,
    /// Destination summaries file.
    pub output: PathBuf,
    /// Process at most this many pending rows (None = all).
    pub limit: Option<usize>,
    /// Skip rows already written in a prior output at `output`.
    pub resume: bool,
    /// Results requested per search query.
    pub num_results: u8,
    /// Hits kept per query when collecting evidence.
    pub hits_per_query: usize,
    /// Cap on deduplicated evidence hits passed to the summarizer.
    pub max_evidence: usize,
    /// Pause between search queries, to stay polite with the API.
    pub query_pause: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/raw/msp.csv"),
            output: PathBuf::from("data/processed/msp_summaries.csv"),
            limit: None,
            resume: true,
            num_results: 10,
            hits_per_query: 5,
            max_evidence: 10,
            query_pause: Duration::from_millis(150),
        }
    }
}

/// Counters for a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Rows present in the input file.
    pub rows_total: usize,
    /// Rows actually processed this run.
    pub processed: usize,
    /// Rows that ended Written.
    pub written: usize,
    /// Rows that ended Failed.
    pub failed: usize,
    /// Rows skipped because a prior run already wrote them.
    pub skipped_resume: usize,
    /// Rows skipped for having no company name.
    pub skipped_empty: usize,
    /// Search queries served from the cache.
    pub cache_hits: usize,
    /// External search API calls made.
    pub api_calls: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a row starts processing.
    fn row_started(&self, name: &str, current: usize, total: usize);
    /// Called when a row finishes with its outcome.
    fn row_finished(&self, name: &str, outcome: RowOutcome);
    /// Called when the run completes.
    fn done(&self, stats: &RunStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn row_finished(&self, _name: &str, _outcome: RowOutcome) {}
    fn done(&self, _stats: &RunStats) {}
}

// ---------------------------------------------------------------------------
// Run entry point
// ---------------------------------------------------------------------------

/// Run the enrichment loop over every pending input row, in input order.
#[instrument(skip_all, fields(input = %config.input.display(), limit = ?config.limit))]
pub async fn enrich(
    config: &EnrichConfig,
    search: &SearchClient,
    summarizer: &SummarizerClient,
    progress: &dyn ProgressReporter,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::default();

    progress.phase("Reading input");
    let rows = read_input(&config.input)?;
    if rows.is_empty() {
        return Err(MspScoutError::validation(format!(
            "input {} has no data rows",
            config.input.display()
        )));
    }
    stats.rows_total = rows.len();

    // Rows a prior run already wrote, keyed by normalized name.
    // Failed rows are absent from the index so they get reprocessed.
    let done_keys: HashSet<String> = if config.resume {
        read_output(&config.output)?
            .iter()
            .filter(|r| r.status == RowOutcome::Written)
            .map(|r| normalize_name(&r.name))
            .collect()
    } else {
        HashSet::new()
    };

    if !done_keys.is_empty() {
        info!(prior_rows = done_keys.len(), "resuming prior run");
    }

    let mut writer = SummaryWriter::open(&config.output, config.resume)?;

    info!(rows = rows.len(), "starting enrichment");
    progress.phase("Enriching rows");

    for (idx, row) in rows.iter().enumerate() {
        if config.limit.is_some_and(|n| stats.processed >= n) {
            info!(limit = ?config.limit, "row limit reached, stopping");
            break;
        }

        if row.name.is_empty() {
            stats.skipped_empty += 1;
            continue;
        }
        if done_keys.contains(&normalize_name(&row.name)) {
            stats.skipped_resume += 1;
            continue;
        }

        progress.row_started(&row.name, idx + 1, rows.len());
        stats.processed += 1;

        let record = process_row(config, search, summarizer, row).await;
        match record.status {
            RowOutcome::Written => stats.written += 1,
            RowOutcome::Failed => stats.failed += 1,
        }
        progress.row_finished(&row.name, record.status);
        writer.append(&record)?;
    }

    stats.cache_hits = search.cache_hits();
    stats.api_calls = search.api_calls();
    stats.elapsed = start.elapsed();

    info!(
        processed = stats.processed,
        written = stats.written,
        failed = stats.failed,
        skipped_resume = stats.skipped_resume,
        cache_hits = stats.cache_hits,
        api_calls = stats.api_calls,
        elapsed_ms = stats.elapsed.as_millis(),
        "enrichment complete"
    );
    progress.done(&stats);

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Per-row processing
// ---------------------------------------------------------------------------

/// Process one row through search and summarization. Errors become a Failed
/// record rather than propagating; search failure skips the summarizer.
async fn process_row(
    config: &EnrichConfig,
    search: &SearchClient,
    summarizer: &SummarizerClient,
    row: &InputRecord,
) -> SummaryRecord {
    let queries = build_queries(&row.name, &row.website);

    let mut collected: Vec<SearchHit> = Vec::new();
    for (i, query) in queries.iter().enumerate() {
        if i > 0 && !config.query_pause.is_zero() {
            tokio::time::sleep(config.query_pause).await;
        }

        match search.search(query, config.num_results).await {
            Ok(hits) => {
                collected.extend(hits.into_iter().take(config.hits_per_query));
            }
            Err(e) => {
                warn!(name = %row.name, error = %e, "search failed, marking row failed");
                let evidence = dedupe_by_url(collected, config.max_evidence);
                return failed_record(row, &evidence, e.to_string());
            }
        }
    }

    let evidence = dedupe_by_url(collected, config.max_evidence);

    match summarizer.summarize(&row.name, &evidence).await {
        Ok(summary) => SummaryRecord {
            name: row.name.clone(),
            website: row.website.clone(),
            linkedin: row.linkedin.clone(),
            phone: row.phone.clone(),
            address: row.address.clone(),
            summary,
            top_urls: top_urls(&evidence),
            status: RowOutcome::Written,
            error: String::new(),
        },
        Err(e) => {
            warn!(name = %row.name, error = %e, "summarization failed, marking row failed");
            failed_record(row, &evidence, e.to_string())
        }
    }
}

/// Build a Failed record, preserving whatever evidence was gathered.
fn failed_record(row: &InputRecord, evidence: &[SearchHit], error: String) -> SummaryRecord {
    SummaryRecord {
        name: row.name.clone(),
        website: row.website.clone(),
        linkedin: row.linkedin.clone(),
        phone: row.phone.clone(),
        address: row.address.clone(),
        summary: String::new(),
        top_urls: top_urls(evidence),
        status: RowOutcome::Failed,
        error,
    }
}

/// Drop duplicate URLs (keeping rank order) and cap the evidence list.
fn dedupe_by_url(hits: Vec<SearchHit>, max: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SearchHit> = hits
        .into_iter()
        .filter(|h| !h.url.is_empty() && seen.insert(h.url.clone()))
        .collect();
    unique.truncate(max);
    unique
}

/// Join the first few evidence URLs for the output column.
fn top_urls(evidence: &[SearchHit]) -> String {
    evidence
        .iter()
        .take(TOP_URLS_KEPT)
        .map(|h| h.url.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            url: url.into(),
            title: String::new(),
            snippet: String::new(),
        }
    }

    #[test]
    fn dedupe_preserves_rank_order() {
        let hits = vec![
            hit("https://a.example.com"),
            hit("https://b.example.com"),
            hit("https://a.example.com"),
            hit(""),
            hit("https://c.example.com"),
        ];
        let unique = dedupe_by_url(hits, 10);
        assert_eq!(
            unique.iter().map(|h| h.url.as_str()).collect::<Vec<_>>(),
            vec![
                "https://a.example.com",
                "https://b.example.com",
                "https://c.example.com"
            ]
        );
    }

    #[test]
    fn dedupe_caps_evidence() {
        let hits: Vec<SearchHit> = (0..20)
            .map(|i| hit(&format!("https://example.com/{i}")))
            .collect();
        assert_eq!(dedupe_by_url(hits, 10).len(), 10);
    }

    #[test]
    fn top_urls_joins_first_five() {
        let hits: Vec<SearchHit> = (0..7)
            .map(|i| hit(&format!("https://example.com/{i}")))
            .collect();
        let joined = top_urls(&hits);
        assert_eq!(joined.matches("; ").count(), 4);
        assert!(joined.starts_with("https://example.com/0"));
        assert!(joined.ends_with("https://example.com/4"));
    }
}

#[cfg(test)]
mod enrich_tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use mspscout_cache::MemoryCache;
    use mspscout_search::{GoogleCredentials, SearchClient};

    use super::*;
    use crate::csvio::read_output;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mspscout_run_{}_{name}.csv", Uuid::now_v7()))
    }

    fn search_body() -> serde_json::Value {
        serde_json::json!({
            "items": [{
                "link": "https://acme.example.com",
                "title": "Acme IT Services - Home",
                "snippet": "Managed IT for SMBs"
            }]
        })
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    async fn mock_search_ok(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(server)
            .await;
    }

    async fn mock_summarize_ok(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(content)))
            .mount(server)
            .await;
    }

    fn search_client(server: &MockServer) -> SearchClient {
        SearchClient::with_base_url(
            GoogleCredentials {
                api_key: "k".into(),
                cse_id: "cx".into(),
            },
            Arc::new(MemoryCache::new()),
            &server.uri(),
        )
        .unwrap()
    }

    fn test_config(input: PathBuf, output: PathBuf) -> EnrichConfig {
        EnrichConfig {
            input,
            output,
            query_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn happy_path_writes_summary_record() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;
        mock_search_ok(&search_server).await;
        mock_summarize_ok(&openai_server, "Acme IT Services is an MSP serving SMBs.").await;

        let input = temp_file("happy_in");
        let output = temp_file("happy_out");
        std::fs::write(&input, "name,website\nAcme IT Services,https://acme.example.com\n")
            .unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let config = test_config(input.clone(), output.clone());
        let stats = enrich(&config, &search, &summarizer, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.failed, 0);

        let rows = read_output(&output).expect("read output");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RowOutcome::Written);
        assert!(rows[0].summary.contains("Acme IT Services"));
        assert!(rows[0].top_urls.contains("acme.example.com"));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn limit_leaves_later_rows_untouched() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;
        mock_search_ok(&search_server).await;
        mock_summarize_ok(&openai_server, "A summary.").await;

        let input = temp_file("limit_in");
        let output = temp_file("limit_out");
        std::fs::write(&input, "name\nFirst Co\nSecond Co\nThird Co\n").unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let mut config = test_config(input.clone(), output.clone());
        config.limit = Some(2);

        let stats = enrich(&config, &search, &summarizer, &SilentProgress)
            .await
            .expect("run");
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.rows_total, 3);

        // Input order preserved: exactly the first two rows, in order.
        let rows = read_output(&output).expect("read output");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "First Co");
        assert_eq!(rows[1].name, "Second Co");

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn search_failure_skips_summarizer() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
            .mount(&search_server)
            .await;

        // The summarizer must never be called for a search-failed row.
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("nope")))
            .expect(0)
            .mount(&openai_server)
            .await;

        let input = temp_file("fail_in");
        let output = temp_file("fail_out");
        std::fs::write(&input, "name\nDoomed Co\n").unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let config = test_config(input.clone(), output.clone());
        let stats = enrich(&config, &search, &summarizer, &SilentProgress)
            .await
            .expect("run completes despite row failure");

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.written, 0);

        let rows = read_output(&output).expect("read output");
        assert_eq!(rows[0].status, RowOutcome::Failed);
        assert!(rows[0].error.contains("403"));
        assert!(rows[0].summary.is_empty());

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn resume_skips_written_and_reprocesses_failed() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;
        mock_search_ok(&search_server).await;
        mock_summarize_ok(&openai_server, "A fresh summary.").await;

        let input = temp_file("resume_in");
        let output = temp_file("resume_out");
        std::fs::write(&input, "name\nDone Co\nBroken Co\nNew Co\n").unwrap();
        // Prior run: Done Co written, Broken Co failed.
        std::fs::write(
            &output,
            "name,website,linkedin,phone,address,summary,top_urls,status,error\n\
             Done Co,,,,,old summary,,written,\n\
             Broken Co,,,,,,,failed,HTTP 500\n",
        )
        .unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let config = test_config(input.clone(), output.clone());
        let stats = enrich(&config, &search, &summarizer, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(stats.skipped_resume, 1);
        assert_eq!(stats.processed, 2); // Broken Co + New Co

        let rows = read_output(&output).expect("read output");
        assert_eq!(rows.len(), 4); // 2 prior + 2 appended
        assert_eq!(rows[2].name, "Broken Co");
        assert_eq!(rows[2].status, RowOutcome::Written);
        assert_eq!(rows[3].name, "New Co");

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn repeated_run_is_served_from_cache() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;
        mock_summarize_ok(&openai_server, "A summary.").await;

        // Each distinct query may hit the API once across both runs.
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .expect(4) // four name queries for one company, no website
            .mount(&search_server)
            .await;

        let input = temp_file("cache_in");
        std::fs::write(&input, "name\nAcme IT Services\n").unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let out1 = temp_file("cache_out1");
        let out2 = temp_file("cache_out2");
        let first = test_config(input.clone(), out1.clone());
        let second = test_config(input.clone(), out2.clone());

        enrich(&first, &search, &summarizer, &SilentProgress)
            .await
            .expect("first run");
        let stats = enrich(&second, &search, &summarizer, &SilentProgress)
            .await
            .expect("second run");

        assert_eq!(stats.api_calls, 4);
        assert_eq!(stats.cache_hits, 4);

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&out1);
        let _ = std::fs::remove_file(&out2);
    }

    #[tokio::test]
    async fn nameless_rows_are_skipped() {
        let search_server = MockServer::start().await;
        let openai_server = MockServer::start().await;
        mock_search_ok(&search_server).await;
        mock_summarize_ok(&openai_server, "A summary.").await;

        let input = temp_file("skip_in");
        let output = temp_file("skip_out");
        std::fs::write(&input, "name,website\n,https://orphan.example.com\nReal Co,\n").unwrap();

        let search = search_client(&search_server);
        let summarizer =
            SummarizerClient::with_base_url("sk", "gpt-4o-mini", &openai_server.uri()).unwrap();

        let config = test_config(input.clone(), output.clone());
        let stats = enrich(&config, &search, &summarizer, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(stats.skipped_empty, 1);
        assert_eq!(stats.written, 1);

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }
}
