//! Public LinkedIn profile discovery for company employees.
//!
//! Uses Google Programmable Search with `site:linkedin.com/in` queries and
//! keeps only public search-result metadata; profile pages are never
//! fetched. Results are filtered to actual profile URLs whose title or
//! snippet mentions the company, capped per company, and written as a
//! people CSV.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, instrument, warn};

use mspscout_search::SearchClient;
use mspscout_shared::{MspScoutError, PersonRecord, Result};

use crate::csvio::read_input;
use crate::queries::website_domain;

/// Queries issued per company.
const MAX_QUERIES: usize = 3;

/// A profile URL looks like `linkedin.com/in/<slug>`.
fn profile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https?://(?:www\.)?linkedin\.com/in/[^/?#]+").expect("static regex")
    })
}

/// Non-profile LinkedIn paths that CSE surfaces for `site:` queries.
fn exclude_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/pub/|/jobs/|/posts/|/events/|/learning/|/pulse/|/company/|/school/")
            .expect("static regex")
    })
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Whether `url` points at an individual public profile.
pub fn is_profile_url(url: &str) -> bool {
    if url.is_empty() || exclude_re().is_match(url) {
        return false;
    }
    profile_re().is_match(url)
}

/// Whether a search result plausibly belongs to an employee of `company`:
/// the company name must appear in the result's title or snippet.
pub fn likely_employee(title: &str, snippet: &str, company: &str) -> bool {
    if company.is_empty() {
        return false;
    }
    let blob = format!("{title} {snippet}").to_lowercase();
    blob.contains(&company.to_lowercase())
}

/// Build the per-company profile queries: quoted name, quoted domain, and
/// an unquoted name variant excluding job postings.
pub fn build_people_queries(company: &str, domain: &str) -> Vec<String> {
    let mut queries = Vec::new();
    if !company.is_empty() {
        queries.push(format!("site:linkedin.com/in \"{company}\""));
    }
    if !domain.is_empty() {
        queries.push(format!("site:linkedin.com/in \"{domain}\""));
    }
    if !company.is_empty() {
        queries.push(format!("site:linkedin.com/in {company} -jobs -job -hiring"));
    }
    queries.truncate(MAX_QUERIES);
    queries
}

// ---------------------------------------------------------------------------
// Discovery run
// ---------------------------------------------------------------------------

/// Configuration for one profile-discovery run.
#[derive(Debug, Clone)]
pub struct PeopleConfig {
    /// Companies CSV (a summaries file works; only name/website are read).
    pub input: PathBuf,
    /// Destination people CSV.
    pub output: PathBuf,
    /// Process only the first N companies (None = all).
    pub limit_companies: Option<usize>,
    /// Maximum profiles kept per company.
    pub per_company: usize,
    /// Results requested per search query.
    pub num_results: u8,
    /// Pause between search queries, to stay polite with the API.
    pub query_pause: Duration,
}

impl Default for PeopleConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/processed/msp_summaries.csv"),
            output: PathBuf::from("data/processed/msp_people.csv"),
            limit_companies: None,
            per_company: 25,
            num_results: 10,
            query_pause: Duration::from_millis(200),
        }
    }
}

/// Counters for a completed discovery run.
#[derive(Debug, Clone, Default)]
pub struct PeopleStats {
    /// Companies processed.
    pub companies: usize,
    /// Profile rows written.
    pub profiles: usize,
}

/// Discover public profile URLs for every company in the input CSV and
/// write them to the output CSV.
///
/// Per-query search failures are logged and skipped; they never abort the
/// run. Within a company, results are deduplicated by URL and capped at
/// `per_company`.
#[instrument(skip_all, fields(input = %config.input.display(), limit = ?config.limit_companies))]
pub async fn discover_people(config: &PeopleConfig, search: &SearchClient) -> Result<PeopleStats> {
    let mut companies = read_input(&config.input)?;
    if let Some(n) = config.limit_companies {
        companies.truncate(n);
    }

    let mut stats = PeopleStats::default();
    let mut rows: Vec<PersonRecord> = Vec::new();

    info!(companies = companies.len(), "starting profile discovery");

    for row in &companies {
        let domain = website_domain(&row.website).unwrap_or_default();
        let queries = build_people_queries(&row.name, &domain);
        if queries.is_empty() {
            continue;
        }
        stats.companies += 1;

        let mut seen: HashSet<String> = HashSet::new();
        'queries: for (i, query) in queries.iter().enumerate() {
            if i > 0 && !config.query_pause.is_zero() {
                tokio::time::sleep(config.query_pause).await;
            }

            let hits = match search.search(query, config.num_results).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(company = %row.name, error = %e, "profile query failed, skipping");
                    continue;
                }
            };

            for hit in hits {
                if !is_profile_url(&hit.url) || seen.contains(&hit.url) {
                    continue;
                }
                if !likely_employee(&hit.title, &hit.snippet, &row.name) {
                    continue;
                }
                seen.insert(hit.url.clone());
                rows.push(PersonRecord {
                    company: row.name.clone(),
                    website: row.website.clone(),
                    profile_url: hit.url,
                    title: hit.title,
                    snippet: hit.snippet,
                });
                if seen.len() >= config.per_company {
                    break 'queries;
                }
            }
        }
    }

    if let Some(parent) = config.output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MspScoutError::io(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(&config.output).map_err(|e| {
        MspScoutError::validation(format!("cannot write {}: {e}", config.output.display()))
    })?;
    for record in &rows {
        writer
            .serialize(record)
            .map_err(|e| MspScoutError::validation(format!("people row serialize: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| MspScoutError::validation(format!("people flush: {e}")))?;

    stats.profiles = rows.len();
    info!(
        companies = stats.companies,
        profiles = stats.profiles,
        "profile discovery complete"
    );
    Ok(stats)
}
