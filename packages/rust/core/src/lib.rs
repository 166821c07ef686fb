//! Enrichment pipeline orchestration for mspscout.
//!
//! Coordinates the search and summarizer clients over a CSV of company
//! rows, and provides the supporting CSV I/O, query building, and
//! deduplication helpers.

pub mod csvio;
pub mod dedupe;
pub mod people;
pub mod pipeline;
pub mod queries;

pub use dedupe::{KeepPolicy, dedupe_summaries};
pub use people::{PeopleConfig, PeopleStats, discover_people};
pub use pipeline::{EnrichConfig, ProgressReporter, RunStats, SilentProgress, enrich};
pub use queries::{build_queries, website_domain};
