//! Shared types, error model, and configuration for mspscout.
//!
//! This crate is the foundation depended on by all other mspscout crates.
//! It provides:
//! - [`MspScoutError`] — the unified error type
//! - Domain types ([`InputRecord`], [`SearchHit`], [`CacheEntry`], [`SummaryRecord`])
//! - Configuration ([`AppConfig`], config loading, credential checks)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GoogleConfig, OpenAiConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, require_env, validate_api_keys,
};
pub use error::{MspScoutError, Result};
pub use types::{
    CacheEntry, InputRecord, PersonRecord, RowOutcome, SearchHit, SummaryRecord, normalize_name,
};
