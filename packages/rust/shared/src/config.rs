//! Application configuration for mspscout.
//!
//! User config lives at `~/.mspscout/mspscout.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file — only the names of the
//! environment variables holding them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MspScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mspscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mspscout";

// ---------------------------------------------------------------------------
// Config structs (matching mspscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Google Programmable Search settings.
    #[serde(default)]
    pub google: GoogleConfig,

    /// OpenAI summarization settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for the on-disk search cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Directory for the profile-discovery search cache, kept separate so
    /// either cache can be cleared independently.
    #[serde(default = "default_people_cache_dir")]
    pub people_cache_dir: String,

    /// Results requested per search query.
    #[serde(default = "default_num_results")]
    pub num_results: u8,

    /// Hits kept per query when collecting evidence.
    #[serde(default = "default_hits_per_query")]
    pub hits_per_query: usize,

    /// Cap on deduplicated evidence hits passed to the summarizer.
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            people_cache_dir: default_people_cache_dir(),
            num_results: default_num_results(),
            hits_per_query: default_hits_per_query(),
            max_evidence: default_max_evidence(),
        }
    }
}

fn default_cache_dir() -> String {
    ".cache/msp_search".into()
}
fn default_people_cache_dir() -> String {
    ".cache/people_search".into()
}
fn default_num_results() -> u8 {
    10
}
fn default_hits_per_query() -> usize {
    5
}
fn default_max_evidence() -> usize {
    10
}

/// `[google]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_google_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the Programmable Search engine ID.
    #[serde(default = "default_google_cx_env")]
    pub cse_id_env: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_google_key_env(),
            cse_id_env: default_google_cx_env(),
        }
    }
}

fn default_google_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_google_cx_env() -> String {
    "GOOGLE_CSE_ID".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Default model for summarization.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_model(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mspscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MspScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mspscout/mspscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MspScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MspScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MspScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MspScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MspScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty env var by name, or fail with a config error naming it.
pub fn require_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(MspScoutError::config(format!(
            "missing credential: set the {var_name} environment variable"
        ))),
    }
}

/// Check that every API credential the enrichment run needs is present.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    require_env(&config.google.api_key_env)?;
    require_env(&config.google.cse_id_env)?;
    require_env(&config.openai.api_key_env)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("cache_dir"));
        assert!(toml_str.contains("GOOGLE_API_KEY"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.num_results, 10);
        assert_eq!(parsed.openai.model, "gpt-4o-mini");
        assert_eq!(parsed.google.cse_id_env, "GOOGLE_CSE_ID");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[openai]
model = "gpt-4.1-mini"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.openai.model, "gpt-4.1-mini");
        assert_eq!(config.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.defaults.max_evidence, 10);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.google.api_key_env = "MSPSCOUT_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_keys(&config);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("MSPSCOUT_TEST_NONEXISTENT_KEY_12345")
        );
    }
}
