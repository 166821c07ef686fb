//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mspscout_cache::FsCache;
use mspscout_core::pipeline::{EnrichConfig, ProgressReporter, RunStats, enrich};
use mspscout_core::{KeepPolicy, PeopleConfig, dedupe_summaries, discover_people};
use mspscout_search::{GoogleCredentials, SearchClient};
use mspscout_shared::{
    AppConfig, RowOutcome, init_config, load_config, require_env, validate_api_keys,
};
use mspscout_storage::{LoadMode, Storage};
use mspscout_summarize::SummarizerClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mspscout — enrich MSP company lists with search-grounded summaries.
#[derive(Parser)]
#[command(
    name = "mspscout",
    version,
    about = "Enrich a CSV of managed service providers with evidence-grounded summaries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search, summarize, and write a summaries CSV for each input company.
    Enrich {
        /// Input CSV with a company name column.
        #[arg(short, long, default_value = "data/raw/msp.csv")]
        input: PathBuf,

        /// Output CSV for the enriched records.
        #[arg(short, long, default_value = "data/processed/msp_summaries.csv")]
        output: PathBuf,

        /// Process at most this many pending rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Summarization model (defaults to the configured one).
        #[arg(long)]
        model: Option<String>,

        /// Search cache directory (defaults to the configured one).
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Reprocess every row, ignoring prior output.
        #[arg(long)]
        no_resume: bool,
    },

    /// Discover public LinkedIn profiles for each company via search.
    People {
        /// Companies CSV (a summaries file works; name/website are read).
        #[arg(short, long, default_value = "data/processed/msp_summaries.csv")]
        input: PathBuf,

        /// Output CSV for the discovered profiles.
        #[arg(short, long, default_value = "data/processed/msp_people.csv")]
        output: PathBuf,

        /// Process only the first N companies.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum profiles kept per company.
        #[arg(long, default_value_t = 25)]
        per_company: usize,

        /// Search cache directory (defaults to the configured one).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Bulk-load a summaries CSV into a local SQL table.
    LoadCsv {
        /// CSV file to load.
        #[arg(long)]
        csv: PathBuf,

        /// Database file.
        #[arg(long, default_value = "data/msp.db")]
        db_path: PathBuf,

        /// Destination table name.
        #[arg(long, default_value = "msp")]
        table: String,

        /// Drop and recreate the table from the CSV header.
        #[arg(long, conflicts_with = "append")]
        replace: bool,

        /// Insert into the existing table (columns must match).
        #[arg(long)]
        append: bool,

        /// Print the table's row count after loading.
        #[arg(long)]
        show_count: bool,
    },

    /// Load summaries and people CSVs into a relational schema.
    LoadDb {
        /// Summaries CSV for the companies table.
        #[arg(long, default_value = "data/processed/msp_summaries.csv")]
        summaries: PathBuf,

        /// People CSV for the people table (optional).
        #[arg(long)]
        people: Option<PathBuf>,

        /// Database file.
        #[arg(long, default_value = "data/msp.db")]
        db_path: PathBuf,
    },

    /// Remove duplicate companies from a summaries CSV.
    Dedupe {
        /// Input CSV.
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV for the deduplicated rows.
        #[arg(short, long)]
        output: PathBuf,

        /// Which duplicate to keep: first or last.
        #[arg(long, default_value = "first")]
        keep: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mspscout=info",
        1 => "mspscout=debug",
        _ => "mspscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich {
            input,
            output,
            limit,
            model,
            cache_dir,
            no_resume,
        } => cmd_enrich(input, output, limit, model, cache_dir, no_resume).await,
        Command::People {
            input,
            output,
            limit,
            per_company,
            cache_dir,
        } => cmd_people(input, output, limit, per_company, cache_dir).await,
        Command::LoadCsv {
            csv,
            db_path,
            table,
            replace,
            append,
            show_count,
        } => cmd_load_csv(&csv, &db_path, &table, replace, append, show_count).await,
        Command::LoadDb {
            summaries,
            people,
            db_path,
        } => cmd_load_db(&summaries, people.as_deref(), &db_path).await,
        Command::Dedupe {
            input,
            output,
            keep,
        } => cmd_dedupe(&input, &output, &keep).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    input: PathBuf,
    output: PathBuf,
    limit: Option<usize>,
    model: Option<String>,
    cache_dir: Option<PathBuf>,
    no_resume: bool,
) -> Result<()> {
    // Validate credentials before doing anything
    let config = load_config()?;
    validate_api_keys(&config)?;

    let credentials = GoogleCredentials {
        api_key: require_env(&config.google.api_key_env)?,
        cse_id: require_env(&config.google.cse_id_env)?,
    };
    let openai_key = require_env(&config.openai.api_key_env)?;
    let model = model.unwrap_or_else(|| config.openai.model.clone());

    let cache_dir = cache_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.cache_dir));
    let cache = Arc::new(FsCache::new(&cache_dir)?);

    let search = SearchClient::new(credentials, cache)?;
    let summarizer = SummarizerClient::new(openai_key, &model)?;

    let run_config = EnrichConfig {
        input,
        output,
        limit,
        resume: !no_resume,
        num_results: config.defaults.num_results,
        hits_per_query: config.defaults.hits_per_query,
        max_evidence: config.defaults.max_evidence,
        query_pause: Duration::from_millis(150),
    };

    info!(
        input = %run_config.input.display(),
        output = %run_config.output.display(),
        model,
        resume = run_config.resume,
        "starting enrichment run"
    );

    let reporter = CliProgress::new();
    let stats = enrich(&run_config, &search, &summarizer, &reporter).await?;

    println!();
    println!("  Enrichment run complete!");
    println!("  Rows:       {}", stats.rows_total);
    println!("  Processed:  {}", stats.processed);
    println!("  Written:    {}", stats.written);
    println!("  Failed:     {}", stats.failed);
    println!("  Skipped:    {}", stats.skipped_resume + stats.skipped_empty);
    println!("  Cache hits: {}", stats.cache_hits);
    println!("  API calls:  {}", stats.api_calls);
    println!("  Time:       {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_people(
    input: PathBuf,
    output: PathBuf,
    limit: Option<usize>,
    per_company: usize,
    cache_dir: Option<PathBuf>,
) -> Result<()> {
    // Only the search credentials are needed; no summarization happens here.
    let config = load_config()?;
    let credentials = GoogleCredentials {
        api_key: require_env(&config.google.api_key_env)?,
        cse_id: require_env(&config.google.cse_id_env)?,
    };

    let cache_dir = cache_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.people_cache_dir));
    let cache = Arc::new(FsCache::new(&cache_dir)?);
    let search = SearchClient::new(credentials, cache)?;

    let run_config = PeopleConfig {
        input,
        output,
        limit_companies: limit,
        per_company,
        num_results: config.defaults.num_results,
        query_pause: Duration::from_millis(200),
    };

    info!(
        input = %run_config.input.display(),
        output = %run_config.output.display(),
        per_company,
        "starting profile discovery"
    );

    let stats = discover_people(&run_config, &search).await?;

    println!();
    println!("  Profile discovery complete!");
    println!("  Companies:  {}", stats.companies);
    println!("  Profiles:   {}", stats.profiles);
    println!("  Cache hits: {}", search.cache_hits());
    println!("  API calls:  {}", search.api_calls());
    println!();

    Ok(())
}

async fn cmd_load_csv(
    csv: &PathBuf,
    db_path: &PathBuf,
    table: &str,
    replace: bool,
    append: bool,
    show_count: bool,
) -> Result<()> {
    let mode = if replace {
        LoadMode::Replace
    } else if append {
        LoadMode::Append
    } else {
        LoadMode::CreateOnly
    };

    info!(
        csv = %csv.display(),
        db = %db_path.display(),
        table,
        ?mode,
        "loading csv"
    );

    let storage = Storage::open(db_path).await?;
    let rows = storage.load_csv(csv, table, mode).await?;

    println!("Loaded {} into table '{table}'.", csv.display());
    if show_count {
        println!("Table '{table}' now contains {rows} rows.");
    }

    Ok(())
}

async fn cmd_load_db(
    summaries: &PathBuf,
    people: Option<&std::path::Path>,
    db_path: &PathBuf,
) -> Result<()> {
    info!(
        summaries = %summaries.display(),
        people = ?people.map(|p| p.display().to_string()),
        db = %db_path.display(),
        "loading relational schema"
    );

    let storage = Storage::open(db_path).await?;
    storage.create_schema().await?;
    let (companies, people_loaded) = storage.populate_companies_people(summaries, people).await?;

    println!(
        "Loaded {companies} companies and {people_loaded} people into {}.",
        db_path.display()
    );
    Ok(())
}

async fn cmd_dedupe(input: &PathBuf, output: &PathBuf, keep: &str) -> Result<()> {
    let keep: KeepPolicy = keep.parse()?;
    let (total, unique) = dedupe_summaries(input, output, "name", keep)?;

    println!(
        "Deduplicated {} rows to {} ({} duplicates removed).",
        total,
        unique,
        total - unique
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}] {name}"));
    }

    fn row_finished(&self, name: &str, outcome: RowOutcome) {
        if outcome == RowOutcome::Failed {
            self.spinner.println(format!("  [failed] {name}"));
        }
    }

    fn done(&self, _stats: &RunStats) {
        self.spinner.finish_and_clear();
    }
}
