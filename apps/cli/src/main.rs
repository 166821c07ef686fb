//! mspscout CLI — MSP lead enrichment tool.
//!
//! Turns a CSV of managed service providers into evidence-grounded company
//! summaries, and loads the results into a SQL-queryable table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Credentials are commonly kept in a local .env during development.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
