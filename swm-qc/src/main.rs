//! swm-qc - replicate consolidation and threshold classification
//!
//! Administrative entry point. Every subcommand prints JSON on stdout; logs go
//! to stderr through the tracing subscriber.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use swm_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use swm_common::{Domain, LogContext};
use swm_qc::pipeline;
use swm_qc::QcState;
use tracing::info;

const MODULE_NAME: &str = "swm-qc";

#[derive(Parser, Debug)]
#[command(name = "swm-qc")]
#[command(about = "Replicate consolidation and threshold classification for stream monitoring data")]
#[command(version)]
struct Cli {
    /// Root folder holding the database and field-work log
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge chemical replicate events into their lowest event id
    Consolidate,

    /// Classify one value
    Classify {
        /// chemical, fish, macro or habitat
        #[arg(long)]
        domain: String,
        #[arg(long)]
        parameter: String,
        /// Omit to classify a missing value
        #[arg(long)]
        value: Option<f64>,
    },

    /// Replicate verdict from the field-work log
    MatchFieldLog {
        #[arg(long)]
        site: String,
        #[arg(long)]
        year: i32,
    },

    /// Resolve stored fish, macro or habitat duplicates
    Resolve {
        /// fish, macro or habitat
        #[arg(long)]
        domain: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = TomlConfig::load_or_default(cli.config.as_deref(), MODULE_NAME);
    swm_common::logging::init_tracing(&config.logging)?;
    source.log();

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(cli.root_folder.as_deref())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path(&config);
    info!(database = %db_path.display(), "Opening database");
    let pool = swm_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let log = LogContext::new(MODULE_NAME);
    let state = QcState::build(
        pool,
        &initializer.field_log_path(&config),
        &config.matching,
        log.clone(),
    )
    .await?;

    match cli.command {
        Command::Consolidate => {
            let stats = state.consolidator().consolidate().await?;
            print_json(&stats)?;
        }
        Command::Classify {
            domain,
            parameter,
            value,
        } => {
            let domain: Domain = domain.parse()?;
            print_json(&state.classifier.classify(domain, &parameter, value))?;
        }
        Command::MatchFieldLog { site, year } => {
            print_json(&state.field_log.match_site(&site, year))?;
        }
        Command::Resolve { domain } => {
            let domain: Domain = domain.parse()?;
            let report = match domain {
                Domain::Habitat => pipeline::resolve_habitat(&state.db, &state.classifier, &log).await?,
                Domain::Fish | Domain::Macro => {
                    pipeline::resolve_biological(&state.db, domain, &state.field_log, &state.classifier, &log)
                        .await?
                }
                Domain::Chemical => anyhow::bail!("Use 'consolidate' for chemical replicates"),
            };
            print_json(&report)?;
        }
    }

    state.db.close().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
