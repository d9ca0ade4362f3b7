//! Evidentia CLI: research runs, dialectical synthesis and literature search
//! from the terminal.

mod commands;

use clap::Parser;
use evidentia_core::error::ConfigError;
use evidentia_core::types::ProviderId;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Evidentia: multi-provider research orchestration
#[derive(Parser, Debug)]
#[command(name = "evidentia", version, about, long_about = None)]
pub struct Cli {
    /// Workspace directory (for `.evidentia/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path (replaces user and workspace config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the five-phase research pipeline on a question
    Research {
        /// Research question
        query: String,
        /// File whose contents are attached to every phase prompt
        #[arg(short, long)]
        attach: Option<PathBuf>,
        /// Active provider (defaults to the configured one)
        #[arg(short, long)]
        provider: Option<ProviderId>,
        /// Secondary provider; enables dialectical mode
        #[arg(short, long)]
        dialectic: Option<ProviderId>,
        /// Rewrite the question before the first phase
        #[arg(long)]
        enhance: bool,
        /// Skip bibliographic source search in the literature phase
        #[arg(long)]
        no_evidence: bool,
        /// Print the run as JSON instead of the report
        #[arg(long)]
        json: bool,
    },
    /// Ask two providers to analyze, cross-review and synthesize a prompt
    Dialectic {
        prompt: String,
        #[arg(long)]
        primary: Option<ProviderId>,
        #[arg(long)]
        secondary: ProviderId,
    },
    /// Search the configured bibliographic sources
    Search {
        query: String,
        /// Results requested per source per query
        #[arg(short, long)]
        limit: Option<usize>,
        /// Target number of unique results before broadening stops
        #[arg(short, long)]
        min: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Submit a question to the external research agent and wait for its report
    Job {
        query: String,
        /// Override the configured timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Inspect LLM providers
    Providers {
        #[command(subcommand)]
        action: ProvidersAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Browse completed research runs
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ProvidersAction {
    /// List providers with their model, fallback and key status
    List,
    /// Send a short probe to one provider, or all enabled providers
    Test { provider: Option<ProviderId> },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration with API keys masked
    Show,
    /// Print configuration warnings
    Validate,
}

#[derive(clap::Subcommand, Debug)]
pub enum HistoryAction {
    /// List recorded runs, newest first
    List,
    /// Print the report of one run
    Show { id: uuid::Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "evidentia", "evidentia")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from(".evidentia").join("logs"));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "evidentia.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(ConfigError::Invalid {
                message: format!("config file {} does not exist", path.display()),
            }
            .into());
        }
        Some(path) => evidentia_core::config::load_config_file(path),
        None => evidentia_core::config::load_config(Some(&workspace), None),
    }
    .map_err(ConfigError::from)?;

    commands::handle_command(cli.command, config, cli.quiet).await
}
