//! Paragraf CLI: the main entry point.
//!
//! Commands:
//! - `ask`       Answer a question from retrieved legal sources
//! - `search`    Show the sources a question would retrieve
//! - `normalize` Run the OCR normalizer over a piece of text
//! - `config`    Show, locate, validate or initialize configuration
//! - `doctor`    Diagnose configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use paragraf_config::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::RetrievalArgs;

#[derive(Parser)]
#[command(
    name = "paragraf",
    about = "Paragraf: answers over German legal texts, grounded in retrieved sources",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.paragraf/config.toml)
    #[arg(long, global = true, env = "PARAGRAF_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from retrieved sources
    Ask {
        /// The question
        query: String,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,

        /// JSON file with prior turns: [{"role": "user", "content": "..."}]
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long, conflicts_with = "stream")]
        json: bool,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Retrieve sources without generating an answer
    Search {
        /// The question
        query: String,

        /// Print the sources as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Normalize OCR-damaged text
    Normalize {
        /// The text to repair
        text: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the config file location
    Path,
    /// Validate the configuration
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);

    init_tracing(&cli, &config_path);

    match cli.command {
        Commands::Ask {
            query,
            stream,
            history,
            json,
            retrieval,
        } => {
            let args = commands::ask::AskArgs {
                query,
                stream,
                history,
                json,
                retrieval,
            };
            commands::ask::run(&config_path, args).await?
        }
        Commands::Search { query, json, retrieval } => {
            commands::search::run(&config_path, &query, json, &retrieval).await?
        }
        Commands::Normalize { text } => commands::normalize::run(&text)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config_path)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path),
            ConfigAction::Validate => commands::config_cmd::validate(&config_path)?,
            ConfigAction::Init { force } => commands::config_cmd::init(&config_path, force)?,
        },
        Commands::Doctor => commands::doctor::run(&config_path).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins, then `-v`, then the configured `log_level`.
/// Logs go to stderr so answers on stdout stay pipeable.
fn init_tracing(cli: &Cli, config_path: &std::path::Path) {
    let fallback = if cli.verbose {
        "debug".to_string()
    } else {
        AppConfig::read_file(config_path)
            .map(|c| c.log_level)
            .unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
