// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! llmroute CLI - quota-aware routing across LLM providers.
//!
//! # Examples
//!
//! ```bash
//! # Write a starter configuration
//! llmroute config init
//!
//! # Route a prompt to the first available candidate
//! llmroute query "Summarize RFC 9110 in one sentence"
//!
//! # Prefer specific candidates for this request
//! llmroute query "hello" --prefer google:gemini-1.5-flash,groq:llama-3.1-8b-instant
//!
//! # Quota usage in the current windows
//! llmroute usage --format json --pretty
//!
//! # Send a tiny prompt to every candidate
//! llmroute check
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{check, config, providers, query, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// llmroute CLI - quota-aware LLM request routing.
#[derive(Parser)]
#[command(name = "llmroute")]
#[command(about = "Quota-aware request router across LLM providers")]
#[command(long_about = r#"
llmroute sends each request to the first provider/model that has quota left
and a healthy track record, falling back down a configured priority list.

Supported provider kinds:
  • OpenAI (openai)
  • Anthropic (anthropic)
  • Google Gemini (google)
  • Groq (groq)
  • OpenRouter (openrouter)
  • Ollama (ollama)

Examples:
  llmroute config init               # Write a starter config
  llmroute query "hello"             # Route one prompt
  llmroute usage                     # Quota usage per candidate
  llmroute providers --format json   # Candidates as JSON
"#)]
#[command(version)]
#[command(author = "llmroute Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the configuration file (default: $LLMROUTE_CONFIG or the user config dir).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Route a prompt to the first available candidate.
    #[command(visible_alias = "q")]
    Query(query::QueryArgs),

    /// Show quota usage per candidate (default if no command specified).
    #[command(visible_alias = "u")]
    Usage,

    /// List candidates in priority order.
    #[command(visible_alias = "p")]
    Providers,

    /// Send a tiny prompt to every candidate.
    Check(check::CheckArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No candidate served the request.
    Exhausted = 2,
    /// The configuration is invalid.
    InvalidConfig = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("llmroute=debug,info")
    } else {
        EnvFilter::new("llmroute=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Query(args)) => query::run(args, &cli).await,
        Some(Commands::Usage) | None => usage::run(&cli).await,
        Some(Commands::Providers) => providers::run(&cli).await,
        Some(Commands::Check(args)) => check::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::Error as i32);
    }

    Ok(())
}
