//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use llmroute_store::{RouterConfig, StorageBackend, persistence::write_atomic};
use tracing::info;

use super::{config_path, load_config};
use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show configuration and counter store paths.
    Path,

    /// Check the configuration for errors.
    Validate,

    /// Write a starter configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Validate => validate_config(cli),
        ConfigAction::Init { force } => init_config(*force, cli),
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    match cli.format {
        OutputFormat::Text => print!("{}", config.to_yaml()?),
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    let config = load_config(cli)?;
    let backend = config.rate_limiting.storage_backend;
    let counters = (backend != StorageBackend::Memory)
        .then(|| config.rate_limiting.resolved_storage_path());

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config file:   {}", path.display());
            match &counters {
                Some(counters) => println!("Counters ({}): {}", backend_name(backend), counters.display()),
                None => println!("Counters:      in memory"),
            }
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_file": path.display().to_string(),
                "storage_backend": backend_name(backend),
                "storage_path": counters.map(|p| p.display().to_string()),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

fn validate_config(cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    let config = load_config(cli)?;

    let registry = match config.registry() {
        Ok(registry) => registry,
        Err(e) => {
            if !cli.quiet {
                eprintln!("{}: {e}", path.display());
            }
            std::process::exit(ExitCode::InvalidConfig as i32);
        }
    };

    let enabled = registry.providers().iter().filter(|p| p.enabled).count();
    match cli.format {
        OutputFormat::Text => {
            println!(
                "{}: OK ({} providers, {} enabled, {} candidates)",
                path.display(),
                registry.providers().len(),
                enabled,
                registry.len()
            );
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "config_file": path.display().to_string(),
                "valid": true,
                "providers": registry.providers().len(),
                "enabled": enabled,
                "candidates": registry.len(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&summary)?);
        }
    }

    Ok(())
}

fn init_config(force: bool, cli: &Cli) -> Result<()> {
    let path = config_path(cli);

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    write_atomic(&path, RouterConfig::example_yaml().as_bytes())?;
    info!(path = %path.display(), "Configuration written");
    println!("Wrote {}", path.display());

    Ok(())
}

fn backend_name(backend: StorageBackend) -> &'static str {
    match backend {
        StorageBackend::Json => "json",
        StorageBackend::Sqlite => "sqlite",
        StorageBackend::Memory => "memory",
    }
}
