//! CLI command implementations.

pub mod check;
pub mod config;
pub mod providers;
pub mod query;
pub mod usage;

use std::path::PathBuf;

use anyhow::{Context, Result};
use llmroute_router::{Router, RouterBuilder};
use llmroute_store::RouterConfig;
use tracing::debug;

use crate::Cli;

/// Returns the config path selected by `--config` or the environment.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(RouterConfig::default_path)
}

/// Loads the configuration file.
pub fn load_config(cli: &Cli) -> Result<RouterConfig> {
    let path = config_path(cli);
    debug!(path = %path.display(), "Loading configuration");
    RouterConfig::load_from(&path)
        .with_context(|| format!("failed to load {}", path.display()))
}

/// Loads the configuration and builds a router from it.
pub fn build_router(cli: &Cli) -> Result<Router> {
    let config = load_config(cli)?;
    let router = RouterBuilder::from_config(&config)
        .context("invalid configuration")?
        .build()
        .context("failed to open the counter store")?;
    Ok(router)
}
