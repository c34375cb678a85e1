//! Providers command - list candidates in priority order.

use anyhow::Result;
use llmroute_core::CandidateKey;
use llmroute_providers::AdapterRegistry;
use tracing::info;

use super::load_config;
use crate::output::{JsonFormatter, ProviderInfoOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Collects one row per configured model, disabled providers included.
fn collect_rows(cli: &Cli) -> Result<Vec<ProviderInfoOutput>> {
    let config = load_config(cli)?;
    let registry = config.registry()?;

    let mut rows = Vec::new();
    for provider in registry.providers() {
        let credentials = AdapterRegistry::build(provider)
            .map(|adapter| adapter.is_configured())
            .unwrap_or(false);
        for model in &provider.models {
            let key = CandidateKey::new(&provider.name, &model.model);
            let priority = registry.candidates().iter().position(|c| c.key == key);
            rows.push(ProviderInfoOutput::new(provider, model, priority, credentials));
        }
    }

    Ok(rows)
}

/// Runs the providers command.
pub async fn run(cli: &Cli) -> Result<()> {
    info!("Listing providers");

    let rows = collect_rows(cli)?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(90));

            for row in &rows {
                println!("{}", formatter.format_provider_line(row));
            }

            println!();
            println!(
                "Total: {} candidates ({} ready)",
                rows.len(),
                rows.iter().filter(|r| r.enabled && r.credentials).count()
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&rows)?);
        }
    }

    Ok(())
}
