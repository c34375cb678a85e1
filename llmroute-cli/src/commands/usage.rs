//! Usage command - quota counts per candidate.

use anyhow::Result;
use tracing::info;

use super::build_router;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the usage command.
pub async fn run(cli: &Cli) -> Result<()> {
    let router = build_router(cli)?;
    let quotas = router.quota_snapshot();

    info!(
        candidates = quotas.len(),
        backend = router.store_backend(),
        "Reading quota usage"
    );

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            if quotas.is_empty() {
                println!("No enabled candidates. Run `llmroute config init` to get started.");
                return Ok(());
            }

            println!("{}", formatter.format_usage_header());
            println!("{}", "─".repeat(96));
            for status in &quotas {
                println!("{}", formatter.format_quota_line(status));
            }

            println!();
            if router.rate_limiting_enabled() {
                println!("Counters: {} store", router.store_backend());
            } else {
                println!("Rate limiting is disabled");
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_usage(&quotas)?);
        }
    }

    Ok(())
}
