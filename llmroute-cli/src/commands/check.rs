//! Check command - send a tiny prompt to every candidate.
//!
//! Each probe is an ordinary routed request with a one-entry override, so
//! quotas and circuit breakers apply exactly as for real traffic.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use futures::future::join_all;
use llmroute_core::{CandidateKey, CompletionRequest, RouteRequest};
use tracing::{info, warn};

use super::build_router;
use crate::output::{CheckOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

const PROBE_PROMPT: &str = "Reply with the single word: ok";
const PROBE_MAX_TOKENS: u32 = 10;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Only check these candidates (comma-separated `provider:model`).
    #[arg(long, value_delimiter = ',')]
    pub candidate: Vec<String>,

    /// Per-probe deadline in seconds.
    #[arg(long, default_value = "30")]
    pub deadline: u64,
}

/// Runs the check command.
pub async fn run(args: &CheckArgs, cli: &Cli) -> Result<()> {
    let router = build_router(cli)?;

    let keys: Vec<CandidateKey> = if args.candidate.is_empty() {
        router.candidates().iter().map(|c| c.key.clone()).collect()
    } else {
        args.candidate
            .iter()
            .map(|s| s.parse::<CandidateKey>())
            .collect::<Result<_, _>>()
            .context("--candidate expects provider:model pairs")?
    };

    info!(candidates = keys.len(), "Checking candidates");

    let deadline = Duration::from_secs(args.deadline);
    let probes = keys.iter().map(|key| {
        let request = RouteRequest::new(
            CompletionRequest::new(PROBE_PROMPT).with_max_tokens(PROBE_MAX_TOKENS),
        )
        .with_override(vec![key.clone()])
        .with_deadline(deadline);
        router.submit(request)
    });
    let outcomes = join_all(probes).await;

    if let Err(e) = router.shutdown() {
        warn!(error = %e, "Failed to flush counters");
    }

    let results: Vec<CheckOutput> = keys
        .iter()
        .zip(&outcomes)
        .map(|(key, outcome)| CheckOutput::new(key, outcome))
        .collect();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            if results.is_empty() {
                println!("No enabled candidates to check");
            }
            for result in &results {
                println!("{}", formatter.format_check_line(result));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&results)?);
        }
    }

    if !results.is_empty() && results.iter().all(|r| !r.ok) {
        std::process::exit(ExitCode::Exhausted as i32);
    }

    Ok(())
}
