//! Query command - route one prompt.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use llmroute_core::{CandidateKey, CompletionRequest, RouteRequest};
use tracing::{info, warn};

use super::build_router;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the query command.
#[derive(Args)]
pub struct QueryArgs {
    /// Prompt text.
    pub prompt: String,

    /// System instruction.
    #[arg(long, short)]
    pub system: Option<String>,

    /// Maximum tokens to generate.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long, short)]
    pub temperature: Option<f32>,

    /// Candidates to try, in order, for this request only.
    /// Comma-separated `provider:model` pairs.
    #[arg(long, value_delimiter = ',')]
    pub prefer: Vec<String>,

    /// Deadline for the whole request in seconds.
    #[arg(long)]
    pub deadline: Option<u64>,
}

impl QueryArgs {
    fn to_request(&self) -> Result<RouteRequest> {
        let mut payload = CompletionRequest::new(&self.prompt);
        if let Some(system) = &self.system {
            payload = payload.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            payload = payload.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            payload = payload.with_temperature(temperature);
        }

        let mut request = RouteRequest::new(payload);
        if !self.prefer.is_empty() {
            let order = self
                .prefer
                .iter()
                .map(|s| s.parse::<CandidateKey>())
                .collect::<Result<Vec<_>, _>>()
                .context("--prefer expects provider:model pairs")?;
            request = request.with_override(order);
        }
        if let Some(secs) = self.deadline {
            request = request.with_deadline(Duration::from_secs(secs));
        }
        Ok(request)
    }
}

/// Runs the query command.
pub async fn run(args: &QueryArgs, cli: &Cli) -> Result<()> {
    let request = args.to_request()?;
    let router = build_router(cli)?;

    info!(candidates = router.candidates().len(), "Submitting query");
    let outcome = router.submit(request).await;

    if let Err(e) = router.shutdown() {
        warn!(error = %e, "Failed to flush counters");
    }

    match outcome {
        Ok(result) => {
            match cli.format {
                OutputFormat::Text => {
                    let formatter = TextFormatter::new(!cli.no_color);
                    println!("{}", formatter.format_query_result(&result));
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    println!("{}", formatter.format_query_result(&result)?);
                }
            }
            Ok(())
        }
        Err(e) => {
            match cli.format {
                OutputFormat::Text => {
                    if !cli.quiet {
                        let formatter = TextFormatter::new(!cli.no_color);
                        eprintln!("{}", formatter.format_failure(&e));
                    }
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    println!("{}", formatter.format_failure(&e)?);
                }
            }
            std::process::exit(ExitCode::Exhausted as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> QueryArgs {
        match Cli::parse_from(argv).command {
            Some(crate::Commands::Query(args)) => args,
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_builds_request_with_override() {
        let args = parse(&[
            "llmroute",
            "query",
            "hello",
            "--system",
            "be brief",
            "--max-tokens",
            "64",
            "--prefer",
            "google:gemini-1.5-flash,ollama:llama3:8b",
            "--deadline",
            "15",
        ]);
        let request = args.to_request().unwrap();

        assert_eq!(request.payload.prompt, "hello");
        assert_eq!(request.payload.system.as_deref(), Some("be brief"));
        assert_eq!(request.payload.max_tokens, Some(64));
        assert_eq!(
            request.priority_override,
            Some(vec![
                CandidateKey::new("google", "gemini-1.5-flash"),
                CandidateKey::new("ollama", "llama3:8b"),
            ])
        );
        assert_eq!(request.deadline, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_rejects_malformed_preference() {
        let args = parse(&["llmroute", "query", "hello", "--prefer", "groq"]);
        assert!(args.to_request().is_err());
    }

    #[test]
    fn test_no_preference_uses_global_order() {
        let args = parse(&["llmroute", "query", "hello"]);
        let request = args.to_request().unwrap();
        assert!(request.priority_override.is_none());
        assert!(request.deadline.is_none());
    }
}
