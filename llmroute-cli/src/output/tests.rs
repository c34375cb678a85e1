//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

#[cfg(test)]
mod fixtures {
    use std::time::Duration;

    use llmroute_core::{
        AdapterError, CandidateAttempt, CandidateFailure, CandidateKey, CompletionResponse,
        QuotaWindow, RouteResult, RouterError, TokenUsage,
    };
    use llmroute_router::QuotaStatus;
    use llmroute_store::QuotaUsage;

    pub fn groq() -> CandidateKey {
        CandidateKey::new("groq", "llama-3.1-8b-instant")
    }

    pub fn google() -> CandidateKey {
        CandidateKey::new("google", "gemini-1.5-flash")
    }

    pub fn served() -> RouteResult {
        RouteResult {
            response: CompletionResponse {
                text: "Paris".to_string(),
                usage: Some(TokenUsage {
                    input_tokens: 12,
                    output_tokens: 3,
                }),
            },
            served_by: google(),
            latency: Duration::from_millis(850),
            skipped: vec![CandidateAttempt::skipped(
                groq(),
                CandidateFailure::RateLimited {
                    window: QuotaWindow::Minute,
                    retry_after: Duration::from_secs(42),
                },
            )],
        }
    }

    pub fn exhausted() -> RouterError {
        RouterError::AllProvidersExhausted {
            attempts: vec![
                CandidateAttempt::skipped(
                    groq(),
                    CandidateFailure::CircuitOpen {
                        retry_after: Duration::from_secs(90),
                    },
                ),
                CandidateAttempt::failed(
                    google(),
                    CandidateFailure::Adapter(AdapterError::server(503, "overloaded")),
                    Duration::from_millis(1200),
                ),
            ],
        }
    }

    pub fn quota(used_minute: u32, rpm: u32, used_day: u32, rpd: u32) -> QuotaStatus {
        QuotaStatus {
            usage: QuotaUsage {
                key: groq(),
                requests_this_minute: used_minute,
                requests_today: used_day,
                minute_resets_in: Duration::from_secs(17),
                day_resets_in: Duration::from_secs(5 * 3600 + 120),
            },
            rpm,
            rpd,
        }
    }
}

#[cfg(test)]
mod text_formatter_tests {
    use std::time::Duration;

    use super::fixtures;
    use super::super::json::{CheckOutput, ProviderInfoOutput};
    use super::super::text::{TextFormatter, format_duration};
    use llmroute_core::{ModelConfig, ProviderConfig, ProviderKind};

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50.0, "█████░░░░░"),
            (100.0, "██████████"),
        ];

        for (percent, expected) in test_cases {
            assert_eq!(formatter.progress_bar(percent), expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_format_query_result() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_query_result(&fixtures::served());

        assert!(output.starts_with("Paris\n"));
        assert!(output.contains("served by google:gemini-1.5-flash in 850ms"));
        assert!(output.contains("12 in / 3 out tokens"));
        assert!(output.contains("skipped groq:llama-3.1-8b-instant"));
        assert!(output.contains("rate_limited"));
    }

    #[test]
    fn test_format_failure_lists_every_candidate() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_failure(&fixtures::exhausted());

        assert!(output.contains("All providers exhausted (2 candidates tried)"));
        assert!(output.contains("circuit_open"));
        assert!(output.contains("server_error"));
        assert!(output.contains("after 1s"));
        assert!(output.contains("Earliest retry in 1m 30s"));
    }

    #[test]
    fn test_format_quota_line() {
        let formatter = TextFormatter::new(false);

        let line = formatter.format_quota_line(&fixtures::quota(15, 30, 100, 14400));
        assert!(line.contains("groq:llama-3.1-8b-instant"));
        assert!(line.contains("█████░░░░░ 15/30"));
        assert!(line.contains("100/14400"));
        assert!(line.contains("in 17s"));

        let exhausted_day = formatter.format_quota_line(&fixtures::quota(0, 30, 14400, 14400));
        assert!(exhausted_day.contains("in 5h 2m"));

        let idle = formatter.format_quota_line(&fixtures::quota(0, 30, 0, 14400));
        assert!(idle.contains('−'));
    }

    #[test]
    fn test_format_provider_line() {
        let formatter = TextFormatter::new(false);
        let provider = ProviderConfig::new("groq", ProviderKind::Groq);
        let model = ModelConfig::new("llama-3.1-8b-instant", 30, 14400);

        let ok = ProviderInfoOutput::new(&provider, &model, Some(0), true);
        let line = formatter.format_provider_line(&ok);
        assert!(line.starts_with('1'));
        assert!(line.contains("30 / 14400"));
        assert!(line.contains('✓'));

        let missing = ProviderInfoOutput::new(&provider, &model, Some(0), false);
        assert!(formatter.format_provider_line(&missing).contains("set GROQ_API_KEY"));

        let disabled = provider.clone().with_enabled(false);
        let off = ProviderInfoOutput::new(&disabled, &model, None, true);
        assert!(formatter.format_provider_line(&off).contains("disabled"));
    }

    #[test]
    fn test_format_check_line() {
        let formatter = TextFormatter::new(false);
        let served = fixtures::served();
        let ok = CheckOutput::new(&fixtures::google(), &Ok(served));
        let line = formatter.format_check_line(&ok);
        assert!(line.contains("✓ OK"));
        assert!(line.contains("850ms"));
        assert!(line.contains("Paris"));

        let failed = CheckOutput::new(&fixtures::google(), &Err(fixtures::exhausted()));
        let line = formatter.format_check_line(&failed);
        assert!(line.contains('✗'));
        assert!(line.contains("overloaded"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(192)), "3m 12s");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(18_180)), "5h 3m");
    }

    #[test]
    fn test_headers() {
        let formatter = TextFormatter::new(false);
        assert!(formatter.format_usage_header().contains("Candidate"));
        assert!(formatter.format_providers_header().contains("Credentials"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::fixtures;
    use super::super::json::{CheckOutput, JsonFormatter};

    #[test]
    fn test_format_compact_json() {
        let formatter = JsonFormatter::new(false);

        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();

        assert_eq!(output, r#"{"key":"value"}"#);
    }

    #[test]
    fn test_format_query_result() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.format_query_result(&fixtures::served()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["text"], "Paris");
        assert_eq!(parsed["servedBy"], "google:gemini-1.5-flash");
        assert_eq!(parsed["latencyMs"], 850);
        assert_eq!(parsed["usage"]["input_tokens"], 12);
        assert_eq!(parsed["skipped"][0]["reason"], "rate_limited");
        assert_eq!(parsed["skipped"][0]["retryAfterSecs"], 42);
        assert!(parsed["skipped"][0].get("elapsedMs").is_none());
    }

    #[test]
    fn test_format_failure() {
        let formatter = JsonFormatter::new(true);
        let output = formatter.format_failure(&fixtures::exhausted()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["error"], "all_providers_exhausted");
        assert_eq!(parsed["retryAfterSecs"], 90);
        let attempts = parsed["attempts"].as_array().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1]["reason"], "server_error");
        assert_eq!(attempts[1]["elapsedMs"], 1200);
    }

    #[test]
    fn test_format_usage() {
        let formatter = JsonFormatter::new(false);
        let output = formatter
            .format_usage(&[fixtures::quota(3, 30, 70, 14400)])
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed[0]["candidate"], "groq:llama-3.1-8b-instant");
        assert_eq!(parsed[0]["requestsThisMinute"], 3);
        assert_eq!(parsed[0]["rpd"], 14400);
        assert_eq!(parsed[0]["minuteResetsInSecs"], 17);
    }

    #[test]
    fn test_check_output_picks_candidate_reason() {
        let check = CheckOutput::new(&fixtures::groq(), &Err(fixtures::exhausted()));
        assert!(!check.ok);
        assert_eq!(check.reason, Some("circuit_open"));
        assert_eq!(check.error.as_deref(), Some("circuit open, retry in 90s"));
    }
}
