//! Text output formatting with quota bars and colors.

use std::time::Duration;

use llmroute_core::{CandidateAttempt, RouteResult, RouterError};
use llmroute_router::QuotaStatus;

use super::json::{CheckOutput, ProviderInfoOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats a served request: the answer, then who served it.
    pub fn format_query_result(&self, result: &RouteResult) -> String {
        let mut lines = vec![result.response.text.clone(), String::new()];

        let mut footer = format!(
            "{} {} in {}",
            self.dim("served by"),
            self.cyan(&result.served_by.to_string()),
            format_duration(result.latency)
        );
        if let Some(usage) = result.response.usage {
            footer.push_str(&self.dim(&format!(
                " ({} in / {} out tokens)",
                usage.input_tokens, usage.output_tokens
            )));
        }
        lines.push(footer);

        for attempt in &result.skipped {
            lines.push(format!("  {} {}", self.dim("skipped"), self.format_attempt(attempt)));
        }

        lines.join("\n")
    }

    /// Formats a routing failure with one line per candidate.
    pub fn format_failure(&self, error: &RouterError) -> String {
        let mut lines = vec![self.red(&self.bold(&error.to_string()))];

        for attempt in error.attempts() {
            lines.push(format!("  {}", self.format_attempt(attempt)));
        }

        if let Some(wait) = error.earliest_retry() {
            lines.push(String::new());
            lines.push(format!("Earliest retry in {}", format_duration(wait)));
        }

        lines.join("\n")
    }

    /// Formats one candidate's outcome.
    pub fn format_attempt(&self, attempt: &CandidateAttempt) -> String {
        let reason = attempt.reason.code();
        let colored = match reason {
            "rate_limited" | "circuit_open" | "unregistered" => self.yellow(reason),
            _ => self.red(reason),
        };
        let mut line = format!("{:<40} {} - {}", attempt.key.to_string(), colored, attempt.reason);
        if !attempt.elapsed.is_zero() {
            line.push_str(&self.dim(&format!(" after {}", format_duration(attempt.elapsed))));
        }
        line
    }

    /// Formats the usage table header.
    pub fn format_usage_header(&self) -> String {
        format!(
            "{:<40} {:<24} {:<18} {}",
            self.bold("Candidate"),
            self.bold("Minute"),
            self.bold("Day"),
            self.bold("Resets")
        )
    }

    /// Formats one candidate's quota usage.
    pub fn format_quota_line(&self, status: &QuotaStatus) -> String {
        let usage = &status.usage;
        let minute_left = percent_remaining(usage.requests_this_minute, status.rpm);
        let day_left = percent_remaining(usage.requests_today, status.rpd);
        let tightest = minute_left.min(day_left);

        let minute = format!(
            "{} {}",
            self.progress_bar(minute_left),
            self.color_for_percent(
                minute_left,
                &format!("{}/{}", usage.requests_this_minute, status.rpm)
            )
        );
        let day = self.color_for_percent(day_left, &format!("{}/{}", usage.requests_today, status.rpd));
        let resets = if day_left <= 0.0 {
            usage.day_resets_in
        } else {
            usage.minute_resets_in
        };
        let resets = if tightest < 100.0 {
            format!("in {}", format_duration(resets))
        } else {
            "−".to_string()
        };

        format!(
            "{:<40} {:<24} {:<18} {}",
            usage.key.to_string(),
            minute,
            day,
            self.dim(&resets)
        )
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let filled = ((percent_remaining.clamp(0.0, 100.0) / 100.0) * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<4} {:<40} {:<11} {:<14} {:<8} {}",
            self.bold("#"),
            self.bold("Candidate"),
            self.bold("Kind"),
            self.bold("RPM / RPD"),
            self.bold("Timeout"),
            self.bold("Credentials")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, info: &ProviderInfoOutput) -> String {
        let priority = info
            .priority
            .map_or_else(|| self.dim("−"), |p| (p + 1).to_string());

        let credentials = match (info.enabled, info.credentials) {
            (false, _) => self.dim("disabled"),
            (true, true) => self.green("✓"),
            (true, false) => match &info.api_key_env {
                Some(env) => self.red(&format!("✗ set {env}")),
                None => self.red("✗"),
            },
        };

        format!(
            "{:<4} {:<40} {:<11} {:<14} {:<8} {}",
            priority,
            info.candidate,
            info.kind,
            format!("{} / {}", info.rpm, info.rpd),
            format!("{}s", info.timeout_secs),
            credentials
        )
    }

    /// Formats one `check` result.
    pub fn format_check_line(&self, check: &CheckOutput) -> String {
        if check.ok {
            let reply = check.reply.as_deref().map(first_line).unwrap_or_default();
            let latency = check.latency_ms.map(|ms| format!("{ms}ms")).unwrap_or_default();
            format!(
                "{:<40} {} {} {}",
                check.candidate,
                self.green("✓ OK"),
                self.dim(&latency),
                self.dim(&reply)
            )
        } else {
            format!(
                "{:<40} {} {}",
                check.candidate,
                self.red("✗"),
                check.error.as_deref().unwrap_or("failed")
            )
        }
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Percentage of `limit` still available.
fn percent_remaining(used: u32, limit: u32) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    (100.0 - f64::from(used) / f64::from(limit) * 100.0).max(0.0)
}

/// Renders a duration as `850ms`, `42s`, `3m 12s` or `5h 3m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs < 60 {
        return format!("{secs}s");
    }
    if secs < 3600 {
        let (m, s) = (secs / 60, secs % 60);
        return if s == 0 { format!("{m}m") } else { format!("{m}m {s}s") };
    }
    let (h, m) = (secs / 3600, (secs % 3600) / 60);
    if m == 0 { format!("{h}h") } else { format!("{h}h {m}m") }
}

fn first_line(text: &str) -> String {
    const MAX: usize = 60;
    let line = text.lines().next().unwrap_or_default().trim();
    match line.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
