//! Fixed quota windows.
//!
//! Both windows are aligned to the Unix epoch: a minute window starts at a
//! timestamp divisible by 60, a day window at UTC midnight. A count belongs
//! to exactly one window and is never carried across a boundary.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MINUTE_SECS: i64 = 60;
const DAY_SECS: i64 = 86_400;

/// A fixed wall-clock quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaWindow {
    /// Wall-clock minute; limited by `rpm`.
    Minute,
    /// UTC day; limited by `rpd`.
    Day,
}

impl QuotaWindow {
    /// Storage suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Day => "day",
        }
    }

    fn length_secs(self) -> i64 {
        match self {
            Self::Minute => MINUTE_SECS,
            Self::Day => DAY_SECS,
        }
    }

    /// Returns the start of the window containing `now`.
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp();
        let start = secs - secs.rem_euclid(self.length_secs());
        DateTime::from_timestamp(start, 0).unwrap_or(now)
    }

    /// Returns the first instant of the next window.
    pub fn window_end(self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start(now) + chrono::Duration::seconds(self.length_secs())
    }

    /// Returns the time left until the current window resets.
    pub fn retry_after(self, now: DateTime<Utc>) -> Duration {
        (self.window_end(now) - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true if `start` is the start of the window containing `now`.
    pub fn is_current(self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.window_start(now) == start
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotaWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(Self::Minute),
            "day" => Ok(Self::Day),
            other => Err(format!("unknown quota window: {other}")),
        }
    }
}
