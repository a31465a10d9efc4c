use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

pub const RATE_LIMIT_RESET_BUFFER: Duration = Duration::from_secs(5);
pub const FALLBACK_WAIT: Duration = Duration::from_secs(60);

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Primary rate limit as last reported by GitHub on a successful response.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RateLimitState {
    /// -1 until the first successful response.
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            remaining: -1,
            reset_at: DateTime::<Utc>::default(),
        }
    }
}

impl RateLimitState {
    /// Absent or unparseable headers keep the previous value.
    pub fn update_from_headers(&mut self, headers: &HeaderMap) {
        if let Some(n) = header_i64(headers, REMAINING_HEADER) {
            self.remaining = n;
        }
        if let Some(reset) = header_i64(headers, RESET_HEADER).and_then(epoch_to_utc) {
            self.reset_at = reset;
        }
    }

    /// How long to hold off before the next request, if the quota is spent.
    pub fn preemptive_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining != 0 {
            return None;
        }
        positive_until(self.reset_at, now)
    }
}

/// What to do with a response, decided from its status and headers alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    SecondaryLimited { wait: Duration },
    PrimaryLimited { wait: Duration },
    Unexpected,
}

pub fn classify_response(
    status: StatusCode,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Disposition {
    match status {
        StatusCode::OK => Disposition::Success,
        StatusCode::TOO_MANY_REQUESTS => Disposition::SecondaryLimited {
            wait: secondary_wait(headers),
        },
        StatusCode::FORBIDDEN if is_quota_exhausted(headers) => Disposition::PrimaryLimited {
            wait: primary_wait(headers, now),
        },
        _ => Disposition::Unexpected,
    }
}

// A 403 without a zero remaining count is an auth or permission failure.
fn is_quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get(REMAINING_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s == "0")
        .unwrap_or(false)
}

fn secondary_wait(headers: &HeaderMap) -> Duration {
    header_i64(headers, RETRY_AFTER.as_str())
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or(FALLBACK_WAIT)
}

fn primary_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    header_i64(headers, RESET_HEADER)
        .and_then(epoch_to_utc)
        .and_then(|reset| positive_until(reset, now))
        .unwrap_or(FALLBACK_WAIT)
}

// Time from `now` until `reset` plus the buffer, when that is still ahead.
fn positive_until(reset: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let buffer = chrono::Duration::from_std(RATE_LIMIT_RESET_BUFFER).ok()?;
    (reset + buffer - now)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

fn epoch_to_utc(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(epoch, 0)
}
