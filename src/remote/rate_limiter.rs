//! Per-host request pacing.
//!
//! [`RateLimiter`] enforces a minimum delay between requests to the same host
//! and honours server-mandated holds: once a host answers with `Retry-After`
//! or an exhausted quota, every worker waits for the hold to expire before its
//! next request to that host.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use repofetch_core::remote::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(250));
//! limiter.acquire("https://api.github.com/repos/o/r/contents/").await; // immediate
//! limiter.acquire("https://api.github.com/repos/o/r/contents/src").await; // waits ~250ms
//! limiter.acquire("https://raw.githubusercontent.com/o/r/main/a.rs").await; // other host, immediate
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Per-host rate limiter shared by every request of a run.
///
/// Wrap in `Arc` to share across tasks. Per-host state is cloned out of the
/// `DashMap` before awaiting so no shard lock is held across a sleep.
#[derive(Debug)]
pub struct RateLimiter {
    default_delay: Duration,
    disabled: bool,
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug, Default)]
struct HostTiming {
    /// `None` until the first request to this host.
    last_request: Option<Instant>,
    /// Server-mandated hold; no request may start before it.
    hold_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct HostState {
    timing: Mutex<HostTiming>,
    cumulative_delay_ms: AtomicU64,
}

impl HostState {
    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a limiter spacing same-host requests by at least `default_delay`.
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        debug!(delay_ms = default_delay.as_millis(), "creating rate limiter");
        Self {
            default_delay,
            disabled: default_delay.is_zero(),
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter with no minimum spacing. Server-mandated holds are
    /// still honoured.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether minimum spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum spacing between same-host requests.
    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    fn state_for(&self, host: &str) -> Arc<HostState> {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostState::default()))
            .clone()
    }

    /// Waits until a request to `url`'s host may start.
    ///
    /// The start slot is reserved under the host lock; the wait happens after
    /// the lock is released and the future may be dropped at any point.
    #[instrument(level = "trace", skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self.state_for(&host);
        let now = Instant::now();
        let (ready_at, held) = {
            let mut timing = state.timing.lock().await;
            let spacing_ready = match timing.last_request {
                Some(last) if !self.disabled => last + self.default_delay,
                _ => now,
            };
            let held = timing.hold_until.filter(|hold| *hold > spacing_ready && *hold > now);
            let ready_at = held.unwrap_or(spacing_ready).max(now);
            timing.last_request = Some(ready_at);
            (ready_at, held.is_some())
        };

        if ready_at <= now {
            return;
        }

        let delay = ready_at - now;
        let cumulative = state.add_cumulative_delay(delay);
        if held {
            info!(
                host = %host,
                wait_secs = delay.as_secs(),
                "waiting out server rate limit before next request"
            );
        } else {
            debug!(
                host = %host,
                delay_ms = delay.as_millis(),
                cumulative_ms = cumulative.as_millis(),
                "applying rate limit delay"
            );
        }
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                host = %host,
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive rate limiting - consider supplying an access token"
            );
        }
        tokio::time::sleep_until(ready_at).await;
    }

    /// Records a server-mandated hold for `url`'s host.
    #[instrument(level = "debug", skip(self), fields(host))]
    pub async fn record_rate_limit(&self, url: &str, delay: Duration) {
        let host = extract_host(url);
        tracing::Span::current().record("host", &host);

        let state = self.state_for(&host);
        let until = Instant::now() + delay.min(MAX_RETRY_AFTER);
        {
            let mut timing = state.timing.lock().await;
            timing.hold_until = Some(timing.hold_until.map_or(until, |h| h.max(until)));
        }

        warn!(
            host = %host,
            delay_secs = delay.as_secs(),
            "remote service is rate limiting requests; pausing this host"
        );
    }
}

/// Extracts the lowercase host from a URL, or `"unknown"` when unparseable.
///
/// ```
/// use repofetch_core::remote::rate_limiter::extract_host;
///
/// assert_eq!(extract_host("https://API.github.com/repos"), "api.github.com");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` value (integer seconds or HTTP-date).
///
/// Negative or unparseable values yield `None`; past dates yield zero; values
/// above one hour are capped.
///
/// ```
/// use std::time::Duration;
/// use repofetch_core::remote::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    Some(
        datetime
            .duration_since(SystemTime::now())
            .map_or(Duration::ZERO, |d| d.min(MAX_RETRY_AFTER)),
    )
}

/// Parses an `x-ratelimit-reset` value (UTC epoch seconds) into the time left
/// until the quota resets, capped at one hour.
#[must_use]
pub fn parse_rate_limit_reset(header_value: &str) -> Option<Duration> {
    let reset_epoch = header_value.trim().parse::<u64>().ok()?;
    let now_epoch = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(Duration::from_secs(reset_epoch.saturating_sub(now_epoch)).min(MAX_RETRY_AFTER))
}
