//! Client-side rate limiting for the GoHighLevel API
//!
//! GoHighLevel enforces two quotas per location: a burst window (100
//! requests per 10 seconds) and a daily window (200 000 requests per 24
//! hours). The limiter tracks outbound requests against both and tells the
//! caller whether to send now or how long to wait.
//!
//! ## Architecture
//!
//! - [`RateWindow`]: sliding log of request instants for one quota
//! - [`RateLimiter`]: both windows behind one mutex, so a check and the
//!   matching record happen atomically
//! - [`ServerRateLimit`]: the quota the server reports in `X-RateLimit-*`
//!   response headers
//!
//! ## Usage
//!
//! ```rust
//! use ghl_api::rate_limit::{Admission, RateLimiter};
//!
//! let limiter = RateLimiter::default();
//! match limiter.admit() {
//!     Admission::Proceed => { /* send the request */ }
//!     Admission::WaitFor(d) => { /* sleep `d`, then ask again */ }
//! }
//! ```
//!
//! Instants come from `tokio::time`, so tests with a paused runtime clock
//! can advance time deterministically.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use ghl_core::config::RateLimitingConfig;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default burst quota
pub const BURST_LIMIT: u32 = 100;
/// Default burst window
pub const BURST_PERIOD: Duration = Duration::from_secs(10);
/// Default daily quota
pub const DAILY_LIMIT: u32 = 200_000;
/// Default daily window
pub const DAILY_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// RateWindow
// ============================================================================

/// Decision returned by [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Capacity was available and the request has been recorded.
    Proceed,
    /// No capacity; nothing was recorded. Wait this long and ask again.
    WaitFor(Duration),
}

/// Sliding log of request instants for a single quota.
///
/// The log never holds more than `limit` entries: an entry is only pushed
/// when the window has capacity, and expired entries are evicted before
/// every check.
#[derive(Debug, Clone)]
pub struct RateWindow {
    limit: usize,
    period: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Creates an empty window. A zero `limit` is treated as 1.
    pub fn new(limit: u32, period: Duration) -> Self {
        let limit = (limit as usize).max(1);
        Self {
            limit,
            period,
            timestamps: VecDeque::with_capacity(limit.min(1024)),
        }
    }

    /// Drops entries that are `period` or more in the past.
    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_capacity(&self) -> bool {
        self.timestamps.len() < self.limit
    }

    /// Time until the oldest entry leaves the window.
    ///
    /// Only meaningful after [`evict`](Self::evict) on a full window, where
    /// the oldest entry is strictly younger than `period`, so the result is
    /// always positive.
    fn time_until_free(&self, now: Instant) -> Duration {
        match self.timestamps.front() {
            Some(&oldest) => (oldest + self.period)
                .saturating_duration_since(now)
                .max(Duration::from_millis(1)),
            None => Duration::ZERO,
        }
    }

    fn record(&mut self, now: Instant) {
        debug_assert!(self.has_capacity());
        self.timestamps.push_back(now);
    }

    /// Number of requests currently inside the window.
    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

#[derive(Debug)]
struct Windows {
    burst: RateWindow,
    daily: RateWindow,
}

/// In-window request counts, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateUsage {
    pub burst: usize,
    pub burst_limit: usize,
    pub daily: usize,
    pub daily_limit: usize,
}

/// Two-window admission control.
///
/// A request is admitted only when both the burst and the daily window have
/// capacity; admission records it in both. State lives in memory only and
/// resets when the process restarts.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(burst: RateWindow, daily: RateWindow) -> Self {
        Self {
            windows: Mutex::new(Windows { burst, daily }),
        }
    }

    /// Builds a limiter from the `rate_limiting` config section.
    pub fn from_config(config: &RateLimitingConfig) -> Self {
        Self::new(
            RateWindow::new(config.burst_limit, Duration::from_secs(config.burst_period_secs)),
            RateWindow::new(config.daily_limit, Duration::from_secs(config.daily_period_secs)),
        )
    }

    /// Ask for admission at the current instant.
    pub fn admit(&self) -> Admission {
        self.admit_at(Instant::now())
    }

    /// Ask for admission at `now`.
    ///
    /// On [`Admission::Proceed`] the request is recorded in both windows.
    /// On [`Admission::WaitFor`] nothing is recorded; the duration is the
    /// longest wait among the full windows, so a single sleep of that length
    /// is always enough for the next call to proceed (absent other callers).
    pub fn admit_at(&self, now: Instant) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.burst.evict(now);
        windows.daily.evict(now);

        let burst_full = !windows.burst.has_capacity();
        let daily_full = !windows.daily.has_capacity();

        if !burst_full && !daily_full {
            windows.burst.record(now);
            windows.daily.record(now);
            return Admission::Proceed;
        }

        let mut wait = Duration::ZERO;
        if burst_full {
            wait = wait.max(windows.burst.time_until_free(now));
        }
        if daily_full {
            wait = wait.max(windows.daily.time_until_free(now));
        }
        debug!(
            burst = windows.burst.count(),
            daily = windows.daily.count(),
            wait_ms = wait.as_millis() as u64,
            "Rate window full"
        );
        Admission::WaitFor(wait)
    }

    /// Current in-window counts.
    pub fn usage(&self) -> RateUsage {
        self.usage_at(Instant::now())
    }

    pub fn usage_at(&self, now: Instant) -> RateUsage {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.burst.evict(now);
        windows.daily.evict(now);
        RateUsage {
            burst: windows.burst.count(),
            burst_limit: windows.burst.limit(),
            daily: windows.daily.count(),
            daily_limit: windows.daily.limit(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            RateWindow::new(BURST_LIMIT, BURST_PERIOD),
            RateWindow::new(DAILY_LIMIT, DAILY_PERIOD),
        )
    }
}

// ============================================================================
// Server-reported limits
// ============================================================================

/// Quota as reported by the server in `X-RateLimit-*` headers.
///
/// Not every endpoint sends these headers; [`ServerRateLimit::from_headers`]
/// returns `None` in that case so a previous observation is not overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub interval: Option<Duration>,
    /// Unix time (seconds) at which the window resets
    pub reset_at: Option<f64>,
}

const LIMIT_HEADERS: [&str; 3] = ["x-ratelimit-remaining", "x-ratelimit-max", "x-ratelimit-limit"];

fn header_u64(headers: &HashMap<String, String>, name: &str) -> Option<u64> {
    headers.get(name).and_then(|v| v.trim().parse().ok())
}

impl ServerRateLimit {
    /// Parses lower-cased response headers.
    pub fn from_headers(headers: &HashMap<String, String>) -> Option<Self> {
        if !LIMIT_HEADERS.iter().any(|h| headers.contains_key(*h)) {
            return None;
        }
        let interval = header_u64(headers, "x-ratelimit-interval-milliseconds")
            .or_else(|| header_u64(headers, "x-ratelimit-interval-ms"))
            .map(Duration::from_millis);
        let reset_at = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|t| t.is_finite() && *t > 0.0);

        Some(Self {
            limit: header_u64(headers, "x-ratelimit-max")
                .or_else(|| header_u64(headers, "x-ratelimit-limit")),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
            interval,
            reset_at,
        })
    }

    /// How long the server asks us to back off, if it said anything.
    ///
    /// The longer of the interval and the time left until `reset_at`.
    pub fn suggested_wait(&self) -> Option<Duration> {
        let until_reset = self.reset_at.map(|reset| {
            let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
            Duration::from_secs_f64((reset - now).clamp(0.0, 3600.0))
        });
        match (self.interval, until_reset) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Longest `Retry-After` honoured.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - A number of seconds (e.g., "30" or "1.5")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT") - parsed as seconds from now
///
/// Returns `None` when the value cannot be parsed or lies more than an hour
/// in the future.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    let wait = if let Ok(seconds) = value.parse::<u64>() {
        Some(Duration::from_secs(seconds))
    } else if let Ok(seconds) = value.parse::<f64>() {
        (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
    } else if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        Some(remaining.to_std().unwrap_or(Duration::ZERO))
    } else {
        None
    };

    if let Some(wait) = wait {
        if wait <= MAX_RETRY_AFTER {
            return Some(wait);
        }
        warn!(value, "Ignoring Retry-After beyond one hour");
        return None;
    }

    warn!(value, "Could not parse Retry-After header");
    None
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: u32, burst_secs: u64, daily: u32, daily_secs: u64) -> RateLimiter {
        RateLimiter::new(
            RateWindow::new(burst, Duration::from_secs(burst_secs)),
            RateWindow::new(daily, Duration::from_secs(daily_secs)),
        )
    }

    // ====================================================================
    // RateWindow
    // ====================================================================

    #[test]
    fn test_window_zero_limit_is_one() {
        let window = RateWindow::new(0, Duration::from_secs(1));
        assert_eq!(window.limit(), 1);
    }

    #[test]
    fn test_window_evicts_entries_exactly_one_period_old() {
        let start = Instant::now();
        let mut window = RateWindow::new(2, Duration::from_secs(10));
        window.record(start);
        window.record(start + Duration::from_secs(5));

        window.evict(start + Duration::from_secs(10));
        assert_eq!(window.count(), 1);
    }

    // ====================================================================
    // Admission
    // ====================================================================

    #[test]
    fn test_admit_with_capacity_records_once_in_each_window() {
        let limiter = RateLimiter::default();
        let now = Instant::now();

        assert_eq!(limiter.admit_at(now), Admission::Proceed);

        let usage = limiter.usage_at(now);
        assert_eq!(usage.burst, 1);
        assert_eq!(usage.daily, 1);
        assert_eq!(usage.burst_limit, 100);
        assert_eq!(usage.daily_limit, 200_000);
    }

    #[test]
    fn test_denied_admission_records_nothing() {
        let limiter = limiter(2, 10, 100, 1000);
        let now = Instant::now();
        limiter.admit_at(now);
        limiter.admit_at(now);

        for _ in 0..5 {
            assert!(matches!(limiter.admit_at(now), Admission::WaitFor(_)));
        }
        let usage = limiter.usage_at(now);
        assert_eq!(usage.burst, 2);
        assert_eq!(usage.daily, 2);
    }

    #[test]
    fn test_counts_never_exceed_limits() {
        let limiter = limiter(5, 10, 12, 100);
        let start = Instant::now();

        // One poll every 500ms for 60 simulated seconds
        for step in 0..120u64 {
            let now = start + Duration::from_millis(step * 500);
            limiter.admit_at(now);
            let usage = limiter.usage_at(now);
            assert!(usage.burst <= 5, "burst {} at step {step}", usage.burst);
            assert!(usage.daily <= 12, "daily {} at step {step}", usage.daily);
        }
    }

    #[test]
    fn test_saturated_wait_is_positive_and_sufficient() {
        let limiter = limiter(3, 10, 1000, 86_400);
        let start = Instant::now();
        limiter.admit_at(start);
        limiter.admit_at(start + Duration::from_secs(2));
        limiter.admit_at(start + Duration::from_secs(4));

        let now = start + Duration::from_secs(5);
        let Admission::WaitFor(d) = limiter.admit_at(now) else {
            panic!("expected WaitFor");
        };
        assert_eq!(d, Duration::from_secs(5));
        assert_eq!(limiter.admit_at(now + d), Admission::Proceed);
    }

    #[test]
    fn test_wait_just_short_of_expiry_is_still_denied() {
        let limiter = limiter(1, 10, 1000, 86_400);
        let start = Instant::now();
        limiter.admit_at(start);

        let Admission::WaitFor(d) = limiter.admit_at(start) else {
            panic!("expected WaitFor");
        };
        assert!(d > Duration::ZERO);
        let early = start + d - Duration::from_millis(1);
        assert!(matches!(limiter.admit_at(early), Admission::WaitFor(_)));
    }

    #[test]
    fn test_daily_window_binds_after_burst_frees() {
        // Burst: 2 per 1s. Daily: 3 per 100s.
        let limiter = limiter(2, 1, 3, 100);
        let start = Instant::now();
        limiter.admit_at(start);
        limiter.admit_at(start);
        limiter.admit_at(start + Duration::from_secs(2));

        let now = start + Duration::from_secs(3);
        let Admission::WaitFor(d) = limiter.admit_at(now) else {
            panic!("expected WaitFor");
        };
        assert_eq!(d, Duration::from_secs(97));
        assert_eq!(limiter.admit_at(now + d), Admission::Proceed);
    }

    #[test]
    fn test_both_full_returns_longer_wait() {
        let limiter = limiter(2, 10, 2, 60);
        let start = Instant::now();
        limiter.admit_at(start);
        limiter.admit_at(start + Duration::from_secs(1));

        let now = start + Duration::from_secs(2);
        let Admission::WaitFor(d) = limiter.admit_at(now) else {
            panic!("expected WaitFor");
        };
        // Burst frees at 10s, daily at 60s
        assert_eq!(d, Duration::from_secs(58));
        assert_eq!(limiter.admit_at(now + d), Admission::Proceed);
    }

    #[test]
    fn test_from_config_uses_configured_windows() {
        let config = RateLimitingConfig {
            burst_limit: 7,
            burst_period_secs: 3,
            ..RateLimitingConfig::default()
        };
        let usage = RateLimiter::from_config(&config).usage();
        assert_eq!(usage.burst_limit, 7);
        assert_eq!(usage.daily_limit, 200_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_sleep_releases_window() {
        let limiter = limiter(1, 10, 100, 1000);
        assert_eq!(limiter.admit(), Admission::Proceed);

        let Admission::WaitFor(d) = limiter.admit() else {
            panic!("expected WaitFor");
        };
        tokio::time::sleep(d).await;
        assert_eq!(limiter.admit(), Admission::Proceed);
    }

    #[test]
    fn test_concurrent_admit_no_overallocation() {
        let limiter = std::sync::Arc::new(limiter(50, 3600, 1000, 86_400));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.admit() == Admission::Proceed)
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    // ====================================================================
    // Server headers
    // ====================================================================

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_server_limit_absent_without_headers() {
        let h = headers(&[("content-type", "application/json")]);
        assert!(ServerRateLimit::from_headers(&h).is_none());
    }

    #[test]
    fn test_server_limit_parses_ghl_headers() {
        let h = headers(&[
            ("x-ratelimit-max", "100"),
            ("x-ratelimit-remaining", "3"),
            ("x-ratelimit-interval-milliseconds", "10000"),
        ]);
        let limit = ServerRateLimit::from_headers(&h).unwrap();
        assert_eq!(limit.limit, Some(100));
        assert_eq!(limit.remaining, Some(3));
        assert_eq!(limit.interval, Some(Duration::from_secs(10)));
        assert!(limit.reset_at.is_none());
        assert_eq!(limit.suggested_wait(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_server_limit_alternate_header_names() {
        let h = headers(&[
            ("x-ratelimit-limit", "50"),
            ("x-ratelimit-interval-ms", "2000"),
            ("x-ratelimit-reset", "not-a-number"),
        ]);
        let limit = ServerRateLimit::from_headers(&h).unwrap();
        assert_eq!(limit.limit, Some(50));
        assert_eq!(limit.remaining, None);
        assert_eq!(limit.interval, Some(Duration::from_millis(2000)));
        assert!(limit.reset_at.is_none());
    }

    #[test]
    fn test_server_limit_reset_in_past_waits_interval() {
        let h = headers(&[
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-interval-milliseconds", "1500"),
            ("x-ratelimit-reset", "1000"),
        ]);
        let limit = ServerRateLimit::from_headers(&h).unwrap();
        assert_eq!(limit.suggested_wait(), Some(Duration::from_millis(1500)));
    }

    // ====================================================================
    // Retry-After
    // ====================================================================

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("1.5"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let future = chrono::Utc::now() + chrono::Duration::seconds(120);
        let header = future.to_rfc2822();
        let parsed = parse_retry_after(&header).unwrap();
        assert!(parsed <= Duration::from_secs(120));
        assert!(parsed >= Duration::from_secs(110));

        let past = chrono::Utc::now() - chrono::Duration::seconds(120);
        assert_eq!(parse_retry_after(&past.to_rfc2822()), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("3600"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_retry_after("86400"), None);
        assert_eq!(parse_retry_after("3600.5"), None);

        let far = chrono::Utc::now() + chrono::Duration::hours(2);
        assert_eq!(parse_retry_after(&far.to_rfc2822()), None);
    }

    #[test]
    fn test_parse_retry_after_invalid() {
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }
}
