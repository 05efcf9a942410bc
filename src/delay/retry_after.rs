use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::NaiveDateTime;

use super::{from_millis, DelayStrategy};
use crate::clock::{system_clock, SharedClock};
use crate::http::Response;

/// IMF-fixdate as sent in `Retry-After`, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Honours the `Retry-After` response header.
///
/// Accepts either a whole number of seconds or an HTTP date in GMT. Dates in
/// the past yield a zero delay. Abstains when there is no response, no
/// header, or the value is malformed.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{DelayStrategy, RetryAfterHeader};
/// use undertow::Response;
/// use std::time::Duration;
///
/// let strategy = RetryAfterHeader::new();
/// let response = Response::new(429).with_header("Retry-After", "2");
///
/// assert_eq!(strategy.delay(1, Some(&response)), Some(Duration::from_secs(2)));
/// assert_eq!(strategy.delay(1, None), None);
/// ```
#[derive(Debug, Clone)]
pub struct RetryAfterHeader {
    clock: SharedClock,
}

impl RetryAfterHeader {
    /// Interpret dates against the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Interpret dates against `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self { clock }
    }
}

impl Default for RetryAfterHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayStrategy for RetryAfterHeader {
    fn delay(&self, _count: u32, response: Option<&Response>) -> Option<Duration> {
        let value = response?.header("retry-after")?;
        parse_retry_after(value, self.clock.system_time())
    }
}

/// Parse a `Retry-After` value relative to `now`.
pub(crate) fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<u64>().ok().map(Duration::from_secs);
    }

    let date = NaiveDateTime::parse_from_str(value, HTTP_DATE).ok()?;
    let target_ms = date.and_utc().timestamp_millis();
    let now_ms = match now.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    };
    Some(from_millis(target_ms.saturating_sub(now_ms).max(0)))
}
