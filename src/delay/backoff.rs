use std::time::Duration;

use super::{from_millis, DelayStrategy};
use crate::error::ConfigError;
use crate::http::Response;

/// Delay grows geometrically: `round(base * multiplier^(count - 1))`.
///
/// Non-decreasing in `count` because the multiplier is at least one.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{DelayStrategy, ExponentialBackOff};
/// use std::time::Duration;
///
/// let strategy = ExponentialBackOff::new(500, 2.3)?;
/// assert_eq!(strategy.delay(3, None), Some(Duration::from_millis(2645)));
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackOff {
    pub(super) base_ms: i64,
    pub(super) multiplier: f64,
}

impl ExponentialBackOff {
    /// Create a backoff starting at `base_ms` and growing by `multiplier` per retry.
    pub fn new(base_ms: i64, multiplier: f64) -> Result<Self, ConfigError> {
        if base_ms < 0 {
            return Err(ConfigError::InvalidDelay(base_ms));
        }
        // Also rejects NaN.
        if !(multiplier >= 1.0) {
            return Err(ConfigError::InvalidMultiplier(multiplier));
        }
        Ok(Self {
            base_ms,
            multiplier,
        })
    }
}

impl DelayStrategy for ExponentialBackOff {
    fn delay(&self, count: u32, _response: Option<&Response>) -> Option<Duration> {
        let exponent = i32::try_from(count).unwrap_or(i32::MAX) - 1;
        let ms = (self.base_ms as f64 * self.multiplier.powi(exponent)).round();
        // Float to int casts saturate.
        Some(Duration::from_millis(ms as u64))
    }
}

/// Delay grows linearly: `base * count`.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{DelayStrategy, IncrementalBackOff};
/// use std::time::Duration;
///
/// let strategy = IncrementalBackOff::new(500)?;
/// assert_eq!(strategy.delay(2, None), Some(Duration::from_millis(1000)));
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalBackOff {
    base: Duration,
}

impl IncrementalBackOff {
    /// Create a backoff adding `base_ms` per retry.
    pub fn new(base_ms: i64) -> Result<Self, ConfigError> {
        if base_ms < 0 {
            return Err(ConfigError::InvalidDelay(base_ms));
        }
        Ok(Self {
            base: from_millis(base_ms),
        })
    }
}

impl DelayStrategy for IncrementalBackOff {
    fn delay(&self, count: u32, _response: Option<&Response>) -> Option<Duration> {
        Some(self.base.saturating_mul(count))
    }
}
