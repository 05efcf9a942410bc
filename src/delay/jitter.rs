use std::time::Duration;

use super::{as_millis, from_millis, DelayStrategy};
use crate::error::ConfigError;
use crate::http::Response;

/// Randomises the delay of an inner strategy.
///
/// The window is shaped by the inner strategy's neighbouring delays: with
/// `d`, `lo` and `hi` the inner delays for `count`, `count - 1` and
/// `count + 1`, the result is drawn uniformly from
/// `[d - (d - lo) * factor, d + (hi - d) * factor]`. A factor of zero
/// disables jitter; a factor of one spans the whole gap to both neighbours.
/// A neighbour the inner strategy abstains on counts as `d`.
///
/// Without the `jitter` feature no randomness is available and the inner
/// delay is returned unchanged.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{DelayJitter, DelayStrategy, ExponentialBackOff};
/// use std::time::Duration;
///
/// let strategy = DelayJitter::new(0.2, ExponentialBackOff::new(100, 2.0)?)?;
/// let delay = strategy.delay(1, None).unwrap();
///
/// assert!(delay >= Duration::from_millis(90) && delay <= Duration::from_millis(120));
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DelayJitter<S> {
    pub(super) factor: f64,
    pub(super) inner: S,
}

impl<S: DelayStrategy> DelayJitter<S> {
    /// Jitter `inner` by `factor`, which must lie in `[0, 1]`.
    pub fn new(factor: f64, inner: S) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(ConfigError::InvalidJitterFactor(factor));
        }
        Ok(Self { factor, inner })
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The inclusive window, in milliseconds, a delay for `count` is drawn from.
    fn window(&self, count: u32, response: Option<&Response>) -> Option<(i64, i64, i64)> {
        let delay = as_millis(self.inner.delay(count, response)?);
        let neighbour = |n: u32| {
            self.inner
                .delay(n, response)
                .map(as_millis)
                .unwrap_or(delay)
        };
        let low = neighbour(count.saturating_sub(1));
        let high = neighbour(count.saturating_add(1));

        let from = delay - ((delay - low) as f64 * self.factor).round() as i64;
        let to = delay + ((high - delay) as f64 * self.factor).round() as i64;
        if from <= to {
            Some((from, delay, to))
        } else {
            Some((to, delay, from))
        }
    }
}

impl<S: DelayStrategy> DelayStrategy for DelayJitter<S> {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        let (from, delay, to) = self.window(count, response)?;
        Some(from_millis(sample(from.max(0), delay, to.max(0))))
    }
}

#[cfg(feature = "jitter")]
fn sample(from: i64, _delay: i64, to: i64) -> i64 {
    use rand::Rng;
    rand::rng().random_range(from..=to)
}

#[cfg(not(feature = "jitter"))]
fn sample(_from: i64, delay: i64, _to: i64) -> i64 {
    delay
}
