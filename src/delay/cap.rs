use std::time::Duration;

use super::{from_millis, DelayStrategy};
use crate::error::ConfigError;
use crate::http::Response;

/// Limits the delay of an inner strategy.
///
/// Above the cap, the delay is clamped to it; with `fallthrough` set the cap
/// abstains instead, so that a later strategy in a
/// [`DelayStrategyChain`](super::DelayStrategyChain) gets a say. An
/// abstaining inner strategy is passed through unchanged.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{ConstantDelay, DelayCap, DelayStrategy};
/// use std::time::Duration;
///
/// let clamp = DelayCap::new(123, ConstantDelay::new(Some(321))?, false)?;
/// assert_eq!(clamp.delay(1, None), Some(Duration::from_millis(123)));
///
/// let fall = DelayCap::new(123, ConstantDelay::new(Some(321))?, true)?;
/// assert_eq!(fall.delay(1, None), None);
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DelayCap<S> {
    pub(super) max: Duration,
    pub(super) inner: S,
    pub(super) fallthrough: bool,
}

impl<S: DelayStrategy> DelayCap<S> {
    /// Cap `inner` at `max_ms` milliseconds.
    pub fn new(max_ms: i64, inner: S, fallthrough: bool) -> Result<Self, ConfigError> {
        if max_ms < 0 {
            return Err(ConfigError::InvalidCap(max_ms));
        }
        Ok(Self {
            max: from_millis(max_ms),
            inner,
            fallthrough,
        })
    }

    /// The cap.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: DelayStrategy> DelayStrategy for DelayCap<S> {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        let delay = self.inner.delay(count, response)?;
        if delay <= self.max {
            Some(delay)
        } else if self.fallthrough {
            None
        } else {
            Some(self.max)
        }
    }
}
