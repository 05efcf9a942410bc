use std::time::Duration;

use super::{
    from_millis, DelayCap, DelayJitter, DelayStrategy, ExponentialBackOff, RetryAfterHeader,
};
use crate::clock::{system_clock, SharedClock};
use crate::http::Response;

/// Tries strategies in order; the first one that does not abstain wins.
///
/// An empty chain, or one where every member abstains, abstains.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{ConstantDelay, DelayStrategy, DelayStrategyChain};
/// use std::time::Duration;
///
/// let chain = DelayStrategyChain::new()
///     .with(ConstantDelay::new(None)?)
///     .with(ConstantDelay::new(Some(40))?);
///
/// assert_eq!(chain.delay(1, None), Some(Duration::from_millis(40)));
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Default)]
pub struct DelayStrategyChain {
    strategies: Vec<Box<dyn DelayStrategy>>,
}

impl DelayStrategyChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy.
    pub fn with(mut self, strategy: impl DelayStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// The default retry delay.
    ///
    /// Honours `Retry-After` up to ten seconds; otherwise (or above that)
    /// falls back to exponential backoff from 500ms by 1.5, jittered by half
    /// and capped at five seconds.
    pub fn standard() -> Self {
        Self::standard_with_clock(system_clock())
    }

    /// [`standard`](Self::standard) with `Retry-After` dates read against `clock`.
    pub fn standard_with_clock(clock: SharedClock) -> Self {
        let retry_after = DelayCap {
            max: from_millis(10_000),
            inner: RetryAfterHeader::with_clock(clock),
            fallthrough: true,
        };
        let backoff = DelayCap {
            max: from_millis(5_000),
            inner: DelayJitter {
                factor: 0.5,
                inner: ExponentialBackOff {
                    base_ms: 500,
                    multiplier: 1.5,
                },
            },
            fallthrough: false,
        };
        Self::new().with(retry_after).with(backoff)
    }

    /// Number of strategies in the chain.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl DelayStrategy for DelayStrategyChain {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.delay(count, response))
    }
}

impl FromIterator<Box<dyn DelayStrategy>> for DelayStrategyChain {
    fn from_iter<I: IntoIterator<Item = Box<dyn DelayStrategy>>>(iter: I) -> Self {
        Self {
            strategies: iter.into_iter().collect(),
        }
    }
}
