//! Composable strategies deciding how long to wait before a retry.
//!
//! A [`DelayStrategy`] maps the retry number (starting at 1) and, when one is
//! available, the response that triggered the retry, to a delay. Returning
//! `None` means the strategy abstains and lets an outer strategy or the
//! caller decide. That is different from `Some(Duration::ZERO)`, which means
//! "retry right away".
//!
//! Strategies are immutable values. Leaves hold primitive parameters; the
//! decorators ([`DelayJitter`], [`DelayCap`]) wrap another strategy and
//! [`DelayStrategyChain`] tries several in order.
//!
//! # Strategies
//!
//! - [`ConstantDelay`]: the same delay (or abstention) every time
//! - [`ExponentialBackOff`]: `round(base * multiplier^(count - 1))`
//! - [`IncrementalBackOff`]: `base * count`
//! - [`RetryAfterHeader`]: honours the `Retry-After` response header
//! - [`DelayJitter`]: randomises within a window shaped by the neighbouring delays
//! - [`DelayCap`]: clamps (or abstains above) a maximum
//! - [`DelayStrategyChain`]: first non-abstaining strategy wins
//!
//! # Example
//!
//! ```rust
//! use undertow::delay::{DelayCap, DelayStrategy, ExponentialBackOff};
//! use std::time::Duration;
//!
//! let strategy = DelayCap::new(1_000, ExponentialBackOff::new(100, 2.0)?, false)?;
//!
//! assert_eq!(strategy.delay(1, None), Some(Duration::from_millis(100)));
//! assert_eq!(strategy.delay(4, None), Some(Duration::from_millis(800)));
//! assert_eq!(strategy.delay(5, None), Some(Duration::from_millis(1_000)));
//! # Ok::<(), undertow::ConfigError>(())
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::http::Response;

mod backoff;
mod cap;
mod chain;
mod constant;
mod jitter;
mod retry_after;

pub use backoff::{ExponentialBackOff, IncrementalBackOff};
pub use cap::DelayCap;
pub use chain::DelayStrategyChain;
pub use constant::ConstantDelay;
pub use jitter::DelayJitter;
pub use retry_after::RetryAfterHeader;


/// Decides how long to wait before retry number `count`.
pub trait DelayStrategy: fmt::Debug {
    /// The delay before retry `count` (starting at 1), or `None` to abstain.
    ///
    /// `response` is the response that triggered the retry, if the attempt
    /// produced one.
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration>;
}

impl<S: DelayStrategy + ?Sized> DelayStrategy for Box<S> {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        (**self).delay(count, response)
    }
}

impl<S: DelayStrategy + ?Sized> DelayStrategy for Rc<S> {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        (**self).delay(count, response)
    }
}

impl<S: DelayStrategy + ?Sized> DelayStrategy for Arc<S> {
    fn delay(&self, count: u32, response: Option<&Response>) -> Option<Duration> {
        (**self).delay(count, response)
    }
}

/// Whole milliseconds of `delay`, saturating at `i64::MAX`.
pub(crate) fn as_millis(delay: Duration) -> i64 {
    i64::try_from(delay.as_millis()).unwrap_or(i64::MAX)
}

/// Convert a non-negative millisecond count to a duration.
pub(crate) fn from_millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
