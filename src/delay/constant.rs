use std::time::Duration;

use super::{from_millis, DelayStrategy};
use crate::error::ConfigError;
use crate::http::Response;

/// Always the same delay, or always abstain.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::{ConstantDelay, DelayStrategy};
/// use std::time::Duration;
///
/// let strategy = ConstantDelay::new(Some(250))?;
/// assert_eq!(strategy.delay(1, None), Some(Duration::from_millis(250)));
/// assert_eq!(strategy.delay(9, None), Some(Duration::from_millis(250)));
///
/// assert!(ConstantDelay::new(Some(-1)).is_err());
/// assert_eq!(ConstantDelay::new(None)?.delay(1, None), None);
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay {
    delay: Option<Duration>,
}

impl ConstantDelay {
    /// Create a constant delay of `ms` milliseconds, or an abstaining strategy for `None`.
    pub fn new(ms: Option<i64>) -> Result<Self, ConfigError> {
        match ms {
            Some(ms) if ms < 0 => Err(ConfigError::InvalidDelay(ms)),
            Some(ms) => Ok(Self {
                delay: Some(from_millis(ms)),
            }),
            None => Ok(Self { delay: None }),
        }
    }

    /// Retry immediately every time.
    pub fn zero() -> Self {
        Self {
            delay: Some(Duration::ZERO),
        }
    }
}

impl DelayStrategy for ConstantDelay {
    fn delay(&self, _count: u32, _response: Option<&Response>) -> Option<Duration> {
        self.delay
    }
}
