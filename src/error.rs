//! Error types for request issuance, settlement and configuration.

use std::fmt;

/// Failure carried by a rejected [`Promise`](crate::Promise).
///
/// The variants split into two groups. Transport failures
/// ([`InvalidArgument`](Self::InvalidArgument), [`Transport`](Self::Transport),
/// [`Timeout`](Self::Timeout), [`Status`](Self::Status)) come from the
/// underlying transport and are the only candidates for a retry. The remaining
/// variants are produced by the promise machinery itself.
///
/// Errors are compared by value, so a failure that survives a retry chain can
/// be checked against the original with `==`.
///
/// # Examples
///
/// ```rust
/// use undertow::HttpError;
///
/// let err = HttpError::transport("connection refused");
/// assert!(err.is_transport_failure());
/// assert_eq!(err.to_string(), "transport failure: connection refused");
///
/// assert!(!HttpError::Cancelled.is_transport_failure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The request was malformed (bad method or URL). Retrying cannot help.
    InvalidArgument(String),
    /// Network or I/O level failure.
    Transport(String),
    /// The idle timeout elapsed while the loop had no duration bound.
    Timeout(String),
    /// The transport reported an HTTP status as a failure.
    Status {
        /// The HTTP status code.
        code: u16,
        /// Description supplied by the transport.
        message: String,
    },
    /// The promise was cancelled before it settled.
    Cancelled,
    /// Waiting could not drive the promise to settlement.
    Unresolved,
}

impl HttpError {
    /// Create an [`HttpError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an [`HttpError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an [`HttpError::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create an [`HttpError::Status`].
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the failure originated in the transport.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Transport(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }

    /// Returns true for malformed-request failures.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true if the promise was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The status code of a [`HttpError::Status`] failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid request: {}", msg),
            Self::Transport(msg) => write!(f, "transport failure: {}", msg),
            Self::Timeout(msg) => write!(f, "idle timeout reached: {}", msg),
            Self::Status { code, message } => write!(f, "HTTP {} returned: {}", code, message),
            Self::Cancelled => write!(f, "promise has been cancelled"),
            Self::Unresolved => write!(f, "waiting did not resolve the promise"),
        }
    }
}

impl std::error::Error for HttpError {}

/// Error returned when a delay strategy is built with invalid arguments.
///
/// Construction fails fast so that a bad configuration never surfaces in the
/// middle of a retry sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A delay in milliseconds was negative.
    InvalidDelay(i64),
    /// A backoff multiplier was below one (or not a number).
    InvalidMultiplier(f64),
    /// A jitter factor was outside `[0, 1]` (or not a number).
    InvalidJitterFactor(f64),
    /// A delay cap was negative.
    InvalidCap(i64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDelay(ms) => write!(
                f,
                "delay in milliseconds must be greater than or equal to zero: {} given",
                ms
            ),
            Self::InvalidMultiplier(m) => write!(
                f,
                "multiplier must be greater than or equal to one: {} given",
                m
            ),
            Self::InvalidJitterFactor(factor) => {
                write!(f, "jitter factor must be between zero and one: {} given", factor)
            }
            Self::InvalidCap(ms) => write!(
                f,
                "maximum delay in milliseconds must be greater than or equal to zero: {} given",
                ms
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_transport_failure_classification() {
        assert!(HttpError::invalid_argument("bad method").is_transport_failure());
        assert!(HttpError::transport("refused").is_transport_failure());
        assert!(HttpError::timeout("idle").is_transport_failure());
        assert!(HttpError::status(503, "unavailable").is_transport_failure());
        assert!(!HttpError::Cancelled.is_transport_failure());
        assert!(!HttpError::Unresolved.is_transport_failure());
    }

    #[test]
    fn test_status_code_accessor() {
        assert_eq!(HttpError::status(429, "slow down").status_code(), Some(429));
        assert_eq!(HttpError::transport("x").status_code(), None);
    }

    #[test]
    fn test_http_error_display() {
        let err = HttpError::status(502, "bad gateway");
        assert_eq!(format!("{}", err), "HTTP 502 returned: bad gateway");
        assert!(format!("{}", HttpError::Cancelled).contains("cancelled"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidJitterFactor(1.5);
        assert!(format!("{}", err).contains("1.5"));

        let err = ConfigError::InvalidDelay(-1);
        assert!(format!("{}", err).contains("-1 given"));
    }
}
