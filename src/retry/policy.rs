//! Retry policies: which outcomes deserve another attempt.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::HttpError;
use crate::http::Response;

/// Decides whether a settled attempt should be retried.
///
/// Policies are stateless predicates; how long to wait and how often to
/// retry are decided elsewhere.
pub trait RetryPolicy: fmt::Debug {
    /// Whether a response warrants another attempt.
    fn on_response(&self, response: &Response) -> bool;

    /// Whether a failure warrants another attempt.
    ///
    /// Only transport failures (see [`HttpError::is_transport_failure`]) are
    /// ever passed here.
    fn on_failure(&self, error: &HttpError) -> bool;
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn on_response(&self, response: &Response) -> bool {
        (**self).on_response(response)
    }

    fn on_failure(&self, error: &HttpError) -> bool {
        (**self).on_failure(error)
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Rc<P> {
    fn on_response(&self, response: &Response) -> bool {
        (**self).on_response(response)
    }

    fn on_failure(&self, error: &HttpError) -> bool {
        (**self).on_failure(error)
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn on_response(&self, response: &Response) -> bool {
        (**self).on_response(response)
    }

    fn on_failure(&self, error: &HttpError) -> bool {
        (**self).on_failure(error)
    }
}

/// Retries a fixed set of status codes and every transport failure except
/// malformed requests.
///
/// # Examples
///
/// ```rust
/// use undertow::{DefaultRetryPolicy, HttpError, Response, RetryPolicy};
///
/// let policy = DefaultRetryPolicy::new();
///
/// assert!(policy.on_response(&Response::new(503)));
/// assert!(!policy.on_response(&Response::new(404)));
/// assert!(policy.on_failure(&HttpError::transport("connection reset")));
/// assert!(!policy.on_failure(&HttpError::invalid_argument("bad URL")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DefaultRetryPolicy {
    status_codes: Vec<u16>,
}

impl DefaultRetryPolicy {
    /// Status codes retried by [`DefaultRetryPolicy::new`].
    pub const STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

    /// Retry on 429, 500, 502, 503 and 504.
    pub fn new() -> Self {
        Self::with_status_codes(Self::STATUS_CODES)
    }

    /// Retry on `codes` instead.
    pub fn with_status_codes(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            status_codes: codes.into_iter().collect(),
        }
    }

    /// The retried status codes.
    pub fn status_codes(&self) -> &[u16] {
        &self.status_codes
    }
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn on_response(&self, response: &Response) -> bool {
        self.status_codes.contains(&response.status())
    }

    fn on_failure(&self, error: &HttpError) -> bool {
        match error {
            HttpError::InvalidArgument(_) => false,
            HttpError::Status { code, .. } => self.status_codes.contains(code),
            HttpError::Transport(_) | HttpError::Timeout(_) => true,
            HttpError::Cancelled | HttpError::Unresolved => false,
        }
    }
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    #[test]
    fn test_default_status_codes() {
        let policy = DefaultRetryPolicy::new();
        for code in [429, 500, 502, 503, 504] {
            assert!(policy.on_response(&Response::new(code)), "{code}");
        }
        for code in [200, 201, 301, 400, 404, 501] {
            assert!(!policy.on_response(&Response::new(code)), "{code}");
        }
    }

    #[test]
    fn test_failures() {
        let policy = DefaultRetryPolicy::new();

        assert!(policy.on_failure(&HttpError::transport("reset")));
        assert!(policy.on_failure(&HttpError::timeout("idle")));
        assert!(policy.on_failure(&HttpError::status(502, "bad gateway")));
        assert!(!policy.on_failure(&HttpError::status(404, "not found")));
        assert!(!policy.on_failure(&HttpError::invalid_argument("bad method")));
        assert!(!policy.on_failure(&HttpError::Cancelled));
    }

    #[test]
    fn test_custom_status_codes() {
        let policy = DefaultRetryPolicy::with_status_codes([408]);
        assert!(policy.on_response(&Response::new(408)));
        assert!(!policy.on_response(&Response::new(503)));
        assert_eq!(policy.status_codes(), &[408]);
    }

    #[test]
    fn test_policy_behind_pointer() {
        let policy: Rc<dyn RetryPolicy> = Rc::new(DefaultRetryPolicy::new());
        assert!(policy.on_response(&Response::new(429)));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let policy = DefaultRetryPolicy::with_status_codes([503]);
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"{"status_codes":[503]}"#);
        assert_eq!(serde_json::from_str::<DefaultRetryPolicy>(&json).unwrap(), policy);
    }
}
