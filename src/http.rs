//! Request and response values exchanged with the transport.
//!
//! These types are deliberately small: the transport owns the wire format,
//! this crate only needs enough of a request to reissue it and enough of a
//! response to make retry decisions.

use std::time::Duration;

use crate::error::HttpError;

/// Options accompanying a request.
///
/// `delay` is consumed by the promise client and never reaches the transport:
/// it defers issuance of this specific call and does not carry over to
/// retries of it.
///
/// # Examples
///
/// ```rust
/// use undertow::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .with_header("accept", "application/json")
///     .with_delay(Duration::from_millis(250));
///
/// let (delay, forwarded) = options.take_delay();
/// assert_eq!(delay, Some(Duration::from_millis(250)));
/// assert_eq!(forwarded.delay, None);
/// assert_eq!(forwarded.headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestOptions {
    /// Request headers, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout forwarded to the transport.
    pub timeout: Option<Duration>,
    /// Defer issuance of this call by the given duration.
    pub delay: Option<Duration>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the per-request transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Defer issuance of the request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Split off the `delay` directive, returning the options to forward.
    pub fn take_delay(mut self) -> (Option<Duration>, Self) {
        let delay = self.delay.take();
        (delay, self)
    }
}

/// A request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Options forwarded to the transport. `options.delay` is always `None`.
    pub options: RequestOptions,
}

impl Request {
    /// Create a request.
    pub fn new(method: impl Into<String>, url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            options,
        }
    }

    /// Check the method and URL for obvious malformation.
    ///
    /// Methods must be non-empty and consist of uppercase ASCII letters only;
    /// URLs must be non-empty and free of whitespace.
    pub fn validate(&self) -> Result<(), HttpError> {
        validate_method(&self.method)?;
        if self.url.is_empty() || self.url.chars().any(char::is_whitespace) {
            return Err(HttpError::invalid_argument(format!(
                "Invalid URL \"{}\"",
                self.url
            )));
        }
        Ok(())
    }
}

/// Check that `method` only contains uppercase letters.
pub fn validate_method(method: &str) -> Result<(), HttpError> {
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(HttpError::invalid_argument(format!(
            "Invalid HTTP method \"{}\", only uppercase letters are accepted",
            method
        )));
    }
    Ok(())
}

/// A completed HTTP response.
///
/// # Examples
///
/// ```rust
/// use undertow::Response;
///
/// let response = Response::new(429).with_header("Retry-After", "2");
/// assert_eq!(response.status(), 429);
/// assert_eq!(response.header("retry-after"), Some("2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Create a response with the given status and no headers or body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// First value of the named header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All headers in the order the transport reported them.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_method() {
        assert!(validate_method("GET").is_ok());
        assert!(validate_method("PATCH").is_ok());
        assert!(validate_method("BAD.METHOD").unwrap_err().is_invalid_argument());
        assert!(validate_method("get").is_err());
        assert!(validate_method("").is_err());
    }

    #[test]
    fn test_validate_url() {
        let ok = Request::new("GET", "http://test/", RequestOptions::new());
        assert!(ok.validate().is_ok());

        let bad = Request::new("GET", "http://te st/", RequestOptions::new());
        assert!(bad.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = Response::new(200)
            .with_header("Content-Type", "application/json")
            .with_header("content-type", "text/plain");
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn test_take_delay_strips_directive() {
        let options = RequestOptions::new()
            .with_body("foo=0123456789")
            .with_delay(Duration::from_millis(10));
        let (delay, forwarded) = options.take_delay();
        assert_eq!(delay, Some(Duration::from_millis(10)));
        assert_eq!(forwarded.delay, None);
        assert_eq!(forwarded.body.as_deref(), Some(&b"foo=0123456789"[..]));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_response_serde_round_trip() {
        let response = Response::new(200).with_header("x", "y").with_body("ok");
        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
