//! Automatic retries for promise clients.
//!
//! [`RetryableHttpClient`] wraps any [`PromiseClient`](crate::PromiseClient).
//! When an attempt settles, a [`RetryPolicy`] decides whether to try again,
//! a [`DelayStrategy`](crate::delay::DelayStrategy) decides how long to wait
//! first, and the retry is issued through the same inner client, deferred by
//! that delay. The caller only ever sees one promise.
//!
//! # Quick Start
//!
//! ```rust
//! use undertow::testing::{MockClock, MockResponse, MockTransport};
//! use undertow::{ClientConfig, PromiseClient, PromiseHttpClient, RequestOptions};
//! use undertow::{RetryOptions, RetryableHttpClient};
//! use std::time::Duration;
//!
//! let clock = MockClock::new();
//! let transport = MockTransport::new(clock.clone()).with_responses([
//!     MockResponse::new(503).with_header("Retry-After", "2"),
//!     MockResponse::new(200),
//! ]);
//! let client = RetryableHttpClient::new(
//!     PromiseHttpClient::with_config(transport, ClientConfig::new().with_clock(clock.shared())),
//!     RetryOptions::new().with_max_retries(3),
//! );
//!
//! let response = client.request("GET", "http://test/", RequestOptions::new()).wait();
//!
//! assert_eq!(response.map(|r| r.status()), Ok(200));
//! assert_eq!(clock.elapsed(), Duration::from_secs(2));
//! ```
//!
//! # Attempt Accounting
//!
//! With `max_retries = n` a request is issued at most `n + 1` times. Once the
//! ceiling is reached the last attempt's outcome is returned as is, even if
//! the policy would retry it: there is no synthetic "retries exhausted" error.
//!
//! Requests that fail before reaching the transport (a malformed method or
//! URL) are never retried.

mod client;
mod policy;

pub use client::{RetryEvent, RetryOptions, RetryableHttpClient};
pub use policy::{DefaultRetryPolicy, RetryPolicy};
