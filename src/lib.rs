//! # Undertow
//!
//! > *"What pulls you back out is the part you never see"*
//!
//! A resilience layer over a multiplexing HTTP transport: requests become
//! promises, one cooperative loop drives all of them, and failed requests are
//! retried behind the caller's back according to a composable delay algebra.
//!
//! ## Pieces
//!
//! - [`Promise`]: a single-threaded promise with chaining, flattening and cancellation
//! - [`PromiseHttpClient`]: issues requests through a [`Transport`] and settles
//!   their promises from a multiplexing wait loop
//! - [`RetryableHttpClient`]: retries requests of any [`PromiseClient`]
//! - [`delay`]: strategies deciding how long to wait before a retry
//! - [`testing`]: a scripted transport and a manual clock
//!
//! ## Quick Example
//!
//! ```rust
//! use undertow::prelude::*;
//! use undertow::testing::{MockClock, MockResponse, MockTransport};
//!
//! let clock = MockClock::new();
//! let transport = MockTransport::new(clock.clone()).with_responses([
//!     MockResponse::new(502),
//!     MockResponse::new(200).with_body("hello"),
//! ]);
//! let client = RetryableHttpClient::new(
//!     PromiseHttpClient::with_config(transport, ClientConfig::new().with_clock(clock.shared())),
//!     RetryOptions::new().with_max_retries(2),
//! );
//!
//! let greeting = client
//!     .request("GET", "http://example.test/", RequestOptions::new())
//!     .map(|response| response.text());
//!
//! assert_eq!(client.wait(None, None), 0);
//! assert_eq!(greeting.result(), Some(Ok("hello".to_string())));
//! ```
//!
//! ## Execution Model
//!
//! Everything runs on one thread. Promises settle only while somebody waits,
//! either on the client ([`PromiseClient::wait`]) or on a promise
//! ([`Promise::wait`]). Continuations run synchronously at settlement, in
//! the order they were attached, before the loop polls again; that is what
//! lets a continuation issue a retry into the very loop that is running it.
//!
//! With the `async` feature, `PromiseHttpClient::wait_async` drives the loop
//! from a tokio task without blocking it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod clock;
pub mod delay;
pub mod error;
pub mod http;
pub mod promise;
pub mod retry;
pub mod testing;
pub mod transport;

#[cfg(feature = "async")]
mod async_wait;

// Re-exports
pub use client::{ClientConfig, FuturePool, PromiseClient, PromiseHttpClient};
pub use clock::{Clock, SharedClock, SystemClock};
pub use delay::{DelayStrategy, DelayStrategyChain};
pub use error::{ConfigError, HttpError};
pub use http::{Request, RequestOptions, Response};
pub use promise::{Next, Outcome, Promise, PromiseState, Resolver};
pub use retry::{DefaultRetryPolicy, RetryEvent, RetryOptions, RetryPolicy, RetryableHttpClient};
pub use transport::{Chunk, Event, OperationId, Transport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{ClientConfig, PromiseClient, PromiseHttpClient};
    pub use crate::delay::{
        ConstantDelay, DelayCap, DelayJitter, DelayStrategy, DelayStrategyChain,
        ExponentialBackOff, IncrementalBackOff, RetryAfterHeader,
    };
    pub use crate::error::{ConfigError, HttpError};
    pub use crate::http::{RequestOptions, Response};
    pub use crate::promise::{Next, Promise};
    pub use crate::retry::{DefaultRetryPolicy, RetryOptions, RetryPolicy, RetryableHttpClient};
}
