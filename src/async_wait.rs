//! Driving the wait loop from async code.

use std::time::Duration;

use futures::FutureExt;

use crate::client::{PromiseClient, PromiseHttpClient};
use crate::error::HttpError;
use crate::promise::{Outcome, Promise};
use crate::transport::Transport;

impl<T: Transport + 'static> PromiseHttpClient<T> {
    /// Drive the loop until `promise` settles, yielding to the runtime between polls.
    ///
    /// Each round collects what the transport has ready without blocking,
    /// then sleeps on the tokio timer: until the next deferred request is
    /// due when nothing is in flight, for the configured poll interval
    /// otherwise. The returned future is not `Send`; run it on a
    /// current-thread runtime or a `LocalSet`.
    ///
    /// Returns [`HttpError::Unresolved`] if nothing is left to drive and the
    /// promise is still pending.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undertow::testing::{MockClock, MockResponse, MockTransport};
    /// use undertow::{ClientConfig, PromiseClient, PromiseHttpClient, RequestOptions};
    ///
    /// # tokio_test::block_on(async {
    /// let clock = MockClock::new();
    /// let transport = MockTransport::new(clock.clone()).with_response(MockResponse::new(200));
    /// let client = PromiseHttpClient::with_config(transport, ClientConfig::new().with_clock(clock.shared()));
    ///
    /// let promise = client.request("GET", "http://test/", RequestOptions::new());
    /// let response = client.wait_async(&promise).await;
    ///
    /// assert_eq!(response.map(|r| r.status()), Ok(200));
    /// # });
    /// ```
    pub async fn wait_async<V: Clone + 'static>(&self, promise: &Promise<V>) -> Outcome<V> {
        loop {
            self.wait(Some(Duration::ZERO), None);
            if let Some(outcome) = promise.clone().now_or_never() {
                return outcome;
            }
            if self.pending() == 0 {
                return promise.result().unwrap_or(Err(HttpError::Unresolved));
            }
            tokio::time::sleep(self.pause()).await;
        }
    }

    fn pause(&self) -> Duration {
        let inner = self.inner();
        let interval = inner.config.poll_interval();
        if !inner.pool.borrow().is_empty() {
            return interval;
        }
        match inner.scheduler.borrow().next_due() {
            Some(due) => due.saturating_duration_since(inner.config.clock().now()),
            None => interval,
        }
    }
}
