//! Promise-returning HTTP client over a multiplexing [`Transport`].
//!
//! [`PromiseHttpClient::request`] hands the request to the transport and
//! returns a [`Promise`] right away. Nothing settles until somebody waits:
//! either [`PromiseClient::wait`] on the client, which drains every in-flight
//! request, or [`Promise::wait`] on one promise, which drives the same loop
//! only until that promise's request completes.
//!
//! # Example
//!
//! ```rust
//! use undertow::testing::{MockClock, MockResponse, MockTransport};
//! use undertow::{ClientConfig, PromiseClient, PromiseHttpClient, RequestOptions};
//!
//! let clock = MockClock::new();
//! let transport = MockTransport::new(clock.clone())
//!     .with_responses([MockResponse::new(200), MockResponse::new(404)]);
//! let client = PromiseHttpClient::with_config(transport, ClientConfig::new().with_clock(clock.shared()));
//!
//! let found = client.request("GET", "http://test/a", RequestOptions::new());
//! let missing = client.request("GET", "http://test/b", RequestOptions::new());
//! assert!(found.is_pending());
//!
//! assert_eq!(client.wait(None, None), 0);
//! assert_eq!(found.wait().map(|r| r.status()), Ok(200));
//! assert_eq!(missing.wait().map(|r| r.status()), Ok(404));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::clock::{system_clock, SharedClock};
use crate::http::{Request, RequestOptions, Response};
use crate::promise::{Canceller, Promise, Resolver, Waiter};
use crate::transport::Transport;

mod pool;
mod scheduler;
mod wait_loop;

pub use pool::FuturePool;
pub(crate) use scheduler::{Deferred, Scheduler, Slot, Ticket};
pub(crate) use wait_loop::{Polled, WaitLoop};

#[cfg(test)]
mod tests;

/// Something that turns requests into promises of responses.
///
/// Implemented by [`PromiseHttpClient`] and by
/// [`RetryableHttpClient`](crate::RetryableHttpClient), so that decorators
/// can wrap either.
pub trait PromiseClient {
    /// Start a request.
    ///
    /// Synchronous failures (a malformed method or URL) come back as an
    /// already rejected promise. A positive `options.delay` defers issuance
    /// of this call by that long.
    fn request(&self, method: &str, url: &str, options: RequestOptions) -> Promise<Response>;

    /// Settle the promises of requests that complete within the given budgets.
    ///
    /// `max_duration` bounds the whole call; `Some(Duration::ZERO)` only
    /// collects what is ready without blocking. `idle_timeout` bounds each
    /// poll of the transport. Without `max_duration`, requests that stay
    /// idle past the idle timeout are rejected with
    /// [`HttpError::Timeout`](crate::HttpError::Timeout).
    ///
    /// Returns the number of requests still pending.
    fn wait(&self, max_duration: Option<Duration>, idle_timeout: Option<Duration>) -> usize;
}

/// Settings for a [`PromiseHttpClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    clock: SharedClock,
    poll_interval: Duration,
}

impl ClientConfig {
    /// System clock, 10ms poll interval.
    pub fn new() -> Self {
        Self {
            clock: system_clock(),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Measure time and sleep through `clock`.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// How long the async driver yields between non-blocking polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The clock.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The async poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Promise client over a [`Transport`].
///
/// Cloning is cheap; clones share the transport, the pool and the schedule.
pub struct PromiseHttpClient<T: Transport + 'static> {
    inner: Rc<ClientInner<T>>,
}

pub(crate) struct ClientInner<T> {
    pub(crate) transport: T,
    pub(crate) config: ClientConfig,
    pub(crate) pool: RefCell<FuturePool>,
    pub(crate) scheduler: RefCell<Scheduler>,
    /// Events polled but not processed yet, shared by nested waits.
    pub(crate) backlog: RefCell<VecDeque<Polled>>,
    next_key: Cell<u64>,
}

impl<T: Transport + 'static> PromiseHttpClient<T> {
    /// A client with the default [`ClientConfig`].
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::new())
    }

    /// A client with `config`.
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                transport,
                config,
                pool: RefCell::new(FuturePool::new()),
                scheduler: RefCell::new(Scheduler::default()),
                backlog: RefCell::new(VecDeque::new()),
                next_key: Cell::new(0),
            }),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// The configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Requests in flight plus requests waiting for their deferred issuance.
    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    pub(crate) fn inner(&self) -> &Rc<ClientInner<T>> {
        &self.inner
    }
}

impl<T: Transport + 'static> PromiseClient for PromiseHttpClient<T> {
    fn request(&self, method: &str, url: &str, options: RequestOptions) -> Promise<Response> {
        let (delay, options) = options.take_delay();
        let request = Request::new(method, url, options);

        let key = self.inner.next_key.get();
        self.inner.next_key.set(key + 1);
        let slot: Slot = Rc::new(Cell::new(Ticket::Deferred(key)));

        let (promise, resolver) = Promise::with_hooks(
            Some(waiter(Rc::downgrade(&self.inner), Rc::clone(&slot))),
            Some(canceller(Rc::downgrade(&self.inner), Rc::clone(&slot))),
        );

        match delay.filter(|d| !d.is_zero()) {
            Some(delay) => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "deferring request"
                );
                let due = saturating_add(self.inner.config.clock.now(), delay);
                self.inner.scheduler.borrow_mut().schedule(
                    due,
                    key,
                    Deferred {
                        request,
                        resolver,
                        slot,
                    },
                );
            }
            None => self.inner.issue(request, resolver, &slot),
        }
        promise
    }

    fn wait(&self, max_duration: Option<Duration>, idle_timeout: Option<Duration>) -> usize {
        WaitLoop::new(&self.inner, None, max_duration, idle_timeout).run()
    }
}

impl<T: Transport + 'static> Clone for PromiseHttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Transport + fmt::Debug + 'static> fmt::Debug for PromiseHttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseHttpClient")
            .field("transport", &self.inner.transport)
            .field("pool", &*self.inner.pool.borrow())
            .field("scheduled", &*self.inner.scheduler.borrow())
            .finish()
    }
}

impl<T: Transport + 'static> ClientInner<T> {
    pub(crate) fn pending(&self) -> usize {
        self.pool.borrow().len() + self.scheduler.borrow().len()
    }

    /// Hand `request` to the transport and track it, or reject on a synchronous failure.
    pub(crate) fn issue(&self, request: Request, resolver: Resolver<Response>, slot: &Slot) {
        match self.transport.issue(&request) {
            Ok(operation) => {
                tracing::trace!(
                    operation = %operation,
                    method = %request.method,
                    url = %request.url,
                    "issued request"
                );
                slot.set(Ticket::Issued(operation));
                self.pool.borrow_mut().attach(operation, resolver);
            }
            Err(error) => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    error = %error,
                    "request failed to issue"
                );
                resolver.reject(error);
            }
        }
    }

    /// Issue every deferred request whose time has come.
    pub(crate) fn issue_due(&self) {
        let due = self
            .scheduler
            .borrow_mut()
            .take_due(self.config.clock.now());
        for deferred in due {
            self.issue(deferred.request, deferred.resolver, &deferred.slot);
        }
    }

    /// Whether the request behind `slot` is neither scheduled nor in flight.
    pub(crate) fn is_done(&self, slot: &Slot) -> bool {
        match slot.get() {
            Ticket::Deferred(key) => !self.scheduler.borrow().contains(key),
            Ticket::Issued(operation) => !self.pool.borrow().contains(operation),
        }
    }

    /// Run the loop until the request behind `slot` settles.
    ///
    /// Returns false when there is nothing left to drive.
    fn drive(&self, slot: &Slot) -> bool {
        if self.is_done(slot) {
            return false;
        }
        WaitLoop::new(self, Some(slot), None, None).run();
        true
    }
}

/// `now + delay`, shortened to a far-future instant the platform can represent on overflow.
fn saturating_add(now: Instant, delay: Duration) -> Instant {
    let mut delay = delay;
    loop {
        match now.checked_add(delay) {
            Some(due) => return due,
            None => delay /= 2,
        }
    }
}

fn waiter<T: Transport + 'static>(client: Weak<ClientInner<T>>, slot: Slot) -> Waiter {
    Rc::new(move || client.upgrade().is_some_and(|client| client.drive(&slot)))
}

fn canceller<T: Transport + 'static>(client: Weak<ClientInner<T>>, slot: Slot) -> Canceller {
    Box::new(move || {
        let Some(client) = client.upgrade() else {
            return;
        };
        match slot.get() {
            Ticket::Issued(operation) => {
                tracing::debug!(operation = %operation, "cancelling request");
                client.transport.cancel(operation);
                client.pool.borrow_mut().detach(operation);
            }
            Ticket::Deferred(key) => {
                tracing::debug!("cancelling deferred request");
                client.scheduler.borrow_mut().remove(key);
            }
        }
    })
}
