use std::time::{Duration, Instant};

use super::{ClientInner, Slot};
use crate::error::HttpError;
use crate::transport::{Chunk, Event, OperationId, Transport};

/// One call of the multiplexing loop.
///
/// Polls the transport over every pooled operation and settles promises as
/// their operations complete. Continuations run as part of settlement, so they
/// observe completion before the next poll, and may issue new requests into
/// the pool being drained.
pub(crate) struct WaitLoop<'a, T> {
    client: &'a ClientInner<T>,
    target: Option<&'a Slot>,
    started: Instant,
    max_duration: Option<Duration>,
    idle_timeout: Option<Duration>,
}

/// A polled event waiting in the backlog.
///
/// Carries whether the poll that produced it counts an idle timeout as a
/// failure, so a later wait with other budgets never misreads it.
pub(crate) struct Polled {
    event: Event,
    idle_fails: bool,
}

impl<'a, T: Transport + 'static> WaitLoop<'a, T> {
    pub(crate) fn new(
        client: &'a ClientInner<T>,
        target: Option<&'a Slot>,
        max_duration: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let idle_timeout = match max_duration {
            Some(max) if max.is_zero() => Some(Duration::ZERO),
            Some(max) => Some((max / 5).min(idle_timeout.unwrap_or(max))),
            None => idle_timeout,
        };
        Self {
            client,
            target,
            started: client.config.clock.now(),
            max_duration,
            idle_timeout,
        }
    }

    /// Run until the target settles, nothing is pending, or the duration bound expires.
    ///
    /// Returns the number of requests still pending.
    pub(crate) fn run(mut self) -> usize {
        loop {
            self.client.issue_due();
            if self.target_done() {
                return self.client.pending();
            }

            let handles = self.client.pool.borrow().handles();
            if handles.is_empty() && self.client.backlog.borrow().is_empty() {
                let Some(due) = self.client.scheduler.borrow().next_due() else {
                    return 0;
                };
                let mut pause = due.saturating_duration_since(self.client.config.clock.now());
                if let Some(remaining) = self.remaining() {
                    if remaining.is_zero() {
                        return self.client.pending();
                    }
                    pause = pause.min(remaining);
                }
                tracing::trace!(
                    pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                    "sleeping until deferred request"
                );
                self.client.config.clock.sleep(pause);
                continue;
            }

            if self.client.backlog.borrow().is_empty() {
                let (budget, woken_early) = self.poll_budget();
                let idle_fails = self.max_duration.is_none() && !woken_early;
                let events = self.client.transport.poll(&handles, budget);
                self.client
                    .backlog
                    .borrow_mut()
                    .extend(events.into_iter().map(|event| Polled { event, idle_fails }));
            }

            if self.drain() {
                return self.client.pending();
            }

            let pending = self.client.pending();
            if pending == 0 {
                return 0;
            }
            if self.remaining().is_some_and(|remaining| remaining.is_zero()) {
                return pending;
            }
        }
    }

    /// Process polled events until the backlog runs dry or the budget needs
    /// re-evaluating. Returns true once the target has settled.
    fn drain(&mut self) -> bool {
        loop {
            // Popped one at a time: a continuation may start a nested wait on the same backlog.
            let next = self.client.backlog.borrow_mut().pop_front();
            let Some(Polled {
                event: (operation, chunk),
                idle_fails,
            }) = next
            else {
                return false;
            };
            if !self.client.pool.borrow().contains(operation) {
                continue;
            }
            tracing::trace!(operation = %operation, chunk = ?chunk, "chunk");

            match chunk {
                Ok(Chunk::Timeout) if !idle_fails => {}
                Ok(Chunk::Timeout) => {
                    self.client.transport.cancel(operation);
                    self.reject(
                        operation,
                        HttpError::timeout(format!("idle timeout reached for {}", operation)),
                    );
                }
                Ok(Chunk::First) => {
                    // Read eagerly so that status failures surface now rather than at completion.
                    if let Err(error) = self.client.transport.status(operation) {
                        self.reject(operation, error);
                    }
                }
                Ok(Chunk::Data) => {}
                Ok(Chunk::Last) => self.complete(operation),
                Err(error) => self.reject(operation, error),
            }

            if self.target_done() {
                return true;
            }
            if self.budget_exceeded() {
                return false;
            }
        }
    }

    fn complete(&self, operation: OperationId) {
        let resolver = self.client.pool.borrow_mut().detach(operation);
        let Some(resolver) = resolver else {
            return;
        };
        match self.client.transport.complete(operation) {
            Ok(response) => {
                tracing::debug!(operation = %operation, status = response.status(), "request completed");
                resolver.fulfill(response);
            }
            Err(error) => {
                tracing::debug!(operation = %operation, error = %error, "response could not be read");
                resolver.reject(error);
            }
        }
    }

    fn reject(&self, operation: OperationId, error: HttpError) {
        let resolver = self.client.pool.borrow_mut().detach(operation);
        if let Some(resolver) = resolver {
            tracing::debug!(operation = %operation, error = %error, "request failed");
            resolver.reject(error);
        }
    }

    fn target_done(&self) -> bool {
        self.target.is_some_and(|slot| self.client.is_done(slot))
    }

    fn remaining(&self) -> Option<Duration> {
        let elapsed = self.client.config.clock.now().saturating_duration_since(self.started);
        self.max_duration.map(|max| max.saturating_sub(elapsed))
    }

    /// Shrink the idle budget once it no longer fits in what is left of the
    /// duration bound. Returns true when the current batch should be abandoned.
    fn budget_exceeded(&mut self) -> bool {
        let (Some(remaining), Some(idle)) = (self.remaining(), self.idle_timeout) else {
            return false;
        };
        if idle.is_zero() || idle <= remaining {
            return false;
        }
        let shrunk = remaining / 5;
        self.idle_timeout = Some(if shrunk.is_zero() { remaining } else { shrunk });
        true
    }

    /// The idle budget, cut short when a deferred request falls due sooner.
    /// The flag is set when it was cut short.
    fn poll_budget(&self) -> (Option<Duration>, bool) {
        let until_due = self
            .client
            .scheduler
            .borrow()
            .next_due()
            .map(|due| due.saturating_duration_since(self.client.config.clock.now()));
        match (until_due, self.idle_timeout) {
            (Some(due), Some(idle)) => (Some(due.min(idle)), due < idle),
            (Some(due), None) => (Some(due), true),
            (None, idle) => (idle, false),
        }
    }
}
