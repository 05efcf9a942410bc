//! Single-threaded promises with monadic chaining and cancellation.
//!
//! A [`Promise`] is a shared handle to a value that is pending, fulfilled or
//! rejected. Only the holder of the matching [`Resolver`] can settle it, and it
//! settles at most once.
//!
//! # Continuations
//!
//! [`Promise::then`] attaches a pair of continuations and returns a derived
//! promise. Continuations run synchronously on the thread that settles the
//! upstream promise, in attachment order, before control returns to whoever
//! settled it (usually the wait loop). A continuation attached to an already
//! settled promise runs immediately.
//!
//! A continuation returns a [`Next`]: a plain value, a failure, or another
//! promise. When it returns a promise the derived promise follows it,
//! recursively, until something settles.
//!
//! ```rust
//! use undertow::{HttpError, Next, Promise};
//!
//! let (source, resolver) = Promise::<u32>::pending();
//! let doubled = source
//!     .map(|n| n * 2)
//!     .and_then(|n| Promise::fulfilled(n + 1));
//!
//! assert!(doubled.is_pending());
//! resolver.fulfill(20);
//! assert_eq!(doubled.result(), Some(Ok(41)));
//! ```
//!
//! # Waiting
//!
//! Promises produced by a client carry a driver: [`Promise::wait`] invokes it
//! until the promise settles. Derived promises inherit the driver of their
//! upstream and adopt the driver of any promise they end up following.
//!
//! # Cancellation
//!
//! [`Promise::cancel`] rejects a pending promise with [`HttpError::Cancelled`]
//! and runs its cancellation hook exactly once. Derived promises forward
//! cancellation upstream.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use crate::error::HttpError;

#[cfg(test)]
mod tests;

/// Outcome of a settled promise.
pub type Outcome<T> = Result<T, HttpError>;

/// Drives whatever settles a promise. Returns false when there was nothing to drive.
pub(crate) type Waiter = Rc<dyn Fn() -> bool>;

/// Side effect run when a pending promise is cancelled.
pub(crate) type Canceller = Box<dyn FnOnce()>;

type Callback<T> = Box<dyn FnOnce(&Outcome<T>)>;

/// Observable state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a failure.
    Rejected,
}

/// What a continuation hands to the derived promise.
#[derive(Debug)]
pub enum Next<T> {
    /// Fulfill with a value.
    Value(T),
    /// Reject with a failure.
    Error(HttpError),
    /// Follow another promise.
    Promise(Promise<T>),
}

impl<T> From<Promise<T>> for Next<T> {
    fn from(promise: Promise<T>) -> Self {
        Next::Promise(promise)
    }
}

impl<T> From<Outcome<T>> for Next<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(value) => Next::Value(value),
            Err(error) => Next::Error(error),
        }
    }
}

struct Shared<T> {
    outcome: Option<Outcome<T>>,
    callbacks: Vec<Callback<T>>,
    waiter: Option<Waiter>,
    canceller: Option<Canceller>,
    wakers: Vec<Waker>,
}

impl<T> Shared<T> {
    fn new(waiter: Option<Waiter>, canceller: Option<Canceller>) -> Self {
        Self {
            outcome: None,
            callbacks: Vec::new(),
            waiter,
            canceller,
            wakers: Vec::new(),
        }
    }
}

/// A value that represents the eventual success or failure of an operation.
///
/// Cloning a promise clones the handle, not the value: every clone observes
/// the same settlement.
pub struct Promise<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.try_borrow() {
            Ok(shared) => match &shared.outcome {
                None => "pending",
                Some(Ok(_)) => "fulfilled",
                Some(Err(_)) => "rejected",
            },
            Err(_) => "settling",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// The settling side of a [`Promise`].
///
/// Consuming methods enforce that a resolver settles its promise at most
/// once. Settling a promise that was already cancelled is a no-op.
pub struct Resolver<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Resolver<T> {
    /// Settle with a value.
    pub fn fulfill(self, value: T) {
        settle(&self.shared, Ok(value));
    }

    /// Settle with a failure.
    pub fn reject(self, error: HttpError) {
        settle(&self.shared, Err(error));
    }

    /// Settle with an outcome.
    pub fn settle(self, outcome: Outcome<T>) {
        settle(&self.shared, outcome);
    }

    /// Settle from a continuation result, following `next` if it is a promise.
    pub fn resolve(self, next: Next<T>) {
        match next {
            Next::Value(value) => self.fulfill(value),
            Next::Error(error) => self.reject(error),
            Next::Promise(inner) => self.follow(inner),
        }
    }

    /// Returns true if the promise already settled (or was cancelled).
    pub fn is_settled(&self) -> bool {
        self.shared.borrow().outcome.is_some()
    }

    fn follow(self, inner: Promise<T>) {
        if Rc::ptr_eq(&self.shared, &inner.shared) {
            self.reject(HttpError::invalid_argument(
                "cannot resolve a promise with itself",
            ));
            return;
        }

        let replaced = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                return;
            }
            let followed = Rc::downgrade(&inner.shared);
            (
                shared.waiter.replace(delegate(&inner.shared)),
                shared
                    .canceller
                    .replace(Box::new(move || cancel_weak(&followed))),
            )
        };
        drop(replaced);

        inner.subscribe(move |outcome| self.settle(outcome.clone()));
    }
}

/// Invoke the current driver of a promise once.
fn drive<T>(shared: &Rc<RefCell<Shared<T>>>) -> bool {
    let waiter = shared.borrow().waiter.clone();
    waiter.is_some_and(|waiter| waiter())
}

/// A driver that forwards to whatever currently drives `shared`.
fn delegate<T: 'static>(shared: &Rc<RefCell<Shared<T>>>) -> Waiter {
    let target = Rc::downgrade(shared);
    Rc::new(move || target.upgrade().is_some_and(|shared| drive(&shared)))
}

fn cancel_weak<T: Clone + 'static>(shared: &Weak<RefCell<Shared<T>>>) {
    if let Some(shared) = shared.upgrade() {
        Promise { shared }.cancel();
    }
}

fn settle<T: Clone + 'static>(shared: &Rc<RefCell<Shared<T>>>, outcome: Outcome<T>) {
    let (callbacks, wakers, waiter, canceller) = {
        let mut state = shared.borrow_mut();
        if state.outcome.is_some() {
            return;
        }
        state.outcome = Some(outcome.clone());
        (
            mem::take(&mut state.callbacks),
            mem::take(&mut state.wakers),
            state.waiter.take(),
            state.canceller.take(),
        )
    };
    // Dropped outside the borrow: they may own the last handle to other promises.
    drop((waiter, canceller));

    for waker in wakers {
        waker.wake();
    }
    for callback in callbacks {
        callback(&outcome);
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// Create a pending promise and the resolver that settles it.
    pub fn pending() -> (Self, Resolver<T>) {
        Self::with_hooks(None, None)
    }

    /// Create a promise that is already fulfilled.
    pub fn fulfilled(value: T) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.fulfill(value);
        promise
    }

    /// Create a promise that is already rejected.
    pub fn rejected(error: HttpError) -> Self {
        let (promise, resolver) = Self::pending();
        resolver.reject(error);
        promise
    }

    pub(crate) fn with_hooks(
        waiter: Option<Waiter>,
        canceller: Option<Canceller>,
    ) -> (Self, Resolver<T>) {
        let shared = Rc::new(RefCell::new(Shared::new(waiter, canceller)));
        (
            Self {
                shared: Rc::clone(&shared),
            },
            Resolver { shared },
        )
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        match &self.shared.borrow().outcome {
            None => PromiseState::Pending,
            Some(Ok(_)) => PromiseState::Fulfilled,
            Some(Err(_)) => PromiseState::Rejected,
        }
    }

    /// Returns true if the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        self.shared.borrow().outcome.is_none()
    }

    /// The outcome, if settled. Does not drive anything.
    pub fn result(&self) -> Option<Outcome<T>> {
        self.shared.borrow().outcome.clone()
    }

    /// Attach continuations and return the promise of their result.
    ///
    /// Exactly one of the two continuations runs, once the promise settles.
    /// Neither runs if the derived promise was cancelled first.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Next<U> + 'static,
        R: FnOnce(HttpError) -> Next<U> + 'static,
    {
        let upstream = Rc::downgrade(&self.shared);
        let (derived, resolver) = Promise::with_hooks(
            Some(delegate(&self.shared)),
            Some(Box::new(move || cancel_weak(&upstream))),
        );

        self.subscribe(move |outcome| {
            if resolver.is_settled() {
                return;
            }
            let next = match outcome {
                Ok(value) => on_fulfilled(value.clone()),
                Err(error) => on_rejected(error.clone()),
            };
            resolver.resolve(next);
        });

        derived
    }

    /// Transform the fulfilled value.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Next::Value(f(value)), Next::Error)
    }

    /// Chain a promise-returning continuation on fulfillment.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        self.then(move |value| Next::Promise(f(value)), Next::Error)
    }

    /// Recover from a rejection with a promise-returning continuation.
    pub fn or_else<F>(&self, f: F) -> Promise<T>
    where
        F: FnOnce(HttpError) -> Promise<T> + 'static,
    {
        self.then(Next::Value, move |error| Next::Promise(f(error)))
    }

    /// Drive the promise to settlement and return its outcome.
    ///
    /// Returns [`HttpError::Unresolved`] without settling the promise when
    /// nothing can drive it further, for instance a [`Promise::pending`]
    /// whose resolver is held elsewhere.
    pub fn wait(&self) -> Outcome<T> {
        loop {
            if let Some(outcome) = self.result() {
                return outcome;
            }
            if !drive(&self.shared) {
                return self.result().unwrap_or(Err(HttpError::Unresolved));
            }
        }
    }

    /// Cancel a pending promise.
    ///
    /// The promise is rejected with [`HttpError::Cancelled`] before its
    /// cancellation hook runs, so nothing observes a half-cancelled promise.
    /// Cancelling a settled promise does nothing.
    pub fn cancel(&self) {
        let (canceller, callbacks, wakers, waiter) = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                return;
            }
            shared.outcome = Some(Err(HttpError::Cancelled));
            (
                shared.canceller.take(),
                mem::take(&mut shared.callbacks),
                mem::take(&mut shared.wakers),
                shared.waiter.take(),
            )
        };
        drop(waiter);

        if let Some(canceller) = canceller {
            canceller();
        }
        for waker in wakers {
            waker.wake();
        }
        let outcome = Err(HttpError::Cancelled);
        for callback in callbacks {
            callback(&outcome);
        }
    }

    /// Combine promises into one that fulfills with every value in order,
    /// or rejects with the first failure.
    ///
    /// ```rust
    /// use undertow::Promise;
    ///
    /// let all = Promise::all(vec![Promise::fulfilled(1), Promise::fulfilled(2)]);
    /// assert_eq!(all.result(), Some(Ok(vec![1, 2])));
    /// ```
    pub fn all(promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        if promises.is_empty() {
            return Promise::fulfilled(Vec::new());
        }

        let members: Vec<_> = promises.iter().map(|p| Rc::downgrade(&p.shared)).collect();
        let waited = members.clone();
        let waiter: Waiter = Rc::new(move || {
            let mut progressed = false;
            for member in waited.iter().filter_map(Weak::upgrade) {
                if member.borrow().outcome.is_none() {
                    progressed |= drive(&member);
                }
            }
            progressed
        });
        let canceller: Canceller = Box::new(move || {
            for member in &members {
                cancel_weak(member);
            }
        });

        let (combined, resolver) = Promise::with_hooks(Some(waiter), Some(canceller));
        let resolver = Rc::new(RefCell::new(Some(resolver)));
        let values = Rc::new(RefCell::new(vec![None; promises.len()]));

        for (index, promise) in promises.iter().enumerate() {
            let resolver = Rc::clone(&resolver);
            let values = Rc::clone(&values);
            promise.subscribe(move |outcome| match outcome {
                Ok(value) => {
                    let complete = {
                        let mut values = values.borrow_mut();
                        values[index] = Some(value.clone());
                        values.iter().all(Option::is_some)
                    };
                    if complete {
                        let collected: Vec<T> = values.borrow_mut().drain(..).flatten().collect();
                        let taken = resolver.borrow_mut().take();
                        if let Some(resolver) = taken {
                            resolver.fulfill(collected);
                        }
                    }
                }
                Err(error) => {
                    let taken = resolver.borrow_mut().take();
                    if let Some(resolver) = taken {
                        resolver.reject(error.clone());
                    }
                }
            });
        }

        combined
    }

    fn subscribe(&self, callback: impl FnOnce(&Outcome<T>) + 'static) {
        let outcome = {
            let mut shared = self.shared.borrow_mut();
            match shared.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    shared.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }
}

impl<T: Clone + 'static> Future for Promise<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        if let Some(outcome) = &shared.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            shared.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
