//! Unit tests for promise settlement, chaining and cancellation.

use super::*;
use std::cell::Cell;

#[test]
fn test_pending_then_fulfilled() {
    let (promise, resolver) = Promise::<u32>::pending();
    assert_eq!(promise.state(), PromiseState::Pending);
    assert_eq!(promise.result(), None);

    resolver.fulfill(7);

    assert_eq!(promise.state(), PromiseState::Fulfilled);
    assert_eq!(promise.result(), Some(Ok(7)));
}

#[test]
fn test_settlement_is_monotonic() {
    let (promise, resolver) = Promise::<u32>::pending();
    promise.cancel();
    resolver.fulfill(1);

    assert_eq!(promise.result(), Some(Err(HttpError::Cancelled)));
}

#[test]
fn test_callbacks_run_in_attachment_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let (promise, resolver) = Promise::<u32>::pending();

    for tag in ["first", "second", "third"] {
        let order = Rc::clone(&order);
        promise.map(move |_| order.borrow_mut().push(tag));
    }
    assert!(order.borrow().is_empty());

    resolver.fulfill(0);
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_then_on_settled_promise_runs_immediately() {
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);

    let derived = Promise::fulfilled(2).map(move |n| {
        flag.set(true);
        n * 3
    });

    assert!(ran.get());
    assert_eq!(derived.result(), Some(Ok(6)));
}

#[test]
fn test_rejection_skips_fulfillment_handler() {
    let fulfilled = Rc::new(Cell::new(false));
    let rejected = Rc::new(Cell::new(false));
    let (f, r) = (Rc::clone(&fulfilled), Rc::clone(&rejected));

    let derived = Promise::<u32>::rejected(HttpError::transport("refused")).then(
        move |n| {
            f.set(true);
            Next::Value(n)
        },
        move |e| {
            r.set(true);
            Next::Error(e)
        },
    );

    assert!(!fulfilled.get());
    assert!(rejected.get());
    assert_eq!(derived.result(), Some(Err(HttpError::transport("refused"))));
}

#[test]
fn test_rejection_can_be_recovered() {
    let recovered = Promise::<u32>::rejected(HttpError::transport("refused"))
        .or_else(|_| Promise::fulfilled(200));
    assert_eq!(recovered.result(), Some(Ok(200)));
}

#[test]
fn test_nested_promises_are_flattened() {
    let (inner, inner_resolver) = Promise::<u32>::pending();

    // Three levels of promise-returning continuations.
    let outer = Promise::fulfilled(()).and_then(move |_| {
        Promise::fulfilled(()).and_then(move |_| Promise::fulfilled(()).and_then(move |_| inner))
    });

    assert!(outer.is_pending());
    inner_resolver.fulfill(42);
    assert_eq!(outer.result(), Some(Ok(42)));
}

#[test]
fn test_follow_forwards_rejection() {
    let (inner, inner_resolver) = Promise::<u32>::pending();
    let outer = Promise::fulfilled(1).and_then(move |_| inner);

    inner_resolver.reject(HttpError::status(503, "unavailable"));
    assert_eq!(outer.result(), Some(Err(HttpError::status(503, "unavailable"))));
}

#[test]
fn test_resolving_with_itself_is_rejected() {
    let (promise, resolver) = Promise::<u32>::pending();
    resolver.resolve(Next::Promise(promise.clone()));
    assert_eq!(promise.state(), PromiseState::Rejected);
}

#[test]
fn test_cancel_runs_hook_exactly_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let (promise, _resolver) =
        Promise::<u32>::with_hooks(None, Some(Box::new(move || counter.set(counter.get() + 1))));

    promise.cancel();
    promise.cancel();

    assert_eq!(calls.get(), 1);
    assert_eq!(promise.result(), Some(Err(HttpError::Cancelled)));
}

#[test]
fn test_cancel_settled_promise_is_noop() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let (promise, resolver) =
        Promise::<u32>::with_hooks(None, Some(Box::new(move || counter.set(counter.get() + 1))));

    resolver.fulfill(5);
    promise.cancel();

    assert_eq!(calls.get(), 0);
    assert_eq!(promise.result(), Some(Ok(5)));
}

#[test]
fn test_cancel_derived_propagates_upstream() {
    let (source, _resolver) = Promise::<u32>::pending();
    let handler_ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&handler_ran);

    let derived = source.then(Next::Value, move |e| {
        flag.set(true);
        Next::Error(e)
    });
    derived.cancel();

    assert_eq!(source.result(), Some(Err(HttpError::Cancelled)));
    assert_eq!(derived.result(), Some(Err(HttpError::Cancelled)));
    // The derived promise settled first, so its continuation is skipped.
    assert!(!handler_ran.get());
}

#[test]
fn test_cancel_follows_adopted_promise() {
    let (inner, _inner_resolver) = Promise::<u32>::pending();
    let followed = inner.clone();
    let outer = Promise::fulfilled(()).and_then(move |_| followed);

    outer.cancel();
    assert_eq!(inner.result(), Some(Err(HttpError::Cancelled)));
}

#[test]
fn test_wait_without_driver_is_unresolved() {
    let (promise, _resolver) = Promise::<u32>::pending();
    assert_eq!(promise.wait(), Err(HttpError::Unresolved));
    assert!(promise.is_pending());
}

#[test]
fn test_wait_uses_driver() {
    let slot: Rc<RefCell<Option<Resolver<u32>>>> = Rc::new(RefCell::new(None));
    let driver_slot = Rc::clone(&slot);
    let waiter: Waiter = Rc::new(move || match driver_slot.borrow_mut().take() {
        Some(resolver) => {
            resolver.fulfill(9);
            true
        }
        None => false,
    });

    let (promise, resolver) = Promise::with_hooks(Some(waiter), None);
    *slot.borrow_mut() = Some(resolver);

    let derived = promise.map(|n| n + 1);
    assert_eq!(derived.wait(), Ok(10));
}

#[test]
fn test_all_collects_in_order() {
    let (a, resolve_a) = Promise::<u32>::pending();
    let (b, resolve_b) = Promise::<u32>::pending();
    let all = Promise::all(vec![a, b]);

    resolve_b.fulfill(2);
    assert!(all.is_pending());
    resolve_a.fulfill(1);

    assert_eq!(all.result(), Some(Ok(vec![1, 2])));
}

#[test]
fn test_all_rejects_on_first_failure() {
    let (a, _resolve_a) = Promise::<u32>::pending();
    let all = Promise::all(vec![a, Promise::rejected(HttpError::transport("down"))]);
    assert_eq!(all.result(), Some(Err(HttpError::transport("down"))));
}

#[test]
fn test_promise_is_a_future() {
    let (promise, resolver) = Promise::<u32>::pending();
    let awaited = promise.clone();

    assert!(futures::FutureExt::now_or_never(awaited.clone()).is_none());
    resolver.fulfill(3);
    assert_eq!(futures::executor::block_on(awaited), Ok(3));
}
