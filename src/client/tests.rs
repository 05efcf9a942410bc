//! Tests for the promise client and its wait loop.

use super::*;
use crate::error::HttpError;
use crate::promise::PromiseState;
use crate::testing::{MockClock, MockResponse, MockTransport};
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn setup(responses: Vec<MockResponse>) -> (PromiseHttpClient<MockTransport>, MockTransport, MockClock) {
    let clock = MockClock::new();
    let transport = MockTransport::new(clock.clone()).with_responses(responses);
    let client = PromiseHttpClient::with_config(
        transport.clone(),
        ClientConfig::new().with_clock(clock.shared()),
    );
    (client, transport, clock)
}

fn get(client: &PromiseHttpClient<MockTransport>, url: &str) -> Promise<Response> {
    client.request("GET", url, RequestOptions::new())
}

fn status(promise: &Promise<Response>) -> Option<Result<u16, HttpError>> {
    promise.result().map(|outcome| outcome.map(|r| r.status()))
}

#[test]
fn test_request_is_pending_until_waited() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);

    let promise = get(&client, "http://test/");

    assert_eq!(promise.state(), PromiseState::Pending);
    assert_eq!(transport.issued(), 1);
    assert_eq!(client.pending(), 1);

    assert_eq!(client.wait(None, None), 0);
    assert_eq!(status(&promise), Some(Ok(200)));
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_wait_drains_every_request() {
    let (client, _, clock) = setup(vec![
        MockResponse::new(200).with_latency(ms(300)),
        MockResponse::new(201).with_latency(ms(100)),
        MockResponse::new(202).with_latency(ms(200)),
    ]);
    let promises: Vec<_> = (0..3).map(|i| get(&client, &format!("http://test/{i}"))).collect();

    assert_eq!(client.wait(None, None), 0);

    let statuses: Vec<_> = promises.iter().map(status).collect();
    assert_eq!(statuses, vec![Some(Ok(200)), Some(Ok(201)), Some(Ok(202))]);
    assert_eq!(clock.elapsed(), ms(300));
}

#[test]
fn test_malformed_request_rejects_synchronously() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);

    let promise = client.request("get", "http://test/", RequestOptions::new());

    assert!(matches!(promise.result(), Some(Err(HttpError::InvalidArgument(_)))));
    assert_eq!(transport.issued(), 0);
    assert_eq!(client.pending(), 0);
}

#[test]
fn test_promise_wait_targets_its_own_request() {
    let (client, _, clock) = setup(vec![
        MockResponse::new(200).with_latency(ms(100)),
        MockResponse::new(200).with_latency(ms(500)),
    ]);
    let fast = get(&client, "http://test/fast");
    let slow = get(&client, "http://test/slow");

    assert_eq!(fast.wait().map(|r| r.status()), Ok(200));

    assert_eq!(clock.elapsed(), ms(100));
    assert!(slow.is_pending());
    assert_eq!(client.pending(), 1);
}

#[test]
fn test_bounded_wait_leaves_slow_requests_pending() {
    let (client, transport, clock) = setup(vec![MockResponse::new(200).hanging()]);
    let promise = get(&client, "http://test/");

    assert_eq!(client.wait(Some(Duration::from_secs(1)), None), 1);

    assert!(promise.is_pending());
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
    assert!(transport.cancelled().is_empty());
}

#[test]
fn test_bounded_wait_settles_what_completes_in_time() {
    let (client, _, clock) = setup(vec![
        MockResponse::new(200).with_latency(ms(150)),
        MockResponse::new(200).with_latency(ms(5_000)),
    ]);
    let quick = get(&client, "http://test/quick");
    let late = get(&client, "http://test/late");

    assert_eq!(client.wait(Some(Duration::from_secs(1)), None), 1);

    assert_eq!(status(&quick), Some(Ok(200)));
    assert!(late.is_pending());
    assert!(clock.elapsed() <= Duration::from_secs(1));
}

#[test]
fn test_zero_duration_wait_does_not_block() {
    let (client, _, clock) = setup(vec![
        MockResponse::new(200),
        MockResponse::new(200).with_latency(ms(50)),
    ]);
    let ready = get(&client, "http://test/ready");
    let later = get(&client, "http://test/later");

    assert_eq!(client.wait(Some(Duration::ZERO), None), 1);

    assert_eq!(status(&ready), Some(Ok(200)));
    assert!(later.is_pending());
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[test]
fn test_idle_timeout_without_bound_rejects() {
    let (client, transport, clock) = setup(vec![MockResponse::new(200).hanging()]);
    let promise = get(&client, "http://test/");

    assert_eq!(client.wait(None, Some(Duration::from_secs(2))), 0);

    assert!(matches!(promise.result(), Some(Err(HttpError::Timeout(_)))));
    assert_eq!(clock.elapsed(), Duration::from_secs(2));
    assert_eq!(transport.cancelled().len(), 1);
}

#[test]
fn test_status_failure_surfaces_at_first_chunk() {
    let clock = MockClock::new();
    let transport = MockTransport::new(clock.clone())
        .with_http_errors()
        .with_response(MockResponse::new(503).with_chunks(3));
    let client = PromiseHttpClient::with_config(transport, ClientConfig::new().with_clock(clock.shared()));

    let promise = get(&client, "http://test/");
    client.wait(None, None);

    assert_eq!(
        promise.result().map(|r| r.map_err(|e| e.status_code())),
        Some(Err(Some(503)))
    );
}

#[test]
fn test_stream_and_body_failures_reject() {
    let (client, _, _) = setup(vec![
        MockResponse::new(200).with_stream_failure("connection reset"),
        MockResponse::new(200).with_broken_body("truncated body"),
        MockResponse::unreachable("could not resolve host"),
    ]);
    let reset = get(&client, "http://test/reset");
    let truncated = get(&client, "http://test/truncated");
    let unreachable = get(&client, "http://test/unreachable");

    client.wait(None, None);

    assert_eq!(reset.result(), Some(Err(HttpError::transport("connection reset"))));
    assert_eq!(truncated.result(), Some(Err(HttpError::transport("truncated body"))));
    assert_eq!(
        unreachable.result(),
        Some(Err(HttpError::transport("could not resolve host")))
    );
}

#[test]
fn test_cancel_detaches_and_cancels_once() {
    let (client, transport, _) = setup(vec![MockResponse::new(200).hanging()]);
    let promise = get(&client, "http://test/");

    promise.cancel();
    promise.cancel();

    assert_eq!(promise.result(), Some(Err(HttpError::Cancelled)));
    assert_eq!(transport.cancelled().len(), 1);
    assert_eq!(client.pending(), 0);
    assert_eq!(client.wait(None, None), 0);
}

#[test]
fn test_cancel_after_completion_is_noop() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);
    let promise = get(&client, "http://test/");

    client.wait(None, None);
    promise.cancel();

    assert_eq!(status(&promise), Some(Ok(200)));
    assert!(transport.cancelled().is_empty());
}

#[test]
fn test_delay_defers_issuance() {
    let (client, transport, clock) = setup(vec![MockResponse::new(200)]);

    let promise = client.request(
        "GET",
        "http://test/",
        RequestOptions::new().with_delay(ms(300)),
    );

    assert_eq!(transport.issued(), 0);
    assert_eq!(client.pending(), 1);

    assert_eq!(promise.wait().map(|r| r.status()), Ok(200));
    assert_eq!(clock.elapsed(), ms(300));
    assert_eq!(transport.requests()[0].options.delay, None);
}

#[test]
fn test_bounded_wait_does_not_issue_early() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);
    let promise = client.request("GET", "http://test/", RequestOptions::new().with_delay(ms(800)));

    assert_eq!(client.wait(Some(ms(500)), None), 1);
    assert_eq!(transport.issued(), 0);

    assert_eq!(client.wait(Some(ms(500)), None), 0);
    assert_eq!(status(&promise), Some(Ok(200)));
}

#[test]
fn test_cancel_deferred_request_never_issues() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);
    let promise = client.request("GET", "http://test/", RequestOptions::new().with_delay(ms(100)));

    promise.cancel();

    assert_eq!(client.wait(None, None), 0);
    assert_eq!(transport.issued(), 0);
    assert!(transport.cancelled().is_empty());
}

#[test]
fn test_deferred_issue_failure_rejects() {
    let (client, _, _) = setup(vec![]);
    let promise = client.request("GET", "http://test/", RequestOptions::new().with_delay(ms(100)));

    assert!(matches!(promise.wait(), Err(HttpError::Transport(_))));
}

#[test]
fn test_continuations_can_issue_during_wait() {
    let (client, transport, _) = setup(vec![MockResponse::new(200), MockResponse::new(204)]);
    let follow_up = client.clone();

    let chained = get(&client, "http://test/first")
        .and_then(move |_| follow_up.request("GET", "http://test/second", RequestOptions::new()));

    assert_eq!(client.wait(None, None), 0);
    assert_eq!(status(&chained), Some(Ok(204)));
    assert_eq!(transport.issued(), 2);
}

#[test]
fn test_nested_wait_inside_continuation() {
    let (client, _, _) = setup(vec![
        MockResponse::new(200),
        MockResponse::new(201).with_latency(ms(10)),
    ]);
    let first = get(&client, "http://test/first");
    let second = get(&client, "http://test/second");

    let observed = first.map(move |_| second.wait().map(|r| r.status()));

    assert_eq!(client.wait(None, None), 0);
    assert_eq!(observed.result(), Some(Ok(Ok(201))));
}

#[test]
fn test_dropped_client_leaves_promise_unresolved() {
    let promise = {
        let (client, _, _) = setup(vec![MockResponse::new(200)]);
        get(&client, "http://test/")
    };
    assert_eq!(promise.wait().map(|r| r.status()), Err(HttpError::Unresolved));
}

#[test]
fn test_unbounded_wait_after_bounded_wait_ignores_stale_idle_timeouts() {
    let (client, transport, clock) = setup(vec![
        MockResponse::new(200).hanging(),
        MockResponse::new(201).with_latency(ms(150)),
    ]);
    let stalled = get(&client, "http://test/stalled");
    let slow = get(&client, "http://test/slow");

    assert_eq!(client.wait(Some(ms(100)), None), 2);
    assert_eq!(clock.elapsed(), ms(100));

    assert_eq!(slow.wait().map(|r| r.status()), Ok(201));
    assert_eq!(clock.elapsed(), ms(150));
    assert!(stalled.is_pending());
    assert!(transport.cancelled().is_empty());
}

#[test]
fn test_out_of_range_delay_stays_deferred() {
    let (client, transport, _) = setup(vec![MockResponse::new(200)]);
    let promise = client.request("GET", "http://test/", RequestOptions::new().with_delay(Duration::MAX));

    assert_eq!(client.wait(Some(ms(500)), None), 1);
    assert_eq!(transport.issued(), 0);
    assert!(promise.is_pending());

    promise.cancel();
    assert_eq!(client.pending(), 0);
    assert_eq!(client.wait(None, None), 0);
}

#[test]
fn test_saturating_add_clamps_to_far_future() {
    let now = Instant::now();
    assert_eq!(saturating_add(now, ms(5)), now + ms(5));
    assert!(saturating_add(now, Duration::MAX) > now + Duration::from_secs(86_400 * 365 * 1_000));
}
