//! Retry Example
//!
//! Drives retrying requests over a scripted transport and a manual clock.
//! Shows:
//! - Retrying on retryable statuses with the standard delay chain
//! - Honouring a Retry-After header
//! - Custom delay strategies and retry hooks
//! - Transport failures being retried and finally surfaced
//!
//! Run with `RUST_LOG=debug cargo run --example retry_demo` to see the
//! retry decisions being logged.

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use undertow::prelude::*;
use undertow::testing::{MockClock, MockResponse, MockTransport};

type Client = RetryableHttpClient<PromiseHttpClient<MockTransport>>;

fn client(clock: &MockClock, responses: Vec<MockResponse>, options: RetryOptions) -> Client {
    let transport = MockTransport::new(clock.clone()).with_responses(responses);
    let config = ClientConfig::new().with_clock(clock.shared());
    RetryableHttpClient::new(PromiseHttpClient::with_config(transport, config), options)
}

// ==================== Standard Chain ====================

/// Example 1: Flaky upstream
///
/// Two 503s then a 200, with the standard chain's jittered backoff.
fn example_standard_chain() {
    println!("\n=== Example 1: Standard Chain ===");

    let clock = MockClock::new();
    let client = client(
        &clock,
        vec![
            MockResponse::new(503),
            MockResponse::new(503),
            MockResponse::new(200).with_body("finally"),
        ],
        RetryOptions::new(),
    );

    let body = client
        .request("GET", "http://flaky.test/", RequestOptions::new())
        .map(|response| response.text())
        .wait();

    println!("Body: {:?}", body);
    println!("Time spent backing off: {:?}", clock.elapsed());
}

// ==================== Retry-After ====================

/// Example 2: Rate limited
///
/// The server asks for two seconds of quiet; the chain listens.
fn example_retry_after() {
    println!("\n=== Example 2: Retry-After ===");

    let clock = MockClock::new();
    let client = client(
        &clock,
        vec![
            MockResponse::new(429).with_header("Retry-After", "2"),
            MockResponse::new(200),
        ],
        RetryOptions::new(),
    );

    let status = client
        .request("GET", "http://limited.test/", RequestOptions::new())
        .wait()
        .map(|response| response.status());

    println!("Status: {:?} after {:?}", status, clock.elapsed());
}

// ==================== Custom Strategy ====================

/// Example 3: Linear backoff with a hook
///
/// Builds a custom chain and reports every retry through `on_retry`.
fn example_custom_strategy() -> Result<(), ConfigError> {
    println!("\n=== Example 3: Custom Strategy ===");

    let strategy = DelayStrategyChain::new()
        .with(RetryAfterHeader::new())
        .with(DelayCap::new(250, IncrementalBackOff::new(100)?, false)?);
    let options = RetryOptions::new()
        .with_max_retries(4)
        .with_delay_strategy(strategy)
        .on_retry(|event| {
            println!(
                "  retry #{} of {} {} in {:?}",
                event.attempt, event.method, event.url, event.delay
            )
        });

    let clock = MockClock::new();
    let client = client(
        &clock,
        vec![
            MockResponse::new(500),
            MockResponse::new(502),
            MockResponse::new(504),
            MockResponse::new(201),
        ],
        options,
    );

    let status = client
        .request("POST", "http://orders.test/", RequestOptions::new().with_body("{}"))
        .wait()
        .map(|response| response.status());

    println!("Status: {:?} after {:?}", status, clock.elapsed());
    Ok(())
}

// ==================== Failures ====================

/// Example 4: Unreachable host
///
/// Transport failures are retried; the last one is what the caller sees.
fn example_failures() -> Result<(), ConfigError> {
    println!("\n=== Example 4: Failures ===");

    let clock = MockClock::new();
    let client = client(
        &clock,
        vec![
            MockResponse::unreachable("connection refused"),
            MockResponse::new(200).with_stream_failure("connection reset"),
            MockResponse::unreachable("no route to host"),
        ],
        RetryOptions::new()
            .with_max_retries(2)
            .with_delay_strategy(ConstantDelay::new(Some(50))?),
    );

    let result = client
        .request("GET", "http://down.test/", RequestOptions::new())
        .wait();

    println!("Result: {:?}", result.map(|response| response.status()));
    println!("Elapsed: {:?}", clock.elapsed());
    Ok(())
}

// ==================== Concurrency ====================

/// Example 5: Many requests, one loop
///
/// All requests share the loop; `wait` drains them together.
fn example_concurrency() {
    println!("\n=== Example 5: Concurrency ===");

    let clock = MockClock::new();
    let client = client(
        &clock,
        vec![
            MockResponse::new(200).with_latency(Duration::from_millis(300)),
            MockResponse::new(503).with_latency(Duration::from_millis(100)),
            MockResponse::new(200).with_latency(Duration::from_millis(200)),
            MockResponse::new(200).with_latency(Duration::from_millis(100)),
        ],
        RetryOptions::new().with_delay_strategy(ConstantDelay::zero()),
    );

    let promises: Vec<_> = (0..3)
        .map(|i| client.request("GET", &format!("http://batch.test/{i}"), RequestOptions::new()))
        .collect();

    let pending = client.wait(None, None);
    println!("Pending after wait: {}", pending);
    for (i, promise) in promises.iter().enumerate() {
        println!("  request {}: {:?}", i, promise.result().map(|r| r.map(|r| r.status())));
    }
    println!("Elapsed: {:?}", clock.elapsed());
}

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Undertow Retry Examples");
    println!("=======================");

    example_standard_chain();
    example_retry_after();
    example_custom_strategy()?;
    example_failures()?;
    example_concurrency();

    println!("\n=== All examples completed ===");
    Ok(())
}
