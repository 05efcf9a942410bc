//! Async Wait Example
//!
//! Drives the request loop from a tokio task with `wait_async`, so the
//! runtime stays free while retries sit out their delay.
//!
//! Run with `cargo run --example async_wait --features async`.

use std::time::{Duration, Instant};

use undertow::prelude::*;
use undertow::testing::{MockClock, MockResponse, MockTransport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt::init();

    let transport = MockTransport::new(MockClock::new()).with_responses([
        MockResponse::new(503),
        MockResponse::new(503),
        MockResponse::new(200).with_body("served"),
    ]);
    let client = RetryableHttpClient::new(
        PromiseHttpClient::new(transport),
        RetryOptions::new().with_delay_strategy(ExponentialBackOff::new(50, 2.0)?),
    );

    let heartbeat = tokio::task::spawn(async {
        for beat in 1..=3 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            println!("  heartbeat {}", beat);
        }
    });

    let started = Instant::now();
    let promise = client.request("GET", "http://flaky.test/", RequestOptions::new());
    let body = client.inner().wait_async(&promise).await;

    println!("Body: {:?}", body.map(|response| response.text()));
    println!("Took {:?} (50ms + 100ms of backoff)", started.elapsed());

    let _ = heartbeat.await;
    Ok(())
}
