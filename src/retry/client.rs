//! The retrying client decorator.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use super::policy::{DefaultRetryPolicy, RetryPolicy};
use crate::client::PromiseClient;
use crate::delay::{DelayStrategy, DelayStrategyChain};
use crate::error::HttpError;
use crate::http::{RequestOptions, Response};
use crate::promise::{Next, Promise, PromiseState};

/// Information about a retry about to happen, passed to hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a> {
    /// The retry number, starting at 1 for the first retry.
    pub attempt: u32,
    /// HTTP method of the request.
    pub method: &'a str,
    /// Target URL of the request.
    pub url: &'a str,
    /// The response that triggered the retry, if the attempt produced one.
    pub response: Option<&'a Response>,
    /// The failure that triggered the retry, if the attempt failed.
    pub error: Option<&'a HttpError>,
    /// Delay before the retry is issued, if any.
    pub delay: Option<Duration>,
}

type RetryHook = Rc<dyn Fn(&RetryEvent<'_>)>;

/// How a [`RetryableHttpClient`] retries.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::ConstantDelay;
/// use undertow::RetryOptions;
///
/// let options = RetryOptions::new()
///     .with_max_retries(5)
///     .with_delay_strategy(ConstantDelay::new(Some(100))?)
///     .on_retry(|event| println!("retry #{} of {}", event.attempt, event.url));
///
/// assert_eq!(options.max_retries(), 5);
/// # Ok::<(), undertow::ConfigError>(())
/// ```
#[derive(Clone)]
pub struct RetryOptions {
    policy: Rc<dyn RetryPolicy>,
    delay: Rc<dyn DelayStrategy>,
    max_retries: u32,
    hook: Option<RetryHook>,
}

impl RetryOptions {
    /// [`DefaultRetryPolicy`], [`DelayStrategyChain::standard`], three retries.
    pub fn new() -> Self {
        Self {
            policy: Rc::new(DefaultRetryPolicy::new()),
            delay: Rc::new(DelayStrategyChain::standard()),
            max_retries: 3,
            hook: None,
        }
    }

    /// Decide what to retry with `policy`.
    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Rc::new(policy);
        self
    }

    /// Decide how long to wait with `strategy`.
    pub fn with_delay_strategy(mut self, strategy: impl DelayStrategy + 'static) -> Self {
        self.delay = Rc::new(strategy);
        self
    }

    /// Retry at most `max_retries` times, so issue at most `max_retries + 1` requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Call `hook` before every retry.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryEvent<'_>) + 'static,
    {
        self.hook = Some(Rc::new(hook));
        self
    }

    /// The retry ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .field("delay", &self.delay)
            .field("max_retries", &self.max_retries)
            .field("hook", &self.hook.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// One logical request across its attempts.
///
/// Never mutated: each retry gets a fresh context.
#[derive(Debug, Clone)]
struct RetryContext {
    method: String,
    url: String,
    options: RequestOptions,
    /// Retries issued so far; zero for the first attempt.
    retries: u32,
}

impl RetryContext {
    fn new(method: &str, url: &str, options: RequestOptions) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            options,
            retries: 0,
        }
    }

    /// The number the next retry gets, starting at 1.
    fn attempt(&self) -> u32 {
        self.retries + 1
    }

    /// The context of the next retry, deferred by `delay`.
    fn next(&self, delay: Option<Duration>) -> Self {
        let (_, options) = self.options.clone().take_delay();
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            options: match delay {
                Some(delay) => options.with_delay(delay),
                None => options,
            },
            retries: self.attempt(),
        }
    }
}

/// Retries requests of an inner [`PromiseClient`].
///
/// The returned promise settles like the promise of the last attempt: with
/// its response, or with its failure unchanged. Retries are only visible
/// through elapsed time, the `on_retry` hook and `tracing` events.
///
/// Cloning is cheap; clones share the inner client and options.
///
/// # Examples
///
/// ```rust
/// use undertow::delay::ConstantDelay;
/// use undertow::testing::{MockClock, MockResponse, MockTransport};
/// use undertow::{ClientConfig, PromiseClient, PromiseHttpClient, RequestOptions};
/// use undertow::{RetryOptions, RetryableHttpClient};
///
/// let clock = MockClock::new();
/// let transport = MockTransport::new(clock.clone())
///     .with_responses([MockResponse::new(503), MockResponse::new(200)]);
/// let client = RetryableHttpClient::new(
///     PromiseHttpClient::with_config(transport.clone(), ClientConfig::new().with_clock(clock.shared())),
///     RetryOptions::new().with_delay_strategy(ConstantDelay::new(Some(100))?),
/// );
///
/// let response = client.request("GET", "http://test/", RequestOptions::new()).wait();
///
/// assert_eq!(response.map(|r| r.status()), Ok(200));
/// assert_eq!(transport.issued(), 2);
/// # Ok::<(), undertow::ConfigError>(())
/// ```
pub struct RetryableHttpClient<C> {
    inner: Rc<Inner<C>>,
}

struct Inner<C> {
    client: C,
    options: RetryOptions,
}

impl<C: PromiseClient + 'static> RetryableHttpClient<C> {
    /// Retry requests of `client` as `options` say.
    pub fn new(client: C, options: RetryOptions) -> Self {
        Self {
            inner: Rc::new(Inner { client, options }),
        }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner.client
    }

    /// The retry options.
    pub fn options(&self) -> &RetryOptions {
        &self.inner.options
    }
}

impl<C: PromiseClient + 'static> Inner<C> {
    fn send(this: &Rc<Self>, context: RetryContext) -> Promise<Response> {
        let promise = this
            .client
            .request(&context.method, &context.url, context.options.clone());

        if promise.state() == PromiseState::Rejected {
            // Failed before reaching the transport; retrying cannot help.
            return promise;
        }
        if context.retries >= this.options.max_retries {
            tracing::debug!(
                method = %context.method,
                url = %context.url,
                count = context.retries,
                max_retries = this.options.max_retries,
                "reached max retries"
            );
            return promise;
        }

        let (on_response, on_failure) = (Rc::clone(this), Rc::clone(this));
        let failed_context = context.clone();
        promise.then(
            move |response| Self::on_response(&on_response, context, response),
            move |error| Self::on_failure(&on_failure, failed_context, error),
        )
    }

    fn on_response(this: &Rc<Self>, context: RetryContext, response: Response) -> Next<Response> {
        if !this.options.policy.on_response(&response) {
            tracing::debug!(
                method = %context.method,
                url = %context.url,
                status = response.status(),
                count = context.retries,
                "returning response"
            );
            return Next::Value(response);
        }

        tracing::info!(
            method = %context.method,
            url = %context.url,
            status = response.status(),
            count = context.retries,
            "retrying on response status"
        );
        Next::Promise(Self::retry(this, &context, Some(&response), None))
    }

    fn on_failure(this: &Rc<Self>, context: RetryContext, error: HttpError) -> Next<Response> {
        if !error.is_transport_failure() {
            return Next::Error(error);
        }
        if !this.options.policy.on_failure(&error) {
            tracing::debug!(
                method = %context.method,
                url = %context.url,
                error = %error,
                count = context.retries,
                "rejecting with failure"
            );
            return Next::Error(error);
        }

        tracing::info!(
            method = %context.method,
            url = %context.url,
            error = %error,
            count = context.retries,
            "retrying on failure"
        );
        Next::Promise(Self::retry(this, &context, None, Some(&error)))
    }

    fn retry(
        this: &Rc<Self>,
        context: &RetryContext,
        response: Option<&Response>,
        error: Option<&HttpError>,
    ) -> Promise<Response> {
        let attempt = context.attempt();
        let delay = this
            .options
            .delay
            .delay(attempt, response)
            .filter(|delay| !delay.is_zero());

        if let Some(hook) = &this.options.hook {
            hook(&RetryEvent {
                attempt,
                method: &context.method,
                url: &context.url,
                response,
                error,
                delay,
            });
        }

        match delay {
            Some(delay) => tracing::info!(
                method = %context.method,
                url = %context.url,
                count = attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying with delay"
            ),
            None => tracing::info!(
                method = %context.method,
                url = %context.url,
                count = attempt,
                "retrying without delay"
            ),
        }

        Self::send(this, context.next(delay))
    }
}

impl<C: PromiseClient + 'static> PromiseClient for RetryableHttpClient<C> {
    fn request(&self, method: &str, url: &str, options: RequestOptions) -> Promise<Response> {
        Inner::send(&self.inner, RetryContext::new(method, url, options))
    }

    fn wait(&self, max_duration: Option<Duration>, idle_timeout: Option<Duration>) -> usize {
        self.inner.client.wait(max_duration, idle_timeout)
    }
}

impl<C> Clone for RetryableHttpClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryableHttpClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableHttpClient")
            .field("client", &self.inner.client)
            .field("options", &self.inner.options)
            .finish()
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;

    #[test]
    fn test_next_context_replaces_delay() {
        let context = RetryContext::new(
            "GET",
            "http://test/",
            RequestOptions::new()
                .with_header("accept", "text/plain")
                .with_delay(Duration::from_secs(5)),
        );
        assert_eq!(context.attempt(), 1);

        let retry = context.next(Some(Duration::from_millis(250)));
        assert_eq!(retry.retries, 1);
        assert_eq!(retry.attempt(), 2);
        assert_eq!(retry.options.delay, Some(Duration::from_millis(250)));
        assert_eq!(retry.options.headers, context.options.headers);

        let immediate = retry.next(None);
        assert_eq!(immediate.retries, 2);
        assert_eq!(immediate.options.delay, None);
    }
}
