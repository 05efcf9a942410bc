//! Deterministic test doubles for the transport and the clock.
//!
//! [`MockTransport`] replays scripted [`MockResponse`]s. Each response becomes
//! ready after its latency has elapsed on a [`MockClock`], then streams a
//! first chunk, its body chunks and a last chunk. Mock time only
//! moves when the transport has nothing ready and idles, or when somebody
//! sleeps on the clock, so tests never wait on the wall clock.
//!
//! # Examples
//!
//! ```rust
//! use undertow::testing::{MockClock, MockResponse, MockTransport};
//! use undertow::{ClientConfig, PromiseClient, PromiseHttpClient, RequestOptions};
//! use std::time::Duration;
//!
//! let clock = MockClock::new();
//! let transport = MockTransport::new(clock.clone())
//!     .with_response(MockResponse::new(200).with_latency(Duration::from_millis(40)));
//! let client = PromiseHttpClient::with_config(
//!     transport.clone(),
//!     ClientConfig::new().with_clock(clock.shared()),
//! );
//!
//! let response = client.request("GET", "http://test/", RequestOptions::new()).wait();
//!
//! assert_eq!(response.map(|r| r.status()), Ok(200));
//! assert_eq!(clock.elapsed(), Duration::from_millis(40));
//! assert_eq!(transport.issued(), 1);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::clock::{Clock, SharedClock};
use crate::error::HttpError;
use crate::http::{Request, Response};
use crate::transport::{Chunk, Event, OperationId, Transport};

/// Poll budget used by [`MockTransport`] when the caller passes none.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// A clock that only moves when told to.
///
/// Clones share the same time. [`Clock::sleep`] advances the clock instead of
/// blocking.
#[derive(Debug, Clone)]
pub struct MockClock {
    state: Arc<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    origin: Instant,
    wall: SystemTime,
    offset_nanos: AtomicU64,
}

impl MockClock {
    /// A clock whose wall time starts at 2023-11-14T22:13:20Z.
    pub fn new() -> Self {
        Self::starting_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    /// A clock whose wall time starts at `wall`.
    pub fn starting_at(wall: SystemTime) -> Self {
        Self {
            state: Arc::new(ClockState {
                origin: Instant::now(),
                wall,
                offset_nanos: AtomicU64::new(0),
            }),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .state
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some(offset.saturating_add(nanos))
            });
    }

    /// How far the clock has moved since it was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.state.offset_nanos.load(Ordering::SeqCst))
    }

    /// This clock as a [`SharedClock`].
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.state.origin + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.state.wall + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fault {
    Unreachable(String),
    Stream(String),
    Status(HttpError),
    Body(String),
}

/// A scripted transport outcome.
///
/// By default the response is ready immediately and streams one body chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    response: Response,
    latency: Option<Duration>,
    chunks: usize,
    fault: Option<Fault>,
}

impl MockResponse {
    /// A response with `status`.
    pub fn new(status: u16) -> Self {
        Self::from(Response::new(status))
    }

    /// An operation that fails with a transport error instead of producing
    /// any chunk, e.g. a refused connection.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            fault: Some(Fault::Unreachable(message.into())),
            ..Self::new(0)
        }
    }

    /// Add a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response = self.response.with_header(name, value);
        self
    }

    /// Set the response body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.response = self.response.with_body(body);
        self
    }

    /// Stream the body as `chunks` data chunks.
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    /// Become ready `latency` after issuance.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Never become ready.
    pub fn hanging(mut self) -> Self {
        self.latency = None;
        self
    }

    /// Fail with a transport error right after the first chunk.
    pub fn with_stream_failure(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(Fault::Stream(message.into()));
        self
    }

    /// Report `error` from the status accessor.
    pub fn with_status_failure(mut self, error: HttpError) -> Self {
        self.fault = Some(Fault::Status(error));
        self
    }

    /// Stream normally but fail when the completed response is collected.
    pub fn with_broken_body(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(Fault::Body(message.into()));
        self
    }
}

impl From<Response> for MockResponse {
    fn from(response: Response) -> Self {
        Self {
            response,
            latency: Some(Duration::ZERO),
            chunks: 1,
            fault: None,
        }
    }
}

type Responder = Box<dyn FnMut(&Request) -> Result<MockResponse, HttpError>>;

/// A scripted in-memory [`Transport`].
///
/// Clones share state, so a test can hand one clone to a client and keep
/// another to inspect what was issued and cancelled.
#[derive(Clone)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

struct MockState {
    clock: MockClock,
    script: VecDeque<MockResponse>,
    responder: Option<Responder>,
    http_errors: bool,
    next_id: u64,
    operations: BTreeMap<OperationId, MockOperation>,
    requests: Vec<Request>,
    cancelled: Vec<OperationId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Waiting,
    Streaming(usize),
    Done,
}

struct MockOperation {
    response: MockResponse,
    ready_at: Option<Instant>,
    timeout: Option<(Duration, Instant)>,
    step: Step,
}

impl MockOperation {
    /// The next instant this operation has something to report.
    fn next_at(&self) -> Option<Instant> {
        if self.step == Step::Done {
            return None;
        }
        let deadline = self.timeout.map(|(_, at)| at);
        match (self.ready_at, deadline) {
            (Some(ready), Some(deadline)) => Some(ready.min(deadline)),
            (ready, deadline) => ready.or(deadline),
        }
    }

    fn advance(&mut self, now: Instant) -> Option<Result<Chunk, HttpError>> {
        if self.step == Step::Done {
            return None;
        }
        if let Some((timeout, deadline)) = self.timeout {
            if deadline <= now {
                self.step = Step::Done;
                return Some(Err(HttpError::timeout(format!(
                    "operation timed out after {} ms",
                    timeout.as_millis()
                ))));
            }
        }
        if !self.ready_at.is_some_and(|ready| ready <= now) {
            return None;
        }

        let (next, chunk) = match (self.step, &self.response.fault) {
            (Step::Waiting, Some(Fault::Unreachable(message))) => {
                (Step::Done, Err(HttpError::transport(message.clone())))
            }
            (Step::Waiting, _) => (Step::Streaming(self.response.chunks), Ok(Chunk::First)),
            (Step::Streaming(_), Some(Fault::Stream(message))) => {
                (Step::Done, Err(HttpError::transport(message.clone())))
            }
            (Step::Streaming(0), _) => (Step::Done, Ok(Chunk::Last)),
            (Step::Streaming(left), _) => (Step::Streaming(left - 1), Ok(Chunk::Data)),
            (Step::Done, _) => return None,
        };
        self.step = next;
        Some(chunk)
    }
}

impl MockState {
    /// Everything the given operations have to report at `now`.
    fn advance_ready(&mut self, operations: &[OperationId], now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        for id in operations {
            if let Some(op) = self.operations.get_mut(id) {
                while let Some(chunk) = op.advance(now) {
                    events.push((*id, chunk));
                }
            }
        }
        events
    }
}

impl MockTransport {
    /// An empty transport on `clock`.
    pub fn new(clock: MockClock) -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                clock,
                script: VecDeque::new(),
                responder: None,
                http_errors: false,
                next_id: 1,
                operations: BTreeMap::new(),
                requests: Vec::new(),
                cancelled: Vec::new(),
            })),
        }
    }

    /// Queue a response for the next issued request.
    pub fn with_response(self, response: impl Into<MockResponse>) -> Self {
        self.push(response);
        self
    }

    /// Queue responses, in issuance order.
    pub fn with_responses<I>(self, responses: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MockResponse>,
    {
        for response in responses {
            self.push(response);
        }
        self
    }

    /// Compute responses from the request instead of a script.
    ///
    /// Returning `Err` fails issuance synchronously.
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&Request) -> Result<MockResponse, HttpError> + 'static,
    {
        self.state.borrow_mut().responder = Some(Box::new(responder));
        self
    }

    /// Report statuses of 400 and above as [`HttpError::Status`] from
    /// [`Transport::status`].
    pub fn with_http_errors(self) -> Self {
        self.state.borrow_mut().http_errors = true;
        self
    }

    /// Queue a response for a later request.
    pub fn push(&self, response: impl Into<MockResponse>) {
        self.state.borrow_mut().script.push_back(response.into());
    }

    /// The clock this transport runs on.
    pub fn clock(&self) -> MockClock {
        self.state.borrow().clock.clone()
    }

    /// Every request successfully issued so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.borrow().requests.clone()
    }

    /// Number of requests successfully issued.
    pub fn issued(&self) -> usize {
        self.state.borrow().requests.len()
    }

    /// Operations cancelled so far, in order.
    pub fn cancelled(&self) -> Vec<OperationId> {
        self.state.borrow().cancelled.clone()
    }

    /// Operations issued but not yet collected or cancelled.
    pub fn in_flight(&self) -> usize {
        self.state
            .borrow()
            .operations
            .values()
            .filter(|op| op.step != Step::Done)
            .count()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockTransport")
            .field("scripted", &state.script.len())
            .field("issued", &state.requests.len())
            .field("in_flight", &state.operations.len())
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

impl Transport for MockTransport {
    fn issue(&self, request: &Request) -> Result<OperationId, HttpError> {
        request.validate()?;

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let response = match state.responder.as_mut() {
            Some(responder) => responder(request)?,
            None => state.script.pop_front().ok_or_else(|| {
                HttpError::transport(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                ))
            })?,
        };

        let id = OperationId(state.next_id);
        state.next_id += 1;
        let now = state.clock.now();
        state.operations.insert(
            id,
            MockOperation {
                ready_at: response.latency.and_then(|latency| now.checked_add(latency)),
                timeout: request
                    .options
                    .timeout
                    .and_then(|t| now.checked_add(t).map(|at| (t, at))),
                response,
                step: Step::Waiting,
            },
        );
        state.requests.push(request.clone());
        tracing::trace!(operation = %id, method = %request.method, url = %request.url, "mock issued");
        Ok(id)
    }

    fn poll(&self, operations: &[OperationId], idle_timeout: Option<Duration>) -> Vec<Event> {
        let mut state = self.state.borrow_mut();
        let live: Vec<OperationId> = operations
            .iter()
            .copied()
            .filter(|id| {
                state
                    .operations
                    .get(id)
                    .is_some_and(|op| op.step != Step::Done)
            })
            .collect();
        if live.is_empty() {
            return Vec::new();
        }

        let now = state.clock.now();
        let events = state.advance_ready(&live, now);
        if !events.is_empty() {
            return events;
        }

        let budget = idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        let next = live
            .iter()
            .filter_map(|id| state.operations.get(id).and_then(MockOperation::next_at))
            .min();
        match next {
            Some(at) if at.saturating_duration_since(now) <= budget => {
                state.clock.advance(at.saturating_duration_since(now));
                state.advance_ready(&live, at)
            }
            _ => {
                state.clock.advance(budget);
                live.into_iter().map(|id| (id, Ok(Chunk::Timeout))).collect()
            }
        }
    }

    fn status(&self, operation: OperationId) -> Result<u16, HttpError> {
        let state = self.state.borrow();
        let op = state
            .operations
            .get(&operation)
            .ok_or_else(|| HttpError::transport(format!("unknown operation {}", operation)))?;
        if let Some(Fault::Status(error)) = &op.response.fault {
            return Err(error.clone());
        }
        let code = op.response.response.status();
        if state.http_errors && code >= 400 {
            return Err(HttpError::status(code, format!("server responded with {}", code)));
        }
        Ok(code)
    }

    fn complete(&self, operation: OperationId) -> Result<Response, HttpError> {
        let op = self
            .state
            .borrow_mut()
            .operations
            .remove(&operation)
            .ok_or_else(|| HttpError::transport(format!("unknown operation {}", operation)))?;
        match op.response.fault {
            Some(Fault::Body(message)) => Err(HttpError::transport(message)),
            _ => Ok(op.response.response),
        }
    }

    fn cancel(&self, operation: OperationId) {
        let mut state = self.state.borrow_mut();
        state.operations.remove(&operation);
        state.cancelled.push(operation);
        tracing::trace!(operation = %operation, "mock cancelled");
    }
}
