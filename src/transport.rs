//! The boundary with the underlying HTTP transport.
//!
//! The transport performs the actual I/O. This crate only needs four
//! primitives from it: issue a request, stream chunks for a set of in-flight
//! operations, read the status once the first byte arrives, and collect the
//! completed response. Cancellation is the fifth.

use std::fmt;
use std::time::Duration;

use crate::error::HttpError;
use crate::http::{Request, Response};

/// Transport-owned identity of one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// One incremental event for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// The operation stayed idle for the whole poll budget.
    Timeout,
    /// Headers arrived.
    First,
    /// Part of the body arrived.
    Data,
    /// The operation completed.
    Last,
}

/// A chunk for an operation, or the failure the transport hit while streaming it.
pub type Event = (OperationId, Result<Chunk, HttpError>);

/// The underlying HTTP transport.
///
/// All methods take `&self`; implementations that keep mutable state use
/// interior mutability. Calls never overlap: the wait loop is single-threaded
/// and cooperative, and callbacks that re-enter the client (to issue a retry,
/// for instance) run between poll calls, never during one.
pub trait Transport {
    /// Start a request.
    ///
    /// Returns [`HttpError::InvalidArgument`] synchronously for malformed
    /// requests.
    fn issue(&self, request: &Request) -> Result<OperationId, HttpError>;

    /// Stream events for the given operations.
    ///
    /// Blocks for at most `idle_timeout` (or a transport default when `None`)
    /// waiting for activity. Operations that stay idle for the whole budget
    /// yield [`Chunk::Timeout`]. For each operation, [`Chunk::First`] is
    /// always yielded before [`Chunk::Last`].
    fn poll(&self, operations: &[OperationId], idle_timeout: Option<Duration>) -> Vec<Event>;

    /// The status code of an operation whose first chunk has arrived.
    ///
    /// Transports that treat some statuses as failures report them here as
    /// [`HttpError::Status`].
    fn status(&self, operation: OperationId) -> Result<u16, HttpError>;

    /// The completed response of an operation whose last chunk has arrived.
    fn complete(&self, operation: OperationId) -> Result<Response, HttpError>;

    /// Abort an operation.
    fn cancel(&self, operation: OperationId);
}

impl<T: Transport + ?Sized> Transport for std::rc::Rc<T> {
    fn issue(&self, request: &Request) -> Result<OperationId, HttpError> {
        (**self).issue(request)
    }

    fn poll(&self, operations: &[OperationId], idle_timeout: Option<Duration>) -> Vec<Event> {
        (**self).poll(operations, idle_timeout)
    }

    fn status(&self, operation: OperationId) -> Result<u16, HttpError> {
        (**self).status(operation)
    }

    fn complete(&self, operation: OperationId) -> Result<Response, HttpError> {
        (**self).complete(operation)
    }

    fn cancel(&self, operation: OperationId) {
        (**self).cancel(operation)
    }
}
