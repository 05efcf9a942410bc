use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use crate::http::{Request, Response};
use crate::promise::Resolver;
use crate::transport::OperationId;

/// Where a request handed to the client currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ticket {
    /// Waiting for issuance, under this scheduler key.
    Deferred(u64),
    /// Issued to the transport.
    Issued(OperationId),
}

/// Shared between a promise's hooks and the code issuing its request.
pub(crate) type Slot = Rc<Cell<Ticket>>;

/// A request whose issuance was deferred by a `delay` option.
pub(crate) struct Deferred {
    pub(crate) request: Request,
    pub(crate) resolver: Resolver<Response>,
    pub(crate) slot: Slot,
}

/// Deferred requests ordered by due time, then by submission.
#[derive(Default)]
pub(crate) struct Scheduler {
    entries: BTreeMap<(Instant, u64), Deferred>,
}

impl Scheduler {
    pub(crate) fn schedule(&mut self, due: Instant, key: u64, deferred: Deferred) {
        self.entries.insert((due, key), deferred);
    }

    /// Remove every request due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<Deferred> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    /// Drop the request scheduled under `key`.
    pub(crate) fn remove(&mut self, key: u64) -> Option<Deferred> {
        let found = *self.entries.keys().find(|(_, k)| *k == key)?;
        self.entries.remove(&found)
    }

    pub(crate) fn contains(&self, key: u64) -> bool {
        self.entries.keys().any(|(_, k)| *k == key)
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|d| (&d.request.method, &d.request.url)))
            .finish()
    }
}
