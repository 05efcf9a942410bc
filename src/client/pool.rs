use std::collections::BTreeMap;
use std::fmt;

use crate::http::Response;
use crate::promise::Resolver;
use crate::transport::OperationId;

/// In-flight operations and the resolvers of the promises standing for them.
///
/// An entry leaves the pool exactly once: when the wait loop settles it, or
/// when its promise is cancelled.
#[derive(Default)]
pub struct FuturePool {
    entries: BTreeMap<OperationId, Resolver<Response>>,
}

impl FuturePool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `operation`, settled later through `resolver`.
    pub fn attach(&mut self, operation: OperationId, resolver: Resolver<Response>) {
        self.entries.insert(operation, resolver);
    }

    /// Stop tracking `operation`, handing back its resolver if it was tracked.
    pub fn detach(&mut self, operation: OperationId) -> Option<Resolver<Response>> {
        self.entries.remove(&operation)
    }

    /// Whether `operation` is tracked.
    pub fn contains(&self, operation: OperationId) -> bool {
        self.entries.contains_key(&operation)
    }

    /// Number of tracked operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked operations, in issuance order.
    pub fn handles(&self) -> Vec<OperationId> {
        self.entries.keys().copied().collect()
    }
}

impl fmt::Debug for FuturePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;
    use crate::promise::Promise;

    #[test]
    fn test_attach_and_detach() {
        let mut pool = FuturePool::new();
        let (promise, resolver) = Promise::<Response>::pending();

        pool.attach(OperationId(2), resolver);
        assert!(pool.contains(OperationId(2)));
        assert_eq!(pool.len(), 1);

        let resolver = pool.detach(OperationId(2)).unwrap();
        resolver.fulfill(Response::new(204));

        assert!(pool.is_empty());
        assert_eq!(promise.result().map(|r| r.map(|r| r.status())), Some(Ok(204)));
    }

    #[test]
    fn test_detach_twice_yields_nothing() {
        let mut pool = FuturePool::new();
        let (_promise, resolver) = Promise::<Response>::pending();
        pool.attach(OperationId(1), resolver);

        assert!(pool.detach(OperationId(1)).is_some());
        assert!(pool.detach(OperationId(1)).is_none());
    }

    #[test]
    fn test_handles_are_ordered() {
        let mut pool = FuturePool::new();
        for id in [3, 1, 2] {
            let (_promise, resolver) = Promise::<Response>::pending();
            pool.attach(OperationId(id), resolver);
        }
        assert_eq!(
            pool.handles(),
            vec![OperationId(1), OperationId(2), OperationId(3)]
        );
        assert_eq!(
            format!("{:?}", pool),
            "{OperationId(1), OperationId(2), OperationId(3)}"
        );
    }
}
