//! Decorators swapped into host fields while the interceptor is installed.

use crate::host::{ConnectionList, MessageQueue};
use crate::interceptor::Shared;
use hostlink_reflect::host::{ObjectRef, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Stands in for the host's connection list and reports every addition
/// and removal.
pub(crate) struct InterceptedConnectionList {
    inner: Arc<dyn ConnectionList>,
    shared: Weak<Shared>,
}

impl InterceptedConnectionList {
    pub(crate) fn new(inner: Arc<dyn ConnectionList>, shared: Weak<Shared>) -> Self {
        Self { inner, shared }
    }
}

impl ConnectionList for InterceptedConnectionList {
    fn add(&self, connection: Value) {
        // The observer must be in place before the host can drain the queue.
        if let Some(shared) = self.shared.upgrade() {
            shared.observe(&connection);
        }
        self.inner.add(connection);
    }

    fn remove(&self, connection: &Value) -> bool {
        let removed = self.inner.remove(connection);
        if removed {
            if let Some(shared) = self.shared.upgrade() {
                shared.forget(connection);
            }
        }
        removed
    }

    fn snapshot(&self) -> Vec<Value> {
        self.inner.snapshot()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// One-shot observer over a new connection's inbound queue.
///
/// The first drain means the host has finished wiring the connection's
/// chain: the original queue goes back into its field and the connection
/// gets hooked. Every drain is served by the original queue.
pub(crate) struct ObservedQueue {
    original: Arc<dyn MessageQueue>,
    connection: ObjectRef,
    fired: AtomicBool,
    shared: Weak<Shared>,
}

impl ObservedQueue {
    pub(crate) fn new(original: Arc<dyn MessageQueue>, connection: ObjectRef, shared: Weak<Shared>) -> Self {
        Self {
            original,
            connection,
            fired: AtomicBool::new(false),
            shared,
        }
    }
}

impl MessageQueue for ObservedQueue {
    fn push(&self, message: Value) {
        self.original.push(message);
    }

    fn drain(&self) -> Vec<Value> {
        if !self.fired.swap(true, Ordering::AcqRel) {
            if let Some(shared) = self.shared.upgrade() {
                shared.first_drain(&self.connection);
            }
        }
        self.original.drain()
    }

    fn len(&self) -> usize {
        self.original.len()
    }
}
