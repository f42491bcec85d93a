//! Contracts of the host-side objects the pipeline plugs into.
//!
//! The host stores these objects in its own fields as [`Value::Object`]s
//! whose payload is an `Arc<dyn Trait>`. The helpers at the bottom of this
//! module wrap and unwrap them.

use hostlink_reflect::host::{ObjectRef, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// A host message object.
pub type Message = ObjectRef;

/// The host's collection of live connections.
pub trait ConnectionList: Send + Sync {
    fn add(&self, connection: Value);
    fn remove(&self, connection: &Value) -> bool;
    fn snapshot(&self) -> Vec<Value>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A connection's inbound message queue, drained by the host's control
/// thread.
pub trait MessageQueue: Send + Sync {
    fn push(&self, message: Value);
    fn drain(&self) -> Vec<Value>;
    fn len(&self) -> usize;
}

/// What a pipeline handler does with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Pass the (possibly replaced) message to the next handler.
    Continue(Value),
    /// Drop the message.
    Stop,
}

/// One named stage of a channel's processing chain.
///
/// Inbound messages travel from the first handler to the last; outbound
/// messages travel from the last handler to the first.
pub trait PipelineHandler: Send + Sync {
    fn inbound(&self, message: Value) -> Flow {
        Flow::Continue(message)
    }

    fn outbound(&self, message: Value) -> Flow {
        Flow::Continue(message)
    }
}

/// The transport endpoint of one connection with its ordered handler chain.
pub trait Channel: Send + Sync {
    fn id(&self) -> u64;
    fn is_open(&self) -> bool;
    fn handler_names(&self) -> Vec<String>;

    /// Inserts `handler` right before `anchor`; false when `anchor` is absent.
    fn add_before(&self, anchor: &str, name: &str, handler: Arc<dyn PipelineHandler>) -> bool;
    fn add_last(&self, name: &str, handler: Arc<dyn PipelineHandler>);
    fn remove(&self, name: &str) -> Option<Arc<dyn PipelineHandler>>;

    fn contains(&self, name: &str) -> bool {
        self.handler_names().iter().any(|n| n == name)
    }
}

/// A write-completion callback handed to the host's send primitive.
/// Fires at most once.
pub struct CompletionListener {
    callback: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl CompletionListener {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    pub fn fire(&self) {
        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn has_fired(&self) -> bool {
        self.callback.lock().is_none()
    }
}

impl std::fmt::Debug for CompletionListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionListener")
            .field("fired", &self.has_fired())
            .finish()
    }
}

pub fn wrap_list(class: &str, list: Arc<dyn ConnectionList>) -> Value {
    Value::Object(ObjectRef::new(class, list))
}

pub fn as_list(value: &Value) -> Option<Arc<dyn ConnectionList>> {
    value.as_object()?.downcast_ref::<Arc<dyn ConnectionList>>().cloned()
}

pub fn wrap_queue(class: &str, queue: Arc<dyn MessageQueue>) -> Value {
    Value::Object(ObjectRef::new(class, queue))
}

pub fn as_queue(value: &Value) -> Option<Arc<dyn MessageQueue>> {
    value.as_object()?.downcast_ref::<Arc<dyn MessageQueue>>().cloned()
}

pub fn wrap_channel(class: &str, channel: Arc<dyn Channel>) -> Value {
    Value::Object(ObjectRef::new(class, channel))
}

pub fn as_channel(value: &Value) -> Option<Arc<dyn Channel>> {
    value.as_object()?.downcast_ref::<Arc<dyn Channel>>().cloned()
}

pub fn wrap_listener(class: &str, listener: Arc<CompletionListener>) -> Value {
    Value::Object(ObjectRef::from_arc(class, listener))
}

pub fn as_listener(value: &Value) -> Option<Arc<CompletionListener>> {
    value.as_object()?.downcast::<CompletionListener>()
}
