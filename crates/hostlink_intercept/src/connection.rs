//! A hooked host connection and its send and receive primitives.

use crate::error::{InterceptError, Result};
use crate::host::{wrap_listener, Channel, CompletionListener, Message};
use hostlink_reflect::host::{ClassName, ObjectRef, Value};
use hostlink_reflect::MethodHandle;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

/// Host methods a connection writes and injects messages through.
#[derive(Debug, Clone)]
pub(crate) struct HostPrimitives {
    /// Writes a message with a completion listener.
    pub send: MethodHandle,
    pub listener_class: ClassName,
    /// Hands a decoded message straight to the connection, skipping the
    /// handler chain. Not every host exposes one.
    pub receive: Option<MethodHandle>,
}

/// One live connection with the pipeline's handler installed.
///
/// Identity and protocol attributes are filled in as the connection's own
/// traffic reveals them.
pub struct InterceptedConnection {
    connection: ObjectRef,
    channel: Arc<dyn Channel>,
    identity: RwLock<Option<Uuid>>,
    protocol_version: RwLock<Option<i64>>,
    window_id: RwLock<Option<i64>>,
    primitives: HostPrimitives,
}

impl InterceptedConnection {
    pub(crate) fn new(connection: ObjectRef, channel: Arc<dyn Channel>, primitives: HostPrimitives) -> Self {
        Self {
            connection,
            channel,
            identity: RwLock::new(None),
            protocol_version: RwLock::new(None),
            window_id: RwLock::new(None),
            primitives,
        }
    }

    /// The channel id, stable for the connection's lifetime.
    pub fn id(&self) -> u64 {
        self.channel.id()
    }

    /// Absent until authentication completes.
    pub fn identity(&self) -> Option<Uuid> {
        *self.identity.read()
    }

    pub fn protocol_version(&self) -> Option<i64> {
        *self.protocol_version.read()
    }

    /// Id of the window the client currently has open, if tracked.
    pub fn window_id(&self) -> Option<i64> {
        *self.window_id.read()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// The host's own connection object.
    pub fn host_object(&self) -> &ObjectRef {
        &self.connection
    }

    pub(crate) fn bind_identity(&self, identity: Uuid) {
        *self.identity.write() = Some(identity);
    }

    pub(crate) fn set_protocol_version(&self, version: i64) {
        *self.protocol_version.write() = Some(version);
    }

    pub(crate) fn set_window_id(&self, window: i64) {
        *self.window_id.write() = Some(window);
    }

    /// Sends one message through the host, firing `on_complete` when the
    /// write completes.
    ///
    /// On a closed connection this is a no-op that fires `on_complete`
    /// immediately.
    pub fn send(&self, message: Message, on_complete: impl FnOnce() + Send + 'static) -> Result<()> {
        if !self.channel.is_open() {
            trace!(connection = self.id(), "send on closed connection ignored");
            on_complete();
            return Ok(());
        }
        let listener = Arc::new(CompletionListener::new(on_complete));
        let listener = wrap_listener(&self.primitives.listener_class, listener);
        self.primitives
            .send
            .invoke(&self.connection, &[Value::Object(message), listener])?;
        Ok(())
    }

    /// Feeds `message` to the host as if the client had sent it, then fires
    /// `on_complete`. The message enters behind the handler chain, so no
    /// modifier sees it.
    ///
    /// On a closed connection this is a no-op that fires `on_complete`
    /// immediately.
    ///
    /// # Errors
    ///
    /// [`InterceptError::Unsupported`] when the host has no direct receive
    /// method, or the host call's own failure. `on_complete` does not fire
    /// in either case.
    pub fn receive(&self, message: Message, on_complete: impl FnOnce() + Send + 'static) -> Result<()> {
        if !self.channel.is_open() {
            trace!(connection = self.id(), "receive on closed connection ignored");
            on_complete();
            return Ok(());
        }
        let method = self
            .primitives
            .receive
            .as_ref()
            .ok_or(InterceptError::Unsupported("receive"))?;
        method.invoke(&self.connection, &[Value::Null, Value::Object(message)])?;
        on_complete();
        Ok(())
    }

    /// Sends several messages as one logical send. `on_complete` fires once,
    /// after the last underlying write completes, in whatever order the
    /// writes complete.
    ///
    /// If one send fails, the messages after it are never sent and its error
    /// is returned. `on_complete` still fires once, when the writes already
    /// handed to the host have completed.
    pub fn send_all(&self, messages: Vec<Message>, on_complete: impl FnOnce() + Send + 'static) -> Result<()> {
        if messages.is_empty() {
            on_complete();
            return Ok(());
        }
        let total = messages.len();
        let remaining = Arc::new(AtomicUsize::new(total));
        let done = Arc::new(CompletionListener::new(on_complete));
        for (index, message) in messages.into_iter().enumerate() {
            let slot = Arc::new(CompletionListener::new({
                let remaining = remaining.clone();
                let done = done.clone();
                move || {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        done.fire();
                    }
                }
            }));
            let fire = slot.clone();
            if let Err(e) = self.send(message, move || fire.fire()) {
                // The failed message and the unsent rest count as completed.
                slot.fire();
                let unsent = total - index - 1;
                if unsent > 0 && remaining.fetch_sub(unsent, Ordering::AcqRel) == unsent {
                    done.fire();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Sends `messages` and waits until every write has completed.
    ///
    /// A failed send returns its error right away, without waiting for the
    /// writes started before it.
    pub async fn flush(&self, messages: Vec<Message>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send_all(messages, move || {
            let _ = tx.send(());
        })?;
        rx.await.map_err(|_| InterceptError::CompletionDropped(self.id()))
    }
}

impl std::fmt::Debug for InterceptedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedConnection")
            .field("id", &self.id())
            .field("identity", &self.identity())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
