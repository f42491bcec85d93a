//! The packet modifier contract.

use crate::connection::InterceptedConnection;
use crate::host::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Ordering hint within one chain.
///
/// `High` modifiers always run before `Low` ones in the same scope; equal
/// priorities run in registration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Low,
}

/// Outcome of one modifier for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Continue with this message, which may differ from the one received.
    Forward(Message),
    /// Drop the message and skip the rest of the chain.
    Terminate,
}

/// A pluggable unit that inspects, rewrites or drops messages.
///
/// Both hooks run on the connection's I/O thread and must not block.
/// Returning an error (or panicking) is logged and treated as passing the
/// message through unchanged.
pub trait PacketModifier: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called for each message received from `source`. `identity` is absent
    /// until the connection has authenticated.
    fn modify_inbound(
        &self,
        identity: Option<Uuid>,
        source: &InterceptedConnection,
        message: Message,
    ) -> anyhow::Result<Verdict> {
        let _ = (identity, source);
        Ok(Verdict::Forward(message))
    }

    /// Called for each message right before it is written to the transport.
    fn modify_outbound(&self, identity: Option<Uuid>, message: Message) -> anyhow::Result<Verdict> {
        let _ = identity;
        Ok(Verdict::Forward(message))
    }
}

type InboundFn = dyn Fn(Option<Uuid>, &InterceptedConnection, Message) -> anyhow::Result<Verdict> + Send + Sync;
type OutboundFn = dyn Fn(Option<Uuid>, Message) -> anyhow::Result<Verdict> + Send + Sync;

/// A modifier assembled from closures.
///
/// ```ignore
/// let mute = FnModifier::new("mute").on_outbound(|_, msg| {
///     Ok(if is_chat(&msg) { Verdict::Terminate } else { Verdict::Forward(msg) })
/// });
/// interceptor.register(Arc::new(mute), Priority::High);
/// ```
pub struct FnModifier {
    name: String,
    inbound: Option<Arc<InboundFn>>,
    outbound: Option<Arc<OutboundFn>>,
}

impl FnModifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inbound: None,
            outbound: None,
        }
    }

    pub fn on_inbound<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Uuid>, &InterceptedConnection, Message) -> anyhow::Result<Verdict> + Send + Sync + 'static,
    {
        self.inbound = Some(Arc::new(f));
        self
    }

    pub fn on_outbound<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Uuid>, Message) -> anyhow::Result<Verdict> + Send + Sync + 'static,
    {
        self.outbound = Some(Arc::new(f));
        self
    }
}

impl PacketModifier for FnModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn modify_inbound(
        &self,
        identity: Option<Uuid>,
        source: &InterceptedConnection,
        message: Message,
    ) -> anyhow::Result<Verdict> {
        match &self.inbound {
            Some(f) => f(identity, source, message),
            None => Ok(Verdict::Forward(message)),
        }
    }

    fn modify_outbound(&self, identity: Option<Uuid>, message: Message) -> anyhow::Result<Verdict> {
        match &self.outbound {
            Some(f) => f(identity, message),
            None => Ok(Verdict::Forward(message)),
        }
    }
}

impl std::fmt::Debug for FnModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModifier").field("name", &self.name).finish_non_exhaustive()
    }
}
