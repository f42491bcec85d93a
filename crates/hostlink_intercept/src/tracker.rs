//! Protocol state tracking from the connection's own traffic.
//!
//! Runs inside the pipeline handler ahead of the modifier chains:
//! - inbound handshake: client protocol version (when the host has one)
//! - outbound login success: connection identity
//! - outbound open window: current window id (when the host has one)

use crate::connection::InterceptedConnection;
use crate::error::Result;
use crate::ids;
use hostlink_reflect::host::{Primitive, Value};
use hostlink_reflect::{ClassDescriptor, FieldHandle, ReflectionContext};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A message class plus the field read from its instances.
struct Extractor {
    class: Arc<ClassDescriptor>,
    field: FieldHandle,
}

impl Extractor {
    fn read(&self, message: &Value) -> Option<Value> {
        if !self.class.is_instance(message) {
            return None;
        }
        let object = message.as_object()?;
        match self.field.get(object) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ Failed to read {} from {}: {}", self.field.name(), self.class.name(), e);
                None
            }
        }
    }
}

pub(crate) struct ProtocolTracker {
    login: Extractor,
    handshake: Option<Extractor>,
    open_window: Option<Extractor>,
}

impl ProtocolTracker {
    pub(crate) fn wire(reflection: &ReflectionContext) -> Result<Self> {
        let identity = reflection.resolve_class(ids::IDENTITY)?.as_type();
        let login_class = reflection.resolve_class(ids::LOGIN_SUCCESS)?;
        let login_field = login_class
            .locate_field()
            .of_type(identity)
            .is_static(false)
            .inherited()
            .required()?;

        let handshake = Self::int_extractor(reflection, ids::HANDSHAKE);
        let open_window = Self::int_extractor(reflection, ids::OPEN_WINDOW);
        info!(
            "🧭 Protocol tracking: identity ✓, protocol version {}, window id {}",
            if handshake.is_some() { "✓" } else { "✗" },
            if open_window.is_some() { "✓" } else { "✗" }
        );

        Ok(Self {
            login: Extractor {
                class: login_class,
                field: login_field,
            },
            handshake,
            open_window,
        })
    }

    /// First non-static int field of an optional message class.
    fn int_extractor(reflection: &ReflectionContext, id: &str) -> Option<Extractor> {
        let class = reflection.resolve_class_optional(id)?;
        let field = class
            .locate_field()
            .of_type(Primitive::Int)
            .is_static(false)
            .optional()?;
        Some(Extractor { class, field })
    }

    pub(crate) fn inbound(&self, connection: &InterceptedConnection, message: &Value) {
        let Some(extractor) = &self.handshake else {
            return;
        };
        if let Some(version) = extractor.read(message).and_then(|v| v.as_int()) {
            debug!(connection = connection.id(), version, "🤝 Client protocol version");
            connection.set_protocol_version(version);
        }
    }

    /// Returns the identity when `message` authenticated the connection.
    pub(crate) fn outbound(&self, connection: &InterceptedConnection, message: &Value) -> Option<Uuid> {
        if let Some(extractor) = &self.open_window {
            if let Some(window) = extractor.read(message).and_then(|v| v.as_int()) {
                connection.set_window_id(window);
                return None;
            }
        }
        let identity = self.login.read(message)?.as_uuid()?;
        connection.bind_identity(identity);
        Some(identity)
    }
}
