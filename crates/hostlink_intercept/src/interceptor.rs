//! The packet interceptor: wiring, hook bookkeeping and the public
//! registration API.

use crate::chain::{run_inbound, run_outbound};
use crate::connection::{HostPrimitives, InterceptedConnection};
use crate::decorator::{InterceptedConnectionList, ObservedQueue};
use crate::error::{InterceptError, Result};
use crate::handler::InterceptHandler;
use crate::host::{as_channel, as_list, as_queue, wrap_list, wrap_queue, Channel, Flow};
use crate::ids;
use crate::modifier::{PacketModifier, Priority, Verdict};
use crate::registry::ModifierRegistry;
use crate::settings::InterceptorSettings;
use crate::tracker::ProtocolTracker;
use dashmap::DashMap;
use hostlink_reflect::host::{ObjectRef, Value};
use hostlink_reflect::{ClassDescriptor, ComparableType, FieldHandle, ReflectionContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Resolved host members the pipeline works through.
struct Wiring {
    server_connection: ObjectRef,
    list_field: FieldHandle,
    original_list: Value,
    channel_field: FieldHandle,
    queue_field: FieldHandle,
    message: Arc<ClassDescriptor>,
    primitives: HostPrimitives,
}

/// A connection whose queue still holds a one-shot observer.
#[derive(Clone)]
struct PendingObserver {
    connection: ObjectRef,
    original_queue: Value,
}

/// State shared by the interceptor, its decorators and its handlers.
///
/// Decorators and handlers hold it weakly so that dropping the interceptor
/// is enough to release everything.
pub(crate) struct Shared {
    settings: InterceptorSettings,
    handler_name: String,
    registry: ModifierRegistry,
    tracker: ProtocolTracker,
    wiring: Wiring,
    /// Serializes every decorator callback and every hook/unhook.
    hook_lock: Mutex<()>,
    hooked: DashMap<usize, Arc<InterceptedConnection>>,
    pending: DashMap<usize, PendingObserver>,
    receivers: DashMap<Uuid, Arc<InterceptedConnection>>,
    protocol_versions: DashMap<Uuid, i64>,
    closed: AtomicBool,
}

impl Shared {
    /// Called by the list decorator after the host added a connection.
    pub(crate) fn observe(self: &Arc<Self>, connection: &Value) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(object) = connection.as_object() else {
            return;
        };
        let _guard = self.hook_lock.lock();
        if let Err(e) = self.install_observer(object) {
            warn!("⚠️ Could not observe new connection {:?}: {}", object, e);
        }
    }

    /// Called by the list decorator after the host removed a connection.
    pub(crate) fn forget(&self, connection: &Value) {
        let Some(object) = connection.as_object() else {
            return;
        };
        let _guard = self.hook_lock.lock();
        if let Some((_, pending)) = self.pending.remove(&object.id()) {
            self.restore_queue(&pending);
        }
        if let Some((_, hooked)) = self.hooked.remove(&object.id()) {
            debug!("🔌 Connection {} torn down", hooked.id());
        }
    }

    /// Called by a connection's observed queue on its first drain.
    pub(crate) fn first_drain(self: &Arc<Self>, connection: &ObjectRef) {
        let _guard = self.hook_lock.lock();
        if let Some((_, pending)) = self.pending.remove(&connection.id()) {
            self.restore_queue(&pending);
        }
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.hook(connection) {
            warn!("⚠️ Failed to hook connection {:?}: {}", connection, e);
        }
    }

    /// Hooks a connection present before installation, or observes it when
    /// the host has not finished wiring its chain. Lock must be held.
    fn adopt(self: &Arc<Self>, connection: &ObjectRef) -> Result<()> {
        let channel = self.channel_of(connection)?;
        if channel.contains(&self.settings.terminal_handler) {
            self.hook(connection)
        } else {
            self.install_observer(connection)
        }
    }

    /// Lock must be held.
    fn install_observer(self: &Arc<Self>, connection: &ObjectRef) -> Result<()> {
        let key = connection.id();
        if self.hooked.contains_key(&key) || self.pending.contains_key(&key) {
            return Ok(());
        }
        let current = self.wiring.queue_field.get(connection)?;
        let original = as_queue(&current)
            .ok_or_else(|| InterceptError::shape("connection queue", format!("{current:?}")))?;
        let class = current.as_object().map(|o| o.class_name().to_string()).unwrap_or_default();
        let observed = ObservedQueue::new(original, connection.clone(), Arc::downgrade(self));
        self.wiring
            .queue_field
            .set(connection, wrap_queue(&class, Arc::new(observed)))?;
        self.pending.insert(
            key,
            PendingObserver {
                connection: connection.clone(),
                original_queue: current,
            },
        );
        debug!("👀 Observing queue of new connection {:?}", connection);
        Ok(())
    }

    /// Inserts our handler into the connection's chain, at most once per
    /// connection. Lock must be held.
    fn hook(self: &Arc<Self>, connection: &ObjectRef) -> Result<()> {
        if self.hooked.contains_key(&connection.id()) {
            return Ok(());
        }
        let channel = self.channel_of(connection)?;
        let intercepted = Arc::new(InterceptedConnection::new(
            connection.clone(),
            channel.clone(),
            self.wiring.primitives.clone(),
        ));
        let handler = Arc::new(InterceptHandler::new(Arc::downgrade(self), intercepted.clone()));

        if channel.remove(&self.handler_name).is_some() {
            debug!("♻️ Replaced stale '{}' on connection {}", self.handler_name, channel.id());
        }
        if !channel.add_before(&self.settings.terminal_handler, &self.handler_name, handler.clone()) {
            channel.add_last(&self.handler_name, handler);
        }
        self.hooked.insert(connection.id(), intercepted);
        debug!("🪝 Hooked connection {}", channel.id());
        Ok(())
    }

    fn channel_of(&self, connection: &ObjectRef) -> Result<Arc<dyn Channel>> {
        let value = self.wiring.channel_field.get(connection)?;
        as_channel(&value).ok_or_else(|| InterceptError::shape("connection channel", format!("{value:?}")))
    }

    fn restore_queue(&self, pending: &PendingObserver) {
        if let Err(e) = self
            .wiring
            .queue_field
            .set(&pending.connection, pending.original_queue.clone())
        {
            warn!("⚠️ Failed to restore queue of {:?}: {}", pending.connection, e);
        }
    }

    /// Whether the modifier chains see this message at all.
    fn accepts(&self, message: &Value) -> bool {
        message.as_object().is_some()
            && (!self.settings.filter_non_messages || self.wiring.message.is_instance(message))
    }

    pub(crate) fn process_inbound(&self, connection: &InterceptedConnection, message: Value) -> Flow {
        if !self.accepts(&message) {
            return Flow::Continue(message);
        }
        self.tracker.inbound(connection, &message);
        let Value::Object(object) = message else {
            return Flow::Continue(message);
        };
        match run_inbound(&self.registry, connection.identity(), connection, object) {
            Verdict::Forward(next) => Flow::Continue(Value::Object(next)),
            Verdict::Terminate => Flow::Stop,
        }
    }

    pub(crate) fn process_outbound(&self, connection: &Arc<InterceptedConnection>, message: Value) -> Flow {
        if !self.accepts(&message) {
            return Flow::Continue(message);
        }
        if let Some(identity) = self.tracker.outbound(connection, &message) {
            self.bind_receiver(identity, connection);
        }
        let Value::Object(object) = message else {
            return Flow::Continue(message);
        };
        match run_outbound(&self.registry, connection.identity(), connection.id(), object) {
            Verdict::Forward(next) => Flow::Continue(Value::Object(next)),
            Verdict::Terminate => Flow::Stop,
        }
    }

    fn bind_receiver(&self, identity: Uuid, connection: &Arc<InterceptedConnection>) {
        match connection.protocol_version() {
            Some(version) => {
                self.protocol_versions.insert(identity, version);
            }
            None => {
                if let Some(version) = self.protocol_versions.get(&identity).map(|v| *v) {
                    connection.set_protocol_version(version);
                }
            }
        }
        self.receivers.insert(identity, connection.clone());
        debug!("🪪 Connection {} authenticated as {}", connection.id(), identity);
    }
}

/// Hooks every current and future connection of a host and runs their
/// traffic through registered [`PacketModifier`]s.
///
/// Dropping the interceptor (or calling [`shutdown`](Self::shutdown))
/// restores the host to the state it was found in.
pub struct PacketInterceptor {
    shared: Arc<Shared>,
}

impl PacketInterceptor {
    /// Wires the interceptor into the host reachable from `server`.
    ///
    /// # Arguments
    ///
    /// * `reflection` - Context whose catalog covers every id in [`ids::REQUIRED`]
    /// * `server` - The host's outer server object
    /// * `settings` - Handler naming and placement
    ///
    /// # Errors
    ///
    /// Any class or member the pipeline needs is missing, or holds a value
    /// of the wrong kind.
    pub fn new(reflection: ReflectionContext, server: &Value, settings: InterceptorSettings) -> Result<Self> {
        let wiring = Self::wire(&reflection, server)?;
        let tracker = ProtocolTracker::wire(&reflection)?;
        let original = as_list(&wiring.original_list)
            .ok_or_else(|| InterceptError::shape("connection list", format!("{:?}", wiring.original_list)))?;
        let list_class = wiring
            .original_list
            .as_object()
            .map(|o| o.class_name().to_string())
            .unwrap_or_default();

        let shared = Arc::new(Shared {
            handler_name: settings.handler_name(),
            settings,
            registry: ModifierRegistry::new(),
            tracker,
            wiring,
            hook_lock: Mutex::new(()),
            hooked: DashMap::new(),
            pending: DashMap::new(),
            receivers: DashMap::new(),
            protocol_versions: DashMap::new(),
            closed: AtomicBool::new(false),
        });

        {
            let _guard = shared.hook_lock.lock();
            let decorator = InterceptedConnectionList::new(original.clone(), Arc::downgrade(&shared));
            shared
                .wiring
                .list_field
                .set(&shared.wiring.server_connection, wrap_list(&list_class, Arc::new(decorator)))?;

            for existing in original.snapshot() {
                if let Some(object) = existing.as_object() {
                    if let Err(e) = shared.adopt(object) {
                        warn!("⚠️ Skipping existing connection {:?}: {}", object, e);
                    }
                }
            }
        }

        info!(
            "🔌 Packet interceptor '{}' installed ({} connections hooked, {} awaiting first drain)",
            shared.handler_name,
            shared.hooked.len(),
            shared.pending.len()
        );
        Ok(Self { shared })
    }

    fn wire(reflection: &ReflectionContext, server: &Value) -> Result<Wiring> {
        let server_class = reflection.resolve_class(ids::SERVER)?;
        if !server_class.is_instance(server) {
            return Err(InterceptError::shape("server", format!("{server:?} is not a {}", server_class.name())));
        }
        let server_object = object(server.clone(), "server")?;

        let game_server = reflection.resolve_class(ids::GAME_SERVER)?;
        let console = server_class
            .locate_field()
            .of_type(ComparableType::subtype_of(game_server.as_type()))
            .inherited()
            .required()?
            .get(&server_object)?;
        let console = object(console, "game server")?;

        let server_connection = reflection.resolve_class(ids::SERVER_CONNECTION)?;
        let server_connection_object = reflection
            .describe_object(&console)?
            .locate_field()
            .of_type(server_connection.as_type())
            .inherited()
            .required()?
            .get(&console)?;
        let server_connection_object = object(server_connection_object, "server connection")?;

        let connection = reflection.resolve_class(ids::CONNECTION)?;
        let list_type = reflection.resolve_class(ids::CONNECTION_LIST)?.as_type();
        let list_field = match server_connection
            .locate_field()
            .of_type(list_type.clone())
            .with_generic(connection.as_type())
            .optional()
        {
            Some(field) => field,
            // Element types may be erased; the connection list is the second list.
            None => server_connection.locate_field().of_type(list_type).skip(1).required()?,
        };
        let original_list = list_field.get(&server_connection_object)?;

        let message = reflection.resolve_class(ids::MESSAGE)?;
        let channel_field = connection
            .locate_field()
            .of_type(reflection.resolve_class(ids::CHANNEL)?.as_type())
            .required()?;
        let queue_field = connection
            .locate_field()
            .of_type(reflection.resolve_class(ids::MESSAGE_QUEUE)?.as_type())
            .with_generic(message.as_type())
            .required()?;

        let listener = reflection.resolve_class(ids::COMPLETION_LISTENER)?;
        let send = connection
            .locate_method()
            .with_params([message.as_type(), listener.as_type()])
            .inherited()
            .required()?;
        let receive = reflection.resolve_class_optional(ids::HANDLER_CONTEXT).and_then(|context| {
            connection
                .locate_method()
                .with_params([context.as_type(), message.as_type()])
                .inherited()
                .optional()
        });
        if receive.is_none() {
            debug!("🔍 Host has no direct receive method; injecting inbound messages is unavailable");
        }

        Ok(Wiring {
            server_connection: server_connection_object,
            list_field,
            original_list,
            channel_field,
            queue_field,
            message,
            primitives: HostPrimitives {
                send,
                listener_class: listener.name().into(),
                receive,
            },
        })
    }

    /// Name of the handler inserted into every hooked chain.
    pub fn handler_name(&self) -> &str {
        &self.shared.handler_name
    }

    /// Registers a modifier for every connection. Returns false if it was
    /// already registered.
    pub fn register(&self, modifier: Arc<dyn PacketModifier>, priority: Priority) -> bool {
        self.shared.registry.register(modifier, priority)
    }

    pub fn unregister(&self, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.shared.registry.unregister(modifier)
    }

    pub fn is_registered(&self, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.shared.registry.global().contains(modifier)
    }

    /// Registers a modifier for one identity. It applies to every connection
    /// that authenticates as `identity`, including future reconnects.
    pub fn register_for(&self, identity: Uuid, modifier: Arc<dyn PacketModifier>, priority: Priority) -> bool {
        self.shared.registry.register_for(identity, modifier, priority)
    }

    pub fn unregister_for(&self, identity: &Uuid, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.shared.registry.unregister_for(identity, modifier)
    }

    pub fn is_registered_for(&self, identity: &Uuid, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.shared.registry.is_registered_for(identity, modifier)
    }

    /// The open connection authenticated as `identity`. Closed connections
    /// are pruned on lookup.
    ///
    /// Identities are learned from the login message only, so a connection
    /// that authenticated before installation is unknown here until the
    /// embedder hands it over through [`attach`](Self::attach).
    pub fn receiver_for(&self, identity: &Uuid) -> Option<Arc<InterceptedConnection>> {
        let connection = self.shared.receivers.get(identity).map(|c| c.clone())?;
        if connection.is_open() {
            return Some(connection);
        }
        self.shared
            .receivers
            .remove_if(identity, |_, c| Arc::ptr_eq(c, &connection));
        None
    }

    /// Hooks the host connection object `connection` on demand and binds it
    /// to `identity`.
    ///
    /// For connections whose identity the embedder already knows from the
    /// host, such as players online before installation. A pending queue
    /// observer is taken out first; a connection that is already hooked is
    /// reused.
    ///
    /// # Errors
    ///
    /// [`InterceptError::Closed`] after [`shutdown`](Self::shutdown), or a
    /// wiring error if `connection` is not a host connection.
    pub fn attach(&self, identity: Uuid, connection: &Value) -> Result<Arc<InterceptedConnection>> {
        let shared = &self.shared;
        let connection = object(connection.clone(), "connection")?;
        let _guard = shared.hook_lock.lock();
        if shared.closed.load(Ordering::Acquire) {
            return Err(InterceptError::Closed);
        }
        if let Some((_, pending)) = shared.pending.remove(&connection.id()) {
            shared.restore_queue(&pending);
        }
        shared.hook(&connection)?;
        let intercepted = shared
            .hooked
            .get(&connection.id())
            .map(|c| c.clone())
            .ok_or_else(|| InterceptError::shape("connection", format!("{connection:?} was not hooked")))?;
        intercepted.bind_identity(identity);
        shared.bind_receiver(identity, &intercepted);
        Ok(intercepted)
    }

    /// Forgets the receiver of `identity`, typically when the host reports
    /// that the identity quit. Identity-scoped modifiers stay registered, and
    /// so does the remembered protocol version, which a reconnect inherits.
    pub fn release(&self, identity: &Uuid) -> Option<Arc<InterceptedConnection>> {
        self.shared.receivers.remove(identity).map(|(_, c)| c)
    }

    /// Last protocol version seen for `identity`, across reconnects.
    pub fn protocol_version(&self, identity: &Uuid) -> Option<i64> {
        self.shared.protocol_versions.get(identity).map(|v| *v)
    }

    /// Every connection currently hooked.
    pub fn connections(&self) -> Vec<Arc<InterceptedConnection>> {
        self.shared.hooked.iter().map(|e| e.value().clone()).collect()
    }

    /// Connections still waiting for their first queue drain.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Restores the connection list and any observed queues, removes the
    /// handler from every hooked chain and clears all registrations.
    /// Idempotent.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = shared.hook_lock.lock();

        if let Err(e) = shared
            .wiring
            .list_field
            .set(&shared.wiring.server_connection, shared.wiring.original_list.clone())
        {
            warn!("⚠️ Failed to restore connection list: {}", e);
        }

        let pending: Vec<PendingObserver> = shared.pending.iter().map(|e| e.value().clone()).collect();
        shared.pending.clear();
        for observer in &pending {
            shared.restore_queue(observer);
        }

        let hooked = shared.hooked.len();
        for entry in shared.hooked.iter() {
            entry.value().channel().remove(&shared.handler_name);
        }
        shared.hooked.clear();
        shared.receivers.clear();
        shared.registry.clear();

        info!(
            "🔌 Packet interceptor '{}' removed ({} handlers, {} observers)",
            shared.handler_name,
            hooked,
            pending.len()
        );
    }
}

impl Drop for PacketInterceptor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PacketInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketInterceptor")
            .field("handler", &self.shared.handler_name)
            .field("hooked", &self.shared.hooked.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn object(value: Value, what: &str) -> Result<ObjectRef> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(InterceptError::shape(what, format!("expected an object, found {other:?}"))),
    }
}
