//! An in-memory server with the layout of a versioned game host.
//!
//! Built on [`MemoryHost`], it models just enough of the host's network layer
//! for the interceptor to wire itself in: an outer server object, the game
//! server and its server connection, a connection list, and per-connection
//! channels with ordered handler chains and inbound queues. Useful for
//! embedder tests and demos as much as for this crate's own tests.

use crate::host::{
    as_list, as_listener, as_queue, wrap_channel, wrap_list, wrap_queue, Channel, CompletionListener,
    ConnectionList, Flow, MessageQueue, PipelineHandler,
};
use crate::ids;
use dashmap::DashMap;
use hostlink_reflect::host::{
    is_subclass, ClassInfo, HostError, HostRuntime, HostType, MemoryHost, Modifiers, ObjectRef, Primitive, Value,
};
use hostlink_reflect::{ClassCatalog, HostVersion, ReflectionContext};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Name of the host's own protocol handler in every channel.
pub const TERMINAL_HANDLER: &str = "packet_handler";

const LIST: &str = "java.util.List";
const ARRAY_LIST: &str = "java.util.ArrayList";
const QUEUE: &str = "java.util.Queue";
const LINKED_QUEUE: &str = "java.util.concurrent.ConcurrentLinkedQueue";
const UUID: &str = "java.util.UUID";
const STRING: &str = "java.lang.String";
const CHANNEL: &str = "io.netty.channel.Channel";
const CHANNEL_FUTURE: &str = "io.netty.channel.ChannelFuture";
const LISTENER: &str = "io.netty.util.concurrent.GenericFutureListener";
const CONTEXT: &str = "io.netty.channel.ChannelHandlerContext";

/// Server-side packet names used by [`LoopbackServer::packet`].
pub mod packets {
    pub const LOGIN_SUCCESS: &str = "PacketLoginOutSuccess";
    pub const HANDSHAKE: &str = "PacketHandshakingInSetProtocol";
    pub const OPEN_WINDOW: &str = "PacketPlayOutOpenWindow";
    pub const CHAT_OUT: &str = "PacketPlayOutChat";
    pub const CHAT_IN: &str = "PacketPlayInChat";
}

/// A channel whose handler chain runs synchronously on the caller's thread.
pub struct MemoryChannel {
    id: u64,
    open: AtomicBool,
    handlers: RwLock<Vec<(String, Arc<dyn PipelineHandler>)>>,
    written: Mutex<Vec<Value>>,
    defer: AtomicBool,
    deferred: Mutex<Vec<Arc<CompletionListener>>>,
}

impl MemoryChannel {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            open: AtomicBool::new(true),
            handlers: RwLock::new(Vec::new()),
            written: Mutex::new(Vec::new()),
            defer: AtomicBool::new(false),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Runs `message` through the chain from the first handler to the last.
    /// Returns the message that left the last handler, or `None` if a
    /// handler consumed or dropped it.
    pub fn receive(&self, message: Value) -> Option<Value> {
        let handlers = self.handlers.read().clone();
        let mut current = message;
        for (name, handler) in &handlers {
            match handler.inbound(current) {
                Flow::Continue(next) => current = next,
                Flow::Stop => {
                    trace!(channel = self.id, handler = %name, "inbound message stopped");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Runs `message` through the chain from the last handler to the first
    /// and records whatever reaches the transport. The listener completes
    /// whether or not the message was dropped on the way.
    pub fn write(&self, message: Value, listener: Option<Arc<CompletionListener>>) -> Option<Value> {
        if !self.is_open() {
            self.complete(listener);
            return None;
        }
        let handlers = self.handlers.read().clone();
        let mut current = message;
        for (name, handler) in handlers.iter().rev() {
            match handler.outbound(current) {
                Flow::Continue(next) => current = next,
                Flow::Stop => {
                    trace!(channel = self.id, handler = %name, "outbound message stopped");
                    self.complete(listener);
                    return None;
                }
            }
        }
        self.written.lock().push(current.clone());
        self.complete(listener);
        Some(current)
    }

    fn complete(&self, listener: Option<Arc<CompletionListener>>) {
        let Some(listener) = listener else {
            return;
        };
        if self.defer.load(Ordering::Acquire) {
            self.deferred.lock().push(listener);
        } else {
            listener.fire();
        }
    }

    /// Holds write completions back until [`complete_deferred`](Self::complete_deferred).
    pub fn defer_completions(&self, defer: bool) {
        self.defer.store(defer, Ordering::Release);
    }

    /// Fires held completions, newest first.
    pub fn complete_deferred(&self) -> usize {
        let pending: Vec<_> = self.deferred.lock().drain(..).collect();
        let count = pending.len();
        for listener in pending.into_iter().rev() {
            listener.fire();
        }
        count
    }

    /// Messages that reached the transport, oldest first.
    pub fn written(&self) -> Vec<Value> {
        self.written.lock().clone()
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Channel for MemoryChannel {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn handler_names(&self) -> Vec<String> {
        self.handlers.read().iter().map(|(n, _)| n.clone()).collect()
    }

    fn add_before(&self, anchor: &str, name: &str, handler: Arc<dyn PipelineHandler>) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.iter().position(|(n, _)| n == anchor) {
            Some(index) => {
                handlers.insert(index, (name.to_string(), handler));
                true
            }
            None => false,
        }
    }

    fn add_last(&self, name: &str, handler: Arc<dyn PipelineHandler>) {
        self.handlers.write().push((name.to_string(), handler));
    }

    fn remove(&self, name: &str) -> Option<Arc<dyn PipelineHandler>> {
        let mut handlers = self.handlers.write();
        let index = handlers.iter().position(|(n, _)| n == name)?;
        Some(handlers.remove(index).1)
    }
}

#[derive(Default)]
pub struct MemoryConnectionList {
    items: RwLock<Vec<Value>>,
}

impl ConnectionList for MemoryConnectionList {
    fn add(&self, connection: Value) {
        self.items.write().push(connection);
    }

    fn remove(&self, connection: &Value) -> bool {
        let mut items = self.items.write();
        match items.iter().position(|c| c == connection) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<Value>>,
}

impl MessageQueue for MemoryQueue {
    fn push(&self, message: Value) {
        self.items.lock().push_back(message);
    }

    fn drain(&self) -> Vec<Value> {
        self.items.lock().drain(..).collect()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// The host's protocol handler: hands inbound messages to whatever queue
/// the connection's queue field currently holds.
struct TerminalHandler {
    host: Weak<MemoryHost>,
    connection: ObjectRef,
}

impl PipelineHandler for TerminalHandler {
    fn inbound(&self, message: Value) -> Flow {
        let queue = self
            .host
            .upgrade()
            .and_then(|host| host.peek(&self.connection, "receivedQueue").ok())
            .and_then(|value| as_queue(&value));
        match queue {
            Some(queue) => {
                queue.push(message);
                Flow::Stop
            }
            None => Flow::Continue(message),
        }
    }
}

/// Layout variations of the loopback host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackOptions {
    /// Declare the connection list fields without element types.
    pub erased_generics: bool,
    /// Define the handshake and open-window packets.
    pub protocol_packets: bool,
    /// Give connections a method that takes decoded inbound messages
    /// directly.
    pub direct_receive: bool,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            erased_generics: false,
            protocol_packets: true,
            direct_receive: true,
        }
    }
}

/// One client connection of the loopback server.
#[derive(Clone)]
pub struct LoopbackClient {
    pub connection: ObjectRef,
    pub channel: Arc<MemoryChannel>,
}

impl LoopbackClient {
    pub fn id(&self) -> u64 {
        self.channel.id()
    }
}

/// The in-memory server.
pub struct LoopbackServer {
    host: Arc<MemoryHost>,
    version: HostVersion,
    server: ObjectRef,
    server_connection: ObjectRef,
    channels: Arc<DashMap<usize, Arc<MemoryChannel>>>,
    next_channel: AtomicU64,
}

impl LoopbackServer {
    pub fn new(version: HostVersion) -> Result<Self, HostError> {
        Self::with_options(version, LoopbackOptions::default())
    }

    pub fn with_options(version: HostVersion, options: LoopbackOptions) -> Result<Self, HostError> {
        let host = Arc::new(MemoryHost::new());
        let nms = |simple: &str| format!("net.minecraft.server.{}.{}", version.package_tag(), simple);
        let class = |name: &str| HostType::class(name);
        let list_of = |element: &str| if options.erased_generics { Vec::new() } else { vec![class(element)] };

        for (name, parent) in [(LIST, None), (ARRAY_LIST, Some(LIST)), (QUEUE, None), (LINKED_QUEUE, Some(QUEUE))] {
            let builder = ClassInfo::builder(name).modifiers(Modifiers::public());
            let builder = match parent {
                Some(parent) => builder.implements(parent),
                None => builder,
            };
            host.define(builder.build());
        }
        for name in [UUID, STRING, CHANNEL, CHANNEL_FUTURE, LISTENER, CONTEXT] {
            host.define(ClassInfo::builder(name).modifiers(Modifiers::public()).build());
        }

        host.define(ClassInfo::builder(nms("Packet")).modifiers(Modifiers::public()).build());
        host.define(ClassInfo::builder(nms("QueuedPacket")).build());
        host.define(
            ClassInfo::builder(nms(packets::LOGIN_SUCCESS))
                .implements(nms("Packet"))
                .field("a", class(UUID), Modifiers::private())
                .field("b", class(STRING), Modifiers::private())
                .build(),
        );
        host.define(
            ClassInfo::builder(nms(packets::CHAT_OUT))
                .implements(nms("Packet"))
                .field("a", class(STRING), Modifiers::private())
                .build(),
        );
        host.define(
            ClassInfo::builder(nms(packets::CHAT_IN))
                .implements(nms("Packet"))
                .field("a", class(STRING), Modifiers::private())
                .build(),
        );
        if options.protocol_packets {
            host.define(
                ClassInfo::builder(nms(packets::HANDSHAKE))
                    .implements(nms("Packet"))
                    .field("a", Primitive::Int.into(), Modifiers::private())
                    .field("hostname", class(STRING), Modifiers::public())
                    .field("port", Primitive::Int.into(), Modifiers::public())
                    .build(),
            );
            host.define(
                ClassInfo::builder(nms(packets::OPEN_WINDOW))
                    .implements(nms("Packet"))
                    .field("a", Primitive::Int.into(), Modifiers::private())
                    .field("b", class(STRING), Modifiers::private())
                    .field("c", Primitive::Int.into(), Modifiers::private())
                    .build(),
            );
        }

        let network_manager = ClassInfo::builder(nms("NetworkManager"))
            .modifiers(Modifiers::public())
            .field("channel", class(CHANNEL), Modifiers::public())
            .generic_field("sendQueue", class(QUEUE), vec![class(&nms("QueuedPacket"))], Modifiers::private())
            .generic_field("receivedQueue", class(QUEUE), vec![class(&nms("Packet"))], Modifiers::private())
            .method("sendPacket", HostType::Void, vec![class(&nms("Packet"))], Modifiers::public())
            .method(
                "sendPacket",
                HostType::Void,
                vec![class(&nms("Packet")), class(LISTENER)],
                Modifiers::public(),
            );
        let network_manager = if options.direct_receive {
            network_manager.method(
                "channelRead0",
                HostType::Void,
                vec![class(CONTEXT), class(&nms("Packet"))],
                Modifiers::private(),
            )
        } else {
            network_manager
        };
        host.define(network_manager.build());
        host.define(
            ClassInfo::builder(nms("ServerConnection"))
                .generic_field("listeningChannels", class(LIST), list_of(CHANNEL_FUTURE), Modifiers::private())
                .generic_field("connections", class(LIST), list_of(&nms("NetworkManager")), Modifiers::private())
                .build(),
        );
        host.define(
            ClassInfo::builder(nms("MinecraftServer"))
                .field("serverConnection", class(&nms("ServerConnection")), Modifiers::private())
                .build(),
        );
        host.define(ClassInfo::builder(nms("DedicatedServer")).extends(nms("MinecraftServer")).build());
        host.define(
            ClassInfo::builder(format!("org.bukkit.craftbukkit.{}.CraftServer", version.package_tag()))
                .modifiers(Modifiers::public())
                .field("console", class(&nms("DedicatedServer")), Modifiers::private().with_final())
                .build(),
        );

        let channels: Arc<DashMap<usize, Arc<MemoryChannel>>> = Arc::new(DashMap::new());
        let network_manager = nms("NetworkManager");
        let packet_class = nms("Packet");
        for arity in [1, 2] {
            let channels = channels.clone();
            let packet_class = packet_class.clone();
            host.implement(&network_manager, "sendPacket", arity, move |host, target, args| {
                let target = target.ok_or_else(|| HostError::Invocation("sendPacket without receiver".into()))?;
                if !args[0]
                    .as_object()
                    .is_some_and(|m| is_subclass(host, m.class_name(), &packet_class))
                {
                    return Err(HostError::BadArgument {
                        member: "sendPacket".into(),
                        reason: format!("{:?} is not a packet", args[0]),
                    });
                }
                let channel = channels
                    .get(&target.id())
                    .map(|c| c.clone())
                    .ok_or_else(|| HostError::Invocation(format!("{target:?} has no channel")))?;
                let listener = args.get(1).and_then(as_listener);
                channel.write(args[0].clone(), listener);
                Ok(Value::Null)
            })?;
        }
        if options.direct_receive {
            host.implement(&network_manager, "channelRead0", 2, |host, target, args| {
                let target = target.ok_or_else(|| HostError::Invocation("channelRead0 without receiver".into()))?;
                let queue = as_queue(&host.peek(target, "receivedQueue")?)
                    .ok_or_else(|| HostError::Invocation(format!("{target:?} has no inbound queue")))?;
                queue.push(args[1].clone());
                Ok(Value::Null)
            })?;
        }

        let server_connection = host.instantiate(&nms("ServerConnection"))?;
        host.poke(
            &server_connection,
            "listeningChannels",
            wrap_list(ARRAY_LIST, Arc::new(MemoryConnectionList::default())),
        )?;
        host.poke(
            &server_connection,
            "connections",
            wrap_list(ARRAY_LIST, Arc::new(MemoryConnectionList::default())),
        )?;
        let console = host.instantiate(&nms("DedicatedServer"))?;
        host.poke(&console, "serverConnection", Value::Object(server_connection.clone()))?;
        let server = host.instantiate(&format!("org.bukkit.craftbukkit.{}.CraftServer", version.package_tag()))?;
        host.poke(&server, "console", Value::Object(console))?;

        Ok(Self {
            host,
            version,
            server,
            server_connection,
            channels,
            next_channel: AtomicU64::new(1),
        })
    }

    /// Catalog entries for every id the interceptor resolves.
    pub fn catalog() -> ClassCatalog {
        let nms = |simple: &str| format!("net.minecraft.server.{{v}}.{simple}");
        ClassCatalog::new()
            .with(ids::SERVER, ["org.bukkit.craftbukkit.{v}.CraftServer".to_string()])
            .with(ids::GAME_SERVER, [nms("MinecraftServer")])
            .with(ids::SERVER_CONNECTION, [nms("ServerConnection")])
            .with(ids::CONNECTION, [nms("NetworkManager")])
            .with(ids::CHANNEL, [CHANNEL.to_string()])
            .with(ids::MESSAGE, [nms("Packet")])
            .with(ids::MESSAGE_QUEUE, [QUEUE.to_string()])
            .with(ids::CONNECTION_LIST, [LIST.to_string()])
            .with(ids::COMPLETION_LISTENER, [LISTENER.to_string()])
            .with(ids::LOGIN_SUCCESS, [nms(packets::LOGIN_SUCCESS)])
            .with(ids::IDENTITY, [UUID.to_string()])
            .with(ids::HANDSHAKE, [nms(packets::HANDSHAKE)])
            .with(ids::OPEN_WINDOW, [nms(packets::OPEN_WINDOW)])
            .with(ids::HANDLER_CONTEXT, [CONTEXT.to_string()])
    }

    /// A reflection context over this server's host.
    pub fn context(&self) -> ReflectionContext {
        let runtime: Arc<dyn HostRuntime> = self.host.clone();
        ReflectionContext::new(runtime, Self::catalog(), self.version)
    }

    pub fn host(&self) -> &Arc<MemoryHost> {
        &self.host
    }

    /// The outer server object handed to the interceptor.
    pub fn server(&self) -> Value {
        Value::Object(self.server.clone())
    }

    /// Whatever the connection list field currently holds.
    pub fn connection_list(&self) -> Result<Value, HostError> {
        self.host.peek(&self.server_connection, "connections")
    }

    /// Whatever the client's inbound queue field currently holds.
    pub fn queue_of(&self, client: &LoopbackClient) -> Result<Value, HostError> {
        self.host.peek(&client.connection, "receivedQueue")
    }

    /// Accepts a new client. The connection enters the list before its
    /// handler chain is complete, as a real host does.
    pub fn connect(&self) -> Result<LoopbackClient, HostError> {
        let id = self.next_channel.fetch_add(1, Ordering::Relaxed);
        let channel = Arc::new(MemoryChannel::new(id));
        let connection = self.host.instantiate(&self.nms("NetworkManager"))?;
        let as_channel: Arc<dyn Channel> = channel.clone();
        self.host.poke(&connection, "channel", wrap_channel(CHANNEL, as_channel))?;
        self.host
            .poke(&connection, "sendQueue", wrap_queue(LINKED_QUEUE, Arc::new(MemoryQueue::default())))?;
        self.host
            .poke(&connection, "receivedQueue", wrap_queue(LINKED_QUEUE, Arc::new(MemoryQueue::default())))?;
        self.channels.insert(connection.id(), channel.clone());

        self.list()?.add(Value::Object(connection.clone()));

        channel.add_last("decoder", Arc::new(Passthrough));
        channel.add_last("encoder", Arc::new(Passthrough));
        channel.add_last(
            TERMINAL_HANDLER,
            Arc::new(TerminalHandler {
                host: Arc::downgrade(&self.host),
                connection: connection.clone(),
            }),
        );
        Ok(LoopbackClient { connection, channel })
    }

    /// Drains every connection's inbound queue, as the host's main loop
    /// does once per tick.
    pub fn tick(&self) -> Result<Vec<Value>, HostError> {
        let mut received = Vec::new();
        for connection in self.list()?.snapshot() {
            let Some(connection) = connection.as_object() else {
                continue;
            };
            if let Some(queue) = as_queue(&self.host.peek(connection, "receivedQueue")?) {
                received.extend(queue.drain());
            }
        }
        Ok(received)
    }

    /// Closes the client and removes it from the connection list.
    pub fn disconnect(&self, client: &LoopbackClient) -> Result<bool, HostError> {
        client.channel.close();
        self.channels.remove(&client.connection.id());
        Ok(self.list()?.remove(&Value::Object(client.connection.clone())))
    }

    /// Creates a packet of the given simple class name with fields set by name.
    pub fn packet(&self, simple: &str, fields: &[(&str, Value)]) -> Result<ObjectRef, HostError> {
        let packet = self.host.instantiate(&self.nms(simple))?;
        for (name, value) in fields {
            self.host.poke(&packet, name, value.clone())?;
        }
        Ok(packet)
    }

    /// Sends the login success packet that authenticates `client`.
    pub fn login(&self, client: &LoopbackClient, identity: uuid::Uuid, name: &str) -> Result<Option<Value>, HostError> {
        let packet = self.packet(
            packets::LOGIN_SUCCESS,
            &[("a", Value::Uuid(identity)), ("b", Value::from(name))],
        )?;
        Ok(client.channel.write(Value::Object(packet), None))
    }

    /// Delivers the client's handshake.
    pub fn handshake(&self, client: &LoopbackClient, protocol: i64) -> Result<Option<Value>, HostError> {
        let packet = self.packet(
            packets::HANDSHAKE,
            &[("a", Value::Int(protocol)), ("port", Value::Int(25565))],
        )?;
        Ok(client.channel.receive(Value::Object(packet)))
    }

    fn list(&self) -> Result<Arc<dyn ConnectionList>, HostError> {
        let value = self.connection_list()?;
        as_list(&value).ok_or_else(|| HostError::NotAnInstance {
            expected: LIST.into(),
            found: format!("{value:?}"),
        })
    }

    fn nms(&self, simple: &str) -> String {
        format!("net.minecraft.server.{}.{}", self.version.package_tag(), simple)
    }
}

/// Codec stand-in.
struct Passthrough;

impl PipelineHandler for Passthrough {}
