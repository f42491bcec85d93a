use crate::host::Channel;
use crate::loopback::{packets, LoopbackClient, LoopbackOptions, LoopbackServer, TERMINAL_HANDLER};
use crate::{
    FnModifier, InterceptError, InterceptorSettings, PacketInterceptor, PacketModifier, PipelineHandler, Priority,
    Verdict,
};
use hostlink_reflect::host::{ObjectRef, Value};
use hostlink_reflect::{ClassCatalog, HostVersion, ReflectError, ReflectionContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const HANDLER: &str = "pi_hostlink";

fn version() -> HostVersion {
    HostVersion::new(1, 12, 2)
}

fn install(server: &LoopbackServer, settings: InterceptorSettings) -> PacketInterceptor {
    PacketInterceptor::new(server.context(), &server.server(), settings).unwrap()
}

fn setup() -> (LoopbackServer, PacketInterceptor) {
    let server = LoopbackServer::new(version()).unwrap();
    let interceptor = install(&server, InterceptorSettings::default());
    (server, interceptor)
}

/// Connects and runs one tick so the host finishes wiring the connection.
fn hooked_client(server: &LoopbackServer) -> LoopbackClient {
    let client = server.connect().unwrap();
    server.tick().unwrap();
    client
}

fn chat_out(server: &LoopbackServer, text: &str) -> ObjectRef {
    server.packet(packets::CHAT_OUT, &[("a", Value::from(text))]).unwrap()
}

fn chat_in(server: &LoopbackServer, text: &str) -> ObjectRef {
    server.packet(packets::CHAT_IN, &[("a", Value::from(text))]).unwrap()
}

fn count_of(client: &LoopbackClient, name: &str) -> usize {
    client.channel.handler_names().iter().filter(|n| n.as_str() == name).count()
}

fn recorder(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn PacketModifier> {
    Arc::new(FnModifier::new(name).on_outbound(move |_, msg| {
        log.lock().push(name);
        Ok(Verdict::Forward(msg))
    }))
}

fn inbound_recorder(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn PacketModifier> {
    Arc::new(FnModifier::new(name).on_inbound(move |_, _, msg| {
        log.lock().push(name);
        Ok(Verdict::Forward(msg))
    }))
}

struct Stale;

impl PipelineHandler for Stale {}

#[test_log::test]
fn new_connection_is_hooked_on_first_drain() {
    let (server, interceptor) = setup();
    let client = server.connect().unwrap();
    assert!(!client.channel.contains(HANDLER));
    assert_eq!(interceptor.pending_count(), 1);
    let observed = server.queue_of(&client).unwrap();

    server.tick().unwrap();
    assert_eq!(
        client.channel.handler_names(),
        ["decoder", "encoder", HANDLER, TERMINAL_HANDLER]
    );
    assert_ne!(server.queue_of(&client).unwrap(), observed);
    assert_eq!(interceptor.pending_count(), 0);

    server.tick().unwrap();
    assert_eq!(count_of(&client, HANDLER), 1);
    assert_eq!(interceptor.connections().len(), 1);
}

#[test_log::test]
fn ready_connections_are_hooked_at_install() {
    let server = LoopbackServer::new(version()).unwrap();
    let early = hooked_client(&server);
    early.channel.add_last("pi_hostlink", Arc::new(Stale));

    let interceptor = install(&server, InterceptorSettings::default());
    assert_eq!(interceptor.connections().len(), 1);
    assert_eq!(interceptor.pending_count(), 0);
    assert_eq!(count_of(&early, HANDLER), 1);

    // The stale handler was replaced by a live one.
    interceptor.register(
        Arc::new(FnModifier::new("drop").on_outbound(|_, _| Ok(Verdict::Terminate))),
        Priority::Low,
    );
    assert_eq!(early.channel.write(Value::Object(chat_out(&server, "x")), None), None);
}

#[test_log::test]
fn handler_goes_last_without_terminal_handler() {
    let server = LoopbackServer::new(version()).unwrap();
    let settings = InterceptorSettings {
        terminal_handler: "netty_tail".into(),
        ..InterceptorSettings::for_plugin("Chat Guard")
    };
    let _interceptor = install(&server, settings);
    let client = hooked_client(&server);
    assert_eq!(client.channel.handler_names().last().map(String::as_str), Some("pi_chat_guard"));
}

#[test_log::test]
fn global_chain_runs_in_priority_order() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let log = Arc::new(Mutex::new(Vec::new()));
    let identity = Uuid::new_v4();

    interceptor.register(recorder("a", log.clone()), Priority::Low);
    interceptor.register(recorder("b", log.clone()), Priority::High);
    interceptor.register(recorder("c", log.clone()), Priority::Low);
    interceptor.register_for(identity, recorder("mine", log.clone()), Priority::High);

    client.channel.write(Value::Object(chat_out(&server, "hi")), None);
    assert_eq!(*log.lock(), ["b", "a", "c"]);

    log.lock().clear();
    server.login(&client, identity, "alice").unwrap();
    client.channel.write(Value::Object(chat_out(&server, "hi")), None);
    // The login itself already runs the identity chain.
    assert_eq!(*log.lock(), ["b", "a", "c", "mine", "b", "a", "c", "mine"]);
}

#[test_log::test]
fn inbound_replacement_reaches_the_host() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let replacement = chat_in(&server, "[redacted]");
    let swap = replacement.clone();
    interceptor.register(
        Arc::new(FnModifier::new("redact").on_inbound(move |_, _, _| Ok(Verdict::Forward(swap.clone())))),
        Priority::Low,
    );

    client.channel.receive(Value::Object(chat_in(&server, "secret")));
    assert_eq!(server.tick().unwrap(), vec![Value::Object(replacement)]);
}

#[test_log::test]
fn failing_modifiers_do_not_break_the_connection() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    interceptor.register(
        Arc::new(FnModifier::new("errors").on_inbound(|_, _, _| anyhow::bail!("bad state"))),
        Priority::High,
    );
    interceptor.register(
        Arc::new(FnModifier::new("panics").on_inbound(|_, _, _| panic!("modifier bug"))),
        Priority::Low,
    );

    let message = chat_in(&server, "still here");
    client.channel.receive(Value::Object(message.clone()));
    assert_eq!(server.tick().unwrap(), vec![Value::Object(message)]);
}

#[test_log::test]
fn failing_inbound_modifier_does_not_skip_later_ones() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let log = Arc::new(Mutex::new(Vec::new()));
    interceptor.register(inbound_recorder("first", log.clone()), Priority::High);
    interceptor.register(
        Arc::new(FnModifier::new("errors").on_inbound(|_, _, _| anyhow::bail!("bad state"))),
        Priority::Low,
    );
    interceptor.register(inbound_recorder("third", log.clone()), Priority::Low);

    let message = chat_in(&server, "hello");
    client.channel.receive(Value::Object(message.clone()));
    assert_eq!(*log.lock(), ["first", "third"]);
    assert_eq!(server.tick().unwrap(), vec![Value::Object(message)]);
}

#[test_log::test]
fn modifiers_can_register_while_handling_a_message() {
    let (server, interceptor) = setup();
    let interceptor = Arc::new(interceptor);
    let client = hooked_client(&server);
    let log = Arc::new(Mutex::new(Vec::new()));
    let late = recorder("late", log.clone());

    let registrar = Arc::downgrade(&interceptor);
    let installed = late.clone();
    interceptor.register(
        Arc::new(FnModifier::new("installer").on_outbound(move |_, msg| {
            if let Some(interceptor) = registrar.upgrade() {
                interceptor.register(installed.clone(), Priority::High);
            }
            Ok(Verdict::Forward(msg))
        })),
        Priority::Low,
    );

    // The running message keeps the chain it started with.
    client.channel.write(Value::Object(chat_out(&server, "first")), None);
    assert!(log.lock().is_empty());
    assert!(interceptor.is_registered(&late));

    client.channel.write(Value::Object(chat_out(&server, "second")), None);
    assert_eq!(*log.lock(), ["late"]);
}

#[test_log::test]
fn non_messages_bypass_modifiers_when_filtered() {
    let server = LoopbackServer::new(version()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counting = |hits: Arc<AtomicUsize>| -> Arc<dyn PacketModifier> {
        Arc::new(FnModifier::new("count").on_outbound(move |_, msg| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Forward(msg))
        }))
    };
    let raw = Value::Object(ObjectRef::new("io.netty.buffer.ByteBuf", ()));

    let filtered = install(&server, InterceptorSettings::default());
    filtered.register(counting(hits.clone()), Priority::Low);
    let client = hooked_client(&server);
    assert_eq!(client.channel.write(Value::Int(5), None), Some(Value::Int(5)));
    assert_eq!(client.channel.write(raw.clone(), None), Some(raw.clone()));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    drop(filtered);

    let unfiltered = install(
        &server,
        InterceptorSettings {
            filter_non_messages: false,
            ..InterceptorSettings::default()
        },
    );
    unfiltered.register(counting(hits.clone()), Priority::Low);
    assert_eq!(client.channel.write(raw.clone(), None), Some(raw));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn login_binds_identity_and_receiver() {
    let (server, interceptor) = setup();
    let alice = hooked_client(&server);
    let bob = hooked_client(&server);
    let id = Uuid::new_v4();

    server.handshake(&alice, 340).unwrap();
    server.login(&alice, id, "alice").unwrap();

    let receiver = interceptor.receiver_for(&id).unwrap();
    assert_eq!(receiver.id(), alice.id());
    assert_eq!(receiver.identity(), Some(id));
    assert_eq!(receiver.protocol_version(), Some(340));
    assert_eq!(interceptor.protocol_version(&id), Some(340));

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let scoped: Arc<dyn PacketModifier> = Arc::new(FnModifier::new("scoped").on_outbound(move |who, msg| {
        if who == Some(id) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Verdict::Forward(msg))
    }));
    interceptor.register_for(id, scoped.clone(), Priority::Low);
    alice.channel.write(Value::Object(chat_out(&server, "a")), None);
    bob.channel.write(Value::Object(chat_out(&server, "b")), None);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(interceptor.is_registered_for(&id, &scoped));
    assert!(!interceptor.is_registered(&scoped));
}

#[test_log::test]
fn reconnect_keeps_version_and_scoped_modifiers() {
    let (server, interceptor) = setup();
    let id = Uuid::new_v4();
    let first = hooked_client(&server);
    server.handshake(&first, 47).unwrap();
    server.login(&first, id, "steve").unwrap();
    let scoped: Arc<dyn PacketModifier> = Arc::new(FnModifier::new("scoped"));
    interceptor.register_for(id, scoped.clone(), Priority::High);

    assert!(server.disconnect(&first).unwrap());
    assert!(interceptor.receiver_for(&id).is_none());
    assert!(interceptor.connections().is_empty());

    let second = hooked_client(&server);
    server.login(&second, id, "steve").unwrap();
    let receiver = interceptor.receiver_for(&id).unwrap();
    assert_eq!(receiver.id(), second.id());
    assert_eq!(receiver.protocol_version(), Some(47));
    assert!(interceptor.is_registered_for(&id, &scoped));

    assert!(interceptor.release(&id).is_some());
    assert!(interceptor.receiver_for(&id).is_none());
    assert!(interceptor.is_registered_for(&id, &scoped));
}

#[test_log::test]
fn open_window_tracks_window_id() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let id = Uuid::new_v4();
    server.login(&client, id, "alex").unwrap();
    let window = server
        .packet(packets::OPEN_WINDOW, &[("a", Value::Int(3)), ("c", Value::Int(27))])
        .unwrap();
    client.channel.write(Value::Object(window), None);
    assert_eq!(interceptor.receiver_for(&id).unwrap().window_id(), Some(3));
}

#[test_log::test]
fn hosts_without_protocol_packets_still_bind_identities() {
    let server = LoopbackServer::with_options(
        version(),
        LoopbackOptions {
            protocol_packets: false,
            ..LoopbackOptions::default()
        },
    )
    .unwrap();
    let interceptor = install(&server, InterceptorSettings::default());
    let client = hooked_client(&server);
    let id = Uuid::new_v4();
    server.login(&client, id, "legacy").unwrap();

    let receiver = interceptor.receiver_for(&id).unwrap();
    assert_eq!(receiver.protocol_version(), None);
    assert_eq!(receiver.window_id(), None);
}

#[test_log::test]
fn erased_list_generics_fall_back_to_position() {
    let server = LoopbackServer::with_options(
        version(),
        LoopbackOptions {
            erased_generics: true,
            ..LoopbackOptions::default()
        },
    )
    .unwrap();
    let _interceptor = install(&server, InterceptorSettings::default());
    let client = hooked_client(&server);
    assert!(client.channel.contains(HANDLER));
}

#[test_log::test]
fn send_all_completes_once_after_every_write() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();
    client.channel.defer_completions(true);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let messages = (0..3).map(|i| chat_out(&server, &format!("line {i}"))).collect();
    connection
        .send_all(messages, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(client.channel.written().len(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(client.channel.complete_deferred(), 3);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn failed_send_all_completes_after_started_writes() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();
    client.channel.defer_completions(true);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let batch = vec![
        chat_out(&server, "sent"),
        ObjectRef::new("io.netty.buffer.ByteBuf", ()),
        chat_out(&server, "never sent"),
    ];
    let result = connection.send_all(batch, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(matches!(result, Err(InterceptError::Reflect(_))));
    assert_eq!(client.channel.written().len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    assert_eq!(client.channel.complete_deferred(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Nothing started: completes right away.
    let counter = hits.clone();
    let result = connection.send_all(vec![ObjectRef::new("io.netty.buffer.ByteBuf", ())], move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(result.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test_log::test]
fn send_on_closed_connection_completes_immediately() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();
    client.channel.close();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    connection
        .send(chat_out(&server, "late"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(client.channel.written().is_empty());

    let counter = hits.clone();
    connection
        .send_all(Vec::new(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test_log::test]
fn receive_injects_behind_the_modifiers() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    interceptor.register(
        Arc::new(FnModifier::new("count").on_inbound(move |_, _, msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Forward(msg))
        })),
        Priority::Low,
    );

    let done = Arc::new(AtomicUsize::new(0));
    let marker = done.clone();
    let injected = chat_in(&server, "typed by the plugin");
    connection
        .receive(injected.clone(), move || {
            marker.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(server.tick().unwrap(), vec![Value::Object(injected)]);

    client.channel.close();
    let marker = done.clone();
    connection
        .receive(chat_in(&server, "too late"), move || {
            marker.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 2);
    assert!(server.tick().unwrap().is_empty());
}

#[test_log::test]
fn receive_needs_a_direct_receive_method() {
    let server = LoopbackServer::with_options(
        version(),
        LoopbackOptions {
            direct_receive: false,
            ..LoopbackOptions::default()
        },
    )
    .unwrap();
    let interceptor = install(&server, InterceptorSettings::default());
    hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();

    let result = connection.receive(chat_in(&server, "hi"), || {});
    assert!(matches!(result, Err(InterceptError::Unsupported("receive"))));
    assert!(server.tick().unwrap().is_empty());
}

#[test_log::test]
fn attach_adopts_a_known_connection_on_demand() {
    let (server, interceptor) = setup();
    let id = Uuid::new_v4();
    let first = hooked_client(&server);
    server.handshake(&first, 340).unwrap();
    server.login(&first, id, "alex").unwrap();
    interceptor.release(&id);
    assert!(interceptor.receiver_for(&id).is_none());

    let waiting = server.connect().unwrap();
    assert_eq!(interceptor.pending_count(), 1);
    let receiver = interceptor
        .attach(id, &Value::Object(waiting.connection.clone()))
        .unwrap();
    assert_eq!(interceptor.pending_count(), 0);
    assert!(waiting.channel.contains(HANDLER));
    assert_eq!(receiver.id(), waiting.id());
    assert_eq!(receiver.identity(), Some(id));
    assert_eq!(receiver.protocol_version(), Some(340));
    assert!(Arc::ptr_eq(&interceptor.receiver_for(&id).unwrap(), &receiver));

    // Already hooked connections are reused, not hooked twice.
    let again = interceptor.attach(id, &Value::Object(first.connection.clone())).unwrap();
    assert_eq!(again.id(), first.id());
    assert_eq!(count_of(&first, HANDLER), 1);

    assert!(matches!(
        interceptor.attach(id, &Value::Null),
        Err(InterceptError::HostShape { .. })
    ));
    interceptor.shutdown();
    assert!(matches!(
        interceptor.attach(id, &Value::Object(waiting.connection.clone())),
        Err(InterceptError::Closed)
    ));
}

#[tokio::test]
async fn flush_waits_for_completion() {
    let (server, interceptor) = setup();
    let client = hooked_client(&server);
    let connection = interceptor.connections().pop().unwrap();

    let batch = vec![chat_out(&server, "one"), chat_out(&server, "two")];
    connection.flush(batch).await.unwrap();
    assert_eq!(client.channel.written().len(), 2);

    // Dropped writes still complete.
    interceptor.register(
        Arc::new(FnModifier::new("drop").on_outbound(|_, _| Ok(Verdict::Terminate))),
        Priority::High,
    );
    connection.flush(vec![chat_out(&server, "three")]).await.unwrap();
    assert_eq!(client.channel.written().len(), 2);
}

#[test_log::test]
fn shutdown_restores_the_host() {
    let server = LoopbackServer::new(version()).unwrap();
    let original_list = server.connection_list().unwrap();
    let interceptor = install(&server, InterceptorSettings::default());
    assert_ne!(server.connection_list().unwrap(), original_list);

    let hooked = hooked_client(&server);
    let pending = server.connect().unwrap();
    let observer = server.queue_of(&pending).unwrap();
    let modifier: Arc<dyn PacketModifier> = Arc::new(FnModifier::new("noop"));
    interceptor.register(modifier.clone(), Priority::Low);

    interceptor.shutdown();
    assert!(interceptor.is_closed());
    assert_eq!(server.connection_list().unwrap(), original_list);
    assert!(!hooked.channel.contains(HANDLER));
    assert_ne!(server.queue_of(&pending).unwrap(), observer);
    assert!(!interceptor.is_registered(&modifier));
    assert!(interceptor.connections().is_empty());

    server.tick().unwrap();
    assert!(!pending.channel.contains(HANDLER));
    interceptor.shutdown();
}

#[test_log::test]
fn dropping_the_interceptor_unhooks_everything() {
    let server = LoopbackServer::new(version()).unwrap();
    let original_list = server.connection_list().unwrap();
    let interceptor = install(&server, InterceptorSettings::default());
    let client = hooked_client(&server);
    assert!(client.channel.contains(HANDLER));

    drop(interceptor);
    assert_eq!(server.connection_list().unwrap(), original_list);
    assert!(!client.channel.contains(HANDLER));
    let late = hooked_client(&server);
    assert!(!late.channel.contains(HANDLER));
}

#[test]
fn wiring_rejects_a_foreign_server() {
    let server = LoopbackServer::new(version()).unwrap();
    let result = PacketInterceptor::new(server.context(), &Value::Null, InterceptorSettings::default());
    assert!(matches!(result, Err(InterceptError::HostShape { .. })));

    let bare = ReflectionContext::new(server.host().clone(), ClassCatalog::new(), version());
    let result = PacketInterceptor::new(bare, &server.server(), InterceptorSettings::default());
    assert!(matches!(
        result,
        Err(InterceptError::Reflect(ReflectError::ClassNotFound { .. }))
    ));
}
