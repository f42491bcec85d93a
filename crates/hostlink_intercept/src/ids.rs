//! Symbolic ids of the host classes the pipeline resolves.
//!
//! Each id must have an entry in the class catalog handed to the
//! reflection context. Ids marked optional are feature-detected.

/// The host's outer server object handed to the interceptor.
pub const SERVER: &str = "server";
/// The inner game server owning the network layer.
pub const GAME_SERVER: &str = "game_server";
/// Holds the live connection list.
pub const SERVER_CONNECTION: &str = "server_connection";
/// One live connection as the host models it.
pub const CONNECTION: &str = "connection";
pub const CHANNEL: &str = "channel";
/// Base class of every protocol message.
pub const MESSAGE: &str = "message";
pub const MESSAGE_QUEUE: &str = "message_queue";
pub const CONNECTION_LIST: &str = "connection_list";
pub const COMPLETION_LISTENER: &str = "completion_listener";
/// Outbound message that completes authentication.
pub const LOGIN_SUCCESS: &str = "login_success";
/// Type of the identity carried by the login success message.
pub const IDENTITY: &str = "identity";
/// Optional: inbound handshake carrying the client protocol version.
pub const HANDSHAKE: &str = "handshake";
/// Optional: outbound message opening a window.
pub const OPEN_WINDOW: &str = "open_window";
/// Optional: context argument of the connection's direct receive method.
pub const HANDLER_CONTEXT: &str = "handler_context";

/// Every id the pipeline may ask for.
pub const ALL: &[&str] = &[
    SERVER,
    GAME_SERVER,
    SERVER_CONNECTION,
    CONNECTION,
    CHANNEL,
    MESSAGE,
    MESSAGE_QUEUE,
    CONNECTION_LIST,
    COMPLETION_LISTENER,
    LOGIN_SUCCESS,
    IDENTITY,
    HANDSHAKE,
    OPEN_WINDOW,
    HANDLER_CONTEXT,
];

/// Ids the pipeline cannot work without.
pub const REQUIRED: &[&str] = &[
    SERVER,
    GAME_SERVER,
    SERVER_CONNECTION,
    CONNECTION,
    CHANNEL,
    MESSAGE,
    MESSAGE_QUEUE,
    CONNECTION_LIST,
    COMPLETION_LISTENER,
    LOGIN_SUCCESS,
    IDENTITY,
];
