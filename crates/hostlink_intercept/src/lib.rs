//! # Hostlink Intercept
//!
//! Transparent interception of a host's live network connections. Every
//! connection, current or future, gets a handler in its channel chain that
//! routes traffic through ordered, pluggable [`PacketModifier`]s.
//!
//! ## Core Ideas
//!
//! - **Global and per-identity chains**: modifiers registered globally see
//!   every message; modifiers registered for an identity see that identity's
//!   messages after the global chain
//! - **Priorities**: `High` modifiers run before `Low` ones, registration
//!   order otherwise
//! - **Failure isolation**: a modifier that errors or panics is logged and
//!   skipped, the message continues unchanged
//! - **Late hooking**: new connections are observed through their inbound
//!   queue and hooked on its first drain, once the host has built the chain
//! - **Clean teardown**: shutting down restores every host field and chain
//!
//! ## Quick Start Example
//!
//! ```rust
//! use hostlink_intercept::loopback::{packets, LoopbackServer};
//! use hostlink_intercept::{FnModifier, InterceptorSettings, PacketInterceptor, Priority, Verdict};
//! use hostlink_reflect::host::Value;
//! use std::sync::Arc;
//!
//! let server = LoopbackServer::new("1.12.2".parse().unwrap()).unwrap();
//! let interceptor = PacketInterceptor::new(
//!     server.context(),
//!     &server.server(),
//!     InterceptorSettings::for_plugin("Quiet Chat"),
//! )
//! .unwrap();
//!
//! interceptor.register(
//!     Arc::new(FnModifier::new("mute").on_outbound(|_, _| Ok(Verdict::Terminate))),
//!     Priority::High,
//! );
//!
//! let client = server.connect().unwrap();
//! server.tick().unwrap();
//!
//! let chat = server.packet(packets::CHAT_OUT, &[("a", Value::from("hello"))]).unwrap();
//! assert_eq!(client.channel.write(Value::Object(chat), None), None);
//! assert!(client.channel.written().is_empty());
//! ```

mod chain;
pub mod connection;
mod decorator;
pub mod error;
mod handler;
pub mod host;
pub mod ids;
pub mod interceptor;
pub mod loopback;
pub mod modifier;
pub mod registry;
pub mod settings;
mod tracker;

#[cfg(test)]
mod tests;

pub use connection::InterceptedConnection;
pub use error::{InterceptError, Result};
pub use host::{Channel, CompletionListener, ConnectionList, Flow, Message, MessageQueue, PipelineHandler};
pub use interceptor::PacketInterceptor;
pub use modifier::{FnModifier, PacketModifier, Priority, Verdict};
pub use registry::{ModifierChain, ModifierRegistry, Registration};
pub use settings::InterceptorSettings;
