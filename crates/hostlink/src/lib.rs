//! # Hostlink
//!
//! Bridge between a plugin and a versioned host process: configuration,
//! logging and the enable/disable lifecycle around
//! [`hostlink_reflect`] (structural member resolution) and
//! [`hostlink_intercept`] (channel interception).
//!
//! ## Configuration
//!
//! The bridge loads a TOML file (see [`BridgeConfig`]). If the file doesn't
//! exist, a default one is written. The class catalog shipped with the crate
//! covers package-versioned hosts up to 1.16 and the unversioned layout from
//! 1.17 on; the `[classes]` table overrides it id by id.
//!
//! ```toml
//! [host]
//! version = "v1_16_R3"
//!
//! [logging]
//! level = "info"
//! json_format = false
//! directives = ["hostlink_reflect=info", "hostlink_intercept=debug"]
//!
//! [interceptor]
//! plugin_name = "Chat Guard"
//!
//! [classes]
//! open_window = ["net.minecraft.server.{v}.PacketPlayOutOpenWindow"]
//! ```
//!
//! ## Quick Start Example
//!
//! ```rust
//! use hostlink::{BridgeConfig, HostBridge};
//! use hostlink::intercept::loopback::LoopbackServer;
//!
//! let server = LoopbackServer::new("v1_12_R1".parse().unwrap()).unwrap();
//! let mut bridge = HostBridge::enable(server.host().clone(), &server.server(), BridgeConfig::default()).unwrap();
//!
//! let _client = server.connect().unwrap();
//! server.tick().unwrap();
//! assert_eq!(bridge.interceptor().unwrap().connections().len(), 1);
//!
//! bridge.disable();
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;

pub use bridge::HostBridge;
pub use config::{BridgeConfig, HostSettings, LoggingSettings};
pub use error::{BridgeError, Result};
pub use logging::setup_logging;

pub use hostlink_intercept as intercept;
pub use hostlink_reflect as reflect;
