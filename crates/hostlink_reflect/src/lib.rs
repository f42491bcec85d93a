//! # Hostlink Reflect
//!
//! Structural member resolution over a versioned host whose internal class
//! and member names change between releases.
//!
//! ## Core Ideas
//!
//! - **Symbolic ids**: classes are requested by a stable id (`server_connection`)
//!   and mapped to real names through a versioned [`ClassCatalog`]
//! - **Structural queries**: members are found by shape (types, parameter
//!   lists, modifiers, position) instead of by name
//! - **Skip counts**: among several members of identical shape, the query picks
//!   the (N+1)-th in declaration order
//! - **Positional enums**: host enum constants are addressed by ordinal through
//!   a local [`mirror_enum!`] declaration
//! - **Caching**: descriptors and handles are resolved once per context and
//!   shared afterwards
//!
//! ## Quick Start Example
//!
//! ```rust
//! use hostlink_reflect::host::{ClassInfo, HostType, MemoryHost, Modifiers, Value};
//! use hostlink_reflect::{ClassCatalog, ReflectionContext};
//! use std::sync::Arc;
//!
//! let host = Arc::new(MemoryHost::new());
//! host.define(
//!     ClassInfo::builder("net.host.v1_8_R3.Session")
//!         .field("a", HostType::class("java.lang.String"), Modifiers::private())
//!         .field("b", HostType::class("java.lang.String"), Modifiers::private())
//!         .build(),
//! );
//!
//! let catalog = ClassCatalog::new().with("session", ["net.host.{v}.Session"]);
//! let ctx = ReflectionContext::new(host.clone(), catalog, "v1_8_R3".parse().unwrap());
//!
//! let session = ctx.resolve_class("session").unwrap();
//! let second = session
//!     .locate_field()
//!     .of_type(HostType::class("java.lang.String"))
//!     .skip(1)
//!     .required()
//!     .unwrap();
//! assert_eq!(second.name(), "b");
//!
//! let live = host.instantiate("net.host.v1_8_R3.Session").unwrap();
//! second.set(&live, "token").unwrap();
//! assert_eq!(second.get(&live).unwrap(), Value::from("token"));
//! ```

pub mod catalog;
pub mod comparable;
pub mod context;
pub mod descriptor;
pub mod enums;
pub mod error;
pub mod handle;
pub mod host;
pub mod query;
pub mod version;


pub use catalog::{ClassCatalog, NameRule, SymbolicId};
pub use comparable::{Assignability, ComparableType};
pub use context::ReflectionContext;
pub use descriptor::ClassDescriptor;
pub use enums::{EnumDescriptor, MirrorEnum};
pub use error::{ReflectError, Result};
pub use handle::{ConstructorHandle, FieldHandle, MethodHandle, ResolvedHandle};
pub use query::{FieldLocator, MemberQuery, MethodLocator, ConstructorLocator};
pub use version::HostVersion;
