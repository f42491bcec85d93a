//! Host model: how the engine sees a foreign process's classes and values.
//!
//! The engine never touches host memory directly. Everything goes through a
//! [`HostRuntime`], which reports class metadata in declaration order and
//! performs reads, writes and calls on live [`Value`]s.

pub mod memory;
pub mod metadata;
pub mod runtime;
pub mod types;
pub mod value;

pub use memory::{EnumConstant, MemoryHost, MemoryObject};
pub use metadata::{ClassInfo, ClassInfoBuilder, ConstructorInfo, FieldInfo, MethodInfo};
pub use runtime::{ancestors, is_assignable_from, is_subclass, HostError, HostRuntime, MemberRef};
pub use types::{ClassName, HostType, Modifiers, Primitive};
pub use value::{ObjectRef, Value};
