//! The runtime contract every host implementation satisfies.

use super::metadata::{ClassInfo, ConstructorInfo, FieldInfo, MethodInfo};
use super::types::{ClassName, HostType};
use super::value::{ObjectRef, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Errors raised by the host while touching live values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("member {member} of {class} is not accessible")]
    IllegalAccess { class: ClassName, member: String },

    #[error("member {member} of {class} needs a receiver")]
    NullTarget { class: ClassName, member: String },

    #[error("{found} is not an instance of {expected}")]
    NotAnInstance { expected: ClassName, found: String },

    #[error("{member} of {class} has no implementation")]
    Unimplemented { class: ClassName, member: String },

    #[error("bad argument for {member}: {reason}")]
    BadArgument { member: String, reason: String },

    #[error("host call failed: {0}")]
    Invocation(String),
}

/// A member passed to [`HostRuntime::override_access`].
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    Field(&'a FieldInfo),
    Method(&'a MethodInfo),
    Constructor(&'a ConstructorInfo),
}

impl MemberRef<'_> {
    pub fn declaring_class(&self) -> &str {
        match self {
            MemberRef::Field(f) => &f.declaring_class,
            MemberRef::Method(m) => &m.declaring_class,
            MemberRef::Constructor(c) => &c.declaring_class,
        }
    }
}

/// Class lookup plus live access into a host process.
///
/// Implementations must be cheap to share: the engine holds one
/// `Arc<dyn HostRuntime>` per reflection context and hands clones of it to
/// every resolved handle.
pub trait HostRuntime: Send + Sync + 'static {
    /// Looks up a class by its real, fully qualified name.
    fn find_class(&self, name: &str) -> Option<Arc<ClassInfo>>;

    /// Runtime class of a live object.
    fn class_of(&self, object: &ObjectRef) -> Option<Arc<ClassInfo>> {
        self.find_class(object.class_name())
    }

    /// Reads a field; `target` is ignored for static fields.
    fn read_field(&self, field: &FieldInfo, target: Option<&ObjectRef>) -> Result<Value, HostError>;

    fn write_field(
        &self,
        field: &FieldInfo,
        target: Option<&ObjectRef>,
        value: Value,
    ) -> Result<(), HostError>;

    fn invoke_method(
        &self,
        method: &MethodInfo,
        target: Option<&ObjectRef>,
        args: &[Value],
    ) -> Result<Value, HostError>;

    fn construct(&self, constructor: &ConstructorInfo, args: &[Value]) -> Result<Value, HostError>;

    /// Forces a member accessible regardless of its declared visibility.
    fn override_access(&self, member: MemberRef<'_>) -> Result<(), HostError>;

    /// Live constants of an enum class in ordinal order.
    ///
    /// The default reads the static field named after each constant, which
    /// is how enum constants are laid out on hosts that store them as
    /// fields.
    fn enum_constants(&self, class: &ClassInfo) -> Result<Vec<Value>, HostError> {
        let Some(names) = &class.enum_constants else {
            return Ok(Vec::new());
        };
        names
            .iter()
            .map(|name| {
                let field = class
                    .fields
                    .iter()
                    .find(|f| f.modifiers.is_static && &f.name == name)
                    .ok_or_else(|| HostError::Unimplemented {
                        class: class.name.clone(),
                        member: name.to_string(),
                    })?;
                self.override_access(MemberRef::Field(field))?;
                self.read_field(field, None)
            })
            .collect()
    }
}

/// Whether a value of type `source` may be stored in a slot of type `target`.
///
/// Primitives and boxed primitives only match themselves. Class types match
/// when `target` appears anywhere in the supertype graph of `source`; arrays
/// compare their element types the same way.
pub fn is_assignable_from(runtime: &dyn HostRuntime, target: &HostType, source: &HostType) -> bool {
    match (target, source) {
        (t, s) if t == s => true,
        (HostType::Class(t), HostType::Class(s)) => is_subclass(runtime, s, t),
        (HostType::Array(t), HostType::Array(s)) => {
            !t.is_primitive() && !s.is_primitive() && is_assignable_from(runtime, t, s)
        }
        _ => false,
    }
}

/// Whether `class` is `ancestor` or inherits from it through any supertype.
pub fn is_subclass(runtime: &dyn HostRuntime, class: &str, ancestor: &str) -> bool {
    if class == ancestor {
        return true;
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([ClassName::from(class)]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(info) = runtime.find_class(&current) else {
            continue;
        };
        for parent in info.supertypes() {
            if *parent == ancestor {
                return true;
            }
            queue.push_back(parent.clone());
        }
    }
    false
}

/// The superclass chain of `class`, most-derived first, excluding `class`.
///
/// Stops at the first superclass the host cannot find.
pub fn ancestors(runtime: &dyn HostRuntime, class: &ClassInfo) -> Vec<Arc<ClassInfo>> {
    let mut chain = Vec::new();
    let mut next = class.superclass.clone();
    while let Some(name) = next {
        let Some(info) = runtime.find_class(&name) else {
            break;
        };
        if chain.iter().any(|c: &Arc<ClassInfo>| c.name == info.name) {
            break;
        }
        next = info.superclass.clone();
        chain.push(info);
    }
    chain
}
