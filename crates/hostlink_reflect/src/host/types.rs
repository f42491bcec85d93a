//! Type and modifier vocabulary of the host's class model.

use compact_str::CompactString;
use std::fmt;

/// Fully qualified name of a host class.
pub type ClassName = CompactString;

/// Primitive value kinds the host distinguishes from their boxed forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "boolean",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Char => "char",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }
}

/// A declared type as it appears on a field, parameter or return slot.
///
/// Class types are referenced by name only. Anything that needs the class
/// itself (supertype walks, instance checks) looks it up through the
/// [`HostRuntime`](super::HostRuntime), which keeps metadata free of
/// reference cycles between classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Void,
    Primitive(Primitive),
    /// The boxed object form of a primitive.
    Boxed(Primitive),
    Class(ClassName),
    Array(Box<HostType>),
}

impl HostType {
    pub fn class(name: impl Into<ClassName>) -> Self {
        HostType::Class(name.into())
    }

    pub fn array_of(element: HostType) -> Self {
        HostType::Array(Box::new(element))
    }

    /// Strips boxing, leaving every other type untouched.
    pub fn unboxed(&self) -> HostType {
        match self {
            HostType::Boxed(p) => HostType::Primitive(*p),
            other => other.clone(),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            HostType::Class(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, HostType::Primitive(_))
    }
}

impl From<Primitive> for HostType {
    fn from(p: Primitive) -> Self {
        HostType::Primitive(p)
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Void => f.write_str("void"),
            HostType::Primitive(p) => f.write_str(p.name()),
            HostType::Boxed(p) => write!(f, "boxed {}", p.name()),
            HostType::Class(name) => f.write_str(name),
            HostType::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Member and class modifiers relevant to structural queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub is_public: bool,
    pub is_static: bool,
    pub is_final: bool,
}

impl Modifiers {
    /// Package-private, non-static, non-final.
    pub const DEFAULT: Modifiers = Modifiers {
        is_public: false,
        is_static: false,
        is_final: false,
    };

    pub const PUBLIC: Modifiers = Modifiers {
        is_public: true,
        is_static: false,
        is_final: false,
    };

    pub fn private() -> Self {
        Self::DEFAULT
    }

    pub fn public() -> Self {
        Self::PUBLIC
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        parts.push(if self.is_public { "public" } else { "non-public" });
        if self.is_static {
            parts.push("static");
        }
        if self.is_final {
            parts.push("final");
        }
        f.write_str(&parts.join(" "))
    }
}
