//! Declared class metadata: what the host reports about a class layout.
//!
//! Members are kept in declaration order. Structural queries depend on that
//! order, so builders append and never sort.

use super::types::{ClassName, HostType, Modifiers};
use std::sync::Arc;

/// A declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: ClassName,
    pub declaring_class: ClassName,
    pub ty: HostType,
    /// Generic type arguments of the declared type, e.g. `[K, V]` for a map.
    pub generic_args: Vec<HostType>,
    pub modifiers: Modifiers,
    /// Position among the declaring class's fields.
    pub slot: usize,
}

/// A declared method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: ClassName,
    pub declaring_class: ClassName,
    pub return_type: HostType,
    pub parameters: Vec<HostType>,
    pub modifiers: Modifiers,
    pub slot: usize,
}

/// A declared constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    pub declaring_class: ClassName,
    pub parameters: Vec<HostType>,
    pub modifiers: Modifiers,
    pub slot: usize,
}

/// Everything the engine needs to know about one host class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: ClassName,
    pub superclass: Option<ClassName>,
    pub interfaces: Vec<ClassName>,
    pub modifiers: Modifiers,
    pub fields: Vec<Arc<FieldInfo>>,
    pub methods: Vec<Arc<MethodInfo>>,
    pub constructors: Vec<Arc<ConstructorInfo>>,
    /// Constant names in ordinal order; `None` when the class is not an enum.
    pub enum_constants: Option<Vec<ClassName>>,
}

impl ClassInfo {
    pub fn builder(name: impl Into<ClassName>) -> ClassInfoBuilder {
        ClassInfoBuilder::new(name)
    }

    pub fn is_enum(&self) -> bool {
        self.enum_constants.is_some()
    }

    /// Direct supertypes: the superclass first, then interfaces in order.
    pub fn supertypes(&self) -> impl Iterator<Item = &ClassName> {
        self.superclass.iter().chain(self.interfaces.iter())
    }
}

/// Fluent builder used by host implementations to describe a class.
#[derive(Debug)]
pub struct ClassInfoBuilder {
    info: ClassInfo,
}

impl ClassInfoBuilder {
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            info: ClassInfo {
                name: name.into(),
                superclass: None,
                interfaces: Vec::new(),
                modifiers: Modifiers::PUBLIC,
                fields: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                enum_constants: None,
            },
        }
    }

    pub fn extends(mut self, superclass: impl Into<ClassName>) -> Self {
        self.info.superclass = Some(superclass.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<ClassName>) -> Self {
        self.info.interfaces.push(interface.into());
        self
    }

    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.info.modifiers = modifiers;
        self
    }

    pub fn field(self, name: impl Into<ClassName>, ty: HostType, modifiers: Modifiers) -> Self {
        self.generic_field(name, ty, Vec::new(), modifiers)
    }

    /// Declares a field whose type carries generic arguments.
    pub fn generic_field(
        mut self,
        name: impl Into<ClassName>,
        ty: HostType,
        generic_args: Vec<HostType>,
        modifiers: Modifiers,
    ) -> Self {
        let slot = self.info.fields.len();
        self.info.fields.push(Arc::new(FieldInfo {
            name: name.into(),
            declaring_class: self.info.name.clone(),
            ty,
            generic_args,
            modifiers,
            slot,
        }));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<ClassName>,
        return_type: HostType,
        parameters: Vec<HostType>,
        modifiers: Modifiers,
    ) -> Self {
        let slot = self.info.methods.len();
        self.info.methods.push(Arc::new(MethodInfo {
            name: name.into(),
            declaring_class: self.info.name.clone(),
            return_type,
            parameters,
            modifiers,
            slot,
        }));
        self
    }

    pub fn constructor(mut self, parameters: Vec<HostType>, modifiers: Modifiers) -> Self {
        let slot = self.info.constructors.len();
        self.info.constructors.push(Arc::new(ConstructorInfo {
            declaring_class: self.info.name.clone(),
            parameters,
            modifiers,
            slot,
        }));
        self
    }

    /// Marks the class as an enum with the given constants in ordinal order.
    pub fn enum_constants<I, S>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ClassName>,
    {
        self.info.enum_constants = Some(constants.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> ClassInfo {
        self.info
    }
}
