//! In-memory host used by embedders and tests to describe a layout
//! declaratively.
//!
//! `MemoryHost` behaves like a strict host: non-public members refuse access
//! until [`HostRuntime::override_access`] has been called for them, instance
//! members refuse a missing receiver, and receivers must be instances of the
//! declaring class.

use super::metadata::{ClassInfo, ConstructorInfo, FieldInfo, MethodInfo};
use super::runtime::{is_subclass, HostError, HostRuntime, MemberRef};
use super::types::ClassName;
use super::value::{ObjectRef, Value};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Body of a host method. Receives the host, the receiver (absent for
/// static methods) and the arguments.
pub type MethodBody =
    Arc<dyn Fn(&MemoryHost, Option<&ObjectRef>, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Body of a host constructor.
pub type ConstructorBody = Arc<dyn Fn(&MemoryHost, &[Value]) -> Result<Value, HostError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MemberKind {
    Field,
    Method,
    Constructor,
}

type MemberKey = (MemberKind, ClassName, usize);

/// Payload of objects created through [`MemoryHost::instantiate`].
#[derive(Debug, Default)]
pub struct MemoryObject {
    fields: RwLock<HashMap<(ClassName, usize), Value>>,
}

impl MemoryObject {
    fn get(&self, field: &FieldInfo) -> Value {
        self.fields
            .read()
            .get(&(field.declaring_class.clone(), field.slot))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, field: &FieldInfo, value: Value) {
        self.fields
            .write()
            .insert((field.declaring_class.clone(), field.slot), value);
    }
}

/// Payload of enum constants handed out by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub ordinal: usize,
    pub name: ClassName,
}

/// A host whose classes and behavior live entirely in memory.
#[derive(Default)]
pub struct MemoryHost {
    classes: DashMap<ClassName, Arc<ClassInfo>>,
    enums: DashMap<ClassName, Vec<Value>>,
    methods: DashMap<MemberKey, MethodBody>,
    constructors: DashMap<MemberKey, ConstructorBody>,
    statics: DashMap<MemberKey, Value>,
    opened: DashSet<MemberKey>,
    overrides: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a class definition.
    pub fn define(&self, info: ClassInfo) -> Arc<ClassInfo> {
        let info = Arc::new(info);
        self.classes.insert(info.name.clone(), info.clone());
        info
    }

    /// Attaches a body to the method of `class` with `name` and `arity`.
    /// Every overload matching both gets the same body.
    pub fn implement<F>(&self, class: &str, name: &str, arity: usize, body: F) -> Result<(), HostError>
    where
        F: Fn(&MemoryHost, Option<&ObjectRef>, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let info = self.class(class)?;
        let body: MethodBody = Arc::new(body);
        let mut found = false;
        for method in info
            .methods
            .iter()
            .filter(|m| m.name == name && m.parameters.len() == arity)
        {
            self.methods
                .insert((MemberKind::Method, info.name.clone(), method.slot), body.clone());
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(HostError::Unimplemented {
                class: info.name.clone(),
                member: format!("{name}/{arity}"),
            })
        }
    }

    /// Attaches a body to the constructor of `class` taking `arity` arguments.
    pub fn implement_constructor<F>(&self, class: &str, arity: usize, body: F) -> Result<(), HostError>
    where
        F: Fn(&MemoryHost, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let info = self.class(class)?;
        let ctor = info
            .constructors
            .iter()
            .find(|c| c.parameters.len() == arity)
            .ok_or_else(|| HostError::Unimplemented {
                class: info.name.clone(),
                member: format!("<init>/{arity}"),
            })?;
        self.constructors
            .insert((MemberKind::Constructor, info.name.clone(), ctor.slot), Arc::new(body));
        Ok(())
    }

    /// Creates a blank instance of `class` with every field null.
    pub fn instantiate(&self, class: &str) -> Result<ObjectRef, HostError> {
        let info = self.class(class)?;
        Ok(ObjectRef::new(info.name.clone(), MemoryObject::default()))
    }

    /// Reads a field by name through the superclass chain, bypassing access
    /// checks. Meant for method bodies and test assertions.
    pub fn peek(&self, object: &ObjectRef, field: &str) -> Result<Value, HostError> {
        let (info, data) = self.raw_field(object, field)?;
        Ok(data.get(&info))
    }

    /// Writes a field by name, bypassing access checks.
    pub fn poke(&self, object: &ObjectRef, field: &str, value: Value) -> Result<(), HostError> {
        let (info, data) = self.raw_field(object, field)?;
        data.set(&info, value);
        Ok(())
    }

    /// Sets a static field by name, bypassing access checks.
    pub fn set_static(&self, class: &str, field: &str, value: Value) -> Result<(), HostError> {
        let info = self.class(class)?;
        let slot = info
            .fields
            .iter()
            .find(|f| f.name == field && f.modifiers.is_static)
            .map(|f| f.slot)
            .ok_or_else(|| HostError::Unimplemented {
                class: info.name.clone(),
                member: field.to_string(),
            })?;
        self.statics
            .insert((MemberKind::Field, info.name.clone(), slot), value);
        Ok(())
    }

    /// Number of access overrides performed so far.
    pub fn override_count(&self) -> usize {
        self.overrides.load(Ordering::Relaxed)
    }

    fn class(&self, name: &str) -> Result<Arc<ClassInfo>, HostError> {
        self.classes
            .get(name)
            .map(|c| c.clone())
            .ok_or_else(|| HostError::NotAnInstance {
                expected: ClassName::from(name),
                found: "unknown class".to_string(),
            })
    }

    fn raw_field<'a>(
        &self,
        object: &'a ObjectRef,
        field: &str,
    ) -> Result<(Arc<FieldInfo>, &'a MemoryObject), HostError> {
        let data = self.payload(object, object.class_name())?;
        let mut next = Some(ClassName::from(object.class_name()));
        while let Some(name) = next {
            let info = self.class(&name)?;
            if let Some(f) = info.fields.iter().find(|f| f.name == field && !f.modifiers.is_static) {
                return Ok((f.clone(), data));
            }
            next = info.superclass.clone();
        }
        Err(HostError::Unimplemented {
            class: ClassName::from(object.class_name()),
            member: field.to_string(),
        })
    }

    fn payload<'a>(&self, object: &'a ObjectRef, expected: &str) -> Result<&'a MemoryObject, HostError> {
        object
            .downcast_ref::<MemoryObject>()
            .ok_or_else(|| HostError::NotAnInstance {
                expected: ClassName::from(expected),
                found: format!("{object:?}"),
            })
    }

    fn check_access(&self, key: &MemberKey, public: bool, member: &str) -> Result<(), HostError> {
        if public || self.opened.contains(key) {
            Ok(())
        } else {
            Err(HostError::IllegalAccess {
                class: key.1.clone(),
                member: member.to_string(),
            })
        }
    }

    fn receiver<'a>(
        &self,
        declaring: &ClassName,
        member: &str,
        target: Option<&'a ObjectRef>,
    ) -> Result<&'a ObjectRef, HostError> {
        let target = target.ok_or_else(|| HostError::NullTarget {
            class: declaring.clone(),
            member: member.to_string(),
        })?;
        if is_subclass(self, target.class_name(), declaring) {
            Ok(target)
        } else {
            Err(HostError::NotAnInstance {
                expected: declaring.clone(),
                found: target.class_name().to_string(),
            })
        }
    }
}

impl HostRuntime for MemoryHost {
    fn find_class(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(name).map(|c| c.clone())
    }

    fn read_field(&self, field: &FieldInfo, target: Option<&ObjectRef>) -> Result<Value, HostError> {
        let key = (MemberKind::Field, field.declaring_class.clone(), field.slot);
        self.check_access(&key, field.modifiers.is_public, &field.name)?;
        if field.modifiers.is_static {
            return Ok(self.statics.get(&key).map(|v| v.clone()).unwrap_or_default());
        }
        let target = self.receiver(&field.declaring_class, &field.name, target)?;
        Ok(self.payload(target, &field.declaring_class)?.get(field))
    }

    fn write_field(&self, field: &FieldInfo, target: Option<&ObjectRef>, value: Value) -> Result<(), HostError> {
        let key = (MemberKind::Field, field.declaring_class.clone(), field.slot);
        self.check_access(&key, field.modifiers.is_public, &field.name)?;
        if field.modifiers.is_static {
            self.statics.insert(key, value);
            return Ok(());
        }
        let target = self.receiver(&field.declaring_class, &field.name, target)?;
        self.payload(target, &field.declaring_class)?.set(field, value);
        Ok(())
    }

    fn invoke_method(
        &self,
        method: &MethodInfo,
        target: Option<&ObjectRef>,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let key = (MemberKind::Method, method.declaring_class.clone(), method.slot);
        self.check_access(&key, method.modifiers.is_public, &method.name)?;
        if args.len() != method.parameters.len() {
            return Err(HostError::BadArgument {
                member: method.name.to_string(),
                reason: format!("expected {} arguments, got {}", method.parameters.len(), args.len()),
            });
        }
        let target = if method.modifiers.is_static {
            None
        } else {
            Some(self.receiver(&method.declaring_class, &method.name, target)?)
        };
        let body = self
            .methods
            .get(&key)
            .map(|b| b.clone())
            .ok_or_else(|| HostError::Unimplemented {
                class: method.declaring_class.clone(),
                member: method.name.to_string(),
            })?;
        body(self, target, args)
    }

    fn construct(&self, constructor: &ConstructorInfo, args: &[Value]) -> Result<Value, HostError> {
        let key = (MemberKind::Constructor, constructor.declaring_class.clone(), constructor.slot);
        self.check_access(&key, constructor.modifiers.is_public, "<init>")?;
        if args.len() != constructor.parameters.len() {
            return Err(HostError::BadArgument {
                member: format!("{}.<init>", constructor.declaring_class),
                reason: format!("expected {} arguments, got {}", constructor.parameters.len(), args.len()),
            });
        }
        match self.constructors.get(&key).map(|b| b.clone()) {
            Some(body) => body(self, args),
            None => Ok(Value::Object(self.instantiate(&constructor.declaring_class)?)),
        }
    }

    fn enum_constants(&self, class: &ClassInfo) -> Result<Vec<Value>, HostError> {
        let Some(names) = &class.enum_constants else {
            return Ok(Vec::new());
        };
        let constants = self.enums.entry(class.name.clone()).or_insert_with(|| {
            names
                .iter()
                .enumerate()
                .map(|(ordinal, name)| {
                    Value::Object(ObjectRef::new(
                        class.name.clone(),
                        EnumConstant {
                            ordinal,
                            name: name.clone(),
                        },
                    ))
                })
                .collect()
        });
        Ok(constants.clone())
    }

    fn override_access(&self, member: MemberRef<'_>) -> Result<(), HostError> {
        let key = match member {
            MemberRef::Field(f) => (MemberKind::Field, f.declaring_class.clone(), f.slot),
            MemberRef::Method(m) => (MemberKind::Method, m.declaring_class.clone(), m.slot),
            MemberRef::Constructor(c) => (MemberKind::Constructor, c.declaring_class.clone(), c.slot),
        };
        self.opened.insert(key);
        self.overrides.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::types::{HostType, Modifiers, Primitive};

    fn host() -> MemoryHost {
        let host = MemoryHost::new();
        host.define(
            ClassInfo::builder("host.Base")
                .field("hidden", Primitive::Int.into(), Modifiers::private())
                .build(),
        );
        host.define(
            ClassInfo::builder("host.Child")
                .extends("host.Base")
                .field("open", Primitive::Int.into(), Modifiers::public())
                .field("COUNT", Primitive::Int.into(), Modifiers::public().with_static())
                .method("twice", Primitive::Int.into(), vec![Primitive::Int.into()], Modifiers::private())
                .build(),
        );
        host.implement("host.Child", "twice", 1, |_, _, args| {
            Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2))
        })
        .unwrap();
        host
    }

    #[test]
    fn private_members_need_override() {
        let host = host();
        let base = host.find_class("host.Base").unwrap();
        let hidden = base.fields[0].clone();
        let obj = host.instantiate("host.Child").unwrap();

        assert!(matches!(
            host.read_field(&hidden, Some(&obj)),
            Err(HostError::IllegalAccess { .. })
        ));
        host.override_access(MemberRef::Field(&hidden)).unwrap();
        host.write_field(&hidden, Some(&obj), Value::Int(7)).unwrap();
        assert_eq!(host.read_field(&hidden, Some(&obj)).unwrap(), Value::Int(7));
        assert_eq!(host.peek(&obj, "hidden").unwrap(), Value::Int(7));
        assert_eq!(host.override_count(), 1);
    }

    #[test]
    fn statics_ignore_receiver() {
        let host = host();
        host.set_static("host.Child", "COUNT", Value::Int(3)).unwrap();
        let child = host.find_class("host.Child").unwrap();
        assert_eq!(host.read_field(&child.fields[1], None).unwrap(), Value::Int(3));
    }

    #[test]
    fn instance_members_check_receiver() {
        let host = host();
        let child = host.find_class("host.Child").unwrap();
        let base_obj = host.instantiate("host.Base").unwrap();
        assert!(matches!(
            host.read_field(&child.fields[0], Some(&base_obj)),
            Err(HostError::NotAnInstance { .. })
        ));
        assert!(matches!(
            host.read_field(&child.fields[0], None),
            Err(HostError::NullTarget { .. })
        ));
    }

    #[test]
    fn method_bodies_run_after_override() {
        let host = host();
        let child = host.find_class("host.Child").unwrap();
        let twice = child.methods[0].clone();
        let obj = host.instantiate("host.Child").unwrap();
        host.override_access(MemberRef::Method(&twice)).unwrap();
        let out = host.invoke_method(&twice, Some(&obj), &[Value::Int(21)]).unwrap();
        assert_eq!(out, Value::Int(42));
        assert_eq!(twice.return_type, HostType::Primitive(Primitive::Int));
    }

    #[test]
    fn subclass_follows_interfaces_and_superclasses() {
        let host = host();
        host.define(ClassInfo::builder("host.Marker").build());
        host.define(ClassInfo::builder("host.Tagged").implements("host.Marker").build());
        host.define(
            ClassInfo::builder("host.Leaf")
                .extends("host.Child")
                .implements("host.Tagged")
                .build(),
        );

        assert!(is_subclass(&host, "host.Leaf", "host.Base"));
        assert!(is_subclass(&host, "host.Leaf", "host.Marker"));
        assert!(is_subclass(&host, "host.Leaf", "host.Leaf"));
        assert!(!is_subclass(&host, "host.Base", "host.Leaf"));
        assert!(!is_subclass(&host, "host.Leaf", "host.Unknown"));

        // Receivers of inherited members are checked through the same walk.
        let leaf = host.instantiate("host.Leaf").unwrap();
        let child = host.find_class("host.Child").unwrap();
        assert_eq!(host.read_field(&child.fields[0], Some(&leaf)).unwrap(), Value::Null);
    }
}
