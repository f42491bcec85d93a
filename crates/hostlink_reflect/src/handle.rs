//! Resolved, access-overridden member handles.
//!
//! A handle is created once per distinct query and class, then cloned out of
//! the cache. Clones share one allocation, so [`FieldHandle::ptr_eq`] and
//! friends tell whether two lookups hit the same cache entry.

use crate::error::{ReflectError, Result};
use crate::host::{ClassName, ConstructorInfo, FieldInfo, HostError, HostRuntime, MemberRef, MethodInfo, ObjectRef, Value};
use std::fmt;
use std::sync::Arc;

struct Bound<M> {
    member: Arc<M>,
    /// Class the query was resolved against, which may be a subclass of
    /// the declaring class.
    owner: ClassName,
    runtime: Arc<dyn HostRuntime>,
}

impl<M> Bound<M> {
    fn new(member: Arc<M>, owner: ClassName, runtime: Arc<dyn HostRuntime>) -> Arc<Self> {
        Arc::new(Self { member, owner, runtime })
    }
}

#[derive(Clone)]
pub struct FieldHandle(Arc<Bound<FieldInfo>>);

impl FieldHandle {
    pub(crate) fn bind(field: Arc<FieldInfo>, owner: ClassName, runtime: Arc<dyn HostRuntime>) -> Result<Self> {
        runtime
            .override_access(MemberRef::Field(&field))
            .map_err(|e| ReflectError::access(describe(&field.declaring_class, &field.name), e))?;
        Ok(Self(Bound::new(field, owner, runtime)))
    }

    pub fn info(&self) -> &FieldInfo {
        &self.0.member
    }

    pub fn name(&self) -> &str {
        &self.0.member.name
    }

    pub fn owner(&self) -> &str {
        &self.0.owner
    }

    pub fn get(&self, target: &ObjectRef) -> Result<Value> {
        self.0
            .runtime
            .read_field(&self.0.member, Some(target))
            .map_err(|e| self.fail(e))
    }

    pub fn set(&self, target: &ObjectRef, value: impl Into<Value>) -> Result<()> {
        self.0
            .runtime
            .write_field(&self.0.member, Some(target), value.into())
            .map_err(|e| self.fail(e))
    }

    pub fn get_static(&self) -> Result<Value> {
        self.0
            .runtime
            .read_field(&self.0.member, None)
            .map_err(|e| self.fail(e))
    }

    pub fn set_static(&self, value: impl Into<Value>) -> Result<()> {
        self.0
            .runtime
            .write_field(&self.0.member, None, value.into())
            .map_err(|e| self.fail(e))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn fail(&self, source: HostError) -> ReflectError {
        ReflectError::access(describe(&self.0.member.declaring_class, &self.0.member.name), source)
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0.member;
        write!(f, "FieldHandle({} {}.{})", m.ty, m.declaring_class, m.name)
    }
}

#[derive(Clone)]
pub struct MethodHandle(Arc<Bound<MethodInfo>>);

impl MethodHandle {
    pub(crate) fn bind(method: Arc<MethodInfo>, owner: ClassName, runtime: Arc<dyn HostRuntime>) -> Result<Self> {
        runtime
            .override_access(MemberRef::Method(&method))
            .map_err(|e| ReflectError::access(describe(&method.declaring_class, &method.name), e))?;
        Ok(Self(Bound::new(method, owner, runtime)))
    }

    pub fn info(&self) -> &MethodInfo {
        &self.0.member
    }

    pub fn name(&self) -> &str {
        &self.0.member.name
    }

    pub fn owner(&self) -> &str {
        &self.0.owner
    }

    pub fn invoke(&self, target: &ObjectRef, args: &[Value]) -> Result<Value> {
        self.0
            .runtime
            .invoke_method(&self.0.member, Some(target), args)
            .map_err(|e| self.fail(e))
    }

    pub fn invoke_static(&self, args: &[Value]) -> Result<Value> {
        self.0
            .runtime
            .invoke_method(&self.0.member, None, args)
            .map_err(|e| self.fail(e))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn fail(&self, source: HostError) -> ReflectError {
        ReflectError::access(describe(&self.0.member.declaring_class, &self.0.member.name), source)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0.member;
        let params: Vec<String> = m.parameters.iter().map(ToString::to_string).collect();
        write!(
            f,
            "MethodHandle({} {}.{}({}))",
            m.return_type,
            m.declaring_class,
            m.name,
            params.join(", ")
        )
    }
}

#[derive(Clone)]
pub struct ConstructorHandle(Arc<Bound<ConstructorInfo>>);

impl ConstructorHandle {
    pub(crate) fn bind(
        constructor: Arc<ConstructorInfo>,
        owner: ClassName,
        runtime: Arc<dyn HostRuntime>,
    ) -> Result<Self> {
        runtime
            .override_access(MemberRef::Constructor(&constructor))
            .map_err(|e| ReflectError::access(describe(&constructor.declaring_class, "<init>"), e))?;
        Ok(Self(Bound::new(constructor, owner, runtime)))
    }

    pub fn info(&self) -> &ConstructorInfo {
        &self.0.member
    }

    pub fn owner(&self) -> &str {
        &self.0.owner
    }

    pub fn new_instance(&self, args: &[Value]) -> Result<Value> {
        self.0
            .runtime
            .construct(&self.0.member, args)
            .map_err(|e| ReflectError::access(describe(&self.0.member.declaring_class, "<init>"), e))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ConstructorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstructorHandle({}/{})", self.0.member.declaring_class, self.0.member.parameters.len())
    }
}

/// Any resolved handle, as stored in the handle cache.
#[derive(Debug, Clone)]
pub enum ResolvedHandle {
    Field(FieldHandle),
    Method(MethodHandle),
    Constructor(ConstructorHandle),
}

fn describe(class: &str, member: &str) -> String {
    format!("{class}.{member}")
}
