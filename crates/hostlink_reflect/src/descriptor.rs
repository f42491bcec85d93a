//! Class descriptors: the entry point for structural queries on one class.

use crate::enums::EnumDescriptor;
use crate::error::{ReflectError, Result};
use crate::handle::{ConstructorHandle, FieldHandle, MethodHandle, ResolvedHandle};
use crate::host::{ancestors, is_subclass, ClassInfo, ClassName, HostRuntime, HostType, Value};
use crate::query::{
    walk, ConstructorLocator, ConstructorQuery, FieldLocator, FieldQuery, MemberQuery, MethodLocator,
    MethodQuery,
};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Handles shared by every descriptor of one reflection context, keyed by
/// the class the query ran against and the query itself.
#[derive(Default)]
pub(crate) struct HandleCache {
    entries: DashMap<(ClassName, MemberQuery), ResolvedHandle>,
}

impl HandleCache {
    fn get(&self, key: &(ClassName, MemberQuery)) -> Option<ResolvedHandle> {
        self.entries.get(key).map(|h| h.clone())
    }

    /// Stores `handle` unless another thread won the race, returning
    /// whichever handle is cached afterwards.
    fn insert(&self, key: (ClassName, MemberQuery), handle: ResolvedHandle) -> ResolvedHandle {
        self.entries.entry(key).or_insert(handle).clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A resolved host class.
///
/// Descriptors are created once per class by the
/// [`ReflectionContext`](crate::ReflectionContext) and shared as
/// `Arc<ClassDescriptor>`; repeated lookups return the same allocation.
pub struct ClassDescriptor {
    info: Arc<ClassInfo>,
    runtime: Arc<dyn HostRuntime>,
    handles: Arc<HandleCache>,
    instance_of: DashMap<ClassName, bool>,
    as_enum: OnceCell<Arc<EnumDescriptor>>,
}

impl ClassDescriptor {
    pub(crate) fn new(info: Arc<ClassInfo>, runtime: Arc<dyn HostRuntime>, handles: Arc<HandleCache>) -> Self {
        Self {
            info,
            runtime,
            handles,
            instance_of: DashMap::new(),
            as_enum: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &Arc<ClassInfo> {
        &self.info
    }

    /// The class as a declared type, for use in type constraints.
    pub fn as_type(&self) -> HostType {
        HostType::Class(self.info.name.clone())
    }

    /// Whether `value` is a live object of this class or a subclass.
    pub fn is_instance(&self, value: &Value) -> bool {
        let Value::Object(object) = value else {
            return false;
        };
        if let Some(known) = self.instance_of.get(object.class_name()) {
            return *known;
        }
        let result = is_subclass(self.runtime.as_ref(), object.class_name(), &self.info.name);
        self.instance_of.insert(ClassName::from(object.class_name()), result);
        result
    }

    pub fn locate_field(&self) -> FieldLocator<'_> {
        FieldLocator::new(self)
    }

    pub fn locate_method(&self) -> MethodLocator<'_> {
        MethodLocator::new(self)
    }

    pub fn locate_constructor(&self) -> ConstructorLocator<'_> {
        ConstructorLocator::new(self)
    }

    /// The class's constants, read once and cached.
    pub fn as_enum(&self) -> Result<Arc<EnumDescriptor>> {
        self.as_enum
            .get_or_try_init(|| {
                if !self.info.is_enum() {
                    return Err(ReflectError::NotAnEnum(self.info.name.clone()));
                }
                let constants = self
                    .runtime
                    .enum_constants(&self.info)
                    .map_err(|e| ReflectError::access(format!("{} constants", self.info.name), e))?;
                debug!("📋 Read {} constants of enum {}", constants.len(), self.info.name);
                Ok(Arc::new(EnumDescriptor::new(self.info.name.clone(), constants)))
            })
            .cloned()
    }

    pub(crate) fn resolve_field(&self, query: FieldQuery) -> Result<FieldHandle> {
        let key = (self.info.name.clone(), MemberQuery::Field(query.clone()));
        if let Some(ResolvedHandle::Field(handle)) = self.handles.get(&key) {
            return Ok(handle);
        }
        let classes = self.search_order(query.common.inherited);
        let runtime = self.runtime.as_ref();
        let field = walk(&classes, |c| c.fields.as_slice(), query.common.skip, |f| {
            query.matches(runtime, f)
        })
        .ok_or_else(|| self.not_found(&key.1))?;

        debug!("🔗 {} on {} -> {}.{}", query, self.info.name, field.declaring_class, field.name);
        let handle = FieldHandle::bind(field, self.info.name.clone(), self.runtime.clone())?;
        match self.handles.insert(key, ResolvedHandle::Field(handle.clone())) {
            ResolvedHandle::Field(cached) => Ok(cached),
            _ => Ok(handle),
        }
    }

    pub(crate) fn resolve_method(&self, query: MethodQuery) -> Result<MethodHandle> {
        if !query.is_complete() {
            return Err(ReflectError::IncompleteQuery {
                class: self.info.name.clone(),
                query: query.to_string(),
            });
        }
        let key = (self.info.name.clone(), MemberQuery::Method(query.clone()));
        if let Some(ResolvedHandle::Method(handle)) = self.handles.get(&key) {
            return Ok(handle);
        }
        let classes = self.search_order(query.common.inherited);
        let runtime = self.runtime.as_ref();
        let method = walk(&classes, |c| c.methods.as_slice(), query.common.skip, |m| {
            query.matches(runtime, m)
        })
        .ok_or_else(|| self.not_found(&key.1))?;

        debug!("🔗 {} on {} -> {}.{}", query, self.info.name, method.declaring_class, method.name);
        let handle = MethodHandle::bind(method, self.info.name.clone(), self.runtime.clone())?;
        match self.handles.insert(key, ResolvedHandle::Method(handle.clone())) {
            ResolvedHandle::Method(cached) => Ok(cached),
            _ => Ok(handle),
        }
    }

    pub(crate) fn resolve_constructor(&self, query: ConstructorQuery) -> Result<ConstructorHandle> {
        let key = (self.info.name.clone(), MemberQuery::Constructor(query.clone()));
        if let Some(ResolvedHandle::Constructor(handle)) = self.handles.get(&key) {
            return Ok(handle);
        }
        let classes = [self.info.clone()];
        let runtime = self.runtime.as_ref();
        let constructor = walk(&classes, |c| c.constructors.as_slice(), query.common.skip, |c| {
            query.matches(runtime, c)
        })
        .ok_or_else(|| self.not_found(&key.1))?;

        debug!("🔗 {} on {}", query, self.info.name);
        let handle = ConstructorHandle::bind(constructor, self.info.name.clone(), self.runtime.clone())?;
        match self.handles.insert(key, ResolvedHandle::Constructor(handle.clone())) {
            ResolvedHandle::Constructor(cached) => Ok(cached),
            _ => Ok(handle),
        }
    }

    fn search_order(&self, inherited: bool) -> Vec<Arc<ClassInfo>> {
        let mut classes = vec![self.info.clone()];
        if inherited {
            classes.extend(ancestors(self.runtime.as_ref(), &self.info));
        }
        classes
    }

    fn not_found(&self, query: &MemberQuery) -> ReflectError {
        ReflectError::MemberNotFound {
            class: self.info.name.clone(),
            query: query.to_string(),
        }
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.info.name)
            .field("superclass", &self.info.superclass)
            .finish_non_exhaustive()
    }
}
