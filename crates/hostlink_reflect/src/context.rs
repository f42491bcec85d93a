//! The reflection context: class resolution and the descriptor arena.

use crate::catalog::{ClassCatalog, SymbolicId};
use crate::descriptor::{ClassDescriptor, HandleCache};
use crate::enums::{EnumDescriptor, MirrorEnum};
use crate::error::{ReflectError, Result};
use crate::host::{ClassName, HostRuntime, ObjectRef};
use crate::version::HostVersion;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

struct ContextInner {
    runtime: Arc<dyn HostRuntime>,
    catalog: ClassCatalog,
    version: HostVersion,
    /// Descriptor arena keyed by real class name.
    classes: DashMap<ClassName, Arc<ClassDescriptor>>,
    /// Symbolic id to the real name it resolved to.
    resolved: DashMap<SymbolicId, ClassName>,
    handles: Arc<HandleCache>,
}

/// Owns every cache of the resolution engine for one host.
///
/// Cheap to clone; clones share the same caches. Independent contexts never
/// share state, so several hosts (or tests) can coexist in one process.
#[derive(Clone)]
pub struct ReflectionContext {
    inner: Arc<ContextInner>,
}

impl ReflectionContext {
    /// Creates a context for `runtime`, selecting candidate class names from
    /// `catalog` according to `version`.
    pub fn new(runtime: Arc<dyn HostRuntime>, catalog: ClassCatalog, version: HostVersion) -> Self {
        info!(
            "🔧 Reflection context ready for host {} ({} catalog entries)",
            version,
            catalog.len()
        );
        Self {
            inner: Arc::new(ContextInner {
                runtime,
                catalog,
                version,
                classes: DashMap::new(),
                resolved: DashMap::new(),
                handles: Arc::new(HandleCache::default()),
            }),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn HostRuntime> {
        &self.inner.runtime
    }

    pub fn version(&self) -> &HostVersion {
        &self.inner.version
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.inner.catalog
    }

    /// Resolves a symbolic id to a descriptor, trying each candidate name the
    /// catalog selects for this version in order.
    ///
    /// # Errors
    ///
    /// [`ReflectError::ClassNotFound`] listing every name tried.
    pub fn resolve_class(&self, id: &str) -> Result<Arc<ClassDescriptor>> {
        if let Some(real) = self.inner.resolved.get(id).map(|r| r.clone()) {
            if let Some(descriptor) = self.inner.classes.get(&real) {
                return Ok(descriptor.clone());
            }
        }

        let candidates = self.inner.catalog.candidates(id, &self.inner.version);
        for name in &candidates {
            if let Some(info) = self.inner.runtime.find_class(name) {
                debug!("🔎 Resolved '{}' to {}", id, info.name);
                let descriptor = self.arena_entry(info);
                self.inner
                    .resolved
                    .insert(SymbolicId::from(id), ClassName::from(descriptor.name()));
                return Ok(descriptor);
            }
        }

        Err(ReflectError::ClassNotFound {
            id: SymbolicId::from(id),
            candidates,
        })
    }

    /// Like [`resolve_class`](Self::resolve_class) for version-dependent
    /// classes that may not exist at all.
    pub fn resolve_class_optional(&self, id: &str) -> Option<Arc<ClassDescriptor>> {
        self.resolve_class(id)
            .map_err(|e| debug!("🔍 Optional class absent: {}", e))
            .ok()
    }

    /// Descriptor for a real class name reached by navigation rather than
    /// through the catalog.
    pub fn describe(&self, real_name: &str) -> Result<Arc<ClassDescriptor>> {
        if let Some(descriptor) = self.inner.classes.get(real_name) {
            return Ok(descriptor.clone());
        }
        match self.inner.runtime.find_class(real_name) {
            Some(info) => Ok(self.arena_entry(info)),
            None => Err(ReflectError::ClassNotFound {
                id: SymbolicId::from(real_name),
                candidates: vec![real_name.to_string()],
            }),
        }
    }

    /// Descriptor for the runtime class of a live object.
    pub fn describe_object(&self, object: &ObjectRef) -> Result<Arc<ClassDescriptor>> {
        self.describe(object.class_name())
    }

    /// Resolves an enum class and verifies it covers every variant of the
    /// mirror `E`.
    pub fn resolve_enum<E: MirrorEnum>(&self, id: &str) -> Result<Arc<EnumDescriptor>> {
        let descriptor = self.resolve_class(id)?.as_enum()?;
        descriptor.check_mirror::<E>()?;
        Ok(descriptor)
    }

    /// Number of distinct handles resolved so far.
    pub fn cached_handles(&self) -> usize {
        self.inner.handles.len()
    }

    fn arena_entry(&self, info: Arc<crate::host::ClassInfo>) -> Arc<ClassDescriptor> {
        self.inner
            .classes
            .entry(info.name.clone())
            .or_insert_with(|| {
                Arc::new(ClassDescriptor::new(
                    info,
                    self.inner.runtime.clone(),
                    self.inner.handles.clone(),
                ))
            })
            .clone()
    }
}

impl std::fmt::Debug for ReflectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionContext")
            .field("version", &self.inner.version)
            .field("classes", &self.inner.classes.len())
            .finish_non_exhaustive()
    }
}
