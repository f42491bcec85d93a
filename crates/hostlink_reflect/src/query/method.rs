use super::{params_match, render, render_params, CommonFilter};
use crate::comparable::ComparableType;
use crate::descriptor::ClassDescriptor;
use crate::error::Result;
use crate::handle::MethodHandle;
use crate::host::{HostRuntime, MethodInfo};
use std::fmt;
use tracing::{debug, warn};

/// Structural query for a method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MethodQuery {
    pub common: CommonFilter,
    pub return_type: Option<ComparableType>,
    pub params: Option<Vec<ComparableType>>,
}

impl MethodQuery {
    /// A method query must pin at least a name, a return type or a
    /// parameter list; anything looser would match arbitrary methods.
    pub fn is_complete(&self) -> bool {
        self.common.name.is_some() || self.return_type.is_some() || self.params.is_some()
    }

    pub fn matches(&self, runtime: &dyn HostRuntime, method: &MethodInfo) -> bool {
        if !self.common.matches(Some(&method.name), &method.modifiers) {
            return false;
        }
        if let Some(ret) = &self.return_type {
            if !ret.matches(runtime, &method.return_type) {
                return false;
            }
        }
        match &self.params {
            Some(params) => params_match(runtime, params, &method.parameters),
            None => true,
        }
    }
}

impl fmt::Display for MethodQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ret) = &self.return_type {
            parts.push(format!("returns={ret}"));
        }
        if let Some(params) = &self.params {
            parts.push(render_params(params));
        }
        self.common.describe(&mut parts);
        render("method", parts, f)
    }
}

/// Fluent builder that locates a method on one class.
#[derive(Debug, Clone)]
pub struct MethodLocator<'d> {
    descriptor: &'d ClassDescriptor,
    query: MethodQuery,
}

impl<'d> MethodLocator<'d> {
    pub(crate) fn new(descriptor: &'d ClassDescriptor) -> Self {
        Self {
            descriptor,
            query: MethodQuery::default(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.query.common.set_name(name);
        self
    }

    pub fn returns(mut self, ty: impl Into<ComparableType>) -> Self {
        self.query.return_type = Some(ty.into());
        self
    }

    pub fn with_params<I, T>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ComparableType>,
    {
        self.query.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_params(mut self) -> Self {
        self.query.params = Some(Vec::new());
        self
    }

    pub fn inherited(mut self) -> Self {
        self.query.common.inherited = true;
        self
    }

    pub fn is_static(mut self, is_static: bool) -> Self {
        self.query.common.is_static = Some(is_static);
        self
    }

    pub fn is_public(mut self, is_public: bool) -> Self {
        self.query.common.is_public = Some(is_public);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.query.common.skip = n;
        self
    }

    pub fn query(&self) -> &MethodQuery {
        &self.query
    }

    pub fn required(self) -> Result<MethodHandle> {
        self.descriptor.resolve_method(self.query)
    }

    /// Like [`required`](Self::required) but yields `None` on any failure.
    /// Incomplete queries are a programming error and are logged louder.
    pub fn optional(self) -> Option<MethodHandle> {
        let class = self.descriptor.name().to_string();
        if !self.query.is_complete() {
            warn!("⚠️ Incomplete method query on {}: {}", class, self.query);
            return None;
        }
        self.required()
            .map_err(|e| debug!("🔍 Optional method on {} absent: {}", class, e))
            .ok()
    }
}
