use super::{params_match, render, render_params, CommonFilter};
use crate::comparable::ComparableType;
use crate::descriptor::ClassDescriptor;
use crate::error::Result;
use crate::handle::ConstructorHandle;
use crate::host::{ConstructorInfo, HostRuntime};
use std::fmt;
use tracing::debug;

/// Structural query for a constructor.
///
/// Constructors are never inherited and have no name, so only the
/// parameter list, the modifier filters and the skip count apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConstructorQuery {
    pub common: CommonFilter,
    pub params: Option<Vec<ComparableType>>,
}

impl ConstructorQuery {
    pub fn matches(&self, runtime: &dyn HostRuntime, constructor: &ConstructorInfo) -> bool {
        if !self.common.matches(None, &constructor.modifiers) {
            return false;
        }
        match &self.params {
            Some(params) => params_match(runtime, params, &constructor.parameters),
            None => true,
        }
    }
}

impl fmt::Display for ConstructorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(params) = &self.params {
            parts.push(render_params(params));
        }
        self.common.describe(&mut parts);
        render("constructor", parts, f)
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorLocator<'d> {
    descriptor: &'d ClassDescriptor,
    query: ConstructorQuery,
}

impl<'d> ConstructorLocator<'d> {
    pub(crate) fn new(descriptor: &'d ClassDescriptor) -> Self {
        Self {
            descriptor,
            query: ConstructorQuery::default(),
        }
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

    pub fn is_public(mut self, is_public: bool) -> Self {
        self.query.common.is_public = Some(is_public);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.query.common.skip = n;
        self
    }

    pub fn query(&self) -> &ConstructorQuery {
        &self.query
    }

    pub fn required(self) -> Result<ConstructorHandle> {
        self.descriptor.resolve_constructor(self.query)
    }

    pub fn optional(self) -> Option<ConstructorHandle> {
        let class = self.descriptor.name().to_string();
        self.required()
            .map_err(|e| debug!("🔍 Optional constructor on {} absent: {}", class, e))
            .ok()
    }
}
