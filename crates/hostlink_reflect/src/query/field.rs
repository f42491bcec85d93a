use super::{render, CommonFilter};
use crate::comparable::{Assignability, ComparableType};
use crate::descriptor::ClassDescriptor;
use crate::error::Result;
use crate::handle::FieldHandle;
use crate::host::{FieldInfo, HostRuntime, HostType};
use std::fmt;
use tracing::debug;

/// Constraint on the generic arguments of a container-typed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerFilter {
    Single(ComparableType),
    KeyValue(ComparableType, ComparableType),
}

impl ContainerFilter {
    fn matches(&self, runtime: &dyn HostRuntime, args: &[HostType]) -> bool {
        match (self, args) {
            (ContainerFilter::Single(element), [arg]) => element.matches(runtime, arg),
            (ContainerFilter::KeyValue(key, value), [k, v]) => {
                key.matches(runtime, k) && value.matches(runtime, v)
            }
            _ => false,
        }
    }
}

/// Structural query for a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldQuery {
    pub common: CommonFilter,
    pub ty: Option<ComparableType>,
    pub container: Option<ContainerFilter>,
}

impl FieldQuery {
    pub fn matches(&self, runtime: &dyn HostRuntime, field: &FieldInfo) -> bool {
        if !self.common.matches(Some(&field.name), &field.modifiers) {
            return false;
        }
        if let Some(ty) = &self.ty {
            if !ty.matches(runtime, &field.ty) {
                return false;
            }
        }
        match &self.container {
            Some(filter) => filter.matches(runtime, &field.generic_args),
            None => true,
        }
    }
}

impl fmt::Display for FieldQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ty) = &self.ty {
            parts.push(format!("type={ty}"));
        }
        match &self.container {
            Some(ContainerFilter::Single(e)) => parts.push(format!("element={e}")),
            Some(ContainerFilter::KeyValue(k, v)) => parts.push(format!("key={k}, value={v}")),
            None => {}
        }
        self.common.describe(&mut parts);
        render("field", parts, f)
    }
}

/// Fluent builder that locates a field on one class.
///
/// ```ignore
/// let list = server_connection
///     .locate_field()
///     .of_type(HostType::class("java.util.List"))
///     .with_generic(HostType::class("host.NetworkManager"))
///     .required()?;
/// ```
#[derive(Debug, Clone)]
pub struct FieldLocator<'d> {
    descriptor: &'d ClassDescriptor,
    query: FieldQuery,
}

impl<'d> FieldLocator<'d> {
    pub(crate) fn new(descriptor: &'d ClassDescriptor) -> Self {
        Self {
            descriptor,
            query: FieldQuery::default(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.query.common.set_name(name);
        self
    }

    pub fn of_type(mut self, ty: impl Into<ComparableType>) -> Self {
        self.query.ty = Some(ty.into());
        self
    }

    /// Includes fields declared on superclasses.
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

    pub fn with_element(mut self, element: impl Into<ComparableType>) -> Self {
        self.query.container = Some(ContainerFilter::Single(element.into()));
        self
    }

    /// Element type filter that also accepts subtypes of `element`.
    pub fn with_generic(self, element: HostType) -> Self {
        self.with_element(ComparableType::exact(element).with_assignability(Assignability::TargetToSource))
    }

    pub fn with_key_value(mut self, key: impl Into<ComparableType>, value: impl Into<ComparableType>) -> Self {
        self.query.container = Some(ContainerFilter::KeyValue(key.into(), value.into()));
        self
    }

    /// Selects the (n+1)-th matching field.
    pub fn skip(mut self, n: usize) -> Self {
        self.query.common.skip = n;
        self
    }

    pub fn query(&self) -> &FieldQuery {
        &self.query
    }

    pub fn required(self) -> Result<FieldHandle> {
        self.descriptor.resolve_field(self.query)
    }

    pub fn optional(self) -> Option<FieldHandle> {
        let class = self.descriptor.name().to_string();
        self.required()
            .map_err(|e| debug!("🔍 Optional field on {} absent: {}", class, e))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClassInfo, MemoryHost, Modifiers};

    #[test]
    fn container_filter_checks_arity() {
        let host = MemoryHost::new();
        let info = ClassInfo::builder("host.Holder")
            .generic_field(
                "entries",
                HostType::class("java.util.Map"),
                vec![HostType::class("java.lang.String"), HostType::class("host.Item")],
                Modifiers::private(),
            )
            .build();
        let field = &info.fields[0];

        let single = FieldQuery {
            container: Some(ContainerFilter::Single(HostType::class("host.Item").into())),
            ..Default::default()
        };
        assert!(!single.matches(&host, field));

        let pair = FieldQuery {
            container: Some(ContainerFilter::KeyValue(
                HostType::class("java.lang.String").into(),
                HostType::class("host.Item").into(),
            )),
            ..Default::default()
        };
        assert!(pair.matches(&host, field));
    }

    #[test]
    fn names_compare_case_insensitively() {
        let host = MemoryHost::new();
        let info = ClassInfo::builder("host.Holder")
            .field("networkManagers", HostType::class("java.util.List"), Modifiers::private())
            .build();
        let mut query = FieldQuery::default();
        query.common.set_name("NETWORKMANAGERS");
        assert!(query.matches(&host, &info.fields[0]));
    }
}
