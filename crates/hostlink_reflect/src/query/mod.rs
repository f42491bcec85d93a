//! Structural member queries.
//!
//! A query is an immutable value: every builder call returns an updated copy
//! and the finished query doubles as the cache key for the handle it
//! resolves to. Queries never mention the class they run against; the
//! locators in this module pair them with a descriptor.

mod constructor;
mod field;
mod method;
mod walk;

pub use constructor::{ConstructorLocator, ConstructorQuery};
pub use field::{ContainerFilter, FieldLocator, FieldQuery};
pub use method::{MethodLocator, MethodQuery};

pub(crate) use walk::walk;

use crate::comparable::ComparableType;
use crate::host::{HostRuntime, HostType, Modifiers};
use compact_str::CompactString;
use std::fmt;

/// A structural query of any member kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberQuery {
    Field(FieldQuery),
    Method(MethodQuery),
    Constructor(ConstructorQuery),
}

impl fmt::Display for MemberQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberQuery::Field(q) => q.fmt(f),
            MemberQuery::Method(q) => q.fmt(f),
            MemberQuery::Constructor(q) => q.fmt(f),
        }
    }
}

/// Constraints shared by every member kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommonFilter {
    /// Lowercased, compared case-insensitively.
    pub name: Option<CompactString>,
    pub inherited: bool,
    pub is_static: Option<bool>,
    pub is_public: Option<bool>,
    pub skip: usize,
}

impl CommonFilter {
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = Some(CompactString::from(name.to_lowercase()));
    }

    pub(crate) fn matches(&self, name: Option<&str>, modifiers: &Modifiers) -> bool {
        if let Some(expected) = &self.name {
            match name {
                Some(actual) if actual.to_lowercase() == expected.as_str() => {}
                _ => return false,
            }
        }
        if self.is_static.is_some_and(|s| s != modifiers.is_static) {
            return false;
        }
        if self.is_public.is_some_and(|p| p != modifiers.is_public) {
            return false;
        }
        true
    }

    fn describe(&self, parts: &mut Vec<String>) {
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(s) = self.is_static {
            parts.push(if s { "static" } else { "instance" }.to_string());
        }
        if let Some(p) = self.is_public {
            parts.push(if p { "public" } else { "non-public" }.to_string());
        }
        if self.inherited {
            parts.push("inherited".to_string());
        }
        if self.skip > 0 {
            parts.push(format!("skip={}", self.skip));
        }
    }
}

/// Parameter sequences must have equal length and match position by position.
pub(crate) fn params_match(runtime: &dyn HostRuntime, expected: &[ComparableType], actual: &[HostType]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(want, have)| want.matches(runtime, have))
}

pub(crate) fn render(kind: &str, parts: Vec<String>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{kind}[{}]", parts.join(", "))
}

pub(crate) fn render_params(params: &[ComparableType]) -> String {
    let list: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("params=({})", list.join(", "))
}
