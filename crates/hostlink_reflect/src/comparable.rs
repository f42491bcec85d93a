//! Type constraints used by structural queries.

use crate::host::{is_assignable_from, HostRuntime, HostType, Primitive};
use std::fmt;

/// How a member's declared type is compared with the query's type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Assignability {
    /// Types must be equal.
    #[default]
    Exact,
    /// A value of the query type can be stored in the member's type, i.e.
    /// the member type is the query type or one of its supertypes.
    SourceToTarget,
    /// A value of the member's type can be stored as the query type, i.e.
    /// the member type is the query type or one of its subtypes.
    TargetToSource,
}

/// A type constraint: base type, boxing tolerance and assignability mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparableType {
    pub ty: HostType,
    pub ignore_boxing: bool,
    pub assignability: Assignability,
}

impl ComparableType {
    pub fn exact(ty: impl Into<HostType>) -> Self {
        Self {
            ty: ty.into(),
            ignore_boxing: false,
            assignability: Assignability::Exact,
        }
    }

    pub fn ignoring_boxing(mut self) -> Self {
        self.ignore_boxing = true;
        self
    }

    pub fn with_assignability(mut self, assignability: Assignability) -> Self {
        self.assignability = assignability;
        self
    }

    /// Matches member types the query type can be assigned into.
    pub fn supertype_of(ty: impl Into<HostType>) -> Self {
        Self::exact(ty).with_assignability(Assignability::SourceToTarget)
    }

    /// Matches member types that are the query type or a subtype of it.
    pub fn subtype_of(ty: impl Into<HostType>) -> Self {
        Self::exact(ty).with_assignability(Assignability::TargetToSource)
    }

    /// Whether a member declared with `member` satisfies this constraint.
    pub fn matches(&self, runtime: &dyn HostRuntime, member: &HostType) -> bool {
        let (query, member) = if self.ignore_boxing {
            (self.ty.unboxed(), member.unboxed())
        } else {
            (self.ty.clone(), member.clone())
        };
        match self.assignability {
            Assignability::Exact => query == member,
            Assignability::SourceToTarget => is_assignable_from(runtime, &member, &query),
            Assignability::TargetToSource => is_assignable_from(runtime, &query, &member),
        }
    }
}

impl From<HostType> for ComparableType {
    fn from(ty: HostType) -> Self {
        Self::exact(ty)
    }
}

impl From<Primitive> for ComparableType {
    fn from(p: Primitive) -> Self {
        Self::exact(p)
    }
}

impl fmt::Display for ComparableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.assignability {
            Assignability::Exact => write!(f, "{}", self.ty)?,
            Assignability::SourceToTarget => write!(f, "super {}", self.ty)?,
            Assignability::TargetToSource => write!(f, "extends {}", self.ty)?,
        }
        if self.ignore_boxing {
            f.write_str(" (boxing ignored)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClassInfo, MemoryHost};

    fn host() -> MemoryHost {
        let host = MemoryHost::new();
        host.define(ClassInfo::builder("host.Animal").build());
        host.define(ClassInfo::builder("host.Dog").extends("host.Animal").build());
        host
    }

    #[test]
    fn exact_requires_equality() {
        let host = host();
        let q = ComparableType::exact(HostType::class("host.Animal"));
        assert!(q.matches(&host, &HostType::class("host.Animal")));
        assert!(!q.matches(&host, &HostType::class("host.Dog")));
    }

    #[test]
    fn assignability_directions() {
        let host = host();
        let dog = HostType::class("host.Dog");
        let animal = HostType::class("host.Animal");

        assert!(ComparableType::supertype_of(dog.clone()).matches(&host, &animal));
        assert!(!ComparableType::supertype_of(animal.clone()).matches(&host, &dog));
        assert!(ComparableType::subtype_of(animal).matches(&host, &dog));
    }

    #[test]
    fn boxing_is_optional() {
        let host = host();
        let boxed = HostType::Boxed(Primitive::Int);
        let q = ComparableType::exact(Primitive::Int);
        assert!(!q.matches(&host, &boxed));
        assert!(q.ignoring_boxing().matches(&host, &boxed));
    }
}
