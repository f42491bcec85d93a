//! Positional mapping between host enums and local mirror enums.
//!
//! Enum constant names are as unstable as class names, so a local mirror
//! enum declares the constants in the host's order and lookups go by
//! ordinal alone.

use crate::error::{ReflectError, Result};
use crate::host::{ClassName, Value};

/// A local enum that mirrors a host enum by declaration order.
///
/// Implemented by [`mirror_enum!`](crate::mirror_enum); a manual impl must
/// list every variant in `VARIANTS` in ordinal order.
pub trait MirrorEnum: Copy + 'static {
    const VARIANTS: &'static [Self];

    fn ordinal(self) -> usize;

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::VARIANTS.get(ordinal).copied()
    }
}

/// Declares a fieldless enum and implements [`MirrorEnum`] for it.
///
/// ```
/// hostlink_reflect::mirror_enum! {
///     pub enum ChatPosition { Chat, System, ActionBar }
/// }
/// use hostlink_reflect::MirrorEnum;
/// assert_eq!(ChatPosition::ActionBar.ordinal(), 2);
/// ```
#[macro_export]
macro_rules! mirror_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::enums::MirrorEnum for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn ordinal(self) -> usize {
                self as usize
            }
        }
    };
}

/// Live constants of one host enum, in ordinal order.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    class: ClassName,
    constants: Vec<Value>,
}

impl EnumDescriptor {
    pub(crate) fn new(class: ClassName, constants: Vec<Value>) -> Self {
        Self { class, constants }
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn get_by_ordinal(&self, ordinal: usize) -> Result<Value> {
        self.constants
            .get(ordinal)
            .cloned()
            .ok_or_else(|| ReflectError::EnumConstantMissing {
                class: self.class.clone(),
                ordinal,
            })
    }

    pub fn get_by_copy<E: MirrorEnum>(&self, mirror: E) -> Result<Value> {
        self.get_by_ordinal(mirror.ordinal())
    }

    /// Ordinal of a live constant, if it belongs to this enum.
    pub fn ordinal_of(&self, value: &Value) -> Option<usize> {
        self.constants.iter().position(|c| c == value)
    }

    /// Maps a live constant back to its mirror variant.
    pub fn to_mirror<E: MirrorEnum>(&self, value: &Value) -> Option<E> {
        self.ordinal_of(value).and_then(E::from_ordinal)
    }

    /// Fails when the host enum has fewer constants than the mirror.
    pub fn check_mirror<E: MirrorEnum>(&self) -> Result<()> {
        if self.constants.len() < E::VARIANTS.len() {
            return Err(ReflectError::EnumConstantMissing {
                class: self.class.clone(),
                ordinal: self.constants.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ObjectRef;

    crate::mirror_enum! {
        enum Direction { North, East, South }
    }

    fn host_enum(n: usize) -> EnumDescriptor {
        let constants = (0..n)
            .map(|i| Value::Object(ObjectRef::new("host.Direction", i)))
            .collect();
        EnumDescriptor::new("host.Direction".into(), constants)
    }

    #[test]
    fn ordinals_within_mirror_resolve() {
        let desc = host_enum(4);
        desc.check_mirror::<Direction>().unwrap();
        for variant in Direction::VARIANTS {
            let value = desc.get_by_copy(*variant).unwrap();
            assert_eq!(desc.to_mirror::<Direction>(&value), Some(*variant));
        }
    }

    #[test]
    fn ordinal_past_end_is_missing() {
        let desc = host_enum(3);
        desc.check_mirror::<Direction>().unwrap();
        assert_eq!(
            desc.get_by_ordinal(3),
            Err(ReflectError::EnumConstantMissing {
                class: "host.Direction".into(),
                ordinal: 3
            })
        );
    }

    #[test]
    fn short_host_enum_fails_mirror_check() {
        assert!(host_enum(2).check_mirror::<Direction>().is_err());
    }
}
