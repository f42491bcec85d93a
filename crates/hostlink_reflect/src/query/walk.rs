use crate::host::ClassInfo;
use std::sync::Arc;

/// Walks `classes` in order (most-derived first) and returns the member
/// selected by `skip`.
///
/// Every member accepted while the counter is still below `skip` bumps the
/// counter and is passed over. The counter is shared across the whole walk,
/// so decoys declared on a subclass count against matches on its ancestors.
pub(crate) fn walk<M>(
    classes: &[Arc<ClassInfo>],
    members: impl Fn(&ClassInfo) -> &[Arc<M>],
    skip: usize,
    mut accept: impl FnMut(&M) -> bool,
) -> Option<Arc<M>> {
    let mut skipped = 0;
    for class in classes {
        for member in members(class) {
            if !accept(member) {
                continue;
            }
            if skipped < skip {
                skipped += 1;
                continue;
            }
            return Some(member.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FieldInfo, HostType, Modifiers, Primitive};

    fn classes() -> Vec<Arc<ClassInfo>> {
        let child = ClassInfo::builder("host.Child")
            .field("a", Primitive::Int.into(), Modifiers::private())
            .field("b", HostType::class("host.Text"), Modifiers::private())
            .build();
        let parent = ClassInfo::builder("host.Parent")
            .field("c", Primitive::Int.into(), Modifiers::private())
            .build();
        vec![Arc::new(child), Arc::new(parent)]
    }

    #[test]
    fn skip_counter_spans_ancestors() {
        let classes = classes();
        let ints = |skip| {
            walk(&classes, |c| c.fields.as_slice(), skip, |f: &FieldInfo| f.ty == HostType::Primitive(Primitive::Int))
                .map(|f| f.name.to_string())
        };
        assert_eq!(ints(0).as_deref(), Some("a"));
        assert_eq!(ints(1).as_deref(), Some("c"));
        assert_eq!(ints(2), None);
    }
}
