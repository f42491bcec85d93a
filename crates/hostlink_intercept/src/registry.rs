//! Modifier registrations, global and per identity.
//!
//! Each chain is a copy-on-write list: readers take a snapshot `Arc` and
//! iterate it without holding any lock, so a modifier may register or
//! unregister modifiers while a message is being processed.

use crate::modifier::{PacketModifier, Priority};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// One registered modifier.
#[derive(Clone)]
pub struct Registration {
    pub modifier: Arc<dyn PacketModifier>,
    pub priority: Priority,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:?}", self.modifier.name(), self.priority)
    }
}

/// Identity of a modifier: the address of its allocation.
fn same_modifier(a: &Arc<dyn PacketModifier>, b: &Arc<dyn PacketModifier>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// A priority-ordered modifier list.
#[derive(Default)]
pub struct ModifierChain {
    entries: RwLock<Arc<Vec<Registration>>>,
}

impl ModifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `modifier`. `High` entries go after the last `High` entry, `Low`
    /// entries at the end. Returns false if it is already registered.
    pub fn insert(&self, modifier: Arc<dyn PacketModifier>, priority: Priority) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|r| same_modifier(&r.modifier, &modifier)) {
            return false;
        }
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        let registration = Registration { modifier, priority };
        match priority {
            Priority::High => {
                let at = next
                    .iter()
                    .rposition(|r| r.priority == Priority::High)
                    .map_or(0, |i| i + 1);
                next.insert(at, registration);
            }
            Priority::Low => next.push(registration),
        }
        *entries = Arc::new(next);
        true
    }

    pub fn remove(&self, modifier: &Arc<dyn PacketModifier>) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|r| same_modifier(&r.modifier, modifier)) {
            return false;
        }
        let next: Vec<Registration> = entries
            .iter()
            .filter(|r| !same_modifier(&r.modifier, modifier))
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    pub fn contains(&self, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.entries.read().iter().any(|r| same_modifier(&r.modifier, modifier))
    }

    /// The current list; later changes do not affect it.
    pub fn snapshot(&self) -> Arc<Vec<Registration>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.entries.write() = Arc::new(Vec::new());
    }
}

/// All registrations of one interceptor.
#[derive(Default)]
pub struct ModifierRegistry {
    global: ModifierChain,
    specific: DashMap<Uuid, Arc<ModifierChain>>,
}

impl ModifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &ModifierChain {
        &self.global
    }

    /// The chain for `identity`, if anything was ever registered for it.
    pub fn specific(&self, identity: &Uuid) -> Option<Arc<ModifierChain>> {
        self.specific.get(identity).map(|c| c.clone())
    }

    pub fn register(&self, modifier: Arc<dyn PacketModifier>, priority: Priority) -> bool {
        self.global.insert(modifier, priority)
    }

    pub fn unregister(&self, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.global.remove(modifier)
    }

    pub fn register_for(&self, identity: Uuid, modifier: Arc<dyn PacketModifier>, priority: Priority) -> bool {
        self.specific
            .entry(identity)
            .or_insert_with(|| Arc::new(ModifierChain::new()))
            .clone()
            .insert(modifier, priority)
    }

    pub fn unregister_for(&self, identity: &Uuid, modifier: &Arc<dyn PacketModifier>) -> bool {
        let removed = match self.specific(identity) {
            Some(chain) => chain.remove(modifier),
            None => false,
        };
        self.specific.remove_if(identity, |_, chain| chain.is_empty());
        removed
    }

    pub fn is_registered_for(&self, identity: &Uuid, modifier: &Arc<dyn PacketModifier>) -> bool {
        self.specific(identity).is_some_and(|c| c.contains(modifier))
    }

    pub fn clear(&self) {
        self.global.clear();
        self.specific.clear();
    }
}
