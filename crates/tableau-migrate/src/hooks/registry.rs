//! Storage for values whose type is only known at the call site.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Map from a Rust type to values of that type.
///
/// Lists and single values live in separate slots, so `push::<V>` and
/// `insert::<V>` never collide.
#[derive(Default)]
pub struct TypedRegistry {
    slots: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the list of `V`s.
    pub fn push<V: Any + Send + Sync>(&mut self, value: V) {
        let slot = self
            .slots
            .entry(TypeId::of::<Vec<V>>())
            .or_insert_with(|| Box::new(Vec::<V>::new()));
        if let Some(list) = slot.downcast_mut::<Vec<V>>() {
            list.push(value);
        }
    }

    /// Every `V` pushed so far, in registration order.
    pub fn list<V: Any + Send + Sync>(&self) -> &[V] {
        self.slots
            .get(&TypeId::of::<Vec<V>>())
            .and_then(|slot| slot.downcast_ref::<Vec<V>>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Store the single `V`, replacing any earlier one.
    pub fn insert<V: Any + Send + Sync>(&mut self, value: V) {
        self.slots.insert(TypeId::of::<V>(), Box::new(value));
    }

    pub fn get<V: Any + Send + Sync>(&self) -> Option<&V> {
        self.slots
            .get(&TypeId::of::<V>())
            .and_then(|slot| slot.downcast_ref::<V>())
    }
}

impl std::fmt::Debug for TypedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRegistry")
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_are_per_type() {
        let mut registry = TypedRegistry::new();
        registry.push(1u32);
        registry.push(2u32);
        registry.push("a");

        assert_eq!(registry.list::<u32>(), &[1, 2]);
        assert_eq!(registry.list::<&str>(), &["a"]);
        assert!(registry.list::<u64>().is_empty());
    }

    #[test]
    fn test_single_values_do_not_collide_with_lists() {
        let mut registry = TypedRegistry::new();
        registry.push(1u32);
        registry.insert(7u32);
        registry.insert(8u32);

        assert_eq!(registry.get::<u32>(), Some(&8));
        assert_eq!(registry.list::<u32>(), &[1]);
        assert!(registry.get::<u64>().is_none());
    }
}
