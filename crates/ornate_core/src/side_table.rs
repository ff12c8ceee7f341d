//! Per-instance side tables
//!
//! Transformers are shared between every instance of a class (and between
//! classes), so any per-instance state they need (fallback values, handler
//! slots, skip flags) lives in an [`InstanceTable`] keyed by instance
//! identity. Entries hold a weak back-reference to their instance and are
//! pruned once the instance is gone.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Weak;

use crate::element::{Element, ElementInner, InstanceId};

struct Entry<V> {
    owner: Weak<ElementInner>,
    value: V,
}

/// Identity-keyed map with weak retention of its keys
pub struct InstanceTable<V> {
    entries: RefCell<FxHashMap<InstanceId, Entry<V>>>,
}

impl<V> Default for InstanceTable<V> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(FxHashMap::default()),
        }
    }
}

impl<V> InstanceTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value for an instance, replacing any previous one
    pub fn set(&self, element: &Element, value: V) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, entry| entry.owner.strong_count() > 0);
        entries.insert(
            element.id(),
            Entry {
                owner: element.downgrade_inner(),
                value,
            },
        );
    }

    /// Remove and return the value for an instance
    pub fn take(&self, element: &Element) -> Option<V> {
        self.entries
            .borrow_mut()
            .remove(&element.id())
            .map(|entry| entry.value)
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.entries.borrow().contains_key(&element.id())
    }

    /// Run `f` against the stored value, if any
    pub fn with<R>(&self, element: &Element, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.entries
            .borrow()
            .get(&element.id())
            .map(|entry| f(&entry.value))
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.owner.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> InstanceTable<V> {
    pub fn get(&self, element: &Element) -> Option<V> {
        self.with(element, V::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[test]
    fn test_values_are_per_instance() {
        let class = ClassBuilder::new("Plain").build().unwrap();
        let a = class.create().unwrap();
        let b = class.create().unwrap();
        let table = InstanceTable::new();

        table.set(&a, "a".to_string());
        assert_eq!(table.get(&a).as_deref(), Some("a"));
        assert_eq!(table.get(&b), None);

        table.set(&b, "b".to_string());
        assert_eq!(table.take(&a).as_deref(), Some("a"));
        assert!(!table.contains(&a));
        assert!(table.contains(&b));
    }

    #[test]
    fn test_dropped_instances_are_not_retained() {
        let class = ClassBuilder::new("Plain").build().unwrap();
        let table = InstanceTable::new();
        {
            let short_lived = class.create().unwrap();
            table.set(&short_lived, 1u32);
            assert_eq!(table.len(), 1);
        }
        assert!(table.is_empty());

        let survivor = class.create().unwrap();
        table.set(&survivor, 2u32);
        assert_eq!(table.entries.borrow().len(), 1);
    }
}
