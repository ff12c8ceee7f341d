//! In-process host platform objects
//!
//! The core consumes a small platform surface: a string attribute table, a
//! once-only internals handle, plain data properties assigned before an
//! element is upgraded, and an event target. [`HostElement`] provides all
//! four without a browser.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{OrnateError, Result};
use crate::source::{DomEvent, EventListener, EventSource, EventTarget, ListenerId};

/// The platform half of an element
#[derive(Default)]
pub struct HostElement {
    attributes: RefCell<IndexMap<String, String>>,
    raw_properties: RefCell<FxHashMap<String, Rc<dyn Any>>>,
    internals_attached: Cell<bool>,
    events: EventSource,
}

impl HostElement {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name)
    }

    /// Set an attribute, returning its previous value
    ///
    /// This writes the table only; change notification is the element's job.
    pub fn set_attribute(&self, name: &str, value: &str) -> Option<String> {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string())
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow_mut().shift_remove(name)
    }

    /// Snapshot of all attributes in insertion order
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.attributes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Assign a plain data property, as code does before an element upgrades
    pub fn set_raw_property<T: 'static>(&self, name: &str, value: T) {
        self.raw_properties
            .borrow_mut()
            .insert(name.to_string(), Rc::new(value));
    }

    pub fn has_raw_property(&self, name: &str) -> bool {
        self.raw_properties.borrow().contains_key(name)
    }

    /// Read and delete a plain data property
    pub fn take_raw_property(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.raw_properties.borrow_mut().remove(name)
    }

    /// Low-level internals request: succeeds exactly once per host
    pub fn attach_internals(&self) -> Result<Rc<ElementInternals>> {
        if self.internals_attached.replace(true) {
            return Err(OrnateError::InternalsAttached);
        }
        Ok(Rc::new(ElementInternals::default()))
    }

    pub fn dispatch_event(&self, event: &DomEvent) -> usize {
        self.events.dispatch_event(event)
    }
}

impl EventTarget for HostElement {
    fn add_event_listener(&self, kind: &str, listener: EventListener) -> ListenerId {
        self.events.add_event_listener(kind, listener)
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.remove_event_listener(id)
    }
}

/// Custom states exposed for styling (`:state(name)`)
#[derive(Debug, Default)]
pub struct CustomStateSet {
    states: RefCell<IndexSet<String>>,
}

impl CustomStateSet {
    pub fn add(&self, name: &str) {
        self.states.borrow_mut().insert(name.to_string());
    }

    pub fn delete(&self, name: &str) -> bool {
        self.states.borrow_mut().shift_remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.states.borrow().contains(name)
    }

    /// Add or remove depending on `on`
    pub fn toggle(&self, name: &str, on: bool) {
        if on {
            self.add(name);
        } else {
            self.delete(name);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.states.borrow().iter().cloned().collect()
    }
}

/// Per-element internals handle
#[derive(Debug, Default)]
pub struct ElementInternals {
    states: CustomStateSet,
    form_value: RefCell<Option<String>>,
    validity_message: RefCell<Option<String>>,
}

impl ElementInternals {
    pub fn states(&self) -> &CustomStateSet {
        &self.states
    }

    pub fn set_form_value(&self, value: Option<String>) {
        *self.form_value.borrow_mut() = value;
    }

    pub fn form_value(&self) -> Option<String> {
        self.form_value.borrow().clone()
    }

    /// `None` marks the element valid
    pub fn set_validity(&self, message: Option<String>) {
        *self.validity_message.borrow_mut() = message;
    }

    pub fn is_valid(&self) -> bool {
        self.validity_message.borrow().is_none()
    }

    pub fn validation_message(&self) -> Option<String> {
        self.validity_message.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_table() {
        let host = HostElement::new();
        assert_eq!(host.get_attribute("foo"), None);
        assert_eq!(host.set_attribute("foo", "1"), None);
        assert_eq!(host.set_attribute("foo", "2"), Some("1".to_string()));
        host.set_attribute("bar", "");
        assert_eq!(
            host.attributes(),
            vec![("foo".to_string(), "2".to_string()), ("bar".to_string(), String::new())]
        );
        assert_eq!(host.remove_attribute("foo"), Some("2".to_string()));
        assert!(!host.has_attribute("foo"));
    }

    #[test]
    fn test_internals_attach_once() {
        let host = HostElement::new();
        assert!(host.attach_internals().is_ok());
        assert!(matches!(
            host.attach_internals(),
            Err(OrnateError::InternalsAttached)
        ));
    }

    #[test]
    fn test_raw_properties_are_taken_once() {
        let host = HostElement::new();
        host.set_raw_property("foo", 5.0f64);
        assert!(host.has_raw_property("foo"));
        let value = host.take_raw_property("foo").unwrap();
        assert_eq!(value.downcast_ref::<f64>(), Some(&5.0));
        assert!(host.take_raw_property("foo").is_none());
    }

    #[test]
    fn test_custom_states() {
        let internals = ElementInternals::default();
        internals.states().toggle("checked", true);
        assert!(internals.states().has("checked"));
        internals.states().toggle("checked", false);
        assert!(!internals.states().has("checked"));
        assert!(internals.is_valid());
        internals.set_validity(Some("required".into()));
        assert_eq!(internals.validation_message().as_deref(), Some("required"));
    }
}
