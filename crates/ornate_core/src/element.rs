//! Element instances
//!
//! An [`Element`] pairs a [`HostElement`] (the platform object) with the
//! [`ElementClass`] it was constructed or upgraded as. It owns the
//! per-instance slots the core needs: the event bus, the init token, the
//! managed field storage and the cached internals handle.
//!
//! The lifecycle drivers (`connect`, `disconnect`, `set_attribute`, ...)
//! stand in for the platform invoking custom element callbacks: each one
//! calls every class level's [`Lifecycle`](crate::lifecycle::Lifecycle)
//! from base to most derived.

use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bus::{EventBus, RestoreReason};
use crate::class::ElementClass;
use crate::error::{OrnateError, Result};
use crate::host::{ElementInternals, HostElement};
use crate::lifecycle::InitToken;
use crate::method::Payload;
use crate::source::{DomEvent, EventListener, EventTarget, ListenerId};

/// Identity of one element instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-instance record behind an [`Element`] handle
pub struct ElementInner {
    id: InstanceId,
    class: Rc<ElementClass>,
    host: Rc<HostElement>,
    bus: OnceCell<EventBus>,
    init_token: Cell<Option<InitToken>>,
    values: RefCell<FxHashMap<String, Rc<dyn Any>>>,
    internals: RefCell<Option<Rc<ElementInternals>>>,
    connected: Cell<bool>,
}

/// A constructed element (cheap to clone)
#[derive(Clone)]
pub struct Element(Rc<ElementInner>);

/// Non-owning element handle for long-lived callbacks
#[derive(Clone)]
pub struct WeakElement {
    id: InstanceId,
    inner: Weak<ElementInner>,
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.inner.upgrade().map(Element)
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }
}

impl PartialEq for WeakElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WeakElement {}

impl Hash for WeakElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.0.id)
            .field("class", &self.0.class.name())
            .field("connected", &self.0.connected.get())
            .finish()
    }
}

impl Element {
    pub(crate) fn new(class: Rc<ElementClass>, host: Rc<HostElement>) -> Self {
        Element(Rc::new(ElementInner {
            id: InstanceId::next(),
            class,
            host,
            bus: OnceCell::new(),
            init_token: Cell::new(None),
            values: RefCell::new(FxHashMap::default()),
            internals: RefCell::new(None),
            connected: Cell::new(false),
        }))
    }

    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    pub fn class(&self) -> &Rc<ElementClass> {
        &self.0.class
    }

    pub fn host(&self) -> &Rc<HostElement> {
        &self.0.host
    }

    /// The element's bus, created on first use
    pub fn bus(&self) -> &EventBus {
        self.0.bus.get_or_init(EventBus::new)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            id: self.0.id,
            inner: Rc::downgrade(&self.0),
        }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<ElementInner> {
        Rc::downgrade(&self.0)
    }

    pub fn is_connected(&self) -> bool {
        self.0.connected.get()
    }

    // =========================================================================
    // INIT TOKEN
    // =========================================================================

    /// Token of the last enhanced constructor that completed
    pub fn init_token(&self) -> Option<InitToken> {
        self.0.init_token.get()
    }

    pub(crate) fn stamp_init_token(&self, token: InitToken) {
        self.0.init_token.set(Some(token));
    }

    /// True once the most derived enhanced constructor has completed
    pub fn is_initialized(&self) -> bool {
        let expected = self.class().init_token();
        expected.is_some() && self.init_token() == expected
    }

    // =========================================================================
    // FIELD STORAGE
    // =========================================================================

    pub(crate) fn read_value<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.0
            .values
            .borrow()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    pub(crate) fn write_value<T: 'static>(&self, key: &str, value: T) {
        self.0
            .values
            .borrow_mut()
            .insert(key.to_string(), Rc::new(value));
    }

    /// Read a managed field by property name
    pub fn get_property<T: 'static>(&self, key: &str) -> Result<T> {
        let entry = self.class().field(key).ok_or_else(|| self.unknown_property(key))?;
        entry
            .field()
            .get_any(self)
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| OrnateError::TypeMismatch {
                key: key.to_string(),
                expected: entry.field().type_name(),
            })
    }

    /// Write a managed field by property name, through its setter
    pub fn set_property<T: 'static>(&self, key: &str, value: T) -> Result<()> {
        let entry = self.class().field(key).ok_or_else(|| self.unknown_property(key))?;
        entry.field().set_any(self, Box::new(value))
    }

    fn unknown_property(&self, key: &str) -> OrnateError {
        OrnateError::UnknownProperty {
            key: key.to_string(),
            class: self.class().name().to_string(),
        }
    }

    // =========================================================================
    // METHODS
    // =========================================================================

    /// Call the public (possibly debounced) method registered under `name`
    pub fn call_method(&self, name: &str, payload: Payload) {
        match self.class().resolve_method(name) {
            Some(method) => method(self, &payload),
            None => tracing::warn!(
                "no method `{}` on class `{}`",
                name,
                self.class().name()
            ),
        }
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.0.host.get_attribute(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.host.has_attribute(name)
    }

    /// Set an attribute, delivering attribute-changed for observed names
    pub fn set_attribute(&self, name: &str, value: &str) {
        let old = self.0.host.set_attribute(name, value);
        if self.class().observes(name) {
            self.attribute_changed_callback(name, old.as_deref(), Some(value));
        }
    }

    /// Remove an attribute; absent attributes produce no notification
    pub fn remove_attribute(&self, name: &str) {
        let Some(old) = self.0.host.remove_attribute(name) else {
            return;
        };
        if self.class().observes(name) {
            self.attribute_changed_callback(name, Some(&old), None);
        }
    }

    pub(crate) fn attribute_changed_callback(
        &self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        tracing::trace!(
            "attribute `{}` changed on {:?}: {:?} -> {:?}",
            name,
            self.id(),
            old,
            new
        );
        for level in self.class().levels() {
            let lifecycle = level.lifecycle();
            // Enhanced levels filter for their author themselves; plain
            // levels only hear the names they declared
            let wanted = lifecycle.enhancement().is_some()
                || lifecycle.observed_attributes().iter().any(|n| n == name);
            if wanted {
                lifecycle.attribute_changed(self, name, old, new);
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Low-level internals request; fails if internals were already handed out
    pub fn attach_internals(&self) -> Result<Rc<ElementInternals>> {
        if self.0.internals.borrow().is_some() {
            return Err(OrnateError::InternalsAttached);
        }
        let internals = self.0.host.attach_internals()?;
        *self.0.internals.borrow_mut() = Some(internals.clone());
        Ok(internals)
    }

    /// Cached internals, attaching them on first use
    pub fn internals(&self) -> Result<Rc<ElementInternals>> {
        if let Some(internals) = self.0.internals.borrow().as_ref() {
            return Ok(internals.clone());
        }
        self.attach_internals()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn add_event_listener(&self, kind: &str, listener: EventListener) -> ListenerId {
        self.0.host.add_event_listener(kind, listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.0.host.remove_event_listener(id)
    }

    pub fn dispatch_event(&self, event: &DomEvent) -> usize {
        self.0.host.dispatch_event(event)
    }

    // =========================================================================
    // LIFECYCLE DRIVERS
    // =========================================================================

    pub fn connect(&self) {
        tracing::debug!("connect {:?}", self);
        self.0.connected.set(true);
        for level in self.class().levels() {
            level.lifecycle().connected(self);
        }
    }

    pub fn disconnect(&self) {
        tracing::debug!("disconnect {:?}", self);
        self.0.connected.set(false);
        for level in self.class().levels() {
            level.lifecycle().disconnected(self);
        }
    }

    pub fn adopt(&self) {
        for level in self.class().levels() {
            level.lifecycle().adopted(self);
        }
    }

    pub fn form_associate(&self, owner: Option<&Element>) {
        for level in self.class().levels() {
            level.lifecycle().form_associated(self, owner);
        }
    }

    pub fn form_reset(&self) {
        for level in self.class().levels() {
            level.lifecycle().form_reset(self);
        }
    }

    pub fn form_disable(&self, disabled: bool) {
        for level in self.class().levels() {
            level.lifecycle().form_disabled(self, disabled);
        }
    }

    pub fn form_state_restore(&self, state: &str, reason: RestoreReason) {
        for level in self.class().levels() {
            level.lifecycle().form_state_restore(self, state, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassBuilder, Member};
    use crate::transformers::{number, string};

    #[test]
    fn test_identity() {
        let class = ClassBuilder::new("Plain").build().unwrap();
        let a = class.create().unwrap();
        let b = class.create().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downgrade().upgrade(), Some(a.clone()));
    }

    #[test]
    fn test_weak_handle_does_not_keep_alive() {
        let class = ClassBuilder::new("Plain").build().unwrap();
        let weak = class.create().unwrap().downgrade();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_internals_first_call_wins() {
        let class = ClassBuilder::new("Plain").build().unwrap();

        let el = class.create().unwrap();
        let cached = el.internals().unwrap();
        assert!(Rc::ptr_eq(&cached, &el.internals().unwrap()));
        assert!(matches!(
            el.attach_internals(),
            Err(OrnateError::InternalsAttached)
        ));

        let el = class.create().unwrap();
        let direct = el.attach_internals().unwrap();
        assert!(Rc::ptr_eq(&direct, &el.internals().unwrap()));
        assert!(el.attach_internals().is_err());
    }

    #[test]
    fn test_dynamic_property_access() {
        let mut builder = ClassBuilder::new("Dyn");
        builder
            .prop(Member::accessor("label"), string(), "x".to_string())
            .unwrap();
        builder
            .attr(Member::accessor("count"), number(), 1.0)
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();

        assert_eq!(el.get_property::<String>("label").unwrap(), "x");
        el.set_property("count", 4.0f64).unwrap();
        assert_eq!(el.get_property::<f64>("count").unwrap(), 4.0);

        assert!(matches!(
            el.get_property::<u8>("count"),
            Err(OrnateError::TypeMismatch { .. })
        ));
        assert!(matches!(
            el.set_property("count", "four"),
            Err(OrnateError::TypeMismatch { .. })
        ));
        assert!(matches!(
            el.get_property::<f64>("missing"),
            Err(OrnateError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_unobserved_attributes_do_not_notify() {
        let class = ClassBuilder::new("Plain").build().unwrap();
        let el = class.create().unwrap();
        el.set_attribute("data-x", "1");
        assert_eq!(el.get_attribute("data-x").as_deref(), Some("1"));
        assert_eq!(el.bus().listener_count(crate::bus::EventKind::Attr), 0);
    }
}
