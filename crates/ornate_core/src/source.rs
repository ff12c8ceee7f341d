//! External sources that subscriptions can attach to
//!
//! - [`EventTarget`]: DOM-style targets dispatching named events
//!   ([`EventSource`] is the in-process implementation, and every
//!   [`HostElement`](crate::host::HostElement) is one too)
//! - [`SignalSource`]: signal-like values exposing their current value and a
//!   change subscription ([`Signal`] is the in-process implementation)
//! - [`Deferred`]: a one-shot value that resolves later, used for event
//!   targets that are not available when a class is declared

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::method::Payload;

new_key_type! {
    /// Handle returned by `EventTarget::add_event_listener`
    pub struct ListenerId;
    /// Handle returned by `SignalSource::subscribe`
    pub struct SubscriberKey;
}

// =============================================================================
// EVENT TARGETS
// =============================================================================

/// An event dispatched through an [`EventTarget`]
#[derive(Clone, Debug)]
pub struct DomEvent {
    kind: String,
    detail: Payload,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: Payload::empty(),
        }
    }

    pub fn with_detail(kind: impl Into<String>, detail: Payload) -> Self {
        Self {
            kind: kind.into(),
            detail,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn detail(&self) -> &Payload {
        &self.detail
    }
}

/// Callback attached to an event target
pub type EventListener = Rc<dyn Fn(&DomEvent)>;

/// Something that dispatches named events to listeners
pub trait EventTarget {
    fn add_event_listener(&self, kind: &str, listener: EventListener) -> ListenerId;

    /// Returns false if the listener was not registered
    fn remove_event_listener(&self, id: ListenerId) -> bool;
}

/// In-process event target
#[derive(Default)]
pub struct EventSource {
    listeners: RefCell<SlotMap<ListenerId, (String, EventListener)>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener registered for its kind
    pub fn dispatch_event(&self, event: &DomEvent) -> usize {
        let matching: SmallVec<[EventListener; 4]> = self
            .listeners
            .borrow()
            .values()
            .filter(|(kind, _)| kind == event.kind())
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl EventTarget for EventSource {
    fn add_event_listener(&self, kind: &str, listener: EventListener) -> ListenerId {
        self.listeners
            .borrow_mut()
            .insert((kind.to_string(), listener))
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id).is_some()
    }
}

// =============================================================================
// DEFERRED VALUES
// =============================================================================

type Waiter<T> = Box<dyn FnOnce(&T)>;

/// A value that becomes available once, later
pub struct Deferred<T> {
    value: RefCell<Option<T>>,
    waiters: RefCell<Vec<Waiter<T>>>,
}

impl<T: 'static> Deferred<T> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(None),
            waiters: RefCell::new(Vec::new()),
        })
    }

    pub fn resolved(value: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(Some(value)),
            waiters: RefCell::new(Vec::new()),
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Resolve and wake every waiter; later calls are ignored
    pub fn resolve(&self, value: T) {
        if self.is_resolved() {
            tracing::warn!("Deferred value resolved twice - ignoring");
            return;
        }
        *self.value.borrow_mut() = Some(value);

        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        let value = self.value.borrow();
        if let Some(value) = value.as_ref() {
            for waiter in waiters {
                waiter(value);
            }
        }
    }

    /// Run `f` now if resolved, otherwise once resolved
    pub fn when_resolved(&self, f: impl FnOnce(&T) + 'static) {
        if let Some(value) = self.value.borrow().as_ref() {
            f(value);
            return;
        }
        self.waiters.borrow_mut().push(Box::new(f));
    }
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

// =============================================================================
// SIGNALS
// =============================================================================

/// A signal-like source: a current value plus change notifications
pub trait SignalSource {
    type Value: Clone + 'static;

    fn value(&self) -> Self::Value;

    fn subscribe(&self, callback: Rc<dyn Fn()>) -> SubscriberKey;

    fn unsubscribe(&self, key: SubscriberKey);
}

struct SignalNode<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    subscribers: RefCell<SlotMap<SubscriberKey, Rc<dyn Fn()>>>,
}

/// A minimal single-threaded signal (cheap to clone)
pub struct Signal<T> {
    node: Rc<SignalNode<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    pub fn new(initial: T) -> Self {
        Self {
            node: Rc::new(SignalNode {
                value: RefCell::new(initial),
                version: Cell::new(0),
                subscribers: RefCell::new(SlotMap::with_key()),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.node.value.borrow().clone()
    }

    /// Set a new value and notify subscribers
    pub fn set(&self, value: T) {
        *self.node.value.borrow_mut() = value;
        self.node.version.set(self.node.version.get() + 1);
        self.notify();
    }

    /// Update the value using a function
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.node.value.borrow());
        self.set(next);
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.node.version.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.node.subscribers.borrow().len()
    }

    fn notify(&self) {
        let subscribers: SmallVec<[Rc<dyn Fn()>; 4]> =
            self.node.subscribers.borrow().values().cloned().collect();
        for subscriber in subscribers {
            subscriber();
        }
    }
}

impl<T: Clone + 'static> SignalSource for Signal<T> {
    type Value = T;

    fn value(&self) -> T {
        self.get()
    }

    fn subscribe(&self, callback: Rc<dyn Fn()>) -> SubscriberKey {
        self.node.subscribers.borrow_mut().insert(callback)
    }

    fn unsubscribe(&self, key: SubscriberKey) {
        self.node.subscribers.borrow_mut().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_source_dispatches_by_kind() {
        let source = EventSource::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = log.clone();
            source.add_event_listener(
                "click",
                Rc::new(move |e| log.borrow_mut().push(e.kind().to_string())),
            );
        }

        assert_eq!(source.dispatch_event(&DomEvent::new("click")), 1);
        assert_eq!(source.dispatch_event(&DomEvent::new("keydown")), 0);
        assert_eq!(*log.borrow(), vec!["click".to_string()]);
    }

    #[test]
    fn test_event_source_remove_listener() {
        let source = EventSource::new();
        let id = source.add_event_listener("click", Rc::new(|_| {}));
        assert!(source.remove_event_listener(id));
        assert!(!source.remove_event_listener(id));
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_deferred_wakes_waiters_once() {
        let deferred = Deferred::<u32>::new();
        let seen = Rc::new(Cell::new(0));
        {
            let seen = seen.clone();
            deferred.when_resolved(move |v| seen.set(*v));
        }
        assert!(!deferred.is_resolved());

        deferred.resolve(7);
        deferred.resolve(9);
        assert_eq!(seen.get(), 7);
        assert_eq!(deferred.get(), Some(7));

        let late = Rc::new(Cell::new(0));
        {
            let late = late.clone();
            deferred.when_resolved(move |v| late.set(*v));
        }
        assert_eq!(late.get(), 7);
    }

    #[test]
    fn test_signal_notifies_subscribers() {
        let counter = Signal::new(0i32);
        let calls = Rc::new(Cell::new(0));
        let key = {
            let calls = calls.clone();
            counter.subscribe(Rc::new(move || calls.set(calls.get() + 1)))
        };

        counter.set(1);
        counter.update(|v| v + 1);
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.version(), 2);
        assert_eq!(calls.get(), 2);

        counter.unsubscribe(key);
        counter.set(3);
        assert_eq!(calls.get(), 2);
        assert_eq!(counter.subscriber_count(), 0);
    }
}
