//! Per-instance event bus
//!
//! Every element owns one lazily created [`EventBus`]. Lifecycle transitions
//! and field changes are published on it and consumed by accessors,
//! reactive methods and subscriptions:
//!
//! ```text
//! Host lifecycle (connect, attribute change, ...)
//!     ↓
//! Enhanced lifecycle wrapper
//!     ↓
//! EventBus::trigger
//!     ↓
//! attr/prop accessors, reactive, subscribe, observe
//! ```
//!
//! Dispatch is synchronous and runs listeners in registration order.
//! Duplicate registrations are kept. Listeners added while an event is being
//! dispatched are not invoked for that same event.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;

/// Names of the events carried by the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    Connected,
    Disconnected,
    Adopted,
    Attr,
    Prop,
    FormAssociated,
    FormReset,
    FormDisabled,
    FormStateRestore,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Init,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Adopted,
        EventKind::Attr,
        EventKind::Prop,
        EventKind::FormAssociated,
        EventKind::FormReset,
        EventKind::FormDisabled,
        EventKind::FormStateRestore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Adopted => "adopted",
            EventKind::Attr => "attr",
            EventKind::Prop => "prop",
            EventKind::FormAssociated => "formAssociated",
            EventKind::FormReset => "formReset",
            EventKind::FormDisabled => "formDisabled",
            EventKind::FormStateRestore => "formStateRestore",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the platform asked an element to restore its form state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreReason {
    Restore,
    Autocomplete,
}

/// An event published on an element's bus
#[derive(Clone, Debug)]
pub enum Event {
    Init,
    Connected,
    Disconnected,
    Adopted,
    /// An observed attribute changed (reflected by a field or not)
    Attr {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
    /// A managed field took a new value
    Prop { key: String, value: Rc<dyn Any> },
    FormAssociated(Option<Element>),
    FormReset,
    FormDisabled(bool),
    FormStateRestore {
        state: String,
        reason: RestoreReason,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init => EventKind::Init,
            Event::Connected => EventKind::Connected,
            Event::Disconnected => EventKind::Disconnected,
            Event::Adopted => EventKind::Adopted,
            Event::Attr { .. } => EventKind::Attr,
            Event::Prop { .. } => EventKind::Prop,
            Event::FormAssociated(_) => EventKind::FormAssociated,
            Event::FormReset => EventKind::FormReset,
            Event::FormDisabled(_) => EventKind::FormDisabled,
            Event::FormStateRestore { .. } => EventKind::FormStateRestore,
        }
    }
}

/// Callback registered on a bus
pub type BusListener = Rc<dyn Fn(&Element, &Event)>;

/// Publish/subscribe channel scoped to one element
#[derive(Default)]
pub struct EventBus {
    channels: RefCell<FxHashMap<EventKind, SmallVec<[BusListener; 4]>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind
    pub fn listen(&self, kind: EventKind, listener: BusListener) {
        self.channels
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(listener);
    }

    /// Invoke every listener registered for the event's kind
    pub fn trigger(&self, element: &Element, event: &Event) {
        // Snapshot so listeners may register further listeners
        let listeners: SmallVec<[BusListener; 4]> =
            match self.channels.borrow().get(&event.kind()) {
                Some(listeners) => listeners.clone(),
                None => return,
            };

        tracing::trace!(
            "bus dispatch `{}` to {} listener(s) on {:?}",
            event.kind(),
            listeners.len(),
            element.id()
        );

        for listener in listeners {
            listener(element, event);
        }
    }

    /// Number of listeners for a kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.channels.borrow().get(&kind).map_or(0, |l| l.len())
    }
}

/// Register `listener` on `element`'s bus
pub fn listen<F>(element: &Element, kind: EventKind, listener: F)
where
    F: Fn(&Element, &Event) + 'static,
{
    element.bus().listen(kind, Rc::new(listener));
}

/// Publish `event` on `element`'s bus
pub fn trigger(element: &Element, event: Event) {
    element.bus().trigger(element, &event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use std::cell::Cell;

    fn plain_element() -> Element {
        ClassBuilder::new("Plain").build().unwrap().create().unwrap()
    }

    #[test]
    fn test_event_kind_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("bogus"), None);
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let el = plain_element();
        let log = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            listen(&el, EventKind::Connected, move |_, _| log.borrow_mut().push(n));
        }
        trigger(&el, Event::Connected);

        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_listeners_are_kept() {
        let el = plain_element();
        let calls = Rc::new(Cell::new(0));
        let listener: BusListener = {
            let calls = calls.clone();
            Rc::new(move |_, _| calls.set(calls.get() + 1))
        };
        el.bus().listen(EventKind::FormReset, listener.clone());
        el.bus().listen(EventKind::FormReset, listener);

        trigger(&el, Event::FormReset);
        assert_eq!(calls.get(), 2);
        assert_eq!(el.bus().listener_count(EventKind::FormReset), 2);
    }

    #[test]
    fn test_events_are_scoped_to_kind_and_instance() {
        let a = plain_element();
        let b = plain_element();
        let calls = Rc::new(Cell::new(0));
        {
            let calls = calls.clone();
            listen(&a, EventKind::Disconnected, move |_, _| calls.set(calls.get() + 1));
        }

        trigger(&a, Event::Connected);
        trigger(&b, Event::Disconnected);
        assert_eq!(calls.get(), 0);

        trigger(&a, Event::Disconnected);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_arguments_are_passed_through() {
        let el = plain_element();
        let seen = Rc::new(RefCell::new(None));
        {
            let seen = seen.clone();
            listen(&el, EventKind::FormStateRestore, move |_, event| {
                if let Event::FormStateRestore { state, reason } = event {
                    *seen.borrow_mut() = Some((state.clone(), *reason));
                }
            });
        }
        trigger(
            &el,
            Event::FormStateRestore {
                state: "draft".into(),
                reason: RestoreReason::Autocomplete,
            },
        );
        assert_eq!(
            *seen.borrow(),
            Some(("draft".to_string(), RestoreReason::Autocomplete))
        );
    }

    #[test]
    fn test_listen_during_dispatch_does_not_crash() {
        let el = plain_element();
        let late_calls = Rc::new(Cell::new(0));
        {
            let late_calls = late_calls.clone();
            listen(&el, EventKind::Adopted, move |el, _| {
                let late_calls = late_calls.clone();
                listen(el, EventKind::Adopted, move |_, _| {
                    late_calls.set(late_calls.get() + 1)
                });
            });
        }
        trigger(&el, Event::Adopted);
        assert_eq!(el.bus().listener_count(EventKind::Adopted), 2);
    }
}
