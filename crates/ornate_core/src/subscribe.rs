//! Subscriptions to external sources
//!
//! `ClassBuilder::subscribe` connects a method or field to an event target
//! or a signal while the element is inside its [`ActivationWindow`].
//! Activation and deactivation are idempotent: entering the window twice
//! keeps one underlying subscription, and leaving it tears that down.
//!
//! Every accepted value goes through the optional filter and map before it
//! reaches the target. Method targets receive it as their payload; field
//! targets receive it through the field's setter.

use smallvec::{smallvec, SmallVec};
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use crate::accessor::Field;
use crate::bus::{listen, EventKind};
use crate::class::Initializer;
use crate::element::{Element, WeakElement};
use crate::error::{OrnateError, Result};
use crate::lifecycle::run_at_init;
use crate::method::{Method, Payload};
use crate::source::{Deferred, DomEvent, EventTarget, SignalSource, SubscriberKey};

// =============================================================================
// ACTIVATION WINDOWS
// =============================================================================

/// Lifecycle events that open and close a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationWindow {
    activate: SmallVec<[EventKind; 2]>,
    deactivate: SmallVec<[EventKind; 2]>,
}

impl Default for ActivationWindow {
    /// Open at `init` and `connected`, close at `disconnected`
    fn default() -> Self {
        Self {
            activate: smallvec![EventKind::Init, EventKind::Connected],
            deactivate: smallvec![EventKind::Disconnected],
        }
    }
}

impl ActivationWindow {
    pub fn new(
        activate: impl IntoIterator<Item = EventKind>,
        deactivate: impl IntoIterator<Item = EventKind>,
    ) -> Self {
        Self {
            activate: activate.into_iter().collect(),
            deactivate: deactivate.into_iter().collect(),
        }
    }

    /// Window from whitespace separated event names
    pub fn from_names(activate: &str, deactivate: &str) -> Result<Self> {
        fn kinds(names: &str) -> Result<SmallVec<[EventKind; 2]>> {
            names
                .split_whitespace()
                .map(|name| {
                    EventKind::from_name(name).ok_or_else(|| {
                        OrnateError::config(name, "unknown lifecycle event")
                    })
                })
                .collect()
        }
        Ok(Self {
            activate: kinds(activate)?,
            deactivate: kinds(deactivate)?,
        })
    }

    pub fn activate(&self) -> &[EventKind] {
        &self.activate
    }

    pub fn deactivate(&self) -> &[EventKind] {
        &self.deactivate
    }

    pub(crate) fn check(&self, member: &str) -> Result<()> {
        if self.activate.is_empty() {
            return Err(OrnateError::config(
                member,
                "activation window never opens",
            ));
        }
        if let Some(kind) = self.activate.iter().find(|k| self.deactivate.contains(k)) {
            return Err(OrnateError::config(
                member,
                format!("`{}` both opens and closes the activation window", kind),
            ));
        }
        Ok(())
    }
}

/// Wire `on` / `off` to an element's window events
pub(crate) fn install_window(
    element: &Element,
    window: &ActivationWindow,
    on: Rc<dyn Fn(&Element)>,
    off: Rc<dyn Fn(&Element)>,
) {
    for &kind in window.activate() {
        let on = on.clone();
        if kind == EventKind::Init {
            run_at_init(element, move |element| on(element));
        } else {
            listen(element, kind, move |element, _| on(element));
        }
    }
    for &kind in window.deactivate() {
        let off = off.clone();
        listen(element, kind, move |element, _| off(element));
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

type Predicate = Rc<dyn Fn(&Element, &Payload) -> bool>;
type Mapper = Rc<dyn Fn(&Element, Payload) -> Payload>;

/// Optional filter and map applied to every delivered value
#[derive(Clone, Default)]
pub(crate) struct Delivery {
    predicate: Option<Predicate>,
    transform: Option<Mapper>,
}

impl Delivery {
    pub(crate) fn filter<T: 'static>(
        &mut self,
        predicate: impl Fn(&Element, &T) -> bool + 'static,
    ) {
        self.predicate = Some(Rc::new(move |element, payload| {
            payload.get::<T>().map_or(false, |value| predicate(element, value))
        }));
    }

    pub(crate) fn map<A: 'static, B: 'static>(&mut self, f: impl Fn(&Element, &A) -> B + 'static) {
        self.transform = Some(Rc::new(move |element, payload| match payload.get::<A>() {
            Some(value) => Payload::new(f(element, value)),
            None => payload,
        }));
    }

    /// Filter then map; `None` when the value is rejected
    pub(crate) fn apply(&self, element: &Element, payload: Payload) -> Option<Payload> {
        if let Some(predicate) = &self.predicate {
            if !predicate(element, &payload) {
                return None;
            }
        }
        Some(match &self.transform {
            Some(transform) => transform(element, payload),
            None => payload,
        })
    }
}

// =============================================================================
// SOURCES
// =============================================================================

type TargetFactory = Rc<dyn Fn(&Element) -> Rc<dyn EventTarget>>;

/// Where an event subscription finds its target
#[derive(Clone)]
pub enum TargetSource {
    /// One shared target
    Target(Rc<dyn EventTarget>),
    /// A target per element, created on first activation
    Factory(TargetFactory),
    /// A target that becomes available later
    Deferred(Rc<Deferred<Rc<dyn EventTarget>>>),
}

impl TargetSource {
    pub fn target<T: EventTarget + 'static>(target: Rc<T>) -> Self {
        TargetSource::Target(target)
    }

    pub fn factory(f: impl Fn(&Element) -> Rc<dyn EventTarget> + 'static) -> Self {
        TargetSource::Factory(Rc::new(f))
    }

    /// The element's own host
    pub fn host() -> Self {
        Self::factory(|element| element.host().clone() as Rc<dyn EventTarget>)
    }
}

trait ErasedSignal {
    fn subscribe(&self, callback: Rc<dyn Fn(Payload)>) -> SubscriberKey;

    fn unsubscribe(&self, key: SubscriberKey);
}

struct SignalAdapter<S> {
    source: Rc<S>,
}

impl<S: SignalSource + 'static> ErasedSignal for SignalAdapter<S> {
    fn subscribe(&self, callback: Rc<dyn Fn(Payload)>) -> SubscriberKey {
        let source: Weak<S> = Rc::downgrade(&self.source);
        self.source.subscribe(Rc::new(move || {
            if let Some(source) = source.upgrade() {
                callback(Payload::new(source.value()));
            }
        }))
    }

    fn unsubscribe(&self, key: SubscriberKey) {
        self.source.unsubscribe(key);
    }
}

/// What a subscription listens to
#[derive(Clone)]
pub struct Source {
    kind: SourceKind,
}

#[derive(Clone)]
enum SourceKind {
    /// Named events on a target; the payload is the [`DomEvent`]
    Events {
        target: TargetSource,
        events: Vec<String>,
    },
    /// Changes of a signal; the payload is the new value
    Signal(Rc<dyn ErasedSignal>),
}

impl Source {
    /// Events named in a whitespace separated list
    pub fn events(target: TargetSource, names: &str) -> Self {
        Source {
            kind: SourceKind::Events {
                target,
                events: names.split_whitespace().map(str::to_string).collect(),
            },
        }
    }

    /// Changes of a signal, without its current value
    pub fn signal<S: SignalSource + 'static>(source: S) -> Self {
        Source {
            kind: SourceKind::Signal(Rc::new(SignalAdapter {
                source: Rc::new(source),
            })),
        }
    }
}

// =============================================================================
// TARGETS
// =============================================================================

type FieldSink = Rc<dyn Fn(&Element, Payload) -> Result<()>>;

/// What receives delivered values
#[derive(Clone)]
pub enum SubscribeTarget {
    Method(Method),
    Field { name: String, sink: FieldSink },
}

impl SubscribeTarget {
    pub fn method(method: &Method) -> Self {
        SubscribeTarget::Method(method.clone())
    }

    /// Write delivered values into a field; the payload must be a `T`
    pub fn field<T: Clone + PartialEq + 'static>(field: &Field<T>) -> Self {
        let handle = field.clone();
        SubscribeTarget::Field {
            name: field.name().to_string(),
            sink: Rc::new(move |element, payload| match payload.get::<T>() {
                Some(value) => handle.set_external(element, value.clone()),
                None => Err(OrnateError::TypeMismatch {
                    key: handle.name().to_string(),
                    expected: std::any::type_name::<T>(),
                }),
            }),
        }
    }

    pub(crate) fn as_method(&self) -> Option<&Method> {
        match self {
            SubscribeTarget::Method(method) => Some(method),
            SubscribeTarget::Field { .. } => None,
        }
    }

    fn name(&self) -> &str {
        match self {
            SubscribeTarget::Method(method) => method.name(),
            SubscribeTarget::Field { name, .. } => name,
        }
    }

    fn deliver(&self, element: &Element, payload: Payload) {
        match self {
            SubscribeTarget::Method(method) => element.call_method(method.name(), payload),
            SubscribeTarget::Field { name, sink } => {
                if let Err(err) = sink(element, payload) {
                    tracing::warn!("subscription rejected by `{}`: {}", name, err);
                }
            }
        }
    }
}

/// Options for `ClassBuilder::subscribe`
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    window: ActivationWindow,
    delivery: Delivery,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, window: ActivationWindow) -> Self {
        self.window = window;
        self
    }

    /// Only deliver values of type `T` accepted by `predicate`
    pub fn filter<T: 'static>(
        mut self,
        predicate: impl Fn(&Element, &T) -> bool + 'static,
    ) -> Self {
        self.delivery.filter(predicate);
        self
    }

    /// Map delivered values of type `A` to `B`
    pub fn map<A: 'static, B: 'static>(mut self, f: impl Fn(&Element, &A) -> B + 'static) -> Self {
        self.delivery.map(f);
        self
    }
}

// =============================================================================
// PER-INSTANCE STATE
// =============================================================================

/// One element's subscription
struct Subscription {
    element: WeakElement,
    target: SubscribeTarget,
    source: Source,
    delivery: Delivery,
    active: Cell<bool>,
    generation: Cell<u64>,
    resolved: OnceCell<Rc<dyn EventTarget>>,
    teardown: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn activate(self: &Rc<Self>, element: &Element) {
        if self.active.replace(true) {
            return;
        }
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        tracing::trace!(
            "activate subscription `{}` on {:?}",
            self.target.name(),
            element.id()
        );

        match &self.source.kind {
            SourceKind::Events { target, events } => match target {
                TargetSource::Target(target) => self.attach(target.clone(), events),
                TargetSource::Factory(factory) => {
                    let target = self.resolved.get_or_init(|| factory(element)).clone();
                    self.attach(target, events);
                }
                TargetSource::Deferred(deferred) => {
                    let this = Rc::downgrade(self);
                    let events = events.clone();
                    deferred.when_resolved(move |target| {
                        let Some(this) = this.upgrade() else {
                            return;
                        };
                        // Still inside the same activation
                        if this.active.get() && this.generation.get() == generation {
                            this.attach(target.clone(), &events);
                        }
                    });
                }
            },
            SourceKind::Signal(signal) => {
                let this = Rc::downgrade(self);
                let key = signal.subscribe(Rc::new(move |payload| {
                    if let Some(this) = this.upgrade() {
                        this.receive(payload);
                    }
                }));
                let signal = signal.clone();
                *self.teardown.borrow_mut() = Some(Box::new(move || signal.unsubscribe(key)));
            }
        }
    }

    fn attach(self: &Rc<Self>, target: Rc<dyn EventTarget>, events: &[String]) {
        let ids: SmallVec<[_; 2]> = events
            .iter()
            .map(|kind| {
                let this = Rc::downgrade(self);
                target.add_event_listener(
                    kind,
                    Rc::new(move |event: &DomEvent| {
                        if let Some(this) = this.upgrade() {
                            this.receive(Payload::new(event.clone()));
                        }
                    }),
                )
            })
            .collect();

        *self.teardown.borrow_mut() = Some(Box::new(move || {
            for id in ids {
                target.remove_event_listener(id);
            }
        }));
    }

    fn deactivate(&self, element: &Element) {
        if !self.active.replace(false) {
            return;
        }
        self.generation.set(self.generation.get() + 1);
        tracing::trace!(
            "deactivate subscription `{}` on {:?}",
            self.target.name(),
            element.id()
        );

        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    fn receive(&self, payload: Payload) {
        if !self.active.get() {
            return;
        }
        let Some(element) = self.element.upgrade() else {
            return;
        };
        if let Some(payload) = self.delivery.apply(&element, payload) {
            self.target.deliver(&element, payload);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The element is gone while still subscribed
        if let Some(teardown) = self.teardown.get_mut().take() {
            teardown();
        }
    }
}

pub(crate) fn initializer(
    target: SubscribeTarget,
    source: Source,
    options: SubscribeOptions,
) -> Result<Initializer> {
    options.window.check(target.name())?;
    if let SourceKind::Events { events, .. } = &source.kind {
        if events.is_empty() {
            return Err(OrnateError::config(
                target.name(),
                "subscription needs at least one event name",
            ));
        }
    }

    let SubscribeOptions { window, delivery } = options;
    Ok(Rc::new(move |element: &Element| {
        let subscription = Rc::new(Subscription {
            element: element.downgrade(),
            target: target.clone(),
            source: source.clone(),
            delivery: delivery.clone(),
            active: Cell::new(false),
            generation: Cell::new(0),
            resolved: OnceCell::new(),
            teardown: RefCell::new(None),
        });

        let on = subscription.clone();
        let off = subscription;
        install_window(
            element,
            &window,
            Rc::new(move |element| on.activate(element)),
            Rc::new(move |element| off.deactivate(element)),
        );
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassBuilder, Member};
    use crate::source::{EventSource, Signal};
    use crate::transformers::number;

    fn recording_method(
        builder: &mut ClassBuilder,
        log: &Rc<RefCell<Vec<String>>>,
    ) -> Method {
        let log = log.clone();
        builder
            .method(Member::method("record"), move |_, payload| {
                let entry = if let Some(event) = payload.get::<DomEvent>() {
                    event.kind().to_string()
                } else if let Some(value) = payload.get::<f64>() {
                    value.to_string()
                } else {
                    "?".to_string()
                };
                log.borrow_mut().push(entry);
            })
            .unwrap()
    }

    #[test]
    fn test_window_validation() {
        assert!(ActivationWindow::default().check("m").is_ok());
        assert!(ActivationWindow::new([EventKind::Connected], [EventKind::Connected])
            .check("m")
            .unwrap_err()
            .is_config());
        assert!(ActivationWindow::new([], [EventKind::Disconnected])
            .check("m")
            .is_err());

        let window = ActivationWindow::from_names("connected adopted", "disconnected").unwrap();
        assert_eq!(window.activate(), &[EventKind::Connected, EventKind::Adopted]);
        assert!(ActivationWindow::from_names("mounted", "").is_err());
    }

    #[test]
    fn test_event_subscription_follows_window() {
        let source = Rc::new(EventSource::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("Listener");
        let record = recording_method(&mut builder, &log);
        builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::events(TargetSource::target(source.clone()), "ping  pong"),
                SubscribeOptions::new().window(ActivationWindow::new(
                    [EventKind::Connected],
                    [EventKind::Disconnected],
                )),
            )
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();

        source.dispatch_event(&DomEvent::new("ping"));
        assert!(log.borrow().is_empty());

        el.connect();
        el.connect();
        assert_eq!(source.listener_count(), 2);
        source.dispatch_event(&DomEvent::new("ping"));
        source.dispatch_event(&DomEvent::new("pong"));
        source.dispatch_event(&DomEvent::new("other"));

        el.disconnect();
        el.disconnect();
        assert_eq!(source.listener_count(), 0);
        source.dispatch_event(&DomEvent::new("ping"));

        assert_eq!(*log.borrow(), vec!["ping", "pong"]);
    }

    #[test]
    fn test_signal_into_field() {
        let signal = Signal::new(1.0f64);
        let mut builder = ClassBuilder::new("Mirror");
        let value = builder.prop(Member::accessor("value"), number(), 0.0).unwrap();
        builder
            .subscribe(
                SubscribeTarget::field(&value),
                Source::signal(signal.clone()),
                SubscribeOptions::new()
                    .filter(|_, v: &f64| *v >= 0.0)
                    .map(|_, v: &f64| v * 10.0),
            )
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();

        // Default window opens at init; the current value is not delivered
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(value.get(&el), 0.0);

        signal.set(2.0);
        assert_eq!(value.get(&el), 20.0);
        signal.set(-1.0);
        assert_eq!(value.get(&el), 20.0);

        el.disconnect();
        assert_eq!(signal.subscriber_count(), 0);
        signal.set(3.0);
        assert_eq!(value.get(&el), 20.0);

        el.connect();
        signal.set(4.0);
        assert_eq!(value.get(&el), 40.0);
    }

    #[test]
    fn test_dropped_element_releases_sources() {
        let signal = Signal::new(0.0f64);
        let source = Rc::new(EventSource::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("Dropped");
        let record = recording_method(&mut builder, &log);
        builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::signal(signal.clone()),
                SubscribeOptions::new(),
            )
            .unwrap();
        builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::events(TargetSource::target(source.clone()), "ping"),
                SubscribeOptions::new(),
            )
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(source.listener_count(), 1);

        drop(el);
        assert_eq!(signal.subscriber_count(), 0);
        assert_eq!(source.listener_count(), 0);
        signal.set(1.0);
        source.dispatch_event(&DomEvent::new("ping"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_deferred_target() {
        let deferred: Rc<Deferred<Rc<dyn EventTarget>>> = Deferred::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("Later");
        let record = recording_method(&mut builder, &log);
        builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::events(TargetSource::Deferred(deferred.clone()), "tick"),
                SubscribeOptions::new().window(ActivationWindow::new(
                    [EventKind::Connected],
                    [EventKind::Disconnected],
                )),
            )
            .unwrap();
        let class = builder.build().unwrap();

        // Activated then deactivated before resolution: never attaches
        let early = class.create().unwrap();
        early.connect();
        early.disconnect();

        let el = class.create().unwrap();
        el.connect();

        let source = Rc::new(EventSource::new());
        deferred.resolve(source.clone());
        assert_eq!(source.listener_count(), 1);

        source.dispatch_event(&DomEvent::new("tick"));
        assert_eq!(*log.borrow(), vec!["tick"]);
        drop(early);
    }

    #[test]
    fn test_host_factory_target() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("SelfListener");
        let record = recording_method(&mut builder, &log);
        builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::events(TargetSource::host(), "click"),
                SubscribeOptions::new(),
            )
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();

        el.dispatch_event(&DomEvent::new("click"));
        assert_eq!(*log.borrow(), vec!["click"]);
    }

    #[test]
    fn test_empty_event_list_is_rejected() {
        let mut builder = ClassBuilder::new("NoEvents");
        let record = builder.method(Member::method("record"), |_, _| {}).unwrap();
        let err = builder
            .subscribe(
                SubscribeTarget::method(&record),
                Source::events(TargetSource::target(Rc::new(EventSource::new())), "  "),
                SubscribeOptions::new(),
            )
            .unwrap_err();
        assert!(err.is_config());
    }
}
