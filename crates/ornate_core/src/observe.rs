//! Platform observers
//!
//! `ClassBuilder::observe` binds a method to a mutation/resize/intersection
//! style observer. The observer is built once per element, on first
//! activation, and then observes the element while its activation window
//! is open. Records reach the method through the same filter/map stage
//! subscriptions use.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::class::Initializer;
use crate::element::{Element, WeakElement};
use crate::error::Result;
use crate::method::{Method, Payload};
use crate::subscribe::{install_window, ActivationWindow, Delivery};

/// Observer object supplied by the platform
pub trait PlatformObserver {
    /// Start delivering records for `target`
    fn observe(&self, target: &Element);

    /// Stop delivering records for every target
    fn disconnect(&self);
}

/// Callback handed to an observer at construction
pub type ObserverCallback = Rc<dyn Fn(Payload)>;

/// Builds one observer per element around its delivery callback
pub type ObserverFactory = Rc<dyn Fn(ObserverCallback) -> Box<dyn PlatformObserver>>;

/// Options for `ClassBuilder::observe`
#[derive(Clone, Default)]
pub struct ObserveOptions {
    window: ActivationWindow,
    delivery: Delivery,
}

impl ObserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, window: ActivationWindow) -> Self {
        self.window = window;
        self
    }

    /// Only deliver records of type `T` accepted by `predicate`
    pub fn filter<T: 'static>(
        mut self,
        predicate: impl Fn(&Element, &T) -> bool + 'static,
    ) -> Self {
        self.delivery.filter(predicate);
        self
    }

    /// Map records of type `A` to `B` before the method sees them
    pub fn map<A: 'static, B: 'static>(mut self, f: impl Fn(&Element, &A) -> B + 'static) -> Self {
        self.delivery.map(f);
        self
    }
}

struct Observation {
    method: Rc<str>,
    factory: ObserverFactory,
    delivery: Delivery,
    element: WeakElement,
    observer: RefCell<Option<Rc<dyn PlatformObserver>>>,
    active: Rc<Cell<bool>>,
}

impl Observation {
    fn activate(&self, element: &Element) {
        if self.active.replace(true) {
            return;
        }
        tracing::trace!("observe `{}` on {:?}", self.method, element.id());

        // Not borrowed across `observe`: records may arrive synchronously
        let observer = self
            .observer
            .borrow_mut()
            .get_or_insert_with(|| Rc::from((self.factory)(self.callback())))
            .clone();
        observer.observe(element);
    }

    fn deactivate(&self, element: &Element) {
        if !self.active.replace(false) {
            return;
        }
        tracing::trace!("stop observing `{}` on {:?}", self.method, element.id());

        let observer = self.observer.borrow().clone();
        if let Some(observer) = observer {
            observer.disconnect();
        }
    }

    fn callback(&self) -> ObserverCallback {
        let method = self.method.clone();
        let delivery = self.delivery.clone();
        let element = self.element.clone();
        let active = self.active.clone();
        Rc::new(move |records| {
            // Records queued before a disconnect are dropped
            if !active.get() {
                return;
            }
            let Some(element) = element.upgrade() else {
                return;
            };
            if let Some(payload) = delivery.apply(&element, records) {
                element.call_method(&method, payload);
            }
        })
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if self.active.get() {
            if let Some(observer) = self.observer.get_mut().take() {
                observer.disconnect();
            }
        }
    }
}

pub(crate) fn initializer(
    method: &Method,
    factory: ObserverFactory,
    options: ObserveOptions,
) -> Result<Initializer> {
    options.window.check(method.name())?;

    let name: Rc<str> = Rc::from(method.name());
    let ObserveOptions { window, delivery } = options;
    Ok(Rc::new(move |element: &Element| {
        let observation = Rc::new(Observation {
            method: name.clone(),
            factory: factory.clone(),
            delivery: delivery.clone(),
            element: element.downgrade(),
            observer: RefCell::new(None),
            active: Rc::new(Cell::new(false)),
        });

        let on = observation.clone();
        let off = observation;
        install_window(
            element,
            &window,
            Rc::new(move |element| on.activate(element)),
            Rc::new(move |element| off.deactivate(element)),
        );
        Ok(())
    }))
}
