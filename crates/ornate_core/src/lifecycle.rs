//! Host lifecycle callbacks and the enhancement wrapper
//!
//! Each class level provides a [`Lifecycle`] with the author's own
//! callbacks. [`enhance`] wraps one in [`Enhanced`], which calls through to
//! the author's callback and then republishes the transition on the
//! element's bus.
//!
//! # Init tokens
//!
//! Every enhancement carries a fresh [`InitToken`]. When an enhanced level
//! finishes constructing, it stamps its token on the instance, so after the
//! whole chain has run the instance carries the token of the most derived
//! enhanced level. A class reports the token of its nearest enhanced level
//! ([`ElementClass::init_token`](crate::class::ElementClass::init_token)).
//! The instance is initialized when both agree, which happens exactly once,
//! at the end of the most derived enhanced constructor, however many levels
//! of the chain are enhanced. Only that outermost enhancement publishes bus
//! events, so every transition is published once.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bus::{listen, trigger, Event, EventKind, RestoreReason};
use crate::element::Element;

/// Marker identifying one application of [`enhance`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InitToken(u64);

impl InitToken {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        InitToken(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Callbacks the host platform invokes on an element
///
/// All methods default to no-ops.
pub trait Lifecycle: 'static {
    /// Attribute names this level handles in `attribute_changed`
    fn observed_attributes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Runs after this level's fields are initialized
    fn constructed(&self, _element: &Element) {}

    fn connected(&self, _element: &Element) {}

    fn disconnected(&self, _element: &Element) {}

    fn adopted(&self, _element: &Element) {}

    fn attribute_changed(
        &self,
        _element: &Element,
        _name: &str,
        _old: Option<&str>,
        _new: Option<&str>,
    ) {
    }

    fn form_associated(&self, _element: &Element, _owner: Option<&Element>) {}

    fn form_reset(&self, _element: &Element) {}

    fn form_disabled(&self, _element: &Element, _disabled: bool) {}

    fn form_state_restore(&self, _element: &Element, _state: &str, _reason: RestoreReason) {}

    /// Capability marker: `Some` when this lifecycle is already enhanced
    fn enhancement(&self) -> Option<InitToken> {
        None
    }
}

/// Lifecycle with no callbacks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLifecycle;

impl Lifecycle for NoLifecycle {}

/// Lifecycle wrapper that republishes transitions on the bus
pub struct Enhanced {
    inner: Rc<dyn Lifecycle>,
    token: InitToken,
}

impl Enhanced {
    pub fn token(&self) -> InitToken {
        self.token
    }

    fn is_outermost(&self, element: &Element) -> bool {
        element.class().init_token() == Some(self.token)
    }

    fn publish(&self, element: &Element, event: Event) {
        if self.is_outermost(element) {
            trigger(element, event);
        }
    }
}

impl Lifecycle for Enhanced {
    fn observed_attributes(&self) -> Vec<String> {
        self.inner.observed_attributes()
    }

    fn constructed(&self, element: &Element) {
        self.inner.constructed(element);
        element.stamp_init_token(self.token);
        if self.is_outermost(element) {
            tracing::debug!("init {:?}", element);
            trigger(element, Event::Init);
        }
    }

    fn connected(&self, element: &Element) {
        self.inner.connected(element);
        self.publish(element, Event::Connected);
    }

    fn disconnected(&self, element: &Element) {
        self.inner.disconnected(element);
        self.publish(element, Event::Disconnected);
    }

    fn adopted(&self, element: &Element) {
        self.inner.adopted(element);
        self.publish(element, Event::Adopted);
    }

    fn attribute_changed(
        &self,
        element: &Element,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        // Authors only see the names they asked for
        if self.inner.observed_attributes().iter().any(|n| n == name) {
            self.inner.attribute_changed(element, name, old, new);
        }
        self.publish(
            element,
            Event::Attr {
                name: name.to_string(),
                old: old.map(str::to_string),
                new: new.map(str::to_string),
            },
        );
    }

    fn form_associated(&self, element: &Element, owner: Option<&Element>) {
        self.inner.form_associated(element, owner);
        self.publish(element, Event::FormAssociated(owner.cloned()));
    }

    fn form_reset(&self, element: &Element) {
        self.inner.form_reset(element);
        self.publish(element, Event::FormReset);
    }

    fn form_disabled(&self, element: &Element, disabled: bool) {
        self.inner.form_disabled(element, disabled);
        self.publish(element, Event::FormDisabled(disabled));
    }

    fn form_state_restore(&self, element: &Element, state: &str, reason: RestoreReason) {
        self.inner.form_state_restore(element, state, reason);
        self.publish(
            element,
            Event::FormStateRestore {
                state: state.to_string(),
                reason,
            },
        );
    }

    fn enhancement(&self) -> Option<InitToken> {
        Some(self.token)
    }
}

/// Wrap a lifecycle so it publishes on the bus; already enhanced lifecycles
/// are returned unchanged
pub fn enhance(lifecycle: Rc<dyn Lifecycle>) -> Rc<dyn Lifecycle> {
    if lifecycle.enhancement().is_some() {
        return lifecycle;
    }
    Rc::new(Enhanced {
        inner: lifecycle,
        token: InitToken::fresh(),
    })
}

/// Run `action` at the element's init moment
///
/// Runs immediately if the most derived enhanced constructor has already
/// completed, otherwise on the matching `init` event. Never runs twice.
pub fn run_at_init<F>(element: &Element, action: F)
where
    F: FnOnce(&Element) + 'static,
{
    if element.is_initialized() {
        action(element);
        return;
    }

    let expected = element.class().init_token();
    let pending = Cell::new(Some(action));
    listen(element, EventKind::Init, move |element, _| {
        if element.init_token() != expected {
            return;
        }
        if let Some(action) = pending.take() {
            action(element);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        observed: Vec<String>,
    }

    impl Lifecycle for Recorder {
        fn observed_attributes(&self) -> Vec<String> {
            self.observed.clone()
        }

        fn connected(&self, _element: &Element) {
            self.log.borrow_mut().push("user:connected".into());
        }

        fn attribute_changed(
            &self,
            _element: &Element,
            name: &str,
            _old: Option<&str>,
            new: Option<&str>,
        ) {
            self.log
                .borrow_mut()
                .push(format!("user:attr:{}={:?}", name, new));
        }

        fn form_disabled(&self, _element: &Element, disabled: bool) {
            self.log
                .borrow_mut()
                .push(format!("user:disabled:{}", disabled));
        }
    }

    fn record_bus(element: &Element, log: &Rc<RefCell<Vec<String>>>) {
        for kind in EventKind::ALL {
            let log = log.clone();
            listen(element, kind, move |_, event| {
                log.borrow_mut().push(format!("bus:{}", event.kind()));
            });
        }
    }

    #[test]
    fn test_enhance_is_idempotent() {
        let once = enhance(Rc::new(NoLifecycle));
        let twice = enhance(once.clone());
        assert!(Rc::ptr_eq(&once, &twice));
        assert!(twice.enhancement().is_some());
        assert!(NoLifecycle.enhancement().is_none());
    }

    #[test]
    fn test_call_through_then_publish() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("Hooks");
        builder
            .lifecycle(Recorder {
                log: log.clone(),
                observed: vec![],
            })
            .enhance();
        let el = builder.build().unwrap().create().unwrap();
        record_bus(&el, &log);

        el.connect();
        el.form_disable(true);
        el.form_reset();
        el.adopt();

        assert_eq!(
            *log.borrow(),
            vec![
                "user:connected",
                "bus:connected",
                "user:disabled:true",
                "bus:formDisabled",
                "bus:formReset",
                "bus:adopted",
            ]
        );
    }

    #[test]
    fn test_attribute_filtering() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("Filtered");
        builder
            .lifecycle(Recorder {
                log: log.clone(),
                observed: vec!["mine".into()],
            })
            .enhance();
        builder
            .attr(
                crate::class::Member::accessor("managed"),
                crate::transformers::string(),
                String::new(),
            )
            .unwrap();
        let el = builder.build().unwrap().create().unwrap();
        record_bus(&el, &log);

        el.set_attribute("mine", "1");
        el.set_attribute("managed", "2");
        el.set_attribute("ignored", "3");

        // The field's own attr listener predates the recorder, so its prop
        // event is logged first
        assert_eq!(
            *log.borrow(),
            vec![
                "user:attr:mine=Some(\"1\")",
                "bus:attr",
                "bus:prop",
                "bus:attr",
            ]
        );
    }

    #[test]
    fn test_plain_base_hears_only_its_names() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut base = ClassBuilder::new("PlainBase");
        base.lifecycle(Recorder {
            log: log.clone(),
            observed: vec!["mine".into()],
        });
        let base = base.build().unwrap();
        assert!(!base.is_enhanced());

        let mut derived = ClassBuilder::extend("ManagedDerived", &base);
        derived
            .attr(
                crate::class::Member::accessor("managed"),
                crate::transformers::string(),
                String::new(),
            )
            .unwrap();
        let el = derived.build().unwrap().create().unwrap();

        el.set_attribute("mine", "1");
        el.set_attribute("managed", "2");
        assert_eq!(*log.borrow(), vec!["user:attr:mine=Some(\"1\")"]);
    }

    #[test]
    fn test_form_callbacks_carry_arguments() {
        struct FormHooks(Rc<RefCell<Vec<String>>>);
        impl Lifecycle for FormHooks {
            fn form_associated(&self, _element: &Element, owner: Option<&Element>) {
                self.0
                    .borrow_mut()
                    .push(format!("user:associated:{}", owner.is_some()));
            }

            fn form_state_restore(&self, _element: &Element, state: &str, _reason: RestoreReason) {
                self.0.borrow_mut().push(format!("user:restore:{}", state));
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut builder = ClassBuilder::new("FormField");
        builder.lifecycle(FormHooks(log.clone())).enhance();
        let el = builder.build().unwrap().create().unwrap();
        let form = ClassBuilder::new("Form").build().unwrap().create().unwrap();

        let owners = Rc::new(RefCell::new(Vec::new()));
        let restores = Rc::new(RefCell::new(Vec::new()));
        {
            let owners = owners.clone();
            listen(&el, EventKind::FormAssociated, move |_, event| {
                if let Event::FormAssociated(owner) = event {
                    owners.borrow_mut().push(owner.as_ref().map(|o| o.id()));
                }
            });
            let restores = restores.clone();
            listen(&el, EventKind::FormStateRestore, move |_, event| {
                if let Event::FormStateRestore { state, reason } = event {
                    restores.borrow_mut().push((state.clone(), *reason));
                }
            });
        }

        el.form_associate(Some(&form));
        el.form_associate(None);
        el.form_state_restore("draft", RestoreReason::Autocomplete);

        assert_eq!(*owners.borrow(), vec![Some(form.id()), None]);
        assert_eq!(
            *restores.borrow(),
            vec![("draft".to_string(), RestoreReason::Autocomplete)]
        );
        assert_eq!(
            *log.borrow(),
            vec![
                "user:associated:true",
                "user:associated:false",
                "user:restore:draft",
            ]
        );
    }

    #[test]
    fn test_run_at_init_runs_once_in_chain() {
        let runs = Rc::new(Cell::new(0));

        let mut base = ClassBuilder::new("Base");
        base.enhance();
        let base = base.build().unwrap();

        let mut derived = ClassBuilder::extend("Derived", &base);
        derived.enhance();
        let derived = derived.build().unwrap();

        let el = derived.create().unwrap();
        assert!(el.is_initialized());
        assert_eq!(el.init_token(), derived.init_token());
        assert_ne!(base.init_token(), derived.init_token());

        // Already initialized: runs immediately
        {
            let runs = runs.clone();
            run_at_init(&el, move |_| runs.set(runs.get() + 1));
        }
        assert_eq!(runs.get(), 1);

        // Later init events never re-run it
        trigger(&el, Event::Init);
        assert_eq!(runs.get(), 1);
    }
}
