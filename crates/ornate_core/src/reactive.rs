//! Reactive methods
//!
//! A reactive method runs once at the element's init moment and then after
//! every matching `prop` event. The init call always uses the undecorated
//! body, so a debounced reactive method still runs synchronously at init.
//! Property writes before init never trigger it.

use std::any::Any;
use std::rc::Rc;

use crate::accessor::Field;
use crate::bus::{listen, Event, EventKind};
use crate::class::Initializer;
use crate::element::Element;
use crate::error::{OrnateError, Result};
use crate::lifecycle::run_at_init;
use crate::method::{Method, Payload};

type KeyPredicate = Rc<dyn Fn(&str, &dyn Any, &Element) -> bool>;

/// Which property changes re-run a reactive method
#[derive(Clone, Default)]
pub struct ReactiveOptions {
    keys: Option<Vec<String>>,
    exclude: Vec<String>,
    predicate: Option<KeyPredicate>,
}

impl ReactiveOptions {
    /// React to every property
    pub fn new() -> Self {
        Self::default()
    }

    /// Only react to these properties
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys
            .get_or_insert_with(Vec::new)
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Only react to this field (may be repeated)
    pub fn field<T: Clone + PartialEq + 'static>(self, field: &Field<T>) -> Self {
        self.keys([field.name()])
    }

    /// Never react to these properties
    pub fn exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(keys.into_iter().map(Into::into));
        self
    }

    /// React only when `predicate(key, new_value, element)` holds
    pub fn filter(
        mut self,
        predicate: impl Fn(&str, &dyn Any, &Element) -> bool + 'static,
    ) -> Self {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    fn accepts(&self, key: &str, value: &dyn Any, element: &Element) -> bool {
        if let Some(keys) = &self.keys {
            if !keys.iter().any(|k| k == key) {
                return false;
            }
        }
        if self.exclude.iter().any(|k| k == key) {
            return false;
        }
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(key, value, element))
    }
}

pub(crate) fn initializer(method: &Method, options: ReactiveOptions) -> Result<Initializer> {
    if matches!(&options.keys, Some(keys) if keys.is_empty()) {
        return Err(OrnateError::config(
            method.name(),
            "reactive key list must not be empty",
        ));
    }

    let name: Rc<str> = Rc::from(method.name());
    let options = Rc::new(options);
    Ok(Rc::new(move |element: &Element| {
        let name = name.clone();
        let options = options.clone();
        run_at_init(element, move |element| {
            match element.class().resolve_original_method(&name) {
                Some(original) => original(element, &Payload::empty()),
                None => tracing::warn!("reactive method `{}` is missing", name),
            }

            listen(element, EventKind::Prop, move |element, event| {
                if let Event::Prop { key, value } = event {
                    if options.accepts(key, &**value, element) {
                        element.call_method(&name, Payload::empty());
                    }
                }
            });
        });
        Ok(())
    }))
}
