//! Custom states mirrored from managed fields
//!
//! `ClassBuilder::state` keeps one custom state of the element's internals
//! in sync with a field: the state is present while the field's value is
//! truthy. It runs at initialization and after every stored change, and
//! publishes nothing itself.

use std::rc::Rc;

use crate::accessor::Field;
use crate::element::Element;
use crate::error::{OrnateError, Result};

/// Default truthiness of field values
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for i128 {
    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().map_or(false, Truthy::is_truthy)
    }
}

impl Truthy for serde_json::Value {
    fn is_truthy(&self) -> bool {
        use serde_json::Value;
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0 && !n.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Options for `ClassBuilder::state`
pub struct StateOptions<T> {
    name: String,
    predicate: Rc<dyn Fn(&T) -> bool>,
}

impl<T: Truthy + 'static> StateOptions<T> {
    /// State `name`, present while the value is truthy
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: Rc::new(|value: &T| value.is_truthy()),
        }
    }
}

impl<T: 'static> StateOptions<T> {
    /// State `name`, present while `predicate` holds
    pub fn with(name: impl Into<String>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            predicate: Rc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn install<T>(field: &Field<T>, options: StateOptions<T>) -> Result<()>
where
    T: Clone + PartialEq + 'static,
{
    if options.name.trim().is_empty() {
        return Err(OrnateError::config(field.name(), "state name must not be empty"));
    }

    let StateOptions { name, predicate } = options;
    field.add_write_hook(Rc::new(move |element: &Element, value: &T| {
        match element.internals() {
            Ok(internals) => internals.states().toggle(&name, predicate(value)),
            Err(err) => tracing::warn!("state `{}`: {}", name, err),
        }
    }));
    Ok(())
}
