//! The transformer protocol
//!
//! A [`Transformer`] packages everything a managed field needs to know about
//! its value type:
//!
//! | Step | Method | Used when |
//! |------|--------|-----------|
//! | declaration check | `check` | `ClassBuilder::attr` / `prop` |
//! | per-instance setup | `init` | first construction of each instance |
//! | string → value | `parse` | the reflected attribute changes |
//! | acceptance | `validate` | every setter call |
//! | normalization | `transform` | after validation |
//! | value → string | `stringify` | reflecting to the attribute |
//! | change detection | `eql` | setter and attribute paths |
//! | side effects | `before_set` | right before storage is written |
//! | read mapping | `transform_get` | every getter call |
//! | reflection policy | `update_content_attr` | after a real change |
//!
//! `parse` and `stringify` never fail: `parse` returns `None` for input it
//! cannot use, which keeps the current value.

use crate::element::Element;
use crate::error::{OrnateError, ValidationError};

/// What a value change does to the reflected attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentAttr {
    /// Write the stringified value
    Set,
    /// Leave the attribute untouched
    Keep,
    /// Remove the attribute
    Remove,
}

/// Names a field is bound to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub property: String,
    pub attribute: Option<String>,
}

impl Binding {
    /// The externally visible name: the attribute if any, else the property
    pub fn public_name(&self) -> &str {
        self.attribute.as_deref().unwrap_or(&self.property)
    }
}

/// Contract for one typed field
pub trait Transformer<T: Clone + PartialEq + 'static>: 'static {
    /// Reject malformed options or bindings at declaration time
    fn check(&self, _binding: &Binding) -> Result<(), OrnateError> {
        Ok(())
    }

    /// Per-instance setup with the (validated) declared initial value
    fn init(&self, _element: &Element, _binding: &Binding, _initial: &T) {}

    /// Convert an attribute value (`None` = absent); `None` keeps the current value
    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<T>;

    fn validate(
        &self,
        _element: &Element,
        _value: &T,
        _external: bool,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    fn transform(&self, _element: &Element, value: T) -> T {
        value
    }

    fn stringify(&self, value: &T) -> String;

    fn eql(&self, _element: &Element, a: &T, b: &T) -> bool {
        a == b
    }

    fn before_set(&self, _element: &Element, _value: &T, _removal: bool) {}

    fn transform_get(&self, _element: &Element, value: T) -> T {
        value
    }

    /// Only consulted when `eql` reports a change
    fn update_content_attr(&self, _old: &T, _new: &T) -> ContentAttr {
        ContentAttr::Set
    }

    /// False for transformers whose values have no canonical string form
    fn is_reflective(&self) -> bool {
        true
    }
}
