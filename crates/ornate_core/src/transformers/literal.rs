use std::fmt::Debug;

use crate::element::Element;
use crate::error::{OrnateError, ValidationError};
use crate::side_table::InstanceTable;
use crate::transformer::{Binding, ContentAttr, Transformer};

/// Restricts another transformer to a fixed set of values
///
/// Disallowed assignments are rejected; disallowed or unparsable attribute
/// input falls back to the declared initial value.
pub struct LiteralTransformer<T, X> {
    values: Vec<T>,
    inner: X,
    fallback: InstanceTable<T>,
}

pub fn literal<T, X>(values: impl IntoIterator<Item = T>, inner: X) -> LiteralTransformer<T, X> {
    LiteralTransformer {
        values: values.into_iter().collect(),
        inner,
        fallback: InstanceTable::new(),
    }
}

impl<T, X> LiteralTransformer<T, X>
where
    T: PartialEq,
{
    pub fn values(&self) -> &[T] {
        &self.values
    }

    fn allows(&self, value: &T) -> bool {
        self.values.contains(value)
    }
}

impl<T, X> Transformer<T> for LiteralTransformer<T, X>
where
    T: Clone + PartialEq + Debug + 'static,
    X: Transformer<T>,
{
    fn check(&self, binding: &Binding) -> Result<(), OrnateError> {
        if self.values.is_empty() {
            return Err(OrnateError::config(
                &binding.property,
                "literal needs at least one allowed value",
            ));
        }
        self.inner.check(binding)
    }

    fn init(&self, element: &Element, binding: &Binding, initial: &T) {
        self.inner.init(element, binding, initial);
        self.fallback.set(element, initial.clone());
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<T> {
        match self.inner.parse(element, raw) {
            Some(value) if self.allows(&value) => Some(value),
            _ => self.fallback.get(element),
        }
    }

    fn validate(
        &self,
        element: &Element,
        value: &T,
        external: bool,
    ) -> Result<(), ValidationError> {
        self.inner.validate(element, value, external)?;
        if !self.allows(value) {
            return Err(ValidationError::Range(format!(
                "{:?} is not one of {:?}",
                value, self.values
            )));
        }
        Ok(())
    }

    fn transform(&self, element: &Element, value: T) -> T {
        self.inner.transform(element, value)
    }

    fn stringify(&self, value: &T) -> String {
        self.inner.stringify(value)
    }

    fn eql(&self, element: &Element, a: &T, b: &T) -> bool {
        self.inner.eql(element, a, b)
    }

    fn before_set(&self, element: &Element, value: &T, removal: bool) {
        self.inner.before_set(element, value, removal);
    }

    fn transform_get(&self, element: &Element, value: T) -> T {
        self.inner.transform_get(element, value)
    }

    fn update_content_attr(&self, old: &T, new: &T) -> ContentAttr {
        self.inner.update_content_attr(old, new)
    }

    fn is_reflective(&self) -> bool {
        self.inner.is_reflective()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::test_support::{binding, element};
    use crate::transformers::{number, string};

    fn sizes() -> LiteralTransformer<String, crate::transformers::StringTransformer> {
        literal(["s", "m", "l"].map(String::from), string())
    }

    #[test]
    fn test_literal_rejects_disallowed_assignments() {
        let el = element();
        let t = sizes();
        assert!(t.validate(&el, &"m".to_string(), false).is_ok());
        assert!(matches!(
            t.validate(&el, &"xl".to_string(), false),
            Err(ValidationError::Range(_))
        ));
    }

    #[test]
    fn test_literal_parse_falls_back() {
        let el = element();
        let t = sizes();
        t.init(&el, &binding("size"), &"m".to_string());

        assert_eq!(t.parse(&el, Some("l")).as_deref(), Some("l"));
        assert_eq!(t.parse(&el, Some("xl")).as_deref(), Some("m"));
        assert_eq!(t.parse(&el, None).as_deref(), Some("m"));
    }

    #[test]
    fn test_literal_over_numbers() {
        let el = element();
        let t = literal([1.0, 2.0, 4.0], number());
        t.init(&el, &binding("scale"), &1.0);
        assert_eq!(t.parse(&el, Some("4")), Some(4.0));
        assert_eq!(t.parse(&el, Some("3")), Some(1.0));
        assert_eq!(t.parse(&el, Some("nope")), Some(1.0));
    }

    #[test]
    fn test_empty_literal_is_a_config_error() {
        let t = literal(Vec::<String>::new(), string());
        assert!(t.check(&binding("size")).unwrap_err().is_config());
    }
}
