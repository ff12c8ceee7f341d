use crate::element::Element;
use crate::error::{OrnateError, ValidationError};
use crate::side_table::InstanceTable;
use crate::transformer::{Binding, ContentAttr, Transformer};

// =============================================================================
// NUMBER
// =============================================================================

/// Bounded floating point values
///
/// Attribute input is clamped into range; direct assignments outside the
/// range are rejected.
pub struct NumberTransformer {
    min: f64,
    max: f64,
    allow_nan: bool,
    fallback: InstanceTable<f64>,
}

pub fn number() -> NumberTransformer {
    NumberTransformer {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
        allow_nan: false,
        fallback: InstanceTable::new(),
    }
}

impl NumberTransformer {
    pub fn min(mut self, min: f64) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    pub fn allow_nan(mut self, allow: bool) -> Self {
        self.allow_nan = allow;
        self
    }

    fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            value
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

impl Transformer<f64> for NumberTransformer {
    fn check(&self, binding: &Binding) -> Result<(), OrnateError> {
        if self.min.is_nan() || self.max.is_nan() {
            return Err(OrnateError::config(
                &binding.property,
                "number bounds must not be NaN",
            ));
        }
        if self.min > self.max {
            return Err(OrnateError::config(
                &binding.property,
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    fn init(&self, element: &Element, _binding: &Binding, initial: &f64) {
        self.fallback.set(element, *initial);
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<f64> {
        let Some(raw) = raw else {
            return self.fallback.get(element).or(Some(0.0));
        };
        let value: f64 = raw.trim().parse().ok()?;
        if value.is_nan() && !self.allow_nan {
            return None;
        }
        Some(self.clamp(value))
    }

    fn validate(
        &self,
        _element: &Element,
        value: &f64,
        _external: bool,
    ) -> Result<(), ValidationError> {
        if value.is_nan() {
            if self.allow_nan {
                return Ok(());
            }
            return Err(ValidationError::Type("NaN is not allowed".into()));
        }
        if *value < self.min || *value > self.max {
            return Err(ValidationError::Range(format!(
                "{} is outside [{}, {}]",
                value, self.min, self.max
            )));
        }
        Ok(())
    }

    fn stringify(&self, value: &f64) -> String {
        value.to_string()
    }

    fn eql(&self, _element: &Element, a: &f64, b: &f64) -> bool {
        a == b || (a.is_nan() && b.is_nan())
    }
}

// =============================================================================
// INTEGER
// =============================================================================

/// Bounded wide integers
///
/// Parsing accepts an optional trailing `n`; input that does not parse
/// keeps the last good value.
pub struct IntTransformer {
    min: i128,
    max: i128,
    fallback: InstanceTable<i128>,
}

pub fn int() -> IntTransformer {
    IntTransformer {
        min: i128::MIN,
        max: i128::MAX,
        fallback: InstanceTable::new(),
    }
}

impl IntTransformer {
    pub fn min(mut self, min: i128) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: i128) -> Self {
        self.max = max;
        self
    }
}

impl Transformer<i128> for IntTransformer {
    fn check(&self, binding: &Binding) -> Result<(), OrnateError> {
        if self.min > self.max {
            return Err(OrnateError::config(
                &binding.property,
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    fn init(&self, element: &Element, _binding: &Binding, initial: &i128) {
        self.fallback.set(element, *initial);
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<i128> {
        let Some(raw) = raw else {
            return self.fallback.get(element).or(Some(0));
        };
        let raw = raw.trim();
        let digits = raw.strip_suffix('n').unwrap_or(raw);
        let value: i128 = digits.parse().ok()?;
        Some(value.clamp(self.min, self.max))
    }

    fn validate(
        &self,
        _element: &Element,
        value: &i128,
        _external: bool,
    ) -> Result<(), ValidationError> {
        if *value < self.min || *value > self.max {
            return Err(ValidationError::Range(format!(
                "{} is outside [{}, {}]",
                value, self.min, self.max
            )));
        }
        Ok(())
    }

    fn stringify(&self, value: &i128) -> String {
        value.to_string()
    }
}

// =============================================================================
// NULLABLE
// =============================================================================

/// Adds an explicit "no value" to another transformer
///
/// A missing attribute means `None`, and `None` removes the attribute.
pub struct Nullable<X> {
    inner: X,
}

pub fn nullable<X>(inner: X) -> Nullable<X> {
    Nullable { inner }
}

impl<T, X> Transformer<Option<T>> for Nullable<X>
where
    T: Clone + PartialEq + 'static,
    X: Transformer<T>,
{
    fn check(&self, binding: &Binding) -> Result<(), OrnateError> {
        self.inner.check(binding)
    }

    fn init(&self, element: &Element, binding: &Binding, initial: &Option<T>) {
        if let Some(initial) = initial {
            self.inner.init(element, binding, initial);
        }
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<Option<T>> {
        match raw {
            None => Some(None),
            Some(raw) => self.inner.parse(element, Some(raw)).map(Some),
        }
    }

    fn validate(
        &self,
        element: &Element,
        value: &Option<T>,
        external: bool,
    ) -> Result<(), ValidationError> {
        match value {
            Some(value) => self.inner.validate(element, value, external),
            None => Ok(()),
        }
    }

    fn transform(&self, element: &Element, value: Option<T>) -> Option<T> {
        value.map(|value| self.inner.transform(element, value))
    }

    fn stringify(&self, value: &Option<T>) -> String {
        value
            .as_ref()
            .map(|value| self.inner.stringify(value))
            .unwrap_or_default()
    }

    fn eql(&self, element: &Element, a: &Option<T>, b: &Option<T>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.inner.eql(element, a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn before_set(&self, element: &Element, value: &Option<T>, removal: bool) {
        if let Some(value) = value {
            self.inner.before_set(element, value, removal);
        }
    }

    fn transform_get(&self, element: &Element, value: Option<T>) -> Option<T> {
        value.map(|value| self.inner.transform_get(element, value))
    }

    fn update_content_attr(&self, old: &Option<T>, new: &Option<T>) -> ContentAttr {
        match (old, new) {
            (_, None) => ContentAttr::Remove,
            (Some(old), Some(new)) => self.inner.update_content_attr(old, new),
            (None, Some(_)) => ContentAttr::Set,
        }
    }

    fn is_reflective(&self) -> bool {
        self.inner.is_reflective()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::test_support::{binding, element};

    #[test]
    fn test_number_parse_clamps() {
        let el = element();
        let t = number().min(0.0).max(10.0);
        t.init(&el, &binding("foo"), &3.0);

        assert_eq!(t.parse(&el, Some("22")), Some(10.0));
        assert_eq!(t.parse(&el, Some("-4")), Some(0.0));
        assert_eq!(t.parse(&el, Some(" 2.5 ")), Some(2.5));
        assert_eq!(t.parse(&el, Some("abc")), None);
        assert_eq!(t.parse(&el, Some("NaN")), None);
        assert_eq!(t.parse(&el, None), Some(3.0));
    }

    #[test]
    fn test_number_validate() {
        let el = element();
        let t = number().min(0.0).max(10.0);
        assert!(t.validate(&el, &10.0, false).is_ok());
        assert!(matches!(
            t.validate(&el, &-1.0, false),
            Err(ValidationError::Range(_))
        ));
        assert!(matches!(
            t.validate(&el, &f64::NAN, false),
            Err(ValidationError::Type(_))
        ));

        let t = number().allow_nan(true);
        assert!(t.validate(&el, &f64::NAN, false).is_ok());
        assert!(t.parse(&el, Some("NaN")).unwrap().is_nan());
        assert!(t.eql(&el, &f64::NAN, &f64::NAN));
    }

    #[test]
    fn test_number_check_bounds() {
        assert!(number().min(5.0).max(1.0).check(&binding("foo")).is_err());
        assert!(number().min(f64::NAN).check(&binding("foo")).is_err());
        assert!(number().min(1.0).max(1.0).check(&binding("foo")).is_ok());
    }

    #[test]
    fn test_number_round_trip() {
        let el = element();
        let t = number();
        for value in [0.0, -3.5, 10.0, 1e-7, 123456.789] {
            let parsed = t.parse(&el, Some(&t.stringify(&value))).unwrap();
            assert!(t.eql(&el, &parsed, &value), "{} -> {}", value, parsed);
        }
        assert_eq!(t.stringify(&10.0), "10");
    }

    #[test]
    fn test_int_parse() {
        let el = element();
        let t = int().min(-5).max(1_000_000_000_000_000_000_000);
        t.init(&el, &binding("big"), &7);

        assert_eq!(
            t.parse(&el, Some("999999999999999999999n")),
            Some(999_999_999_999_999_999_999)
        );
        assert_eq!(t.parse(&el, Some("-100")), Some(-5));
        assert_eq!(t.parse(&el, Some("1.5")), None);
        assert_eq!(t.parse(&el, Some("n")), None);
        assert_eq!(t.parse(&el, None), Some(7));
        assert!(t.validate(&el, &-6, false).is_err());
        assert!(int().min(2).max(1).check(&binding("big")).is_err());
    }

    #[test]
    fn test_int_round_trip() {
        let el = element();
        let t = int();
        for value in [0, -42, i128::from(u64::MAX) + 1, i128::MIN, i128::MAX] {
            assert_eq!(t.parse(&el, Some(&t.stringify(&value))), Some(value));
        }
    }

    #[test]
    fn test_nullable_round_trip() {
        let el = element();
        let t = nullable(int());
        let t: &dyn Transformer<Option<i128>> = &t;
        for value in [Some(0), Some(-7), Some(i128::MAX)] {
            assert_eq!(t.parse(&el, Some(&t.stringify(&value))), Some(value));
        }
        // `None` is carried by removing the attribute
        assert_eq!(t.update_content_attr(&Some(1), &None), ContentAttr::Remove);
        assert_eq!(t.parse(&el, None), Some(None));
    }

    #[test]
    fn test_nullable_number() {
        let el = element();
        let t = nullable(number().max(10.0));
        let t: &dyn Transformer<Option<f64>> = &t;
        t.init(&el, &binding("limit"), &None);

        assert_eq!(t.parse(&el, None), Some(None));
        assert_eq!(t.parse(&el, Some("12")), Some(Some(10.0)));
        assert_eq!(t.parse(&el, Some("x")), None);
        assert!(t.validate(&el, &None, false).is_ok());
        assert!(t.validate(&el, &Some(11.0), false).is_err());
        assert_eq!(t.update_content_attr(&Some(1.0), &None), ContentAttr::Remove);
        assert_eq!(t.update_content_attr(&None, &Some(1.0)), ContentAttr::Set);
        assert_eq!(t.stringify(&Some(2.0)), "2");
    }
}
