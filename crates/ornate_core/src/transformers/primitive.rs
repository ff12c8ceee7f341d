use crate::element::Element;
use crate::side_table::InstanceTable;
use crate::transformer::{Binding, ContentAttr, Transformer};

/// Text values; never rejects anything
#[derive(Default)]
pub struct StringTransformer {
    fallback: InstanceTable<String>,
}

pub fn string() -> StringTransformer {
    StringTransformer::default()
}

impl Transformer<String> for StringTransformer {
    fn init(&self, element: &Element, _binding: &Binding, initial: &String) {
        self.fallback.set(element, initial.clone());
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<String> {
        match raw {
            Some(raw) => Some(raw.to_string()),
            None => Some(self.fallback.get(element).unwrap_or_default()),
        }
    }

    fn stringify(&self, value: &String) -> String {
        value.clone()
    }
}

/// Presence-based flags: any attribute value means `true`
#[derive(Default, Clone, Copy)]
pub struct BooleanTransformer;

pub fn boolean() -> BooleanTransformer {
    BooleanTransformer
}

impl Transformer<bool> for BooleanTransformer {
    fn parse(&self, _element: &Element, raw: Option<&str>) -> Option<bool> {
        Some(raw.is_some())
    }

    fn stringify(&self, _value: &bool) -> String {
        String::new()
    }

    fn update_content_attr(&self, _old: &bool, new: &bool) -> ContentAttr {
        if *new {
            ContentAttr::Set
        } else {
            ContentAttr::Remove
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::test_support::{binding, element};

    #[test]
    fn test_string_falls_back_to_initial() {
        let el = element();
        let t = string();
        t.init(&el, &binding("label"), &"A".to_string());

        assert_eq!(t.parse(&el, Some("B")).as_deref(), Some("B"));
        assert_eq!(t.parse(&el, Some("")).as_deref(), Some(""));
        assert_eq!(t.parse(&el, None).as_deref(), Some("A"));
    }

    #[test]
    fn test_string_without_init_falls_back_to_empty() {
        let el = element();
        assert_eq!(string().parse(&el, None).as_deref(), Some(""));
    }

    #[test]
    fn test_string_round_trip() {
        let el = element();
        let t = string();
        for value in ["", "plain", "with spaces", "ünïcødé", "\"quoted\""] {
            let value = value.to_string();
            let parsed = t.parse(&el, Some(&t.stringify(&value))).unwrap();
            assert!(t.eql(&el, &parsed, &value));
        }
    }

    #[test]
    fn test_boolean_presence() {
        let el = element();
        let t = boolean();
        assert_eq!(t.parse(&el, Some("")), Some(true));
        assert_eq!(t.parse(&el, Some("false")), Some(true));
        assert_eq!(t.parse(&el, None), Some(false));
        assert_eq!(t.stringify(&true), "");
        assert_eq!(t.update_content_attr(&false, &true), ContentAttr::Set);
        assert_eq!(t.update_content_attr(&true, &false), ContentAttr::Remove);
    }
}
