//! Tag name registry
//!
//! Maps external tag names to defined classes, standing in for the host
//! platform's element registry.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::class::ElementClass;
use crate::element::Element;
use crate::error::{OrnateError, Result};
use crate::host::HostElement;

/// Names the platform reserves even though they contain a hyphen
const RESERVED_TAGS: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Check that `tag` is a valid custom element name
pub fn validate_tag(tag: &str) -> Result<()> {
    let invalid = |reason: &str| Err(OrnateError::config(tag, reason));

    if !tag.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("tag name must start with a lowercase ASCII letter");
    }
    if !tag.contains('-') {
        return invalid("tag name must contain a hyphen");
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_')))
    {
        return invalid(&format!("tag name must not contain `{}`", c));
    }
    if RESERVED_TAGS.contains(&tag) {
        return invalid("tag name is reserved");
    }
    Ok(())
}

/// Registry of defined classes, in definition order
#[derive(Default)]
pub struct Registry {
    classes: RefCell<IndexMap<String, Rc<ElementClass>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its declared tag name
    pub fn define(&self, class: &Rc<ElementClass>) -> Result<()> {
        let Some(tag) = class.tag_name() else {
            return Err(OrnateError::config(
                class.name(),
                "class has no tag name; declare one with `define`",
            ));
        };

        let mut classes = self.classes.borrow_mut();
        if classes.contains_key(tag) {
            return Err(OrnateError::config(tag, "tag name is already defined"));
        }
        tracing::debug!("define <{}> as {}", tag, class.name());
        classes.insert(tag.to_string(), class.clone());
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Rc<ElementClass>> {
        self.classes.borrow().get(tag).cloned()
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.classes.borrow().contains_key(tag)
    }

    /// Defined tag names, in definition order
    pub fn tags(&self) -> Vec<String> {
        self.classes.borrow().keys().cloned().collect()
    }

    /// Construct a fresh element for `tag`
    pub fn create(&self, tag: &str) -> Result<Element> {
        self.lookup(tag)?.create()
    }

    /// Upgrade an existing host element to the class defined for `tag`
    pub fn upgrade(&self, tag: &str, host: Rc<HostElement>) -> Result<Element> {
        self.lookup(tag)?.upgrade(host)
    }

    fn lookup(&self, tag: &str) -> Result<Rc<ElementClass>> {
        self.get(tag)
            .ok_or_else(|| OrnateError::UnknownTag(tag.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags())
            .finish()
    }
}
