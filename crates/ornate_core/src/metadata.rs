//! Per-class metadata
//!
//! Every class level owns one [`ClassMetadata`], filled in while its
//! [`ClassBuilder`](crate::class::ClassBuilder) runs and frozen once the
//! class is built. Lookups through
//! [`ElementClass`](crate::class::ElementClass) merge the chain, with the
//! most derived level winning on a name collision.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::error::Result;
use crate::method::{MethodFn, MethodId};

/// Type-erased view of a managed field
pub trait ManagedField {
    fn property(&self) -> &str;

    /// Reflected attribute name, `None` for in-memory properties
    fn attribute(&self) -> Option<&str>;

    /// Per-instance initialization, run while the instance is constructed
    fn init(self: Rc<Self>, element: &Element) -> Result<()>;

    fn get_any(&self, element: &Element) -> Box<dyn Any>;

    /// Write through the setter; fails with `TypeMismatch` on the wrong type
    fn set_any(&self, element: &Element, value: Box<dyn Any>) -> Result<()>;

    fn type_name(&self) -> &'static str;
}

/// One field registered on a class
#[derive(Clone)]
pub struct FieldEntry {
    field: Rc<dyn ManagedField>,
}

impl FieldEntry {
    pub(crate) fn new(field: Rc<dyn ManagedField>) -> Self {
        Self { field }
    }

    pub fn property(&self) -> &str {
        self.field.property()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.field.attribute()
    }

    pub fn field(&self) -> &Rc<dyn ManagedField> {
        &self.field
    }

    /// Whether this entry holds exactly `field`
    pub(crate) fn holds(&self, field: &dyn ManagedField) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.field) as *const (),
            field as *const dyn ManagedField as *const (),
        )
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("property", &self.property())
            .field("attribute", &self.attribute())
            .field("type", &self.field.type_name())
            .finish()
    }
}

/// Metadata record of one class level
#[derive(Default)]
pub struct ClassMetadata {
    tag_name: Option<String>,
    /// attribute name -> field
    attributes: IndexMap<String, FieldEntry>,
    /// property name -> field, for fields without an attribute
    properties: IndexMap<String, FieldEntry>,
    /// public method name -> slot currently answering to it
    methods: IndexMap<String, MethodId>,
    callables: FxHashMap<MethodId, MethodFn>,
    /// wrapper slot -> the slot it wraps
    method_aliases: FxHashMap<MethodId, MethodId>,
}

impl ClassMetadata {
    pub fn tag_name(&self) -> Option<&str> {
        self.tag_name.as_deref()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldEntry> {
        self.attributes.get(name)
    }

    /// Field by property name, reflected or not
    pub fn field(&self, property: &str) -> Option<&FieldEntry> {
        self.properties.get(property).or_else(|| {
            self.attributes
                .values()
                .find(|entry| entry.property() == property)
        })
    }

    pub fn method_id(&self, name: &str) -> Option<MethodId> {
        self.methods.get(name).copied()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub(crate) fn callable(&self, id: MethodId) -> Option<&MethodFn> {
        self.callables.get(&id)
    }

    /// The slot `wrapper` wraps, if it is a wrapper
    pub fn alias_of(&self, wrapper: MethodId) -> Option<MethodId> {
        self.method_aliases.get(&wrapper).copied()
    }

    // =========================================================================
    // DECLARATION (builder only)
    // =========================================================================

    pub(crate) fn set_tag_name(&mut self, tag: String) {
        self.tag_name = Some(tag);
    }

    pub(crate) fn insert_field(&mut self, entry: FieldEntry) {
        match entry.attribute() {
            Some(attribute) => {
                self.attributes.insert(attribute.to_string(), entry);
            }
            None => {
                self.properties.insert(entry.property().to_string(), entry);
            }
        }
    }

    pub(crate) fn insert_method(&mut self, name: &str, id: MethodId, callable: MethodFn) {
        self.methods.insert(name.to_string(), id);
        self.callables.insert(id, callable);
    }

    /// Point `name` at `wrapper`, remembering the slot it replaced
    pub(crate) fn wrap_method(&mut self, name: &str, wrapper: MethodId, callable: MethodFn) {
        if let Some(previous) = self.methods.insert(name.to_string(), wrapper) {
            self.method_aliases.insert(wrapper, previous);
        }
        self.callables.insert(wrapper, callable);
    }
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("tag_name", &self.tag_name)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("aliases", &self.method_aliases.len())
            .finish()
    }
}
