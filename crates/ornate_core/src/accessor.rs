//! Managed field accessors (`attr` / `prop`)
//!
//! A [`FieldAccessor`] owns one field's transformer, declared default and
//! per-instance bookkeeping. Values live in the element's field storage
//! under the property name.
//!
//! Setter path: validate, transform, compare, `before_set`, store, write
//! hooks, reflect to the attribute, publish `prop`.
//!
//! Attribute path (on the bus `attr` event): parse, compare, `before_set`,
//! store, write hooks, publish `prop`. A reflective write marks the
//! instance so the attribute notification it causes is skipped.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{listen, trigger, Event, EventKind};
use crate::class::ClassId;
use crate::element::Element;
use crate::error::{OrnateError, Result};
use crate::metadata::ManagedField;
use crate::side_table::InstanceTable;
use crate::transformer::{Binding, ContentAttr, Transformer};

/// Hook run after every stored value change, including initialization
pub(crate) type WriteHook<T> = Rc<dyn Fn(&Element, &T)>;

/// Options for `ClassBuilder::attr_with`
#[derive(Clone, Debug)]
pub struct AttrOptions {
    /// Attribute name, when it differs from the property name
    pub as_name: Option<String>,
    /// Write property changes back to the attribute
    pub reflective: bool,
}

impl Default for AttrOptions {
    fn default() -> Self {
        Self {
            as_name: None,
            reflective: true,
        }
    }
}

impl AttrOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            as_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn reflective(mut self, reflective: bool) -> Self {
        self.reflective = reflective;
        self
    }
}

/// Typed operations the [`Field`] handle forwards to
pub(crate) trait TypedField<T>: ManagedField {
    fn get(&self, element: &Element) -> T;

    fn write(&self, element: &Element, value: T, external: bool) -> Result<()>;

    fn add_write_hook(&self, hook: WriteHook<T>);

    fn owner(&self) -> ClassId;
}

pub(crate) struct FieldAccessor<T, X> {
    binding: Binding,
    transformer: X,
    default: T,
    reflective: bool,
    owner: ClassId,
    skip_next: InstanceTable<()>,
    hooks: RefCell<Vec<WriteHook<T>>>,
}

impl<T, X> FieldAccessor<T, X>
where
    T: Clone + PartialEq + 'static,
    X: Transformer<T>,
{
    pub(crate) fn new(
        binding: Binding,
        transformer: X,
        default: T,
        reflective: bool,
        owner: ClassId,
    ) -> Rc<Self> {
        Rc::new(Self {
            binding,
            transformer,
            default,
            reflective,
            owner,
            skip_next: InstanceTable::new(),
            hooks: RefCell::new(Vec::new()),
        })
    }

    fn stored(&self, element: &Element) -> T {
        element
            .read_value::<T>(&self.binding.property)
            .unwrap_or_else(|| self.default.clone())
    }

    fn store(&self, element: &Element, value: &T) {
        element.write_value(&self.binding.property, value.clone());
        let hooks: Vec<WriteHook<T>> = self.hooks.borrow().clone();
        for hook in hooks {
            hook(element, value);
        }
    }

    fn publish(&self, element: &Element, value: T) {
        trigger(
            element,
            Event::Prop {
                key: self.binding.property.clone(),
                value: Rc::new(value),
            },
        );
    }

    fn reflect(&self, element: &Element, old: &T, new: &T) {
        let Some(attribute) = self.binding.attribute.as_deref() else {
            return;
        };
        if !self.reflective {
            return;
        }
        match self.transformer.update_content_attr(old, new) {
            ContentAttr::Set => {
                let text = self.transformer.stringify(new);
                self.skip_next.set(element, ());
                element.set_attribute(attribute, &text);
                self.skip_next.take(element);
            }
            ContentAttr::Remove => {
                if element.has_attribute(attribute) {
                    self.skip_next.set(element, ());
                    element.remove_attribute(attribute);
                    self.skip_next.take(element);
                }
            }
            ContentAttr::Keep => {}
        }
    }

    fn on_attribute_changed(&self, element: &Element, raw: Option<&str>) {
        if self.skip_next.take(element).is_some() {
            return;
        }
        let Some(value) = self.transformer.parse(element, raw) else {
            tracing::warn!(
                "`{}`: ignoring unusable attribute value {:?}",
                self.binding.public_name(),
                raw
            );
            return;
        };
        let old = self.stored(element);
        if self.transformer.eql(element, &old, &value) {
            return;
        }
        self.transformer.before_set(element, &value, raw.is_none());
        self.store(element, &value);
        self.publish(element, value);
    }

    /// Value assigned as a plain data property before the upgrade
    fn recover_shadowed(&self, element: &Element) {
        let Some(raw) = element.host().take_raw_property(&self.binding.property) else {
            return;
        };
        if let Some(attribute) = self.binding.attribute.as_deref() {
            if element.has_attribute(attribute) {
                return;
            }
        }
        match raw.downcast_ref::<T>() {
            Some(value) => {
                if let Err(err) = self.write(element, value.clone(), true) {
                    tracing::warn!(
                        "`{}`: dropping pre-upgrade value: {}",
                        self.binding.property,
                        err
                    );
                }
            }
            None => tracing::warn!(
                "`{}`: dropping pre-upgrade value of the wrong type (expected {})",
                self.binding.property,
                type_name::<T>()
            ),
        }
    }
}

impl<T, X> ManagedField for FieldAccessor<T, X>
where
    T: Clone + PartialEq + 'static,
    X: Transformer<T>,
{
    fn property(&self) -> &str {
        &self.binding.property
    }

    fn attribute(&self) -> Option<&str> {
        self.binding.attribute.as_deref()
    }

    fn init(self: Rc<Self>, element: &Element) -> Result<()> {
        self.transformer
            .validate(element, &self.default, false)
            .map_err(|err| {
                OrnateError::config(
                    &self.binding.property,
                    format!("invalid initial value: {}", err),
                )
            })?;
        let mut value = self.transformer.transform(element, self.default.clone());
        self.transformer.init(element, &self.binding, &value);

        if let Some(attribute) = self.binding.attribute.clone() {
            if let Some(raw) = element.get_attribute(&attribute) {
                if let Some(parsed) = self.transformer.parse(element, Some(&raw)) {
                    value = parsed;
                }
            }

            let field = self.clone();
            listen(element, EventKind::Attr, move |element, event| {
                if let Event::Attr { name, new, .. } = event {
                    if *name == attribute {
                        field.on_attribute_changed(element, new.as_deref());
                    }
                }
            });
        }

        self.transformer.before_set(element, &value, false);
        self.store(element, &value);
        self.recover_shadowed(element);
        Ok(())
    }

    fn get_any(&self, element: &Element) -> Box<dyn Any> {
        Box::new(TypedField::get(self, element))
    }

    fn set_any(&self, element: &Element, value: Box<dyn Any>) -> Result<()> {
        match value.downcast::<T>() {
            Ok(value) => self.write(element, *value, false),
            Err(_) => Err(OrnateError::TypeMismatch {
                key: self.binding.property.clone(),
                expected: type_name::<T>(),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T, X> TypedField<T> for FieldAccessor<T, X>
where
    T: Clone + PartialEq + 'static,
    X: Transformer<T>,
{
    fn get(&self, element: &Element) -> T {
        self.transformer
            .transform_get(element, self.stored(element))
    }

    fn write(&self, element: &Element, value: T, external: bool) -> Result<()> {
        self.transformer.validate(element, &value, external)?;
        let value = self.transformer.transform(element, value);

        let old = self.stored(element);
        if self.transformer.eql(element, &old, &value) {
            return Ok(());
        }

        tracing::trace!("set `{}` on {:?}", self.binding.property, element.id());
        self.transformer.before_set(element, &value, false);
        self.store(element, &value);
        self.reflect(element, &old, &value);
        self.publish(element, value);
        Ok(())
    }

    fn add_write_hook(&self, hook: WriteHook<T>) {
        self.hooks.borrow_mut().push(hook);
    }

    fn owner(&self) -> ClassId {
        self.owner
    }
}

/// Handle to a managed field, returned by `attr` and `prop`
pub struct Field<T> {
    inner: Rc<dyn TypedField<T>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Field<T> {
    pub(crate) fn new<X: Transformer<T>>(accessor: Rc<FieldAccessor<T, X>>) -> Self {
        Self { inner: accessor }
    }

    pub fn get(&self, element: &Element) -> T {
        self.inner.get(element)
    }

    /// Assign through the validating setter
    pub fn set(&self, element: &Element, value: impl Into<T>) -> Result<()> {
        self.inner.write(element, value.into(), false)
    }

    /// Assign a value that came from outside the element (subscriptions)
    pub(crate) fn set_external(&self, element: &Element, value: T) -> Result<()> {
        self.inner.write(element, value, true)
    }

    pub fn name(&self) -> &str {
        self.inner.property()
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.inner.attribute()
    }

    pub(crate) fn owner(&self) -> ClassId {
        self.inner.owner()
    }

    pub(crate) fn add_write_hook(&self, hook: WriteHook<T>) {
        self.inner.add_write_hook(hook);
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("property", &self.inner.property())
            .field("attribute", &self.inner.attribute())
            .finish()
    }
}
