//! Class declaration
//!
//! A class is declared once through [`ClassBuilder`] and frozen into an
//! [`ElementClass`]. Every builder call corresponds to one decorator
//! application and takes effect in call order:
//!
//! ```ignore
//! let mut builder = ClassBuilder::new("Counter");
//! builder.define("x-counter");
//! let count = builder.attr(Member::accessor("count"), number().min(0.0), 0.0)?;
//! let render = builder.method(Member::method("render"), |el, _| { /* ... */ })?;
//! builder.debounce(&render, Debounce::Microtask)?;
//! builder.reactive(&render, ReactiveOptions::new().field(&count))?;
//! let class = builder.build()?;
//! ```
//!
//! Classes can extend each other. The chain of classes is a list of
//! *levels*, base first; each level has its own lifecycle, metadata and
//! member initializers.

use indexmap::IndexSet;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::accessor::{AttrOptions, Field, FieldAccessor};
use crate::debounce::{wrap_method, Debounce};
use crate::element::Element;
use crate::error::{OrnateError, Result};
use crate::host::HostElement;
use crate::lifecycle::{enhance, InitToken, Lifecycle, NoLifecycle};
use crate::metadata::{ClassMetadata, FieldEntry, ManagedField};
use crate::method::{Method, MethodFn, MethodId, Payload};
use crate::observe::{self, ObserveOptions, ObserverFactory};
use crate::reactive::{self, ReactiveOptions};
use crate::registry::validate_tag;
use crate::state::{self, StateOptions};
use crate::subscribe::{self, Source, SubscribeOptions, SubscribeTarget};
use crate::transformer::{Binding, Transformer};

/// Per-instance setup registered by a decorator
pub(crate) type Initializer = Rc<dyn Fn(&Element) -> Result<()>>;

/// Identity of one class level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ClassId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// MEMBERS
// =============================================================================

/// Kind of class member a decorator is applied to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Accessor,
    Field,
    Method,
    Getter,
    Setter,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Accessor => "accessor",
            MemberKind::Field => "field",
            MemberKind::Method => "method",
            MemberKind::Getter => "getter",
            MemberKind::Setter => "setter",
        };
        f.write_str(name)
    }
}

/// Descriptor of the member a decorator is applied to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    name: String,
    kind: MemberKind,
    is_static: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_static: false,
        }
    }

    pub fn accessor(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Accessor)
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Field)
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Method)
    }

    pub fn getter(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Getter)
    }

    pub fn setter(name: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Setter)
    }

    /// Mark the member as static
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Private members (`#name`) have no public facade of their own
    pub fn is_private(&self) -> bool {
        self.name.starts_with('#')
    }

    fn check(&self, decorator: &str, allowed: &[MemberKind]) -> Result<()> {
        if self.name.is_empty() || self.name == "#" {
            return Err(OrnateError::config(
                &self.name,
                format!("`{}` needs a named member", decorator),
            ));
        }
        if self.is_static {
            return Err(OrnateError::config(
                &self.name,
                format!("`{}` cannot be applied to static members", decorator),
            ));
        }
        if !allowed.contains(&self.kind) {
            return Err(OrnateError::config(
                &self.name,
                format!("`{}` cannot be applied to a {}", decorator, self.kind),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Declares one class level
pub struct ClassBuilder {
    id: ClassId,
    name: String,
    parent: Option<Rc<ElementClass>>,
    lifecycle: Rc<dyn Lifecycle>,
    enhanced: bool,
    managed: bool,
    metadata: ClassMetadata,
    initializers: Vec<Initializer>,
    /// Public getters/setters standing in front of private members
    facades: IndexSet<String>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClassId::next(),
            name: name.into(),
            parent: None,
            lifecycle: Rc::new(NoLifecycle),
            enhanced: false,
            managed: false,
            metadata: ClassMetadata::default(),
            initializers: Vec::new(),
            facades: IndexSet::new(),
        }
    }

    /// Declare a class extending `parent`
    pub fn extend(name: impl Into<String>, parent: &Rc<ElementClass>) -> Self {
        let mut builder = Self::new(name);
        builder.parent = Some(parent.clone());
        builder
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    /// The author's own lifecycle callbacks for this level
    pub fn lifecycle(&mut self, lifecycle: impl Lifecycle) -> &mut Self {
        self.lifecycle = Rc::new(lifecycle);
        self
    }

    /// Republish this level's lifecycle on the bus
    ///
    /// Levels that declare managed members are enhanced automatically.
    pub fn enhance(&mut self) -> &mut Self {
        self.enhanced = true;
        self
    }

    /// Enhance this level and give it a tag name for a
    /// [`Registry`](crate::registry::Registry)
    pub fn define(&mut self, tag: impl Into<String>) -> &mut Self {
        self.metadata.set_tag_name(tag.into());
        self.enhanced = true;
        self
    }

    /// Declare a public getter, setter or accessor fronting a private member
    ///
    /// A private `attr` declared after `facade(Member::getter("x"))` binds to
    /// attribute `x` without an explicit name.
    pub fn facade(&mut self, member: Member) -> Result<&mut Self> {
        member.check(
            "facade",
            &[MemberKind::Getter, MemberKind::Setter, MemberKind::Accessor],
        )?;
        if member.is_private() {
            return Err(OrnateError::config(
                member.name(),
                "a facade must be a public member",
            ));
        }
        self.facades.insert(member.name().to_string());
        Ok(self)
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    /// Reflected field bound to the attribute of the same name
    pub fn attr<T, X>(&mut self, member: Member, transformer: X, default: T) -> Result<Field<T>>
    where
        T: Clone + PartialEq + 'static,
        X: Transformer<T>,
    {
        self.attr_with(member, transformer, default, AttrOptions::default())
    }

    pub fn attr_with<T, X>(
        &mut self,
        member: Member,
        transformer: X,
        default: T,
        options: AttrOptions,
    ) -> Result<Field<T>>
    where
        T: Clone + PartialEq + 'static,
        X: Transformer<T>,
    {
        member.check("attr", &[MemberKind::Accessor])?;
        let attribute = match options.as_name {
            Some(name) if !name.is_empty() => name,
            Some(_) => {
                return Err(OrnateError::config(
                    member.name(),
                    "attribute name must not be empty",
                ))
            }
            None if member.is_private() => {
                let public = member.name().trim_start_matches('#');
                if !self.facades.contains(public) {
                    return Err(OrnateError::config(
                        member.name(),
                        "a private member needs a public facade or an attribute name",
                    ));
                }
                public.to_string()
            }
            None => member.name().to_string(),
        };
        let binding = Binding {
            property: member.name().to_string(),
            attribute: Some(attribute),
        };
        self.declare_field(binding, transformer, default, options.reflective)
    }

    /// In-memory field with no attribute
    pub fn prop<T, X>(&mut self, member: Member, transformer: X, default: T) -> Result<Field<T>>
    where
        T: Clone + PartialEq + 'static,
        X: Transformer<T>,
    {
        member.check("prop", &[MemberKind::Accessor])?;
        let binding = Binding {
            property: member.name().to_string(),
            attribute: None,
        };
        self.declare_field(binding, transformer, default, false)
    }

    fn declare_field<T, X>(
        &mut self,
        binding: Binding,
        transformer: X,
        default: T,
        reflective: bool,
    ) -> Result<Field<T>>
    where
        T: Clone + PartialEq + 'static,
        X: Transformer<T>,
    {
        transformer.check(&binding)?;

        if self.metadata.field(&binding.property).is_some() {
            return Err(OrnateError::config(
                &binding.property,
                "field is declared twice",
            ));
        }
        if let Some(attribute) = &binding.attribute {
            if self.metadata.attribute(attribute).is_some() {
                return Err(OrnateError::config(
                    &binding.property,
                    format!("attribute `{}` is already bound", attribute),
                ));
            }
        }

        let reflective = reflective && binding.attribute.is_some() && transformer.is_reflective();
        tracing::trace!(
            "{}: declare field `{}` (attribute {:?}, reflective {})",
            self.name,
            binding.property,
            binding.attribute,
            reflective
        );

        let accessor = FieldAccessor::new(binding, transformer, default, reflective, self.id);
        self.metadata.insert_field(FieldEntry::new(accessor.clone()));

        let init = accessor.clone();
        self.push_initializer(Rc::new(move |element| {
            if !element.class().resolves_to(&*init) {
                tracing::trace!("`{}` is redeclared by a derived level", init.property());
                return Ok(());
            }
            ManagedField::init(init.clone(), element)
        }));
        Ok(Field::new(accessor))
    }

    /// Mirror a field into a custom state of the element's internals
    pub fn state<T>(&mut self, field: &Field<T>, options: StateOptions<T>) -> Result<()>
    where
        T: Clone + PartialEq + 'static,
    {
        if field.owner() != self.id {
            return Err(OrnateError::config(
                field.name(),
                "`state` must be applied where the field is declared",
            ));
        }
        state::install(field, options)
    }

    // =========================================================================
    // METHODS
    // =========================================================================

    pub fn method<F>(&mut self, member: Member, body: F) -> Result<Method>
    where
        F: Fn(&Element, &Payload) + 'static,
    {
        member.check("method", &[MemberKind::Method])?;
        if self.metadata.method_id(member.name()).is_some() {
            return Err(OrnateError::config(
                member.name(),
                "method is declared twice",
            ));
        }
        let id = MethodId::next();
        self.metadata.insert_method(member.name(), id, Rc::new(body));
        Ok(Method::new(member.name(), id))
    }

    /// Coalesce calls to a method declared on this level
    pub fn debounce(&mut self, method: &Method, strategy: Debounce) -> Result<()> {
        let current = self.metadata.method_id(method.name()).ok_or_else(|| {
            OrnateError::config(
                method.name(),
                "`debounce` must be applied where the method is declared",
            )
        })?;
        let original: MethodFn = self
            .metadata
            .callable(current)
            .cloned()
            .ok_or_else(|| OrnateError::config(method.name(), "method has no body"))?;

        self.metadata
            .wrap_method(method.name(), MethodId::next(), wrap_method(strategy, original));
        Ok(())
    }

    /// Run a method at init and again on matching property changes
    pub fn reactive(&mut self, method: &Method, options: ReactiveOptions) -> Result<()> {
        self.check_method(method, "reactive")?;
        let init = reactive::initializer(method, options)?;
        self.push_initializer(init);
        Ok(())
    }

    /// Feed a source into a method or field while the activation window is open
    pub fn subscribe(
        &mut self,
        target: SubscribeTarget,
        source: Source,
        options: SubscribeOptions,
    ) -> Result<()> {
        if let Some(method) = target.as_method() {
            self.check_method(method, "subscribe")?;
        }
        let init = subscribe::initializer(target, source, options)?;
        self.push_initializer(init);
        Ok(())
    }

    /// Attach a platform observer while the activation window is open
    pub fn observe(
        &mut self,
        method: &Method,
        factory: ObserverFactory,
        options: ObserveOptions,
    ) -> Result<()> {
        self.check_method(method, "observe")?;
        let init = observe::initializer(method, factory, options)?;
        self.push_initializer(init);
        Ok(())
    }

    fn check_method(&self, method: &Method, decorator: &str) -> Result<()> {
        let declared = self.metadata.method_id(method.name()).is_some()
            || self
                .parent
                .as_ref()
                .map_or(false, |parent| parent.resolve_method(method.name()).is_some());
        if declared {
            Ok(())
        } else {
            Err(OrnateError::config(
                method.name(),
                format!("`{}` needs a method declared on this class", decorator),
            ))
        }
    }

    fn push_initializer(&mut self, init: Initializer) {
        self.managed = true;
        self.initializers.push(init);
    }

    /// Freeze the declaration
    pub fn build(self) -> Result<Rc<ElementClass>> {
        if let Some(tag) = self.metadata.tag_name() {
            validate_tag(tag)?;
        }

        let lifecycle = if self.enhanced || self.managed {
            enhance(self.lifecycle)
        } else {
            self.lifecycle
        };

        let mut observed: IndexSet<String> = self
            .parent
            .as_ref()
            .map(|parent| parent.observed.clone())
            .unwrap_or_default();
        observed.extend(lifecycle.observed_attributes());
        observed.extend(self.metadata.attributes().map(|(name, _)| name.to_string()));

        tracing::debug!(
            "built class `{}` ({} initializer(s), enhanced: {})",
            self.name,
            self.initializers.len(),
            lifecycle.enhancement().is_some()
        );

        Ok(Rc::new(ElementClass {
            id: self.id,
            name: self.name,
            parent: self.parent,
            lifecycle,
            metadata: self.metadata,
            initializers: self.initializers,
            observed,
        }))
    }
}

// =============================================================================
// CLASSES
// =============================================================================

/// A frozen class level and its ancestors
pub struct ElementClass {
    id: ClassId,
    name: String,
    parent: Option<Rc<ElementClass>>,
    lifecycle: Rc<dyn Lifecycle>,
    metadata: ClassMetadata,
    initializers: Vec<Initializer>,
    observed: IndexSet<String>,
}

impl fmt::Debug for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ElementClass {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<ElementClass>> {
        self.parent.as_ref()
    }

    pub fn lifecycle(&self) -> &Rc<dyn Lifecycle> {
        &self.lifecycle
    }

    /// This level's own metadata
    pub fn metadata(&self) -> &ClassMetadata {
        &self.metadata
    }

    /// Every level of the chain, base first
    pub fn levels(&self) -> SmallVec<[&ElementClass; 4]> {
        let mut levels: SmallVec<[&ElementClass; 4]> = SmallVec::new();
        let mut level = Some(self);
        while let Some(current) = level {
            levels.push(current);
            level = current.parent.as_deref();
        }
        levels.reverse();
        levels
    }

    /// Levels from most derived to base
    fn ancestry(&self) -> impl Iterator<Item = &ElementClass> {
        std::iter::successors(Some(self), |level| level.parent.as_deref())
    }

    /// Token of the nearest enhanced level
    pub fn init_token(&self) -> Option<InitToken> {
        self.ancestry()
            .find_map(|level| level.lifecycle.enhancement())
    }

    pub fn is_enhanced(&self) -> bool {
        self.lifecycle.enhancement().is_some()
    }

    pub fn is_subclass_of(&self, other: &ElementClass) -> bool {
        self.ancestry().any(|level| level.id == other.id)
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.metadata.tag_name()
    }

    /// Attribute names the platform notifies this class about
    pub fn observed_attributes(&self) -> Vec<String> {
        self.observed.iter().cloned().collect()
    }

    pub fn observes(&self, name: &str) -> bool {
        self.observed.contains(name)
    }

    /// Managed field by property name; derived levels win
    pub fn field(&self, property: &str) -> Option<&FieldEntry> {
        self.ancestry()
            .find_map(|level| level.metadata.field(property))
    }

    /// Managed field by attribute name; derived levels win
    pub fn attribute_field(&self, attribute: &str) -> Option<&FieldEntry> {
        self.ancestry()
            .find_map(|level| level.metadata.attribute(attribute))
    }

    /// True unless a more derived level redeclares the field's property or
    /// attribute
    pub(crate) fn resolves_to(&self, field: &dyn ManagedField) -> bool {
        let owns_property = self
            .field(field.property())
            .map_or(false, |entry| entry.holds(field));
        let owns_attribute = field.attribute().map_or(true, |attribute| {
            self.attribute_field(attribute)
                .map_or(false, |entry| entry.holds(field))
        });
        owns_property && owns_attribute
    }

    fn callable(&self, id: MethodId) -> Option<MethodFn> {
        self.ancestry()
            .find_map(|level| level.metadata.callable(id).cloned())
    }

    fn method_id(&self, name: &str) -> Option<MethodId> {
        self.ancestry()
            .find_map(|level| level.metadata.method_id(name))
    }

    /// The public callable for `name`, debounced if it was debounced
    pub fn resolve_method(&self, name: &str) -> Option<MethodFn> {
        self.method_id(name).and_then(|id| self.callable(id))
    }

    /// The undecorated callable for `name`, following wrapper aliases
    pub fn resolve_original_method(&self, name: &str) -> Option<MethodFn> {
        let mut id = self.method_id(name)?;
        while let Some(original) = self
            .ancestry()
            .find_map(|level| level.metadata.alias_of(id))
        {
            id = original;
        }
        self.callable(id)
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Construct a fresh instance
    pub fn create(self: &Rc<Self>) -> Result<Element> {
        self.upgrade(HostElement::new())
    }

    /// Construct an instance over an existing host element
    ///
    /// Each level runs its initializers and then its `constructed` callback,
    /// base first. Afterwards attribute-changed is delivered for every
    /// observed attribute already present on the host.
    pub fn upgrade(self: &Rc<Self>, host: Rc<HostElement>) -> Result<Element> {
        let element = Element::new(self.clone(), host);
        tracing::debug!("construct {:?}", element);

        for level in self.levels() {
            for init in &level.initializers {
                init(&element)?;
            }
            level.lifecycle.constructed(&element);
        }

        for (name, value) in element.host().attributes() {
            if self.observes(&name) {
                element.attribute_changed_callback(&name, None, Some(&value));
            }
        }
        Ok(element)
    }
}
