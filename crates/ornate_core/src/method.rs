//! Managed methods
//!
//! A method declared on a class is stored as a callable slot keyed by
//! [`MethodId`]. Decorators that wrap a method (currently `debounce`)
//! register a new slot and point the method's public name at it, recording
//! `wrapper -> original` in the class metadata. Reactive initialization
//! follows that alias chain back to the undecorated callable.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::Element;

/// Identifier of one callable slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MethodId(u64);

impl MethodId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        MethodId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Type-erased argument handed to managed methods
///
/// Reactive calls pass an empty payload; subscriptions pass the (transformed)
/// event or signal value; observers pass their delivery records.
#[derive(Clone, Default)]
pub struct Payload(Option<Rc<dyn Any>>);

impl Payload {
    pub fn new<T: 'static>(value: T) -> Self {
        Payload(Some(Rc::new(value)))
    }

    pub fn from_rc(value: Rc<dyn Any>) -> Self {
        Payload(Some(value))
    }

    pub fn empty() -> Self {
        Payload(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    pub fn as_rc(&self) -> Option<Rc<dyn Any>> {
        self.0.clone()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Payload(..)"),
            None => f.write_str("Payload(empty)"),
        }
    }
}

/// Callable stored in a method slot
pub type MethodFn = Rc<dyn Fn(&Element, &Payload)>;

/// Handle to a method declared through `ClassBuilder::method`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Method {
    name: Rc<str>,
    id: MethodId,
}

impl Method {
    pub(crate) fn new(name: &str, id: MethodId) -> Self {
        Self {
            name: Rc::from(name),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot of the undecorated body
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Call the public (possibly wrapped) method on an element
    pub fn call(&self, element: &Element, payload: Payload) {
        element.call_method(&self.name, payload);
    }
}
