use std::fmt;
use std::rc::Rc;

use crate::element::Element;
use crate::error::OrnateError;
use crate::side_table::InstanceTable;
use crate::source::{DomEvent, EventTarget, ListenerId};
use crate::transformer::{Binding, ContentAttr, Transformer};

/// A compiled inline handler, called with the element and the event
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Element, &DomEvent)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Element, &DomEvent) + 'static) -> Self {
        EventHandler(Rc::new(f))
    }

    pub fn call(&self, element: &Element, event: &DomEvent) {
        (self.0)(element, event);
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

/// Turns attribute text into a handler; `None` when the text does not compile
pub type HandlerCompiler = Rc<dyn Fn(&str) -> Option<EventHandler>>;

/// `on*` handler slots
///
/// The slot listens on the host for the event named by the rest of its
/// public name (`onselect` handles `select`). Writing the property never
/// touches the attribute.
pub struct EventHandlerTransformer {
    compiler: HandlerCompiler,
    handlers: Rc<InstanceTable<EventHandler>>,
    listeners: InstanceTable<ListenerId>,
}

pub fn event_handler(
    compiler: impl Fn(&str) -> Option<EventHandler> + 'static,
) -> EventHandlerTransformer {
    EventHandlerTransformer {
        compiler: Rc::new(compiler),
        handlers: Rc::new(InstanceTable::new()),
        listeners: InstanceTable::new(),
    }
}

fn event_type(binding: &Binding) -> Option<&str> {
    binding
        .public_name()
        .strip_prefix("on")
        .filter(|rest| !rest.is_empty())
}

impl Transformer<Option<EventHandler>> for EventHandlerTransformer {
    fn check(&self, binding: &Binding) -> Result<(), OrnateError> {
        if event_type(binding).is_none() {
            return Err(OrnateError::config(
                &binding.property,
                format!(
                    "handler slot `{}` must be named `on<event>`",
                    binding.public_name()
                ),
            ));
        }
        Ok(())
    }

    fn init(&self, element: &Element, binding: &Binding, _initial: &Option<EventHandler>) {
        let Some(kind) = event_type(binding) else {
            return;
        };
        if self.listeners.contains(element) {
            return;
        }

        let handlers = self.handlers.clone();
        let weak = element.downgrade();
        let id = element.add_event_listener(
            kind,
            Rc::new(move |event: &DomEvent| {
                let Some(element) = weak.upgrade() else {
                    return;
                };
                if let Some(handler) = handlers.get(&element) {
                    handler.call(&element, event);
                }
            }),
        );
        self.listeners.set(element, id);
    }

    fn parse(&self, _element: &Element, raw: Option<&str>) -> Option<Option<EventHandler>> {
        match raw {
            None => Some(None),
            Some(text) => (self.compiler)(text).map(Some),
        }
    }

    fn stringify(&self, _value: &Option<EventHandler>) -> String {
        String::new()
    }

    fn before_set(&self, element: &Element, value: &Option<EventHandler>, _removal: bool) {
        match value {
            Some(handler) => self.handlers.set(element, handler.clone()),
            None => {
                self.handlers.take(element);
            }
        }
    }

    fn update_content_attr(
        &self,
        _old: &Option<EventHandler>,
        _new: &Option<EventHandler>,
    ) -> ContentAttr {
        ContentAttr::Keep
    }

    fn is_reflective(&self) -> bool {
        false
    }
}
