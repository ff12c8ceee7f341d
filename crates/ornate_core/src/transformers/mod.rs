//! Built-in transformers
//!
//! - [`string`]: any text; removal falls back to the declared initial value
//! - [`number`] / [`int`]: bounded numbers, clamped when parsed and
//!   rejected when assigned out of range
//! - [`boolean`]: attribute presence
//! - [`literal`]: a fixed set of values on top of another transformer
//! - [`json`] / [`record`]: serde values encoded as JSON text
//! - [`nullable`]: adds an explicit "no value" to another transformer
//! - [`event_handler`]: `on*` handler slots compiled from attribute text

mod event_handler;
mod json;
mod literal;
mod numeric;
mod primitive;

pub use event_handler::{event_handler, EventHandler, EventHandlerTransformer, HandlerCompiler};
pub use json::{json, record, JsonTransformer};
pub use literal::{literal, LiteralTransformer};
pub use numeric::{int, nullable, number, IntTransformer, Nullable, NumberTransformer};
pub use primitive::{boolean, string, BooleanTransformer, StringTransformer};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::class::ClassBuilder;
    use crate::element::Element;
    use crate::transformer::Binding;

    pub fn element() -> Element {
        ClassBuilder::new("TransformerHost")
            .build()
            .unwrap()
            .create()
            .unwrap()
    }

    pub fn binding(name: &str) -> Binding {
        Binding {
            property: name.to_string(),
            attribute: Some(name.to_string()),
        }
    }
}
