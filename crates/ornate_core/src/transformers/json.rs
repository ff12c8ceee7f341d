use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::element::Element;
use crate::error::ValidationError;
use crate::side_table::InstanceTable;
use crate::transformer::{Binding, Transformer};

/// Structured values stored as JSON text
///
/// Attribute text that fails to decode keeps the previous value. Values that
/// fail to encode are rejected by the setter.
pub struct JsonTransformer<T> {
    fallback: InstanceTable<T>,
}

pub fn json<T>() -> JsonTransformer<T> {
    JsonTransformer {
        fallback: InstanceTable::new(),
    }
}

/// `json` for record structs
pub fn record<T>() -> JsonTransformer<T>
where
    T: Serialize + DeserializeOwned,
{
    json()
}

impl<T> Transformer<T> for JsonTransformer<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    fn init(&self, element: &Element, _binding: &Binding, initial: &T) {
        self.fallback.set(element, initial.clone());
    }

    fn parse(&self, element: &Element, raw: Option<&str>) -> Option<T> {
        let Some(raw) = raw else {
            return self.fallback.get(element);
        };
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!("json attribute did not decode: {}", err);
                None
            }
        }
    }

    fn validate(
        &self,
        _element: &Element,
        value: &T,
        _external: bool,
    ) -> Result<(), ValidationError> {
        serde_json::to_string(value)
            .map(|_| ())
            .map_err(|err| ValidationError::Type(format!("value is not encodable: {}", err)))
    }

    fn stringify(&self, value: &T) -> String {
        serde_json::to_string(value).unwrap_or_default()
    }
}
