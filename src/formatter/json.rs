use super::{FormatError, Formatter};
use crate::config::ConfigNode;
use crate::record::LogRecord;
use crate::registry::{Category, Component, Registry};
use std::any::Any;

/// Formatter that writes the attributes as one JSON object per record.
/// Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        serde_json::to_vec(record.attributes()).map_err(|e| FormatError::Encode(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut Registry) {
    registry.register(Category::Formatter, "json", |_: &ConfigNode, _: &Registry| {
        Ok(Component::Formatter(Box::new(JsonFormatter)))
    });
}
