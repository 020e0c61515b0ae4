use crate::attribute::AttributeError;
use crate::record::LogRecord;
use crate::registry::Registry;
use std::any::Any;

pub mod json;
#[cfg(feature = "msgpack")]
pub mod msgpack;
pub mod string;

/// Renders a record into the bytes handed to a sink.
pub trait Formatter: Send {
    /// Render a single record.
    ///
    /// **Returns**
    /// - `Ok(bytes)` with the rendered message, without trailing newline.
    /// - `Err(..)` if an attribute the formatter needs is missing or has
    ///   the wrong kind, or if encoding failed.
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError>;

    fn as_any(&self) -> &dyn Any;
}

/// Error type returned by [`Formatter::format`].
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Register every built-in formatter.
pub fn register_builtins(registry: &mut Registry) {
    string::register(registry);
    json::register(registry);
    #[cfg(feature = "msgpack")]
    msgpack::register(registry);
}
