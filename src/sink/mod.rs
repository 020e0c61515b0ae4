use crate::registry::Registry;
use std::any::Any;
use std::io;
use std::path::PathBuf;

pub mod files;
pub mod null;
pub mod rotation;

/// Destination for formatted messages.
///
/// Implementations assume a single logical writer and do no locking of
/// their own. A caller feeding one sink from several threads has to
/// serialize the calls itself.
pub trait Sink: Send {
    /// Persist one formatted message.
    ///
    /// **Returns**
    /// - `Ok(())` once the message was handed to the backend.
    /// - `Err(..)` if the backend failed. The message is not buffered for
    ///   replay; the caller decides whether to retry.
    fn consume(&mut self, message: &[u8]) -> Result<(), SinkError>;

    /// Flush anything the backend buffers.
    ///
    /// Default implementation is a no-op.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Error type returned by sinks.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to open '{path}' for writing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rotate '{path}': {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Register every built-in sink.
pub fn register_builtins(registry: &mut Registry) {
    files::register(registry);
    null::register(registry);
}
