use super::{Sink, SinkError};
use crate::config::ConfigNode;
use crate::registry::{Category, Component, Registry};
use std::any::Any;

/// A sink that simply drops all messages.
///
/// Useful for measuring the cost of filtering and formatting without any
/// I/O, and for tests that don't care about persistence.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    consumed: u64,
}

impl NullSink {
    /// Number of messages dropped so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl Sink for NullSink {
    fn consume(&mut self, _message: &[u8]) -> Result<(), SinkError> {
        self.consumed += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut Registry) {
    registry.register(Category::Sink, "null", |_: &ConfigNode, _: &Registry| {
        Ok(Component::Sink(Box::new(NullSink::default())))
    });
}
