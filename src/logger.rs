use crate::attribute::AttributeError;
use crate::filter::Filter;
use crate::formatter::{FormatError, Formatter};
use crate::record::LogRecord;
use crate::sink::{Sink, SinkError};

/// A formatter bound to the sink receiving its output.
pub struct Frontend {
    formatter: Box<dyn Formatter>,
    sink: Box<dyn Sink>,
}

impl Frontend {
    pub fn new(formatter: Box<dyn Formatter>, sink: Box<dyn Sink>) -> Self {
        Frontend { formatter, sink }
    }

    pub fn formatter(&self) -> &dyn Formatter {
        self.formatter.as_ref()
    }

    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// Render `record` and hand it to the sink.
    pub fn handle(&mut self, record: &LogRecord) -> Result<(), LogError> {
        let message = self.formatter.format(record)?;
        self.sink.consume(&message)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.sink.flush()?;
        Ok(())
    }
}

/// Error type returned by [`Logger::log`].
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("filter evaluation failed: {0}")]
    Filter(#[from] AttributeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// A named, ordered set of frontends with an optional gate in front.
///
/// The frontends are fixed at construction. Reconfiguring means building a
/// new `Logger`.
pub struct Logger {
    name: String,
    filter: Option<Filter>,
    frontends: Vec<Frontend>,
}

impl Logger {
    pub fn new(name: impl Into<String>, frontends: Vec<Frontend>, filter: Option<Filter>) -> Self {
        Logger {
            name: name.into(),
            filter,
            frontends,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn frontends(&self) -> &[Frontend] {
        &self.frontends
    }

    /// Pass `record` through the filter and every frontend, in order.
    ///
    /// **Returns**
    /// - `Ok(false)` if the filter rejected the record.
    /// - `Ok(true)` once every frontend handled it.
    /// - `Err(..)` on the first failure; later frontends are skipped.
    pub fn log(&mut self, record: &LogRecord) -> Result<bool, LogError> {
        if let Some(filter) = &self.filter {
            if !filter.evaluate(record.attributes())? {
                return Ok(false);
            }
        }
        for frontend in &mut self.frontends {
            frontend.handle(record)?;
        }
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        for frontend in &mut self.frontends {
            frontend.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("frontends", &self.frontends.len())
            .finish()
    }
}
