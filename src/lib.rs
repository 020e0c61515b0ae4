//! Config-driven construction of logging pipelines.
//!
//! A [`registry::Registry`] maps `(category, type name)` to builders for
//! formatters, sinks and filters. The [`repository`] turns a tree of logger
//! definitions into [`logger::Logger`]s through it. Records carry typed
//! [`attribute::Attributes`] that [`filter`] predicates inspect.
//!
//! ```no_run
//! use log_repository::{attribute::Attributes, record::LogRecord, registry, repository};
//!
//! let registry = registry::install(registry::Registry::with_builtins()).unwrap();
//! let mut loggers = repository::load_or_trivial(registry, None).unwrap();
//! let logger = loggers.get_mut(repository::TRIVIAL).unwrap();
//!
//! let record = LogRecord::with_message(chrono::Utc::now(), "INFO", "hello", Attributes::new());
//! logger.log(&record).unwrap();
//! ```

pub mod attribute;
pub mod config;
pub mod env;
pub mod filter;
pub mod formatter;
pub mod init;
pub mod layer;
pub mod logger;
pub mod record;
pub mod registry;
pub mod repository;
pub mod sink;

pub use attribute::{AttributeError, AttributeValue, Attributes};
pub use config::{ConfigMappingError, ConfigNode};
pub use filter::{and_, equals, get_attr, not_, or_, Filter};
pub use logger::{Frontend, LogError, Logger};
pub use record::LogRecord;
pub use registry::{Category, Component, Registry, RegistryError};
pub use repository::{ConfigError, LoggerConfig, Repository};
pub use sink::SinkError;
