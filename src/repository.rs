//! Logger definitions and their assembly into live [`Logger`]s.
//!
//! The configuration root maps logger names to definitions:
//!
//! ```json
//! {
//!   "app": {
//!     "filter": {"type": "eq", "config": ["service", "auth"]},
//!     "frontends": [
//!       {
//!         "formatter": {"type": "string", "config": "[<timestamp>] <message>"},
//!         "sink": {"type": "files", "config": ["/var/log/app.log", true, [1048576, 5]]}
//!       }
//!     ]
//!   }
//! }
//! ```

use crate::config::{ConfigMappingError, ConfigNode};
use crate::logger::{Frontend, Logger};
use crate::registry::{Category, Component, Registry, RegistryError};
use crate::sink::files::{FILES, STDOUT_PATH};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Name of the built-in fallback logger.
pub const TRIVIAL: &str = "trivial";

/// Pattern used by the built-in fallback logger.
pub const TRIVIAL_PATTERN: &str = "[<timestamp>] [<severity>]: <message>";

/// What to build: category, declared type name and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    pub category: Category,
    pub type_name: String,
    pub config: ConfigNode,
}

impl ComponentDescriptor {
    pub fn new(category: Category, type_name: impl Into<String>, config: ConfigNode) -> Self {
        ComponentDescriptor {
            category,
            type_name: type_name.into(),
            config,
        }
    }

    /// Map `{"type": name, "config": payload}`; a missing payload is null.
    pub fn from_node(category: Category, node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let type_name: String = node.field("type")?.to().map_err(|e| e.at("type"))?;
        let config = node.get("config").cloned().unwrap_or_default();
        Ok(ComponentDescriptor::new(category, type_name, config))
    }

    pub fn build(&self, registry: &Registry) -> Result<Component, RegistryError> {
        registry.build_resolved(self.category, &self.type_name, &self.config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontendConfig {
    pub formatter: ComponentDescriptor,
    pub sink: ComponentDescriptor,
}

impl FrontendConfig {
    pub fn from_node(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let formatter = node
            .field("formatter")
            .and_then(|n| ComponentDescriptor::from_node(Category::Formatter, n))
            .map_err(|e| e.at("formatter"))?;
        let sink = node
            .field("sink")
            .and_then(|n| ComponentDescriptor::from_node(Category::Sink, n))
            .map_err(|e| e.at("sink"))?;
        Ok(FrontendConfig { formatter, sink })
    }

    fn build(&self, registry: &Registry) -> Result<Frontend, RegistryError> {
        let formatter = self.formatter.build(registry)?.into_formatter()?;
        let sink = self.sink.build(registry)?.into_sink()?;
        Ok(Frontend::new(formatter, sink))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    pub name: String,
    pub frontends: Vec<FrontendConfig>,
    pub filter: Option<ComponentDescriptor>,
}

impl LoggerConfig {
    pub fn from_node(name: impl Into<String>, node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let frontends = node
            .field("frontends")
            .and_then(ConfigNode::as_sequence)
            .map_err(|e| e.at("frontends"))?
            .iter()
            .enumerate()
            .map(|(i, n)| FrontendConfig::from_node(n).map_err(|e| e.at(format!("frontends[{}]", i))))
            .collect::<Result<Vec<_>, _>>()?;
        let filter = node
            .get("filter")
            .map(|n| ComponentDescriptor::from_node(Category::Filter, n))
            .transpose()
            .map_err(|e| e.at("filter"))?;
        Ok(LoggerConfig {
            name: name.into(),
            frontends,
            filter,
        })
    }

    /// The fallback definition: pattern formatter to standard output,
    /// flushed after every record.
    pub fn trivial() -> Self {
        let formatter = ComponentDescriptor::new(Category::Formatter, "string", ConfigNode::from(TRIVIAL_PATTERN));
        let sink = ComponentDescriptor::new(
            Category::Sink,
            FILES,
            ConfigNode::from(vec![ConfigNode::from(STDOUT_PATH), ConfigNode::Bool(true)]),
        );
        LoggerConfig {
            name: TRIVIAL.to_string(),
            frontends: vec![FrontendConfig { formatter, sink }],
            filter: None,
        }
    }

    /// Build a fresh logger. Either every frontend is built or none is.
    pub fn build(&self, registry: &Registry) -> Result<Logger, ConfigError> {
        let wrap = |source| ConfigError::Build {
            logger: self.name.clone(),
            source,
        };
        let filter = match &self.filter {
            Some(descriptor) => Some(descriptor.build(registry).and_then(Component::into_filter).map_err(wrap)?),
            None => None,
        };
        let frontends = self
            .frontends
            .iter()
            .map(|f| f.build(registry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(wrap)?;
        debug!(logger = %self.name, frontends = frontends.len(), "assembled logger");
        Ok(Logger::new(self.name.clone(), frontends, filter))
    }
}

/// Error type returned while loading logger definitions.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration root: {0}")]
    Root(#[source] ConfigMappingError),

    #[error("invalid definition of logger '{logger}': {source}")]
    Invalid {
        logger: String,
        #[source]
        source: ConfigMappingError,
    },

    #[error("failed to build logger '{logger}': {source}")]
    Build {
        logger: String,
        #[source]
        source: RegistryError,
    },

    #[error("no logger named '{0}'")]
    UnknownLogger(String),

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Map every logger definition under `root`.
pub fn parse(root: &ConfigNode) -> Result<Vec<LoggerConfig>, ConfigError> {
    root.as_mapping()
        .map_err(ConfigError::Root)?
        .iter()
        .map(|(name, node)| {
            LoggerConfig::from_node(name, node).map_err(|source| ConfigError::Invalid {
                logger: name.clone(),
                source,
            })
        })
        .collect()
}

/// Build every logger defined under `root`. Stops at the first invalid
/// definition and returns nothing in that case.
pub fn load(registry: &Registry, root: &ConfigNode) -> Result<HashMap<String, Logger>, ConfigError> {
    parse(root)?
        .iter()
        .map(|config| Ok((config.name.clone(), config.build(registry)?)))
        .collect()
}

/// Like [`load`], falling back to the `trivial` logger without a root.
pub fn load_or_trivial(
    registry: &Registry,
    root: Option<&ConfigNode>,
) -> Result<HashMap<String, Logger>, ConfigError> {
    match root {
        Some(root) => load(registry, root),
        None => {
            warn!("no logging configuration supplied, using the trivial logger");
            let trivial = LoggerConfig::trivial();
            Ok(HashMap::from([(trivial.name.clone(), trivial.build(registry)?)]))
        }
    }
}

/// Named logger definitions, each of which can be instantiated any number
/// of times. Every [`Repository::create`] call yields an independent logger.
pub struct Repository<'r> {
    registry: &'r Registry,
    configs: BTreeMap<String, LoggerConfig>,
}

impl<'r> Repository<'r> {
    /// Repository holding only the `trivial` definition.
    pub fn new(registry: &'r Registry) -> Self {
        let trivial = LoggerConfig::trivial();
        Repository {
            registry,
            configs: BTreeMap::from([(trivial.name.clone(), trivial)]),
        }
    }

    /// Add or replace one definition.
    pub fn add(&mut self, config: LoggerConfig) {
        self.configs.insert(config.name.clone(), config);
    }

    /// Add every definition under `root`. Nothing is added if any of them
    /// is malformed.
    pub fn configure(&mut self, root: &ConfigNode) -> Result<(), ConfigError> {
        for config in parse(root)? {
            self.add(config);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Result<Logger, ConfigError> {
        self.configs
            .get(name)
            .ok_or_else(|| ConfigError::UnknownLogger(name.to_string()))?
            .build(self.registry)
    }

    /// Instantiate every definition.
    pub fn create_all(&self) -> Result<HashMap<String, Logger>, ConfigError> {
        self.configs
            .values()
            .map(|config| Ok((config.name.clone(), config.build(self.registry)?)))
            .collect()
    }
}
