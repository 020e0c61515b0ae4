//! Runtime factory mapping `(category, type name)` to a component builder.
//!
//! A [`Registry`] is populated during startup and then treated as frozen.
//! [`install`] publishes one process-wide instance; every registration has
//! to happen before that call, so build and load never race a registration.

use crate::config::{ConfigMappingError, ConfigNode};
use crate::filter::Filter;
use crate::formatter::Formatter;
use crate::sink::Sink;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Component families that can be built from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Formatter,
    Sink,
    Filter,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Formatter => "formatter",
            Category::Sink => "sink",
            Category::Filter => "filter",
        };
        f.write_str(name)
    }
}

/// A constructed component, tagged with its category.
pub enum Component {
    Formatter(Box<dyn Formatter>),
    Sink(Box<dyn Sink>),
    Filter(Filter),
}

impl Component {
    pub fn category(&self) -> Category {
        match self {
            Component::Formatter(_) => Category::Formatter,
            Component::Sink(_) => Category::Sink,
            Component::Filter(_) => Category::Filter,
        }
    }

    pub fn into_formatter(self) -> Result<Box<dyn Formatter>, RegistryError> {
        match self {
            Component::Formatter(f) => Ok(f),
            other => Err(other.mismatch(Category::Formatter)),
        }
    }

    pub fn into_sink(self) -> Result<Box<dyn Sink>, RegistryError> {
        match self {
            Component::Sink(s) => Ok(s),
            other => Err(other.mismatch(Category::Sink)),
        }
    }

    pub fn into_filter(self) -> Result<Filter, RegistryError> {
        match self {
            Component::Filter(f) => Ok(f),
            other => Err(other.mismatch(Category::Filter)),
        }
    }

    fn mismatch(&self, expected: Category) -> RegistryError {
        RegistryError::CategoryMismatch {
            expected,
            found: self.category(),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component::{:?}", self.category())
    }
}

/// Constructs a component from its configuration payload. The registry is
/// passed along so composite components can build their children.
pub type Builder =
    Box<dyn Fn(&ConfigNode, &Registry) -> Result<Component, RegistryError> + Send + Sync>;

/// Derives the concrete type name of a composite component from the shape
/// of its configuration.
pub type Discriminator = fn(&ConfigNode) -> String;

/// Error type returned by registry lookups and builders.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("no {category} registered under '{type_name}'")]
    UnknownType { category: Category, type_name: String },

    #[error("invalid config for {category} '{type_name}': {source}")]
    ConfigMapping {
        category: Category,
        type_name: String,
        #[source]
        source: ConfigMappingError,
    },

    /// Raised inside builders; [`Registry::build`] rewraps it as
    /// [`RegistryError::ConfigMapping`].
    #[error(transparent)]
    Mapping(#[from] ConfigMappingError),

    #[error("builder produced a {found}, expected a {expected}")]
    CategoryMismatch { expected: Category, found: Category },

    #[error("no registry installed")]
    NotInstalled,

    #[error("a registry is already installed")]
    AlreadyInstalled,
}

#[derive(Default)]
pub struct Registry {
    builders: HashMap<(Category, String), Builder>,
    discriminators: HashMap<(Category, String), Discriminator>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in formatter, sink and filter.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        crate::formatter::register_builtins(&mut registry);
        crate::sink::register_builtins(&mut registry);
        crate::filter::register_builtins(&mut registry);
        registry
    }

    /// Register a builder for `(category, type_name)`, replacing any
    /// previous one.
    pub fn register<F>(&mut self, category: Category, type_name: impl Into<String>, builder: F)
    where
        F: Fn(&ConfigNode, &Registry) -> Result<Component, RegistryError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        debug!(%category, type_name = %type_name, "registering component builder");
        if self
            .builders
            .insert((category, type_name.clone()), Box::new(builder))
            .is_some()
        {
            warn!(%category, type_name = %type_name, "replaced existing component builder");
        }
    }

    /// Attach a discriminator to the base type `base` of `category`.
    pub fn register_discriminator(
        &mut self,
        category: Category,
        base: impl Into<String>,
        discriminator: Discriminator,
    ) {
        self.discriminators.insert((category, base.into()), discriminator);
    }

    pub fn contains(&self, category: Category, type_name: &str) -> bool {
        self.builders.contains_key(&(category, type_name.to_string()))
    }

    /// Concrete type name for a component declared as `base` with `config`.
    /// Types without a discriminator resolve to themselves.
    pub fn resolve(&self, category: Category, base: &str, config: &ConfigNode) -> String {
        match self.discriminators.get(&(category, base.to_string())) {
            Some(discriminate) => discriminate(config),
            None => base.to_string(),
        }
    }

    /// Build the component registered under exactly `type_name`.
    pub fn build(
        &self,
        category: Category,
        type_name: &str,
        config: &ConfigNode,
    ) -> Result<Component, RegistryError> {
        let builder = self
            .builders
            .get(&(category, type_name.to_string()))
            .ok_or_else(|| RegistryError::UnknownType {
                category,
                type_name: type_name.to_string(),
            })?;

        debug!(%category, type_name, "building component");
        let component = builder(config, self).map_err(|e| match e {
            RegistryError::Mapping(source) => RegistryError::ConfigMapping {
                category,
                type_name: type_name.to_string(),
                source,
            },
            other => other,
        })?;

        if component.category() != category {
            return Err(component.mismatch(category));
        }
        Ok(component)
    }

    /// Resolve the concrete type of `base` from `config`, then build it.
    pub fn build_resolved(
        &self,
        category: Category,
        base: &str,
        config: &ConfigNode,
    ) -> Result<Component, RegistryError> {
        let type_name = self.resolve(category, base, config);
        self.build(category, &type_name, config)
    }

    pub fn build_formatter(
        &self,
        type_name: &str,
        config: &ConfigNode,
    ) -> Result<Box<dyn Formatter>, RegistryError> {
        self.build_resolved(Category::Formatter, type_name, config)?
            .into_formatter()
    }

    pub fn build_sink(&self, type_name: &str, config: &ConfigNode) -> Result<Box<dyn Sink>, RegistryError> {
        self.build_resolved(Category::Sink, type_name, config)?.into_sink()
    }

    pub fn build_filter(&self, type_name: &str, config: &ConfigNode) -> Result<Filter, RegistryError> {
        self.build_resolved(Category::Filter, type_name, config)?
            .into_filter()
    }
}

static INSTALLED: OnceCell<Registry> = OnceCell::new();

/// Publish `registry` as the process-wide instance. Can succeed only once.
pub fn install(registry: Registry) -> Result<&'static Registry, RegistryError> {
    INSTALLED
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    installed()
}

/// The process-wide registry, if [`install`] has run.
pub fn installed() -> Result<&'static Registry, RegistryError> {
    INSTALLED.get().ok_or(RegistryError::NotInstalled)
}
