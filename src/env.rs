//! Environment-driven loading of logger definitions.
//!
//! These are purely helpers; the repository itself never reads the
//! environment.

use crate::config::ConfigNode;
use crate::logger::Logger;
use crate::registry::Registry;
use crate::repository::{self, ConfigError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Path of a JSON file holding the logger definitions.
pub const LOG_REPOSITORY_CONFIG_ENV: &str = "LOG_REPOSITORY_CONFIG";

/// Read and parse a JSON configuration file into a [`ConfigNode`].
pub fn read_config(path: impl AsRef<Path>) -> Result<ConfigNode, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build every logger defined in the JSON file at `path`.
pub fn load_from_path(
    registry: &Registry,
    path: impl AsRef<Path>,
) -> Result<HashMap<String, Logger>, ConfigError> {
    let root = read_config(path)?;
    repository::load(registry, &root)
}

/// Build the loggers named by [`LOG_REPOSITORY_CONFIG_ENV`], or the
/// `trivial` logger when the variable is unset.
pub fn load_from_env(registry: &Registry) -> Result<HashMap<String, Logger>, ConfigError> {
    match std::env::var_os(LOG_REPOSITORY_CONFIG_ENV) {
        Some(path) => load_from_path(registry, path),
        None => repository::load_or_trivial(registry, None),
    }
}
