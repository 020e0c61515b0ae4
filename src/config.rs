//! Untyped configuration tree and the helpers that map it onto typed
//! component configs.
//!
//! Nodes are produced by an external parser. Any serde front end works since
//! [`ConfigNode`] implements `Deserialize`; a `serde_json::Value` converts
//! directly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum ConfigNode {
    #[default]
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigNode>),
    Mapping(BTreeMap<String, ConfigNode>),
}

/// Shape of a node, as reported in mapping errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Sequence,
    Mapping,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Null => "null",
            NodeKind::Bool => "bool",
            NodeKind::Integer => "integer",
            NodeKind::Float => "float",
            NodeKind::String => "string",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// A node's shape does not match what the consumer expects.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigMappingError {
    #[error("expected {expected}, found {found}")]
    WrongKind { expected: NodeKind, found: NodeKind },

    #[error("expected a sequence of {min}..={max} elements, found {found}")]
    WrongArity { min: usize, max: usize, found: usize },

    #[error("expected a scalar, found {0}")]
    NotAScalar(NodeKind),

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("integer {0} out of range")]
    OutOfRange(i128),

    #[error("at '{path}': {source}")]
    At {
        path: String,
        #[source]
        source: Box<ConfigMappingError>,
    },
}

impl ConfigMappingError {
    /// Prefix the error with the location it was found at.
    pub fn at(self, path: impl Into<String>) -> Self {
        ConfigMappingError::At {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

impl ConfigNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigNode::Null => NodeKind::Null,
            ConfigNode::Bool(_) => NodeKind::Bool,
            ConfigNode::UInt(_) | ConfigNode::Int(_) => NodeKind::Integer,
            ConfigNode::Float(_) => NodeKind::Float,
            ConfigNode::String(_) => NodeKind::String,
            ConfigNode::Sequence(_) => NodeKind::Sequence,
            ConfigNode::Mapping(_) => NodeKind::Mapping,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigNode::Null)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ConfigNode::Sequence(_))
    }

    pub fn as_sequence(&self) -> Result<&[ConfigNode], ConfigMappingError> {
        match self {
            ConfigNode::Sequence(items) => Ok(items),
            other => Err(other.wrong_kind(NodeKind::Sequence)),
        }
    }

    pub fn as_mapping(&self) -> Result<&BTreeMap<String, ConfigNode>, ConfigMappingError> {
        match self {
            ConfigNode::Mapping(map) => Ok(map),
            other => Err(other.wrong_kind(NodeKind::Mapping)),
        }
    }

    /// Sequence whose length lies in `min..=max`.
    pub fn sequence_of(&self, min: usize, max: usize) -> Result<&[ConfigNode], ConfigMappingError> {
        let items = self.as_sequence()?;
        if items.len() < min || items.len() > max {
            return Err(ConfigMappingError::WrongArity {
                min,
                max,
                found: items.len(),
            });
        }
        Ok(items)
    }

    /// Optional member of a mapping node. Non-mapping nodes have no members.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        match self {
            ConfigNode::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Required member of a mapping node.
    pub fn field(&self, key: &str) -> Result<&ConfigNode, ConfigMappingError> {
        self.as_mapping()?
            .get(key)
            .ok_or_else(|| ConfigMappingError::MissingKey(key.to_string()))
    }

    /// Typed view of this node.
    pub fn to<T: FromConfig>(&self) -> Result<T, ConfigMappingError> {
        T::from_config(self)
    }

    fn wrong_kind(&self, expected: NodeKind) -> ConfigMappingError {
        ConfigMappingError::WrongKind {
            expected,
            found: self.kind(),
        }
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigNode)>) -> Self {
        ConfigNode::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Conversion from a config node into a typed value.
pub trait FromConfig: Sized {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError>;
}

impl FromConfig for String {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        match node {
            ConfigNode::String(s) => Ok(s.clone()),
            other => Err(other.wrong_kind(NodeKind::String)),
        }
    }
}

impl FromConfig for bool {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        match node {
            ConfigNode::Bool(b) => Ok(*b),
            other => Err(other.wrong_kind(NodeKind::Bool)),
        }
    }
}

impl FromConfig for u64 {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        match node {
            ConfigNode::UInt(v) => Ok(*v),
            ConfigNode::Int(v) => u64::try_from(*v).map_err(|_| ConfigMappingError::OutOfRange(*v as i128)),
            other => Err(other.wrong_kind(NodeKind::Integer)),
        }
    }
}

impl FromConfig for i64 {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        match node {
            ConfigNode::Int(v) => Ok(*v),
            ConfigNode::UInt(v) => i64::try_from(*v).map_err(|_| ConfigMappingError::OutOfRange(*v as i128)),
            other => Err(other.wrong_kind(NodeKind::Integer)),
        }
    }
}

impl FromConfig for usize {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let v = u64::from_config(node)?;
        usize::try_from(v).map_err(|_| ConfigMappingError::OutOfRange(v as i128))
    }
}

impl FromConfig for ConfigNode {
    fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        Ok(node.clone())
    }
}

impl From<serde_json::Value> for ConfigNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ConfigNode::Null,
            Value::Bool(b) => ConfigNode::Bool(b),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    ConfigNode::UInt(v)
                } else if let Some(v) = n.as_i64() {
                    ConfigNode::Int(v)
                } else {
                    ConfigNode::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ConfigNode::String(s),
            Value::Array(items) => ConfigNode::Sequence(items.into_iter().map(ConfigNode::from).collect()),
            Value::Object(map) => ConfigNode::Mapping(map.into_iter().map(|(k, v)| (k, ConfigNode::from(v))).collect()),
        }
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        ConfigNode::String(value.to_string())
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        ConfigNode::Bool(value)
    }
}

impl From<u64> for ConfigNode {
    fn from(value: u64) -> Self {
        ConfigNode::UInt(value)
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(value: Vec<ConfigNode>) -> Self {
        ConfigNode::Sequence(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_from_json() {
        let node = ConfigNode::from(json!({"files": ["/tmp/a.log", true, [1024, 2]], "n": -1}));
        let files = node.field("files").unwrap().sequence_of(2, 3).unwrap();
        assert_eq!(files[0].to::<String>().unwrap(), "/tmp/a.log");
        assert!(files[1].to::<bool>().unwrap());
        assert!(files[2].is_sequence());
        assert_eq!(node.field("n").unwrap().to::<i64>().unwrap(), -1);
    }

    #[test]
    fn deserializes_through_serde() {
        let node: ConfigNode = serde_json::from_str(r#"[null, 3, "x", {"k": 1.5}]"#).unwrap();
        let items = node.as_sequence().unwrap();
        assert!(items[0].is_null());
        assert_eq!(items[1], ConfigNode::UInt(3));
        assert_eq!(items[3].field("k").unwrap(), &ConfigNode::Float(1.5));
    }

    #[test]
    fn reports_shape_errors() {
        let node = ConfigNode::from(vec!["a".into()]);
        assert_eq!(
            node.sequence_of(2, 3),
            Err(ConfigMappingError::WrongArity { min: 2, max: 3, found: 1 })
        );
        assert_eq!(
            node.as_sequence().unwrap()[0].to::<bool>(),
            Err(ConfigMappingError::WrongKind {
                expected: NodeKind::Bool,
                found: NodeKind::String,
            })
        );
        assert_eq!(
            ConfigNode::Int(-3).to::<u64>(),
            Err(ConfigMappingError::OutOfRange(-3))
        );
        assert_eq!(
            ConfigNode::mapping([("a", ConfigNode::Null)]).field("b"),
            Err(ConfigMappingError::MissingKey("b".to_string()))
        );
    }
}
