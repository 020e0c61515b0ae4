use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Format used when a timestamp attribute is rendered as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Value stored under a single attribute name.
///
/// The set of kinds is closed: every consumer (filters, formatters) matches
/// on it exhaustively, so adding a kind is a compile-time checked change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

/// Discriminant of an [`AttributeValue`], used in type mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Timestamp,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::UInt => "uint",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl AttributeValue {
    pub fn kind(&self) -> Kind {
        match self {
            AttributeValue::Bool(_) => Kind::Bool,
            AttributeValue::Int(_) => Kind::Int,
            AttributeValue::UInt(_) => Kind::UInt,
            AttributeValue::Float(_) => Kind::Float,
            AttributeValue::String(_) => Kind::String,
            AttributeValue::Timestamp(_) => Kind::Timestamp,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::UInt(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
            AttributeValue::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// Rust types that map one-to-one onto an attribute kind.
pub trait AttributeKind: Sized {
    const KIND: Kind;

    /// Borrow the payload if `value` holds this kind.
    fn extract(value: &AttributeValue) -> Option<&Self>;

    fn into_value(self) -> AttributeValue;
}

macro_rules! attribute_kind {
    ($ty:ty, $variant:ident) => {
        impl AttributeKind for $ty {
            const KIND: Kind = Kind::$variant;

            fn extract(value: &AttributeValue) -> Option<&Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }

        impl From<$ty> for AttributeValue {
            fn from(value: $ty) -> Self {
                AttributeValue::$variant(value)
            }
        }
    };
}

attribute_kind!(bool, Bool);
attribute_kind!(i64, Int);
attribute_kind!(u64, UInt);
attribute_kind!(f64, Float);
attribute_kind!(String, String);
attribute_kind!(DateTime<Utc>, Timestamp);

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

/// Error returned by typed attribute access and filter evaluation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute '{0}' not found")]
    KeyNotFound(String),

    #[error("attribute '{name}' has kind {found}, expected {expected}")]
    TypeMismatch { name: String, expected: Kind, found: Kind },
}

/// Ordered set of named attributes attached to one record.
///
/// Names are unique. Insertion order is preserved and is the order used by
/// every serializing formatter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, consuming and returning the set.
    ///
    /// Re-using an existing name replaces its value but keeps its position.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// In-place form of [`Attributes::with`], for collectors filling a set
    /// before it is handed to a record.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn value(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Typed access to an attribute.
    ///
    /// Fails with [`AttributeError::KeyNotFound`] when `name` is absent and
    /// with [`AttributeError::TypeMismatch`] when the stored kind is not `T`.
    pub fn get<T: AttributeKind>(&self, name: &str) -> Result<&T, AttributeError> {
        let value = self
            .value(name)
            .ok_or_else(|| AttributeError::KeyNotFound(name.to_string()))?;
        T::extract(value).ok_or_else(|| AttributeError::TypeMismatch {
            name: name.to_string(),
            expected: T::KIND,
            found: value.kind(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<AttributeValue>> FromIterator<(N, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Attributes::new(), |attrs, (n, v)| attrs.with(n, v))
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
