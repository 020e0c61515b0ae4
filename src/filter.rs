//! Predicates over a record's attributes.
//!
//! A predicate is built from a typed accessor and combined with [`and_`],
//! [`or_`] and [`not_`]. Evaluation never hides a type error: a missing or
//! mistyped attribute is reported as an [`AttributeError`], not as `false`.

use crate::attribute::{AttributeError, AttributeKind, AttributeValue, Attributes, Kind};
use crate::config::{ConfigMappingError, ConfigNode};
use crate::registry::{Category, Component, Registry, RegistryError};
use crate::repository::ComponentDescriptor;
use std::marker::PhantomData;

/// Typed handle on a named attribute.
#[derive(Debug, Clone)]
pub struct Accessor<T> {
    name: String,
    _kind: PhantomData<fn() -> T>,
}

/// Create an accessor for the attribute `name` holding a `T`.
pub fn get_attr<T: AttributeKind>(name: impl Into<String>) -> Accessor<T> {
    Accessor {
        name: name.into(),
        _kind: PhantomData,
    }
}

impl<T: AttributeKind> Accessor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get<'a>(&self, attributes: &'a Attributes) -> Result<&'a T, AttributeError> {
        attributes.get::<T>(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Equals { name: String, expected: AttributeValue },
    IntegerEquals { name: String, expected: i128 },
    Exists(String),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

/// Immutable boolean predicate over [`Attributes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Node);

impl Filter {
    /// Equality against an untyped literal; the literal's kind is the
    /// expected kind. Used when the literal comes from configuration.
    pub fn value_equals(name: impl Into<String>, expected: AttributeValue) -> Self {
        Filter(Node::Equals {
            name: name.into(),
            expected,
        })
    }

    /// Equality against an integer literal of unknown signedness. Matches
    /// an `Int` or a `UInt` attribute holding the same number.
    pub fn integer_equals(name: impl Into<String>, expected: i128) -> Self {
        Filter(Node::IntegerEquals {
            name: name.into(),
            expected,
        })
    }

    /// Evaluate against `attributes`.
    ///
    /// `and`/`or` short-circuit, so an error in the right operand is only
    /// reported when that operand is reached.
    pub fn evaluate(&self, attributes: &Attributes) -> Result<bool, AttributeError> {
        eval(&self.0, attributes)
    }
}

fn eval(node: &Node, attributes: &Attributes) -> Result<bool, AttributeError> {
    match node {
        Node::Equals { name, expected } => {
            let actual = attributes
                .value(name)
                .ok_or_else(|| AttributeError::KeyNotFound(name.clone()))?;
            if actual.kind() != expected.kind() {
                return Err(AttributeError::TypeMismatch {
                    name: name.clone(),
                    expected: expected.kind(),
                    found: actual.kind(),
                });
            }
            Ok(actual == expected)
        }
        Node::IntegerEquals { name, expected } => {
            let actual = attributes
                .value(name)
                .ok_or_else(|| AttributeError::KeyNotFound(name.clone()))?;
            match actual {
                AttributeValue::Int(v) => Ok(i128::from(*v) == *expected),
                AttributeValue::UInt(v) => Ok(i128::from(*v) == *expected),
                other => Err(AttributeError::TypeMismatch {
                    name: name.clone(),
                    expected: if i64::try_from(*expected).is_ok() { Kind::Int } else { Kind::UInt },
                    found: other.kind(),
                }),
            }
        }
        Node::Exists(name) => Ok(attributes.value(name).is_some()),
        Node::And(lhs, rhs) => Ok(eval(lhs, attributes)? && eval(rhs, attributes)?),
        Node::Or(lhs, rhs) => Ok(eval(lhs, attributes)? || eval(rhs, attributes)?),
        Node::Not(inner) => Ok(!eval(inner, attributes)?),
    }
}

/// True iff the accessor's attribute has kind `T` and equals `literal`.
pub fn equals<T: AttributeKind>(accessor: Accessor<T>, literal: T) -> Filter {
    Filter::value_equals(accessor.name, literal.into_value())
}

/// True iff an attribute called `name` is present, whatever its kind.
pub fn exists(name: impl Into<String>) -> Filter {
    Filter(Node::Exists(name.into()))
}

pub fn and_(lhs: Filter, rhs: Filter) -> Filter {
    Filter(Node::And(Box::new(lhs.0), Box::new(rhs.0)))
}

pub fn or_(lhs: Filter, rhs: Filter) -> Filter {
    Filter(Node::Or(Box::new(lhs.0), Box::new(rhs.0)))
}

pub fn not_(inner: Filter) -> Filter {
    Filter(Node::Not(Box::new(inner.0)))
}

/// `eq` filter on `name`. Configuration carries no signedness, so integer
/// literals compare against `Int` and `UInt` attributes alike.
fn literal_equals(name: String, node: &ConfigNode) -> Result<Filter, ConfigMappingError> {
    let expected = match node {
        ConfigNode::Int(v) => return Ok(Filter::integer_equals(name, i128::from(*v))),
        ConfigNode::UInt(v) => return Ok(Filter::integer_equals(name, i128::from(*v))),
        ConfigNode::Bool(v) => AttributeValue::Bool(*v),
        ConfigNode::Float(v) => AttributeValue::Float(*v),
        ConfigNode::String(v) => AttributeValue::String(v.clone()),
        other => return Err(ConfigMappingError::NotAScalar(other.kind())),
    };
    Ok(Filter::value_equals(name, expected))
}

fn nested(node: &ConfigNode, registry: &Registry) -> Result<Filter, RegistryError> {
    let descriptor = ComponentDescriptor::from_node(Category::Filter, node)?;
    registry.build_filter(&descriptor.type_name, &descriptor.config)
}

fn fold(
    config: &ConfigNode,
    registry: &Registry,
    combine: fn(Filter, Filter) -> Filter,
) -> Result<Component, RegistryError> {
    let items = config.sequence_of(1, usize::MAX)?;
    let mut filter = nested(&items[0], registry)?;
    for item in &items[1..] {
        filter = combine(filter, nested(item, registry)?);
    }
    Ok(Component::Filter(filter))
}

/// Register the config-driven filters:
/// - `eq`: `[name, literal]`
/// - `exists`: `name`
/// - `not`: one filter descriptor
/// - `and`, `or`: a non-empty sequence of filter descriptors
pub fn register_builtins(registry: &mut Registry) {
    registry.register(Category::Filter, "eq", |config: &ConfigNode, _: &Registry| {
        let items = config.sequence_of(2, 2)?;
        let name: String = items[0].to()?;
        Ok(Component::Filter(literal_equals(name, &items[1])?))
    });
    registry.register(Category::Filter, "exists", |config: &ConfigNode, _: &Registry| {
        let name: String = config.to()?;
        Ok(Component::Filter(exists(name)))
    });
    registry.register(Category::Filter, "not", |config: &ConfigNode, registry: &Registry| {
        Ok(Component::Filter(not_(nested(config, registry)?)))
    });
    registry.register(Category::Filter, "and", |config: &ConfigNode, registry: &Registry| {
        fold(config, registry, and_)
    });
    registry.register(Category::Filter, "or", |config: &ConfigNode, registry: &Registry| {
        fold(config, registry, or_)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn x_is_five() -> Filter {
        equals(get_attr::<i64>("x"), 5)
    }

    #[test]
    fn equality_matches_kind_and_value() {
        let filter = x_is_five();
        assert_eq!(filter.evaluate(&Attributes::new().with("x", 5i64)), Ok(true));
        assert_eq!(filter.evaluate(&Attributes::new().with("x", 6i64)), Ok(false));
    }

    #[test]
    fn equality_fails_loudly() {
        let filter = x_is_five();
        assert_eq!(
            filter.evaluate(&Attributes::new()),
            Err(AttributeError::KeyNotFound("x".to_string()))
        );
        assert_eq!(
            filter.evaluate(&Attributes::new().with("x", "5")),
            Err(AttributeError::TypeMismatch {
                name: "x".to_string(),
                expected: Kind::Int,
                found: Kind::String,
            })
        );
    }

    #[test]
    fn combinators_compose() {
        let attrs = Attributes::new()
            .with("x", 5i64)
            .with("service", "auth");
        let service = equals(get_attr::<String>("service"), "auth".to_string());

        assert_eq!(and_(x_is_five(), service.clone()).evaluate(&attrs), Ok(true));
        assert_eq!(and_(x_is_five(), not_(service.clone())).evaluate(&attrs), Ok(false));
        assert_eq!(
            or_(not_(x_is_five()), exists("service")).evaluate(&attrs),
            Ok(true)
        );
    }

    #[test]
    fn short_circuit_skips_unreachable_errors() {
        let attrs = Attributes::new().with("x", 6i64);
        let missing = equals(get_attr::<bool>("absent"), true);
        assert_eq!(and_(x_is_five(), missing.clone()).evaluate(&attrs), Ok(false));
        assert!(or_(x_is_five(), missing).evaluate(&attrs).is_err());
    }

    #[test]
    fn accessor_reads_typed_value() {
        let attrs = Attributes::new().with("flag", true);
        assert_eq!(get_attr::<bool>("flag").get(&attrs), Ok(&true));
    }

    #[test]
    fn builds_composite_filters_from_config() {
        let registry = Registry::with_builtins();
        let config = ConfigNode::from(json!([
            {"type": "eq", "config": ["x", 5]},
            {"type": "not", "config": {"type": "eq", "config": ["service", "billing"]}}
        ]));
        let filter = registry.build_filter("and", &config).unwrap();

        let attrs = Attributes::new().with("x", 5i64).with("service", "auth");
        assert_eq!(
            filter,
            and_(
                Filter::integer_equals("x", 5),
                not_(equals(get_attr::<String>("service"), "billing".to_string()))
            )
        );
        assert_eq!(filter.evaluate(&attrs), Ok(true));
    }

    #[test]
    fn config_integer_literal_matches_either_signedness() {
        let registry = Registry::with_builtins();
        let filter = registry
            .build_filter("eq", &ConfigNode::from(json!(["iteration", 5])))
            .unwrap();

        assert_eq!(filter.evaluate(&Attributes::new().with("iteration", 5u64)), Ok(true));
        assert_eq!(filter.evaluate(&Attributes::new().with("iteration", 5i64)), Ok(true));
        assert_eq!(filter.evaluate(&Attributes::new().with("iteration", 6u64)), Ok(false));
        assert_eq!(
            filter.evaluate(&Attributes::new().with("iteration", "5")),
            Err(AttributeError::TypeMismatch {
                name: "iteration".to_string(),
                expected: Kind::Int,
                found: Kind::String,
            })
        );

        let negative = registry
            .build_filter("eq", &ConfigNode::from(json!(["delta", -1])))
            .unwrap();
        assert_eq!(negative.evaluate(&Attributes::new().with("delta", u64::MAX)), Ok(false));
        assert_eq!(negative.evaluate(&Attributes::new().with("delta", -1i64)), Ok(true));

        let huge = registry
            .build_filter("eq", &ConfigNode::from(json!(["seq", u64::MAX])))
            .unwrap();
        assert_eq!(huge.evaluate(&Attributes::new().with("seq", u64::MAX)), Ok(true));
        assert_eq!(
            huge.evaluate(&Attributes::new().with("seq", true)),
            Err(AttributeError::TypeMismatch {
                name: "seq".to_string(),
                expected: Kind::UInt,
                found: Kind::Bool,
            })
        );
    }

    #[test]
    fn rejects_non_scalar_literals() {
        let registry = Registry::with_builtins();
        let config = ConfigNode::from(json!(["x", [1, 2]]));
        assert!(matches!(
            registry.build_filter("eq", &config),
            Err(RegistryError::ConfigMapping {
                source: ConfigMappingError::NotAScalar(_),
                ..
            })
        ));
        assert!(matches!(
            registry.build_filter("or", &ConfigNode::from(json!([]))),
            Err(RegistryError::ConfigMapping { .. })
        ));
    }
}
