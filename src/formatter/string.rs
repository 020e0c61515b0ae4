use super::{FormatError, Formatter};
use crate::attribute::AttributeError;
use crate::config::ConfigNode;
use crate::record::LogRecord;
use crate::registry::{Category, Component, Registry};
use std::any::Any;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

/// Formatter that renders a pattern such as `"[<timestamp>] <message>"`.
///
/// Each `<name>` is replaced with the textual form of the attribute `name`;
/// everything else is copied verbatim. A `<` that does not open a valid
/// placeholder is kept as a literal.
#[derive(Debug, Clone)]
pub struct PatternFormatter {
    pattern: String,
    tokens: Vec<Token>,
}

impl PatternFormatter {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let tokens = tokenize(&pattern);
        PatternFormatter { pattern, tokens }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    while let Some(start) = rest.find('<') {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name = after.find('>').map(|end| &after[..end]);
        match name {
            Some(name) if is_placeholder_name(name) => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Placeholder(name.to_string()));
                rest = &after[name.len() + 1..];
            }
            _ => {
                literal.push('<');
                rest = after;
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

impl Formatter for PatternFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let attributes = record.attributes();
        let mut out = String::with_capacity(self.pattern.len() + 64);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Placeholder(name) => {
                    let value = attributes
                        .value(name)
                        .ok_or_else(|| AttributeError::KeyNotFound(name.clone()))?;
                    write!(out, "{}", value).map_err(|e| FormatError::Encode(e.to_string()))?;
                }
            }
        }
        Ok(out.into_bytes())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Register the `string` formatter. Its payload is the pattern itself.
pub fn register(registry: &mut Registry) {
    registry.register(Category::Formatter, "string", |config: &ConfigNode, _: &Registry| {
        let pattern: String = config.to()?;
        Ok(Component::Formatter(Box::new(PatternFormatter::new(pattern))))
    });
}
