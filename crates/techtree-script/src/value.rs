//! Parse-tree values produced by the parser.

use crate::lexer::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    String(String),
    Number(f64),
    Boolean(bool),
    Identifier(String),
    /// Reference to a `@variable`, name stored without the `@`.
    Variable(String),
}

impl Scalar {
    /// Text of a quoted string or bare identifier.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::String(s) | Scalar::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Scalar::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Number(_) => "number",
            Scalar::Boolean(_) => "boolean",
            Scalar::Identifier(_) => "identifier",
            Scalar::Variable(_) => "variable",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "\"{s}\""),
            Scalar::Number(n) => write!(f, "{}", format_number(*n)),
            Scalar::Boolean(true) => f.write_str("yes"),
            Scalar::Boolean(false) => f.write_str("no"),
            Scalar::Identifier(s) => f.write_str(s),
            Scalar::Variable(name) => write!(f, "@{name}"),
        }
    }
}

/// Render a number the way it would be written in a script file:
/// integral values without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// `key op value` inside a document or block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Statement key. Variable declarations keep their `@` prefix.
    pub key: String,
    pub op: Operator,
    pub value: ParseValue,
    /// 1-based line of the key token.
    pub line: u32,
    /// Index of the key token in the token stream.
    pub offset: usize,
}

impl Statement {
    pub fn is_variable_declaration(&self) -> bool {
        self.key.starts_with('@')
    }

    /// Declared variable name without the `@`.
    pub fn variable_name(&self) -> Option<&str> {
        self.key.strip_prefix('@')
    }
}

/// A value on the right-hand side of a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParseValue {
    Scalar(Scalar),
    /// `{ key = value ... }`, order and duplicate keys preserved.
    Block(Vec<Statement>),
    /// `{ a b "c" }`: bare scalars without keys.
    Array(Vec<Scalar>),
}

impl ParseValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ParseValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&[Statement]> {
        match self {
            ParseValue::Block(stmts) => Some(stmts),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Scalar]> {
        match self {
            ParseValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// First statement with the given key in a block.
    pub fn get(&self, key: &str) -> Option<&ParseValue> {
        self.as_block()?
            .iter()
            .find(|s| s.key == key)
            .map(|s| &s.value)
    }

    /// All statements with the given key in a block, in source order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ParseValue> + 'a {
        self.as_block()
            .unwrap_or(&[])
            .iter()
            .filter(move |s| s.key == key)
            .map(|s| &s.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ParseValue::Scalar(s) => s.kind_name(),
            ParseValue::Block(_) => "block",
            ParseValue::Array(_) => "array",
        }
    }
}
