//! `@variable` declarations and lookup.
//!
//! Declarations are collected from a whole document before any value is
//! resolved, so use-before-declaration works. A [`VariableScope`] layers a
//! document's own table over a shared table (scripted-variable files).

use crate::value::{ParseValue, Scalar, Statement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest `@a = @b` chain followed before giving up.
pub const MAX_CHAIN: usize = 16;

/// Variable name -> declared scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableTable {
    values: HashMap<String, Scalar>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect top-level `@name = scalar` declarations. A later declaration
    /// of the same name wins.
    pub fn from_statements(statements: &[Statement]) -> Self {
        let mut table = Self::new();
        for stmt in statements {
            if let (Some(name), ParseValue::Scalar(value)) = (stmt.variable_name(), &stmt.value) {
                table.declare(name, value.clone());
            }
        }
        table
    }

    pub fn declare(&mut self, name: impl Into<String>, value: Scalar) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge `other` into this table; `other` wins on conflicts.
    pub fn extend(&mut self, other: &VariableTable) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// A document's variables layered over an optional shared table.
#[derive(Debug, Clone, Copy)]
pub struct VariableScope<'a> {
    local: &'a VariableTable,
    shared: Option<&'a VariableTable>,
}

impl<'a> VariableScope<'a> {
    pub fn new(local: &'a VariableTable) -> Self {
        Self {
            local,
            shared: None,
        }
    }

    pub fn with_shared(local: &'a VariableTable, shared: &'a VariableTable) -> Self {
        Self {
            local,
            shared: Some(shared),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Scalar> {
        self.local
            .get(name)
            .or_else(|| self.shared.and_then(|s| s.get(name)))
    }

    /// Resolve a variable to a number, following references to other
    /// variables. `None` when undeclared, non-numeric, or the chain is too
    /// long (which also covers self-reference).
    pub fn resolve_number(&self, name: &str) -> Option<f64> {
        let mut current = name;
        for _ in 0..MAX_CHAIN {
            match self.get(current)? {
                Scalar::Number(n) => return Some(*n),
                Scalar::Variable(next) => current = next.as_str(),
                Scalar::String(s) | Scalar::Identifier(s) => return s.parse().ok(),
                Scalar::Boolean(_) => return None,
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Name-based fallbacks
// ---------------------------------------------------------------------------

/// The run of digits at the end of a name: `tier0cost3` -> 3.
pub fn trailing_number(name: &str) -> Option<u64> {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digits_start..].parse().ok()
}

/// The tier a variable name denotes: the digits right after the last
/// `tier` that has any (`tier2cost1` -> 2), else the trailing digits.
pub fn tier_from_name(name: &str) -> Option<u64> {
    let lower = name.to_ascii_lowercase();
    lower
        .rmatch_indices("tier")
        .find_map(|(idx, _)| {
            let digits: String = lower[idx + 4..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
        .or_else(|| trailing_number(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn collects_declarations_from_whole_document() {
        let doc = parse_document("tech = { cost = @late }\n@late = 250\n@early = 10");
        let vars = doc.variables();
        assert_eq!(vars.len(), 2);
        assert_eq!(VariableScope::new(&vars).resolve_number("late"), Some(250.0));
    }

    #[test]
    fn later_declaration_wins() {
        let doc = parse_document("@x = 1\n@x = 2");
        assert_eq!(doc.variables().get("x"), Some(&Scalar::Number(2.0)));
    }

    #[test]
    fn local_shadows_shared() {
        let mut shared = VariableTable::new();
        shared.declare("cost", Scalar::Number(100.0));
        shared.declare("only_shared", Scalar::Number(7.0));
        let mut local = VariableTable::new();
        local.declare("cost", Scalar::Number(5.0));

        let scope = VariableScope::with_shared(&local, &shared);
        assert_eq!(scope.resolve_number("cost"), Some(5.0));
        assert_eq!(scope.resolve_number("only_shared"), Some(7.0));
        assert_eq!(scope.resolve_number("missing"), None);
    }

    #[test]
    fn chains_resolve_and_cycles_stop() {
        let doc = parse_document("@a = @b\n@b = @c\n@c = 42\n@loop = @loop");
        let vars = doc.variables();
        let scope = VariableScope::new(&vars);
        assert_eq!(scope.resolve_number("a"), Some(42.0));
        assert_eq!(scope.resolve_number("loop"), None);
    }

    #[test]
    fn numeric_strings_resolve() {
        let mut vars = VariableTable::new();
        vars.declare("s", Scalar::String("12.5".into()));
        vars.declare("flag", Scalar::Boolean(true));
        let scope = VariableScope::new(&vars);
        assert_eq!(scope.resolve_number("s"), Some(12.5));
        assert_eq!(scope.resolve_number("flag"), None);
    }

    #[test]
    fn extend_overwrites() {
        let mut a = VariableTable::new();
        a.declare("x", Scalar::Number(1.0));
        let mut b = VariableTable::new();
        b.declare("x", Scalar::Number(2.0));
        b.declare("y", Scalar::Number(3.0));
        a.extend(&b);
        assert_eq!(a.get("x"), Some(&Scalar::Number(2.0)));
        assert_eq!(a.iter().count(), 2);
    }

    #[test]
    fn trailing_digits() {
        assert_eq!(trailing_number("tier0cost3"), Some(3));
        assert_eq!(trailing_number("cost120"), Some(120));
        assert_eq!(trailing_number("nothing"), None);
        assert_eq!(trailing_number(""), None);
    }

    #[test]
    fn tier_digits_prefer_tier_marker() {
        assert_eq!(tier_from_name("tier2cost1"), Some(2));
        assert_eq!(tier_from_name("TIER4"), Some(4));
        assert_eq!(tier_from_name("level5"), Some(5));
        assert_eq!(tier_from_name("tierless"), None);
        assert_eq!(tier_from_name("frontier2_tier3"), Some(3));
        assert_eq!(tier_from_name("tier1_frontier_cost"), Some(1));
    }
}
