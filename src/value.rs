//! Typed context values and the per-execution variable context.
//!
//! A [`ClauseContext`] is the mutable state a kernel executes against. It is
//! exclusively owned by one in-flight execution: callers construct a fresh
//! context per `execute` call and must never share one across concurrent
//! executions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A tagged value stored in a clause context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ContextValue {
    /// Numeric value (all numbers are f64, like the clause grammar's literals).
    Number(f64),
    /// Text value.
    Text(String),
    /// Boolean value.
    Bool(bool),
}

impl ContextValue {
    /// Parse a literal token: quoted string, `true`/`false`, or number.
    /// Returns `None` if the token is not a literal (i.e. it is a variable name).
    pub fn parse_literal(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
            return Some(ContextValue::Text(token[1..token.len() - 1].to_string()));
        }
        match token {
            "true" => return Some(ContextValue::Bool(true)),
            "false" => return Some(ContextValue::Bool(false)),
            _ => {}
        }
        token.parse::<f64>().ok().map(ContextValue::Number)
    }

    /// Numeric accessor, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ContextValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean accessor, if this value is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Number(n) => write!(f, "{n}"),
            ContextValue::Text(s) => write!(f, "{s}"),
            ContextValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        ContextValue::Number(n)
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        ContextValue::Bool(b)
    }
}

/// Mutable mapping from variable name to tagged value.
///
/// Exclusively owned by one execution in flight. The executor mutates it
/// through clause actions; the caller reads the final state afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClauseContext {
    vars: HashMap<String, ContextValue>,
}

impl ClauseContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ContextValue>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set`](Self::set) for seeding initial inputs.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Get a variable's value.
    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.vars.get(name)
    }

    /// Whether a variable is present.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the context holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over variable name/value pairs (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.vars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_variants() {
        assert_eq!(
            ContextValue::parse_literal("42.5"),
            Some(ContextValue::Number(42.5))
        );
        assert_eq!(
            ContextValue::parse_literal("\"hello\""),
            Some(ContextValue::Text("hello".into()))
        );
        assert_eq!(
            ContextValue::parse_literal("true"),
            Some(ContextValue::Bool(true))
        );
        // Bare identifiers are variables, not literals.
        assert_eq!(ContextValue::parse_literal("counter"), None);
    }

    #[test]
    fn context_set_and_get() {
        let mut ctx = ClauseContext::new();
        ctx.set("x", 5.0);
        ctx.set("name", "alice");
        ctx.set("done", false);

        assert_eq!(ctx.get("x"), Some(&ContextValue::Number(5.0)));
        assert_eq!(ctx.get("name"), Some(&ContextValue::Text("alice".into())));
        assert!(ctx.contains("done"));
        assert!(!ctx.contains("missing"));
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn set_replaces_previous_value() {
        let mut ctx = ClauseContext::new().with("x", 1.0);
        ctx.set("x", 2.0);
        assert_eq!(ctx.get("x"), Some(&ContextValue::Number(2.0)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn value_display() {
        assert_eq!(ContextValue::Number(3.0).to_string(), "3");
        assert_eq!(ContextValue::Text("a".into()).to_string(), "a");
        assert_eq!(ContextValue::Bool(true).to_string(), "true");
    }
}
