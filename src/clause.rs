//! Declarative clause inputs and the `WHEN ... THEN ...` parser.
//!
//! A clause is one declarative rule: a guard condition and an action, plus
//! the variable names it reads and writes and any explicit ordering hints.
//! Clause inputs are immutable once created; compilation turns them into
//! dependency-resolved DAG nodes.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::expr::{Condition, Operand};

/// Whether a node may fire again in later iterations once its guard
/// re-satisfies. Re-firing is the default; `Once` opts a clause out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FiringMode {
    /// Fire every iteration the guard holds (self-referential rules converge
    /// this way, or exhaust the iteration bound).
    #[default]
    Refire,
    /// Fire at most once per execution.
    Once,
}

/// One declarative rule as supplied by the host. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseInput {
    /// Unique id within one compilation unit.
    pub id: String,
    /// The textual rule, e.g. `WHEN x == 5 THEN SET done = true`.
    pub raw_clause: String,
    /// Explicit ordering hints: ids of clauses that must fire first.
    pub dependencies: Vec<String>,
    /// Variable names the clause reads.
    pub inputs: Vec<String>,
    /// Variable names the clause writes.
    pub outputs: Vec<String>,
    /// Re-firing semantics for the compiled node.
    pub firing: FiringMode,
}

impl ClauseInput {
    /// Create a clause with the given id and raw rule text.
    pub fn new(id: impl Into<String>, raw_clause: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_clause: raw_clause.into(),
            dependencies: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            firing: FiringMode::default(),
        }
    }

    /// Add an explicit dependency on another clause id.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Declare a variable this clause reads.
    pub fn with_input(mut self, var: impl Into<String>) -> Self {
        self.inputs.push(var.into());
        self
    }

    /// Declare a variable this clause writes.
    pub fn with_output(mut self, var: impl Into<String>) -> Self {
        self.outputs.push(var.into());
        self
    }

    /// Set the firing mode (default: [`FiringMode::Refire`]).
    pub fn with_firing(mut self, firing: FiringMode) -> Self {
        self.firing = firing;
        self
    }
}

/// The executable action of a compiled clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClauseAction {
    /// Set a variable to a literal or to another variable's current value.
    Set { var: String, value: Operand },
    /// Add a numeric delta to a variable (unset variables start at 0).
    Add { var: String, delta: f64 },
    /// Delegate to the caller-supplied action executor.
    CallTool {
        tool: String,
        args: HashMap<String, String>,
    },
}

/// A clause parsed into its guard and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledClause {
    pub guard: Condition,
    pub action: ClauseAction,
}

fn when_then_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*WHEN\s+(.+?)\s+THEN\s+(.+?)\s*$").expect("clause regex is valid")
    })
}

fn set_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)^SET\s+(\S+)\s*=\s*(.+)$"#).expect("set regex is valid")
    })
}

fn add_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^ADD\s+(\S+)\s+(-?[0-9][0-9_.]*)$").expect("add regex is valid")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^CALL\s+([A-Za-z_][\w-]*)\s*\((.*)\)$").expect("call regex is valid")
    })
}

/// Parse a raw `WHEN <condition> THEN <action>` rule.
pub fn parse_clause(raw: &str) -> Result<CompiledClause, CompileError> {
    let caps = when_then_re().captures(raw).ok_or_else(|| CompileError::Parse {
        message: format!("\"{raw}\" does not match `WHEN <condition> THEN <action>`"),
    })?;

    let guard = Condition::parse(&caps[1])?;
    let action = parse_action(caps[2].trim())?;
    Ok(CompiledClause { guard, action })
}

fn parse_action(text: &str) -> Result<ClauseAction, CompileError> {
    if let Some(caps) = set_re().captures(text) {
        return Ok(ClauseAction::Set {
            var: caps[1].to_string(),
            value: Operand::parse(&caps[2])?,
        });
    }
    if let Some(caps) = add_re().captures(text) {
        let delta: f64 = caps[2].replace('_', "").parse().map_err(|_| {
            CompileError::InvalidAction {
                expression: text.into(),
                message: format!("\"{}\" is not a number", &caps[2]),
            }
        })?;
        return Ok(ClauseAction::Add {
            var: caps[1].to_string(),
            delta,
        });
    }
    if let Some(caps) = call_re().captures(text) {
        return Ok(ClauseAction::CallTool {
            tool: caps[1].to_string(),
            args: parse_call_args(&caps[2])?,
        });
    }
    Err(CompileError::InvalidAction {
        expression: text.into(),
        message: "expected SET, ADD, or CALL".into(),
    })
}

/// Parse `key=value, key2="quoted value"` tool arguments.
fn parse_call_args(text: &str) -> Result<HashMap<String, String>, CompileError> {
    let mut args = HashMap::new();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(args);
    }
    for pair in split_args(trimmed) {
        let (key, value) = pair.split_once('=').ok_or_else(|| CompileError::InvalidAction {
            expression: text.into(),
            message: format!("argument \"{pair}\" is not key=value"),
        })?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        args.insert(key.trim().to_string(), value.to_string());
    }
    Ok(args)
}

/// Split on commas that are not inside double quotes.
fn split_args(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ContextValue;

    #[test]
    fn parse_set_clause() {
        let compiled = parse_clause("WHEN x == 5 THEN SET done = true").unwrap();
        assert_eq!(
            compiled.action,
            ClauseAction::Set {
                var: "done".into(),
                value: Operand::Literal(ContextValue::Bool(true)),
            }
        );
    }

    #[test]
    fn parse_set_from_variable() {
        let compiled = parse_clause("WHEN always THEN SET copy = source").unwrap();
        assert_eq!(
            compiled.action,
            ClauseAction::Set {
                var: "copy".into(),
                value: Operand::Var("source".into()),
            }
        );
    }

    #[test]
    fn parse_add_clause() {
        let compiled = parse_clause("WHEN counter < 3 THEN ADD counter 1").unwrap();
        assert_eq!(
            compiled.action,
            ClauseAction::Add {
                var: "counter".into(),
                delta: 1.0,
            }
        );
    }

    #[test]
    fn parse_call_clause_with_args() {
        let compiled =
            parse_clause(r#"WHEN ready == true THEN CALL http_fetch(url="https://example.com", timeout=5)"#)
                .unwrap();
        match compiled.action {
            ClauseAction::CallTool { tool, args } => {
                assert_eq!(tool, "http_fetch");
                assert_eq!(args.get("url").map(String::as_str), Some("https://example.com"));
                assert_eq!(args.get("timeout").map(String::as_str), Some("5"));
            }
            other => panic!("expected CallTool, got {other:?}"),
        }
    }

    #[test]
    fn quoted_argument_values_may_contain_commas() {
        let compiled =
            parse_clause(r#"WHEN always THEN CALL notify(message="a, b, and c")"#).unwrap();
        match compiled.action {
            ClauseAction::CallTool { args, .. } => {
                assert_eq!(args.get("message").map(String::as_str), Some("a, b, and c"));
            }
            other => panic!("expected CallTool, got {other:?}"),
        }
    }

    #[test]
    fn case_insensitive_keywords() {
        assert!(parse_clause("when always then set x = 1").is_ok());
    }

    #[test]
    fn missing_then_is_a_parse_error() {
        let err = parse_clause("WHEN x == 5 SET done = true").unwrap_err();
        assert!(matches!(err, CompileError::Parse { .. }));
    }

    #[test]
    fn bogus_action_is_rejected() {
        let err = parse_clause("WHEN always THEN FROB x").unwrap_err();
        assert!(matches!(err, CompileError::InvalidAction { .. }));
    }

    #[test]
    fn clause_input_builder() {
        let clause = ClauseInput::new("c1", "WHEN always THEN SET x = 1")
            .with_dependency("c0")
            .with_input("seed")
            .with_output("x")
            .with_firing(FiringMode::Once);
        assert_eq!(clause.id, "c1");
        assert_eq!(clause.dependencies, vec!["c0".to_string()]);
        assert_eq!(clause.firing, FiringMode::Once);
    }
}
