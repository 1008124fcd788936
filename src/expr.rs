//! Guard and exit-condition expression grammar.
//!
//! The grammar is deliberately small and total: a condition is either one of
//! the constants `always` / `never`, or a single comparison
//! `<operand> <op> <operand>` with ops `== != < <= > >=`. Operands are
//! variable names or literals (number, quoted string, `true`, `false`).
//!
//! Evaluation never fails. Equality across mismatched types is false (and
//! `!=` is its complement, so an unset variable is "not equal" to anything);
//! ordering comparisons are defined for numbers only and are false otherwise.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::value::{ClauseContext, ContextValue};

/// One side of a comparison: a context variable or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Look the value up in the clause context at evaluation time.
    Var(String),
    /// A fixed value.
    Literal(ContextValue),
}

impl Operand {
    /// Parse an operand token: literals win over variable names. Fails when
    /// the token is neither a literal nor a valid identifier.
    pub fn parse(token: &str) -> Result<Operand, CompileError> {
        let trimmed = token.trim();
        if let Some(lit) = ContextValue::parse_literal(trimmed) {
            return Ok(Operand::Literal(lit));
        }
        if is_identifier(trimmed) {
            return Ok(Operand::Var(trimmed.to_string()));
        }
        Err(CompileError::InvalidCondition {
            expression: token.into(),
            message: format!("\"{trimmed}\" is neither a literal nor a variable name"),
        })
    }

    fn resolve<'a>(&'a self, ctx: &'a ClauseContext) -> Option<&'a ContextValue> {
        match self {
            Operand::Var(name) => ctx.get(name),
            Operand::Literal(value) => Some(value),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{name}"),
            Operand::Literal(ContextValue::Text(s)) => write!(f, "\"{s}\""),
            Operand::Literal(v) => write!(f, "{v}"),
        }
    }
}

/// Comparison operators of the condition grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// A parsed guard or exit condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Unconditionally true.
    Always,
    /// Unconditionally false.
    Never,
    /// A single typed comparison.
    Compare {
        lhs: Operand,
        op: Comparator,
        rhs: Operand,
    },
}

fn comparison_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*("[^"]*"|\S+)\s*(==|!=|<=|>=|<|>)\s*("[^"]*"|.+?)\s*$"#)
            .expect("comparison regex is valid")
    })
}

impl Condition {
    /// Parse a condition expression.
    pub fn parse(expression: &str) -> Result<Condition, CompileError> {
        let trimmed = expression.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "always" => return Ok(Condition::Always),
            "never" => return Ok(Condition::Never),
            "" => {
                return Err(CompileError::InvalidCondition {
                    expression: expression.into(),
                    message: "empty expression".into(),
                });
            }
            _ => {}
        }

        let caps = comparison_re().captures(trimmed).ok_or_else(|| {
            CompileError::InvalidCondition {
                expression: expression.into(),
                message: "expected `<operand> <op> <operand>`".into(),
            }
        })?;

        let op = match &caps[2] {
            "==" => Comparator::Eq,
            "!=" => Comparator::Ne,
            "<" => Comparator::Lt,
            "<=" => Comparator::Le,
            ">" => Comparator::Gt,
            ">=" => Comparator::Ge,
            other => {
                return Err(CompileError::InvalidCondition {
                    expression: expression.into(),
                    message: format!("unknown operator \"{other}\""),
                });
            }
        };

        Ok(Condition::Compare {
            lhs: Operand::parse(&caps[1])?,
            op,
            rhs: Operand::parse(&caps[3])?,
        })
    }

    /// Evaluate against a context. Total: never errors.
    pub fn eval(&self, ctx: &ClauseContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::Compare { lhs, op, rhs } => {
                let left = lhs.resolve(ctx);
                let right = rhs.resolve(ctx);
                match op {
                    Comparator::Eq => matches!((left, right), (Some(a), Some(b)) if a == b),
                    // Complement of Eq: an unset variable is not equal to anything.
                    Comparator::Ne => !matches!((left, right), (Some(a), Some(b)) if a == b),
                    Comparator::Lt => numeric(left, right).is_some_and(|(a, b)| a < b),
                    Comparator::Le => numeric(left, right).is_some_and(|(a, b)| a <= b),
                    Comparator::Gt => numeric(left, right).is_some_and(|(a, b)| a > b),
                    Comparator::Ge => numeric(left, right).is_some_and(|(a, b)| a >= b),
                }
            }
        }
    }
}

/// Variable names: leading letter or underscore, then word characters or dots.
fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn numeric(left: Option<&ContextValue>, right: Option<&ContextValue>) -> Option<(f64, f64)> {
    match (left?, right?) {
        (ContextValue::Number(a), ContextValue::Number(b)) => Some((*a, *b)),
        _ => None,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => write!(f, "always"),
            Condition::Never => write!(f, "never"),
            Condition::Compare { lhs, op, rhs } => {
                write!(f, "{lhs} {} {rhs}", op.symbol())
            }
        }
    }
}
