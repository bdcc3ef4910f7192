//! Condition expression language.
//!
//! Conditions are small boolean predicates over namespaced resource
//! attributes, for example:
//!
//! ```text
//! host.sys_load > 1.5 || host.mem_used_percent > 0.7
//! ```
//!
//! Parsing and evaluation are separate passes: [`Condition::parse`] builds an
//! expression tree once, and [`Condition::evaluate`] runs it against an
//! [`EvaluationEnvironment`]. [`validate`] is exactly the parse pass, so a
//! condition accepted at write time is one the evaluator will parse.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, Reference};
pub use parser::{parse_expression, DEFAULT_MAX_DEPTH};

use crate::environment::EvaluationEnvironment;
use dt_core::ScalarKind;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A syntax error in a condition string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// Human-readable description.
    pub message: String,
    /// Byte offset in the condition where the error was detected.
    pub position: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Errors produced while parsing or evaluating a condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Invalid condition: {0}")]
    Parse(#[from] ParseError),

    #[error("Undefined reference '{reference}': {detail}")]
    UndefinedReference { reference: String, detail: String },

    #[error("Type mismatch: cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: ScalarKind,
        right: ScalarKind,
    },
}

/// A parsed, reusable condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parses a condition with the default nesting limit.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        Self::parse_with_max_depth(source, DEFAULT_MAX_DEPTH)
    }

    /// Parses a condition, rejecting parenthesis nesting beyond `max_depth`.
    pub fn parse_with_max_depth(source: &str, max_depth: usize) -> Result<Self, ParseError> {
        let expr = parse_expression(source, max_depth)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluates the condition to a boolean.
    ///
    /// Both operands of `&&` and `||` are always evaluated, left first, so a
    /// reference error on either side is reported even when the other side
    /// already decides the result.
    pub fn evaluate(&self, env: &EvaluationEnvironment) -> Result<bool, ConditionError> {
        Ok(eval::evaluate(&self.expr, env)?.is_truthy())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every attribute reference in the condition, in evaluation order.
    pub fn references(&self) -> Vec<&Reference> {
        self.expr.references()
    }

    /// Namespaces referenced by the condition, sorted and de-duplicated.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .references()
            .into_iter()
            .map(|r| r.namespace.as_str())
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }
}

impl FromStr for Condition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Checks that `source` is a syntactically valid condition.
pub fn validate(source: &str) -> Result<(), ParseError> {
    Condition::parse(source).map(|_| ())
}

/// Returns true if `source` is a syntactically valid condition.
pub fn is_valid(source: &str) -> bool {
    validate(source).is_ok()
}

/// Parses and evaluates `source` in one step.
pub fn eval_bool(source: &str, env: &EvaluationEnvironment) -> Result<bool, ConditionError> {
    Condition::parse(source)?.evaluate(env)
}
