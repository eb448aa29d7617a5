//! JSON filter expressions and their rendering into SQL `WHERE` clauses.
//!
//! Incoming request bodies use a small JSON logic dialect:
//!
//! ```text
//! { "and": [ <expr>, ... ] }
//! { "or":  [ <expr>, ... ] }
//! { "<op>": [ {"var": "<name>"}, <scalar> ] }
//! { "<op>": [ <scalar>, {"var": "<name>"}, <scalar> ] }
//! ```
//!
//! [`parse`] validates the JSON into a closed [`FilterExpr`] tree and
//! [`compile`] renders it as SQL text. Rendering interpolates values directly
//! (strings are single-quoted verbatim, never escaped), so untrusted input
//! should go through [`compile_parameterized`] instead.

mod compile;
mod parse;

pub use compile::{compile, compile_parameterized, BindParam, ParameterizedFilter};
pub use parse::{parse, parse_with_depth, DEFAULT_MAX_DEPTH};

use serde::{Deserialize, Deserializer};
use serde_json::Number;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unrecognized filter expression: {0}")]
    UnrecognizedExpression(String),

    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("invalid number of operands for operator {operator}: got {count}")]
    InvalidOperandCount { operator: String, count: usize },

    #[error("invalid operand for operator {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },

    #[error("'{0}' requires at least one operand")]
    EmptyGroup(&'static str),

    #[error("filter nesting exceeds the maximum depth of {0}")]
    DepthExceeded(usize),
}

/// A validated filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Comparison(Comparison),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub operands: Operands,
}

/// Operand shapes accepted by a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    /// `[{"var": name}, value]`
    Single { variable: Variable, value: Scalar },
    /// `[value, {"var": name}, value]`; both bounds use the same operator.
    Range {
        start: Scalar,
        variable: Variable,
        end: Scalar,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    DoubleEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "==" => Some(Self::DoubleEq),
            "!=" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::DoubleEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column or JSON-path accessor referenced by a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
}

impl Scalar {
    /// Literal form used by two-operand comparisons: text is single-quoted.
    pub fn quoted(&self) -> String {
        match self {
            Scalar::Text(text) => format!("'{text}'"),
            Scalar::Number(number) => number_literal(number),
        }
    }

    /// Literal form used by range comparisons: text is emitted as-is.
    pub fn bare(&self) -> String {
        match self {
            Scalar::Text(text) => text.clone(),
            Scalar::Number(number) => number_literal(number),
        }
    }
}

/// Decimal form of a number; integral floats drop the trailing `.0`.
fn number_literal(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() => float.to_string(),
        _ => number.to_string(),
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&compile(self))
    }
}

impl<'de> Deserialize<'de> for FilterExpr {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        parse(&value).map_err(serde::de::Error::custom)
    }
}
