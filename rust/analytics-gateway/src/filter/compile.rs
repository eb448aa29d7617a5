use super::{Comparison, FilterExpr, Operands, Scalar};
use serde::Serialize;

/// Renders a filter tree as a SQL boolean expression.
///
/// Groups are wrapped in exactly one pair of parentheses and keep operand
/// order. Two-operand comparisons quote text values; range comparisons emit
/// both bounds unquoted and apply the same operator to each bound.
pub fn compile(expr: &FilterExpr) -> String {
    match expr {
        FilterExpr::And(operands) => group(operands, " AND "),
        FilterExpr::Or(operands) => group(operands, " OR "),
        FilterExpr::Comparison(comparison) => comparison_sql(comparison),
    }
}

fn group(operands: &[FilterExpr], separator: &str) -> String {
    let parts: Vec<String> = operands.iter().map(compile).collect();
    format!("({})", parts.join(separator))
}

fn comparison_sql(comparison: &Comparison) -> String {
    let op = comparison.op;
    match &comparison.operands {
        Operands::Single { variable, value } => {
            format!("{} {op} {}", variable.name, value.quoted())
        }
        Operands::Range {
            start,
            variable,
            end,
        } => format!(
            "{name} {op} {} AND {name} {op} {}",
            start.bare(),
            end.bare(),
            name = variable.name
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum BindParam {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&Scalar> for BindParam {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => BindParam::Text(text.clone()),
            Scalar::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(int), _) => BindParam::Int(int),
                // Beyond i64 but still integral: keep the exact digits.
                (None, _) if number.is_u64() => BindParam::Text(number.to_string()),
                (None, Some(float)) => BindParam::Float(float),
                (None, None) => BindParam::Text(number.to_string()),
            },
        }
    }
}

/// SQL text with `$n` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterizedFilter {
    pub sql: String,
    pub params: Vec<BindParam>,
}

/// Same structure as [`compile`], but every literal becomes a positional
/// placeholder numbered in pre-order. Variable names are still interpolated.
pub fn compile_parameterized(expr: &FilterExpr) -> ParameterizedFilter {
    let mut params = Vec::new();
    let sql = render_bound(expr, &mut params);
    ParameterizedFilter { sql, params }
}

fn render_bound(expr: &FilterExpr, params: &mut Vec<BindParam>) -> String {
    match expr {
        FilterExpr::And(operands) => bound_group(operands, " AND ", params),
        FilterExpr::Or(operands) => bound_group(operands, " OR ", params),
        FilterExpr::Comparison(comparison) => {
            let op = comparison.op;
            match &comparison.operands {
                Operands::Single { variable, value } => {
                    let slot = bind(params, value);
                    format!("{} {op} {slot}", variable.name)
                }
                Operands::Range {
                    start,
                    variable,
                    end,
                } => {
                    let first = bind(params, start);
                    let second = bind(params, end);
                    format!(
                        "{name} {op} {first} AND {name} {op} {second}",
                        name = variable.name
                    )
                }
            }
        }
    }
}

fn bound_group(operands: &[FilterExpr], separator: &str, params: &mut Vec<BindParam>) -> String {
    let parts: Vec<String> = operands
        .iter()
        .map(|operand| render_bound(operand, params))
        .collect();
    format!("({})", parts.join(separator))
}

fn bind(params: &mut Vec<BindParam>, value: &Scalar) -> String {
    params.push(BindParam::from(value));
    format!("${}", params.len())
}
