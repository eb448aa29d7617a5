use super::{Comparison, ComparisonOp, FilterError, FilterExpr, Operands, Scalar, Variable};
use serde_json::{Map, Value};

/// Nesting limit applied by [`parse`].
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Key accepted as shorthand for a `<=` range comparison.
const BETWEEN_KEY: &str = "between";

type Result<T> = std::result::Result<T, FilterError>;

pub fn parse(value: &Value) -> Result<FilterExpr> {
    parse_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// Parses a filter, rejecting trees nested deeper than `max_depth` levels.
/// A lone comparison is one level deep.
pub fn parse_with_depth(value: &Value, max_depth: usize) -> Result<FilterExpr> {
    parse_node(value, 1, max_depth)
}

fn parse_node(value: &Value, depth: usize, max_depth: usize) -> Result<FilterExpr> {
    if depth > max_depth {
        return Err(FilterError::DepthExceeded(max_depth));
    }

    let object = value.as_object().ok_or_else(|| {
        FilterError::UnrecognizedExpression(format!("expected an object, found {}", kind(value)))
    })?;
    let (key, payload) = single_entry(object)?;

    match key.as_str() {
        "and" => parse_group("and", payload, depth, max_depth).map(FilterExpr::And),
        "or" => parse_group("or", payload, depth, max_depth).map(FilterExpr::Or),
        operator => parse_comparison(operator, payload).map(FilterExpr::Comparison),
    }
}

fn single_entry(object: &Map<String, Value>) -> Result<(&String, &Value)> {
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(FilterError::UnrecognizedExpression(format!(
            "expected exactly one key, found {}",
            object.len()
        ))),
    }
}

fn parse_group(
    name: &'static str,
    payload: &Value,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<FilterExpr>> {
    let items = payload.as_array().ok_or_else(|| {
        FilterError::UnrecognizedExpression(format!(
            "'{name}' expects an array, found {}",
            kind(payload)
        ))
    })?;

    if items.is_empty() {
        return Err(FilterError::EmptyGroup(name));
    }

    items
        .iter()
        .map(|item| parse_node(item, depth + 1, max_depth))
        .collect()
}

fn parse_comparison(key: &str, payload: &Value) -> Result<Comparison> {
    let (op, range_only) = if key == BETWEEN_KEY {
        (ComparisonOp::Lte, true)
    } else {
        let op = ComparisonOp::from_symbol(key)
            .ok_or_else(|| FilterError::UnsupportedOperator(key.to_string()))?;
        (op, false)
    };

    let operands = payload
        .as_array()
        .ok_or_else(|| invalid_operand(key, format!("expected an array, found {}", kind(payload))))?;

    let operands = match operands.as_slice() {
        [variable, value] if !range_only => Operands::Single {
            variable: parse_variable(key, variable)?,
            value: parse_scalar(key, value)?,
        },
        [start, variable, end] => Operands::Range {
            start: parse_scalar(key, start)?,
            variable: parse_variable(key, variable)?,
            end: parse_scalar(key, end)?,
        },
        other => {
            return Err(FilterError::InvalidOperandCount {
                operator: key.to_string(),
                count: other.len(),
            })
        }
    };

    Ok(Comparison { op, operands })
}

fn parse_variable(operator: &str, value: &Value) -> Result<Variable> {
    let name = value
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.get("var"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            invalid_operand(
                operator,
                format!("expected {{\"var\": <name>}}, found {}", kind(value)),
            )
        })?;

    if name.trim().is_empty() {
        return Err(invalid_operand(operator, "variable name must not be empty"));
    }

    Ok(Variable {
        name: name.to_string(),
    })
}

fn parse_scalar(operator: &str, value: &Value) -> Result<Scalar> {
    match value {
        Value::String(text) => Ok(Scalar::Text(text.clone())),
        Value::Number(number) => Ok(Scalar::Number(number.clone())),
        other => Err(invalid_operand(
            operator,
            format!("expected a string or number, found {}", kind(other)),
        )),
    }
}

fn invalid_operand(operator: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidOperand {
        operator: operator.to_string(),
        reason: reason.into(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn var(name: &str) -> Variable {
        Variable {
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_nested_groups() {
        let expr = parse(&json!({
            "and": [
                {"==": [{"var": "status"}, "active"]},
                {"or": [{">": [{"var": "age"}, 18]}]}
            ]
        }))
        .unwrap();

        let FilterExpr::And(children) = expr else {
            panic!("expected an AND group");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[0],
            FilterExpr::Comparison(Comparison {
                op: ComparisonOp::DoubleEq,
                operands: Operands::Single {
                    variable: var("status"),
                    value: Scalar::Text("active".into()),
                },
            })
        );
        assert!(matches!(children[1], FilterExpr::Or(ref inner) if inner.len() == 1));
    }

    #[test]
    fn parses_range_operands_in_order() {
        let expr = parse(&json!({"<": [1, {"var": "n"}, "9"]})).unwrap();
        assert_eq!(
            expr,
            FilterExpr::Comparison(Comparison {
                op: ComparisonOp::Lt,
                operands: Operands::Range {
                    start: Scalar::Number(1.into()),
                    variable: var("n"),
                    end: Scalar::Text("9".into()),
                },
            })
        );
    }

    #[test]
    fn between_maps_to_lte_range() {
        let expr = parse(&json!({"between": [0, {"var": "score"}, 100]})).unwrap();
        let FilterExpr::Comparison(comparison) = expr else {
            panic!("expected a comparison");
        };
        assert_eq!(comparison.op, ComparisonOp::Lte);
        assert!(matches!(comparison.operands, Operands::Range { .. }));
    }

    #[test]
    fn between_requires_three_operands() {
        let err = parse(&json!({"between": [{"var": "score"}, 100]})).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidOperandCount {
                operator: "between".into(),
                count: 2
            }
        );
    }

    #[test]
    fn rejects_unsupported_operator() {
        let err = parse(&json!({"~=": [{"var": "x"}, 1]})).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedOperator("~=".into()));
    }

    #[test]
    fn rejects_wrong_operand_counts() {
        for operands in [json!([{"var": "x"}]), json!([1, {"var": "x"}, 2, 3]), json!([])] {
            let err = parse(&json!({">": operands})).unwrap_err();
            assert!(
                matches!(err, FilterError::InvalidOperandCount { ref operator, .. } if operator == ">"),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_shapes_that_are_not_expressions() {
        for input in [
            json!("status"),
            json!([1, 2]),
            json!({}),
            json!({"and": [], "or": []}),
            json!({"and": {"==": [{"var": "x"}, 1]}}),
        ] {
            let err = parse(&input).unwrap_err();
            assert!(
                matches!(err, FilterError::UnrecognizedExpression(_)),
                "expected unrecognized expression for {input}, got {err:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_groups() {
        assert_eq!(
            parse(&json!({"or": []})).unwrap_err(),
            FilterError::EmptyGroup("or")
        );
    }

    #[test]
    fn rejects_malformed_operands() {
        let cases = [
            json!({"=": ["status", "active"]}),
            json!({"=": [{"var": ""}, "active"]}),
            json!({"=": [{"var": "x", "extra": 1}, 1]}),
            json!({"=": [{"var": "x"}, null]}),
            json!({"=": [{"var": "x"}, [1]]}),
            json!({"=": {"var": "x"}}),
        ];
        for input in cases {
            let err = parse(&input).unwrap_err();
            assert!(
                matches!(err, FilterError::InvalidOperand { .. }),
                "expected invalid operand for {input}, got {err:?}"
            );
        }
    }

    #[test]
    fn enforces_depth_limit() {
        let mut value = json!({"=": [{"var": "x"}, 1]});
        for _ in 0..4 {
            value = json!({"and": [value]});
        }

        assert!(parse_with_depth(&value, 5).is_ok());
        assert_eq!(
            parse_with_depth(&value, 4).unwrap_err(),
            FilterError::DepthExceeded(4)
        );
    }

    #[test]
    fn deeply_nested_input_fails_without_overflowing() {
        let mut value = json!({"=": [{"var": "x"}, 1]});
        for _ in 0..1_000 {
            value = json!({"or": [value]});
        }
        assert_eq!(
            parse(&value).unwrap_err(),
            FilterError::DepthExceeded(DEFAULT_MAX_DEPTH)
        );
    }
}
