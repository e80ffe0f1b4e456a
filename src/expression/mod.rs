/// Guard expressions and working-state access
///
/// Decision edges carry guards of the form `<dotted.path> <operator> <literal>`.
/// This module tokenizes and parses them into a small AST and evaluates that AST
/// against the working state. It also hosts the dotted-path helpers used by
/// script nodes and the rule engine.

// Dotted-path lookup, assignment and literal parsing
pub mod path;

// Tokenizer and parser producing `GuardExpression`
pub mod parser;

pub use parser::{parse, CompareOp, GuardExpression};
pub use path::{parse_literal, resolve_path, resolve_template, set_path};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },
}

/// Parse and evaluate `expression` against `state` in one step.
pub fn evaluate(state: &Value, expression: &str) -> Result<bool, ExpressionError> {
    Ok(parse(expression)?.evaluate(state))
}

/// Equality used by guards and rule conditions.
///
/// Numbers compare by value, so `1` and `1.0` are equal. Everything else is
/// structural equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Numeric view of a value. Numeric strings are accepted.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_numeric_guard() {
        let state = json!({ "score": 85 });
        assert!(evaluate(&state, "score >= 80").unwrap());
        assert!(!evaluate(&state, "score < 80").unwrap());
    }

    #[test]
    fn missing_operator_is_malformed() {
        let err = evaluate(&json!({}), "score").unwrap_err();
        assert!(matches!(err, ExpressionError::MalformedExpression { .. }));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }
}
