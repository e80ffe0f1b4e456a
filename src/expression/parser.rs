/// Guard tokenizer, parser and evaluator
///
/// Grammar: `path OP literal`. Operators are matched longest-first so `===` is
/// never read as `==` followed by `=`. Word operators (`contains`, `startsWith`)
/// must be surrounded by whitespace. Anything inside single or double quotes is
/// literal text and never produces an operator token.

use super::path::{parse_literal, resolve_path};
use super::{as_number, values_equal, ExpressionError};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Gte,
    Lte,
    Gt,
    Lt,
    Contains,
    StartsWith,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::StrictEq => "===",
            CompareOp::StrictNe => "!==",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "startsWith",
        }
    }
}

// Longest first.
const SYMBOLIC_OPS: [CompareOp; 8] = [
    CompareOp::StrictEq,
    CompareOp::StrictNe,
    CompareOp::Eq,
    CompareOp::Ne,
    CompareOp::Gte,
    CompareOp::Lte,
    CompareOp::Gt,
    CompareOp::Lt,
];

const WORD_OPS: [CompareOp; 2] = [CompareOp::Contains, CompareOp::StartsWith];

/// Parsed guard: `path OP literal`.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardExpression {
    pub path: String,
    pub op: CompareOp,
    pub literal: Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OperatorToken {
    start: usize,
    end: usize,
    op: CompareOp,
}

/// Find every operator token outside quoted text.
fn tokenize_operators(expression: &str) -> Vec<OperatorToken> {
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    'scan: while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'"' || b == b'\'' {
            quote = Some(b);
            i += 1;
            continue;
        }

        for op in SYMBOLIC_OPS {
            let symbol = op.symbol().as_bytes();
            if bytes[i..].starts_with(symbol) {
                tokens.push(OperatorToken { start: i, end: i + symbol.len(), op });
                i += symbol.len();
                continue 'scan;
            }
        }

        if i > 0 && bytes[i - 1].is_ascii_whitespace() {
            for op in WORD_OPS {
                let word = op.symbol().as_bytes();
                let end = i + word.len();
                let bounded = bytes.get(end).is_some_and(|c| c.is_ascii_whitespace());
                if bytes[i..].starts_with(word) && bounded {
                    tokens.push(OperatorToken { start: i, end, op });
                    i = end;
                    continue 'scan;
                }
            }
        }

        i += 1;
    }

    tokens
}

/// Parse a guard string into a `GuardExpression`.
pub fn parse(expression: &str) -> Result<GuardExpression, ExpressionError> {
    let malformed = |reason: &str| ExpressionError::MalformedExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    let tokens = tokenize_operators(expression);
    let token = match tokens.as_slice() {
        [] => return Err(malformed("no comparison operator found")),
        [token] => *token,
        _ => return Err(malformed("expected exactly one comparison operator")),
    };

    let path = expression[..token.start].trim();
    let literal = expression[token.end..].trim();

    if path.is_empty() || literal.is_empty() {
        return Err(malformed("expected `<path> <operator> <literal>`"));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(malformed("left-hand side must be a single dotted path"));
    }

    Ok(GuardExpression {
        path: path.to_string(),
        op: token.op,
        literal: parse_literal(literal),
    })
}

impl GuardExpression {
    /// Evaluate against the working state. Never fails once parsed.
    pub fn evaluate(&self, state: &Value) -> bool {
        let left = resolve_path(state, &self.path);
        let right = &self.literal;

        match self.op {
            CompareOp::Eq => loose_equal(left, right),
            CompareOp::Ne => !loose_equal(left, right),
            CompareOp::StrictEq => left.is_some_and(|l| values_equal(l, right)),
            CompareOp::StrictNe => !left.is_some_and(|l| values_equal(l, right)),
            CompareOp::Gt => compare(left, right) == Some(Ordering::Greater),
            CompareOp::Lt => compare(left, right) == Some(Ordering::Less),
            CompareOp::Gte => matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Lte => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Contains => match left {
                Some(Value::String(s)) => s.contains(&text_of(right)),
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, right)),
                _ => false,
            },
            CompareOp::StartsWith => match left {
                Some(Value::String(s)) => s.starts_with(&text_of(right)),
                _ => false,
            },
        }
    }
}

impl fmt::Display for GuardExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.op.symbol(), self.literal)
    }
}

// Absent equals null, and nothing else.
fn loose_equal(left: Option<&Value>, right: &Value) -> bool {
    match left {
        None => right.is_null(),
        Some(l) => values_equal(l, right),
    }
}

fn compare(left: Option<&Value>, right: &Value) -> Option<Ordering> {
    match (left?, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (l, r) => as_number(l)?.partial_cmp(&as_number(r)?),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn longest_operator_wins() {
        let expr = parse("status === 'active'").unwrap();
        assert_eq!(expr.op, CompareOp::StrictEq);
        assert_eq!(expr.path, "status");
        assert_eq!(expr.literal, json!("active"));

        assert_eq!(parse("a !== 1").unwrap().op, CompareOp::StrictNe);
        assert_eq!(parse("a >= 1").unwrap().op, CompareOp::Gte);
        assert_eq!(parse("a<1").unwrap().op, CompareOp::Lt);
    }

    #[test]
    fn operators_inside_quotes_are_literal_text() {
        let expr = parse("note == 'a >= b'").unwrap();
        assert_eq!(expr.op, CompareOp::Eq);
        assert_eq!(expr.literal, json!("a >= b"));
    }

    #[test]
    fn word_operators_need_whitespace() {
        let expr = parse("user.email contains '@example.com'").unwrap();
        assert_eq!(expr.op, CompareOp::Contains);
        assert_eq!(expr.path, "user.email");

        assert_eq!(parse("name startsWith Jo").unwrap().op, CompareOp::StartsWith);
        assert!(parse("containsx == 1").is_ok());
    }

    #[test]
    fn malformed_inputs() {
        assert!(parse("score").is_err());
        assert!(parse(">= 80").is_err());
        assert!(parse("score >=").is_err());
        assert!(parse("a == b == c").is_err());
        assert!(parse("total score > 3").is_err());
    }

    #[test]
    fn absent_paths_only_loosely_equal_null() {
        let state = json!({ "present": null });
        assert!(parse("missing == null").unwrap().evaluate(&state));
        assert!(!parse("missing === null").unwrap().evaluate(&state));
        assert!(parse("present === null").unwrap().evaluate(&state));
        assert!(!parse("missing == 0").unwrap().evaluate(&state));
        assert!(parse("missing != 0").unwrap().evaluate(&state));
        assert!(!parse("missing > 0").unwrap().evaluate(&state));
    }

    #[test]
    fn comparisons_by_type() {
        let state = json!({ "score": 85, "tier": "gold", "tags": ["vip", "eu"], "raw": "90" });
        assert!(parse("score > 80").unwrap().evaluate(&state));
        assert!(parse("score <= 85").unwrap().evaluate(&state));
        assert!(parse("score == 85.0").unwrap().evaluate(&state));
        assert!(!parse("score == '85'").unwrap().evaluate(&state));
        assert!(parse("tier > 'bronze'").unwrap().evaluate(&state));
        assert!(parse("raw >= 90").unwrap().evaluate(&state));
        assert!(parse("tags contains 'vip'").unwrap().evaluate(&state));
        assert!(parse("tier startsWith go").unwrap().evaluate(&state));
        assert!(!parse("score startsWith 8").unwrap().evaluate(&state));
    }
}
