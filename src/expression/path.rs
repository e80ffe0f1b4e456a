/// Dotted-path helpers over `serde_json::Value`
///
/// `resolve_path` walks `a.b.c` through nested objects (and numeric segments
/// through arrays). A missing segment yields `None`, which callers treat as
/// "absent" rather than null.

use minijinja::Environment;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Resolve a dotted path against the working state.
pub fn resolve_path<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut current = state;
    for segment in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects as needed.
///
/// Numeric segments index into arrays; an index equal to the length appends.
/// Missing keys and scalar intermediates become objects. A write whose array
/// segment is not a usable index is dropped, leaving the array intact.
pub fn set_path(state: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.trim().split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return;
    }

    let mut current = state;
    for segment in &segments {
        match slot_mut(current, segment) {
            Some(slot) => current = slot,
            None => {
                tracing::warn!("⚠️ Ignoring write to '{}': '{}' is not an index into an array", path, segment);
                return;
            }
        }
    }
    *current = value;
}

fn slot_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Array(items) => {
            let index = segment.parse::<usize>().ok()?;
            if index == items.len() {
                items.push(Value::Null);
            }
            items.get_mut(index)
        }
        other => Some(ensure_object(other).entry(segment.to_string()).or_insert(Value::Null)),
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(obj) => obj,
        _ => unreachable!("value was just replaced by an object"),
    }
}

/// Parse a guard literal.
///
/// Order: `true`/`false`, `null`, number, quoted string (quotes stripped),
/// otherwise the raw text.
pub fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }

    if raw.len() >= 2 {
        let bytes = raw.as_bytes();
        let (first, last) = (bytes[0], bytes[raw.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }

    Value::String(raw.to_string())
}

/// Resolve a script value against the state.
///
/// A string that is exactly `{{path}}` resolves to the referenced JSON value
/// (null when absent). A string with embedded `{{path}}` fragments is rendered
/// as a template against the state. Anything else is returned unchanged.
pub fn resolve_template(value: &Value, state: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    let trimmed = text.trim();
    if let Some(inner) = trimmed.strip_prefix("{{").and_then(|t| t.strip_suffix("}}")) {
        if is_plain_path(inner) {
            return resolve_path(state, inner).cloned().unwrap_or(Value::Null);
        }
    }

    if !is_template(text) {
        return value.clone();
    }

    match render(text, state) {
        Ok(rendered) => Value::String(rendered),
        Err(e) => {
            tracing::warn!("⚠️ Failed to render template '{}': {}", text, e);
            value.clone()
        }
    }
}

fn is_plain_path(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Check if a string contains template syntax.
pub fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

fn template_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(Environment::new)
}

/// Render a template string with the working state as its context.
pub fn render(template: &str, state: &Value) -> Result<String, minijinja::Error> {
    template_env().render_str(template, minijinja::Value::from_serialize(state))
}
