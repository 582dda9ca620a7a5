//! Advisory response parsing
//!
//! Accepts a JSON array of actions, a single action object, or either of
//! those wrapped in a fenced code block.

use serde_json::Value;

use crate::types::Action;

/// Remove a surrounding ``` / ```json fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let Some((_, body)) = trimmed.split_once('\n') else {
        return "";
    };
    let body = body.trim_end();
    match body.rfind('\n') {
        Some(idx) if body[idx + 1..].trim_start().starts_with("```") => body[..idx].trim(),
        None if body.trim_start().starts_with("```") => "",
        _ => body.trim(),
    }
}

/// Parse backend text into actions. The error string describes why the
/// payload is not an action list.
pub fn parse_actions(text: &str) -> Result<Vec<Action>, String> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;

    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(format!("expected array or object, got {}", kind_of(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item).map_err(|e| format!("action {i} has wrong shape: {e}"))
        })
        .collect()
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
