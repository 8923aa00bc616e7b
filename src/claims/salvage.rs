// src/claims/salvage.rs — Recover structured JSON from untrusted oracle output
//
// Oracle text is fenced, chatty, or cut off at the token limit often enough that
// nothing downstream ever parses it directly. Everything here is total: bad input
// produces an empty result, never an error or a panic.

use serde_json::Value;

const FENCE: &str = "```";

/// Remove a surrounding markdown code fence, if any, and trim.
///
/// Drops the opening fence line (with its language tag) and everything from the
/// last remaining fence marker onward. An opening fence with no line break leaves
/// nothing behind.
pub fn strip_code_fence(text: &str) -> String {
    let mut s = text.trim();

    if s.starts_with(FENCE) {
        s = match s.find('\n') {
            Some(i) => &s[i + 1..],
            None => "",
        };
    }

    if let Some(i) = s.rfind(FENCE) {
        s = &s[..i];
    }

    s.trim().to_string()
}

/// Close a truncated array of objects just after its last complete `}`.
fn close_truncated(text: &str) -> String {
    if text.ends_with(']') || text.ends_with('}') {
        return text.to_string();
    }
    match text.rfind('}') {
        Some(i) => format!("{}]", &text[..=i]),
        None => text.to_string(),
    }
}

fn cleaned(text: &str) -> String {
    close_truncated(&strip_code_fence(text))
}

/// Best-effort recovery of a JSON array from oracle output.
///
/// Returns the parsed elements, or an empty vec when the text is not (and cannot
/// be repaired into) a JSON array.
pub fn salvage_json_array(text: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(&cleaned(text)) {
        Ok(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Like [`salvage_json_array`], but a lone JSON object is accepted as a
/// one-element array.
pub fn salvage_records(text: &str) -> Vec<Value> {
    let items = salvage_json_array(text);
    if !items.is_empty() {
        return items;
    }
    match serde_json::from_str::<Value>(&strip_code_fence(text)) {
        Ok(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}
