//! Shared parser utilities
//!
//! Line cleanup, character-safe truncation, number formatting and the small JSON
//! accessors every format parser leans on.

use crate::event::{ActionType, Agent, AgentEvent};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

// ============================================================================
// Line handling
// ============================================================================

/// Strip a trailing `\n` or `\r\n` (or a lone `\r`) from a raw line.
pub fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// True for lines that carry nothing to parse.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

// ============================================================================
// Text utilities
// ============================================================================

/// Keep at most `max_chars` characters. Never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

/// Like [`truncate_chars`] but marks the cut with a trailing `...`.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

/// Format an integer with `,` thousands separators (`1234567` -> `1,234,567`).
pub fn fmt_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// JSON accessors
// ============================================================================

/// String field or `""` when missing or not a string.
pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Integer field, accepting float encodings too. Missing -> 0.
pub fn int_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        None => 0,
    }
}

/// Render a scalar JSON value the way a human would type it.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Top-level RFC 3339 `timestamp` of a payload, if present and valid.
pub fn payload_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.get("timestamp")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a line as a JSON object. Scalars and arrays count as malformed.
pub fn parse_object(line: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    value.is_object().then_some(value)
}

/// Remove ANSI escape sequences (colors, cursor movement) from terminal output.
pub fn strip_ansi(s: &str) -> String {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-Z\\-_])").ok()
    });
    match re {
        Some(re) if s.contains('\x1b') => re.replace_all(s, "").into_owned(),
        _ => s.to_string(),
    }
}

/// The ERROR event surfaced by process-facing parsers for undecodable input.
pub fn bad_json(agent: Agent, raw: &str) -> AgentEvent {
    AgentEvent::new(
        agent,
        ActionType::Error,
        format!("Bad JSON: {}", truncate_chars(raw, 80)),
    )
}
