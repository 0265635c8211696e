//! Format auto-detection
//!
//! Sniffs the first decidable line of a stream and binds a concrete parser for the
//! rest of it.

use super::common::*;
use super::{ClaudeCliParser, ClaudeSseParser, CodexJsonlParser, LineParser};
use crate::event::AgentEvent;
use serde_json::Value;

/// Top-level `type` values emitted by `claude --output-format stream-json`.
const CLAUDE_CLI_TYPES: [&str; 10] = [
    "system",
    "assistant",
    "user",
    "result",
    "stream_event",
    "tool_progress",
    "tool_use_summary",
    "auth_status",
    "rate_limit_event",
    "prompt_suggestion",
];

/// Parser that resolves its delegate lazily from the stream itself
#[derive(Default)]
pub struct AutoDetectParser {
    delegate: Option<Box<dyn LineParser>>,
}

impl AutoDetectParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn detect(line: &str) -> Option<Box<dyn LineParser>> {
        let stripped = line.trim();
        if stripped.starts_with("event:") || stripped.starts_with("data:") {
            return Some(Box::new(ClaudeSseParser::new()));
        }
        if !stripped.starts_with('{') {
            return None;
        }

        let data = parse_object(stripped)?;
        let etype = str_field(&data, "type");

        if etype.contains('.') {
            Some(Box::new(CodexJsonlParser::new()))
        } else if CLAUDE_CLI_TYPES.contains(&etype) {
            Some(Box::new(ClaudeCliParser::new()))
        } else if looks_like_codex(&data) {
            Some(Box::new(CodexJsonlParser::new()))
        } else {
            Some(Box::new(ClaudeCliParser::new()))
        }
    }
}

fn looks_like_codex(data: &Value) -> bool {
    data.get("item").is_some() || data.get("thread_id").is_some()
}

impl LineParser for AutoDetectParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        if self.delegate.is_none() {
            if is_blank(line) {
                return None;
            }
            self.delegate = Some(Self::detect(line)?);
        }
        self.delegate.as_mut()?.parse_line(line)
    }

    fn name(&self) -> &'static str {
        "auto"
    }

    fn detected_format(&self) -> Option<&'static str> {
        self.delegate.as_ref().map(|d| d.name())
    }
}

impl std::fmt::Debug for AutoDetectParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoDetectParser")
            .field("detected", &self.detected_format())
            .finish()
    }
}
