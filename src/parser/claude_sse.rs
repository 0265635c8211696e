//! Claude Messages API server-sent events parser
//!
//! Frames look like `event: <type>` / `data: <json>` terminated by an empty line.
//! Lines are buffered until the terminator arrives, then the accumulated data is
//! decoded as one payload.

use super::common::*;
use super::LineParser;
use crate::event::{ActionType, Agent, AgentEvent};
use serde_json::Value;

/// Parser for raw Claude SSE streams
#[derive(Debug, Default)]
pub struct ClaudeSseParser {
    event_type: Option<String>,
    data_lines: Vec<String>,
    session_id: String,
}

impl ClaudeSseParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) -> Option<AgentEvent> {
        let data = self.data_lines.join("\n");
        let event_type = self.event_type.take();
        self.data_lines.clear();

        let payload: Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(_) => return Some(bad_json(Agent::Claude, &data).with_session(&self.session_id)),
        };

        let etype = payload
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(event_type)
            .unwrap_or_else(|| "unknown".to_string());

        let event = self.process(&etype, &payload)?;
        Some(
            event
                .with_session(&self.session_id)
                .with_timestamp(payload_timestamp(&payload)),
        )
    }

    fn process(&mut self, etype: &str, payload: &Value) -> Option<AgentEvent> {
        match etype {
            "message_start" => {
                let message = payload.get("message").unwrap_or(&Value::Null);
                let id = str_field(message, "id");
                if !id.is_empty() {
                    self.session_id = id.to_string();
                }
                let model = match str_field(message, "model") {
                    "" => "unknown",
                    m => m,
                };
                Some(
                    AgentEvent::new(Agent::Claude, ActionType::MessageStart, model)
                        .with_meta("model", model),
                )
            }
            "content_block_start" => block_start_event(payload),
            "content_block_delta" => block_delta_event(payload),
            "content_block_stop" => None,
            "message_delta" => message_delta_event(payload),
            "message_stop" => Some(AgentEvent::new(
                Agent::Claude,
                ActionType::MessageStop,
                "Complete",
            )),
            "ping" => None,
            "error" => {
                let message = payload
                    .get("error")
                    .map(|e| str_field(e, "message"))
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Unknown error");
                Some(AgentEvent::new(Agent::Claude, ActionType::Error, message))
            }
            _ => None,
        }
    }
}

impl LineParser for ClaudeSseParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        let line = strip_eol(line);

        if let Some(rest) = line.strip_prefix("event:") {
            self.event_type = Some(rest.trim().to_string());
            None
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.data_lines
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            None
        } else if line.is_empty() {
            if self.data_lines.is_empty() {
                self.event_type = None;
                return None;
            }
            self.flush()
        } else {
            // Comments (`: keep-alive`), `id:`/`retry:` fields and whitespace-only lines
            None
        }
    }

    fn name(&self) -> &'static str {
        "claude-sse"
    }
}

// ============================================================================
// Stream payload helpers (shared with the CLI `stream_event` wrapper)
// ============================================================================

/// `content_block_start`: announce thinking and tool calls, nothing else.
pub(crate) fn block_start_event(payload: &Value) -> Option<AgentEvent> {
    let block = payload.get("content_block")?;
    match str_field(block, "type") {
        "thinking" => Some(AgentEvent::new(
            Agent::Claude,
            ActionType::Thinking,
            "Thinking...",
        )),
        "tool_use" => {
            let name = match str_field(block, "name") {
                "" => "tool",
                n => n,
            };
            Some(
                AgentEvent::new(Agent::Claude, ActionType::ToolUse, format!("Calling {}", name))
                    .with_meta("tool", name),
            )
        }
        _ => None,
    }
}

/// `content_block_delta`: deltas pass through verbatim.
pub(crate) fn block_delta_event(payload: &Value) -> Option<AgentEvent> {
    let delta = payload.get("delta")?;
    match str_field(delta, "type") {
        "text_delta" => Some(AgentEvent::new(
            Agent::Claude,
            ActionType::TextDelta,
            str_field(delta, "text"),
        )),
        "thinking_delta" => Some(AgentEvent::new(
            Agent::Claude,
            ActionType::Thinking,
            str_field(delta, "thinking"),
        )),
        "input_json_delta" => Some(AgentEvent::new(
            Agent::Claude,
            ActionType::ToolUse,
            str_field(delta, "partial_json"),
        )),
        _ => None,
    }
}

/// `message_delta`: stop reason and output tokens, when either is known.
pub(crate) fn message_delta_event(payload: &Value) -> Option<AgentEvent> {
    let stop_reason = payload
        .get("delta")
        .map(|d| str_field(d, "stop_reason"))
        .unwrap_or("");
    let tokens = payload
        .get("usage")
        .map(|u| int_field(u, "output_tokens"))
        .unwrap_or(0);

    let mut parts = Vec::new();
    if !stop_reason.is_empty() {
        parts.push(stop_reason.to_string());
    }
    if tokens > 0 {
        parts.push(format!("{} tokens", tokens));
    }
    if parts.is_empty() {
        return None;
    }

    let mut event = AgentEvent::new(Agent::Claude, ActionType::MessageStop, parts.join(" | "));
    if tokens > 0 {
        event = event.with_meta("output_tokens", tokens);
    }
    Some(event)
}
