//! Claude CLI stream-json parser
//!
//! Parses the one-object-per-line output of `claude -p --output-format stream-json`.
//! The content-block helpers at the bottom are shared with the interactive log parser.

use super::claude_sse::{block_delta_event, block_start_event, message_delta_event};
use super::common::*;
use super::LineParser;
use crate::event::{ActionType, Agent, AgentEvent};
use serde_json::Value;

/// Parser for Claude CLI JSONL output
#[derive(Debug, Default)]
pub struct ClaudeCliParser {
    session_id: String,
}

impl ClaudeCliParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn dispatch(&self, data: &Value) -> Option<AgentEvent> {
        match str_field(data, "type") {
            "system" => system_event(data),
            "assistant" => assistant_event(data.get("message")?),
            "user" => tool_result_event(data.get("message")?.get("content")?),
            "stream_event" => stream_event(data.get("event")?),
            "result" => result_event(data),
            "tool_progress" => {
                let elapsed = data
                    .get("elapsed_time_seconds")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                if elapsed <= 2.0 {
                    return None;
                }
                let tool = match str_field(data, "tool_name") {
                    "" => "Tool",
                    t => t,
                };
                Some(AgentEvent::new(
                    Agent::Claude,
                    ActionType::ToolUse,
                    format!("{} running ({:.0}s)", tool, elapsed),
                ))
            }
            "tool_use_summary" => {
                let summary = str_field(data, "summary").trim();
                if summary.is_empty() {
                    return None;
                }
                Some(AgentEvent::new(
                    Agent::Claude,
                    ActionType::ToolResult,
                    truncate_chars(summary, 200),
                ))
            }
            "rate_limit_event" => {
                let status = data
                    .get("rate_limit_info")
                    .map(|info| str_field(info, "status"))
                    .unwrap_or("");
                (status == "rejected")
                    .then(|| AgentEvent::new(Agent::Claude, ActionType::Error, "Rate limited"))
            }
            "auth_status" => {
                let error = value_text(data.get("error")?);
                if error.is_empty() {
                    return None;
                }
                Some(AgentEvent::new(
                    Agent::Claude,
                    ActionType::Error,
                    format!("Auth: {}", truncate_chars(&error, 200)),
                ))
            }
            _ => None,
        }
    }
}

impl LineParser for ClaudeCliParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        if is_blank(line) {
            return None;
        }
        let raw = line.trim();
        let data = match parse_object(raw) {
            Some(v) => v,
            None => return Some(bad_json(Agent::Claude, raw).with_session(&self.session_id)),
        };

        let sid = str_field(&data, "session_id");
        if !sid.is_empty() {
            self.session_id = sid.to_string();
        }

        let event = self.dispatch(&data)?;
        Some(
            event
                .with_session(&self.session_id)
                .with_timestamp(payload_timestamp(&data)),
        )
    }

    fn name(&self) -> &'static str {
        "claude-cli"
    }
}

fn system_event(data: &Value) -> Option<AgentEvent> {
    match str_field(data, "subtype") {
        "init" => {
            let mut parts = Vec::new();
            let model = str_field(data, "model");
            if !model.is_empty() {
                parts.push(model.to_string());
            }
            if let Some(tools) = data.get("tools").and_then(Value::as_array) {
                parts.push(format!("{} tools", tools.len()));
            }
            let version = str_field(data, "claude_code_version");
            if !version.is_empty() {
                parts.push(format!("v{}", version));
            }
            let content = if parts.is_empty() {
                "Initialized".to_string()
            } else {
                parts.join(" | ")
            };
            let mut event = AgentEvent::new(Agent::Claude, ActionType::Init, content);
            if !model.is_empty() {
                event = event.with_meta("model", model);
            }
            Some(event)
        }
        "compact_boundary" => {
            let meta = data.get("compact_metadata").unwrap_or(&Value::Null);
            Some(compact_event(meta))
        }
        "task_started" => {
            let description = str_field(data, "description");
            let content = if description.is_empty() {
                "Task started".to_string()
            } else {
                format!("Task started: {}", description)
            };
            Some(AgentEvent::new(
                Agent::Claude,
                ActionType::TaskUpdate,
                truncate_chars(&content, 200),
            ))
        }
        "task_notification" => {
            let status = match str_field(data, "status") {
                "" => "update",
                s => s,
            };
            let summary = str_field(data, "summary");
            let content = if summary.is_empty() {
                format!("Task {}", status)
            } else {
                format!("Task {}: {}", status, summary)
            };
            Some(AgentEvent::new(
                Agent::Claude,
                ActionType::TaskUpdate,
                truncate_chars(&content, 200),
            ))
        }
        "task_progress" => {
            let tool_uses = data
                .get("usage")
                .map(|u| int_field(u, "tool_uses"))
                .filter(|n| *n > 0)
                .unwrap_or_else(|| int_field(data, "tool_uses"));
            if tool_uses <= 0 {
                return None;
            }
            let mut content = format!("Task progress: {} tool uses", tool_uses);
            let last_tool = str_field(data, "last_tool_name");
            if !last_tool.is_empty() {
                content.push_str(&format!(" ({})", last_tool));
            }
            Some(AgentEvent::new(Agent::Claude, ActionType::TaskUpdate, content))
        }
        _ if str_field(data, "status") == "compacting" => Some(AgentEvent::new(
            Agent::Claude,
            ActionType::Compact,
            "Compacting context...",
        )),
        _ => None,
    }
}

fn stream_event(event: &Value) -> Option<AgentEvent> {
    match str_field(event, "type") {
        "message_start" => {
            let model = event
                .get("message")
                .map(|m| str_field(m, "model"))
                .unwrap_or("");
            if model.is_empty() {
                return None;
            }
            Some(AgentEvent::new(
                Agent::Claude,
                ActionType::MessageStart,
                format!("Response ({})", model),
            ))
        }
        "content_block_start" => block_start_event(event),
        "content_block_delta" => block_delta_event(event),
        "message_delta" => message_delta_event(event),
        _ => None,
    }
}

fn result_event(data: &Value) -> Option<AgentEvent> {
    let subtype = str_field(data, "subtype");

    if subtype == "success" {
        let mut parts = Vec::new();
        let turns = int_field(data, "num_turns");
        if turns > 0 {
            parts.push(format!("{} turns", turns));
        }
        let cost = data
            .get("total_cost_usd")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if cost > 0.0 {
            parts.push(format!("${:.4}", cost));
        }
        let duration_ms = int_field(data, "duration_ms");
        if duration_ms > 0 {
            parts.push(format!("{:.1}s", duration_ms as f64 / 1000.0));
        }
        if let Some(usage) = data.get("usage") {
            let input = int_field(usage, "input_tokens");
            let output = int_field(usage, "output_tokens");
            if input > 0 || output > 0 {
                parts.push(format!(
                    "{}+{} tok",
                    fmt_thousands(input),
                    fmt_thousands(output)
                ));
            }
        }

        let content = if parts.is_empty() {
            "Complete".to_string()
        } else {
            parts.join(" | ")
        };
        let mut event = AgentEvent::new(Agent::Claude, ActionType::Result, content);
        // Raw values so downstream cost sums see exactly what the CLI reported
        for key in ["total_cost_usd", "num_turns", "duration_ms", "usage"] {
            if let Some(value) = data.get(key).filter(|v| !v.is_null()) {
                event = event.with_meta(key, value.clone());
            }
        }
        return Some(event);
    }

    if subtype.starts_with("error") {
        let errors: Vec<String> = data
            .get("errors")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(value_text).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let content = if errors.is_empty() {
            subtype.to_string()
        } else {
            errors.join("; ")
        };
        return Some(AgentEvent::new(
            Agent::Claude,
            ActionType::Error,
            truncate_chars(&content, 200),
        ));
    }

    None
}

// ============================================================================
// Content blocks (shared with the interactive parser)
// ============================================================================

/// First content block of an assistant message that yields an event.
pub(crate) fn assistant_event(message: &Value) -> Option<AgentEvent> {
    let content = message.get("content")?;

    if let Some(text) = content.as_str() {
        if text.trim().is_empty() {
            return None;
        }
        return Some(AgentEvent::new(
            Agent::Claude,
            ActionType::TextDelta,
            truncate_chars(text, 400),
        ));
    }

    content.as_array()?.iter().find_map(|block| match str_field(block, "type") {
        "text" => {
            let text = str_field(block, "text");
            (!text.trim().is_empty()).then(|| {
                AgentEvent::new(Agent::Claude, ActionType::TextDelta, truncate_chars(text, 400))
            })
        }
        "tool_use" => {
            let name = str_field(block, "name");
            let input = block.get("input").unwrap_or(&Value::Null);
            Some(
                AgentEvent::new(
                    Agent::Claude,
                    ActionType::ToolUse,
                    summarize_tool_use(name, input),
                )
                .with_meta("tool", name),
            )
        }
        "thinking" => {
            let thinking = str_field(block, "thinking");
            (!thinking.trim().is_empty()).then(|| {
                AgentEvent::new(Agent::Claude, ActionType::Thinking, truncate_chars(thinking, 200))
            })
        }
        _ => None,
    })
}

/// First `tool_result` block of a user message, if any.
pub(crate) fn tool_result_event(content: &Value) -> Option<AgentEvent> {
    let block = content
        .as_array()?
        .iter()
        .find(|b| str_field(b, "type") == "tool_result")?;

    let text = tool_result_text(block.get("content").unwrap_or(&Value::Null));
    let is_error = block
        .get("is_error")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if is_error {
        return Some(AgentEvent::new(
            Agent::Claude,
            ActionType::Error,
            format!("Tool error: {}", truncate_chars(text.trim(), 150)),
        ));
    }
    if text.trim().is_empty() {
        return None;
    }
    Some(AgentEvent::new(
        Agent::Claude,
        ActionType::ToolResult,
        truncate_chars(text.trim(), 200),
    ))
}

/// Tool result content is either a plain string or a list of text blocks.
pub(crate) fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// `Context compacted (...)` from snake_case or camelCase compact metadata.
pub(crate) fn compact_event(meta: &Value) -> AgentEvent {
    let trigger = match str_field(meta, "trigger") {
        "" => "auto",
        t => t,
    };
    let pre_tokens = match int_field(meta, "pre_tokens") {
        0 => int_field(meta, "preTokens"),
        n => n,
    };
    AgentEvent::new(
        Agent::Claude,
        ActionType::Compact,
        format!(
            "Context compacted ({}, {} tokens)",
            trigger,
            fmt_thousands(pre_tokens)
        ),
    )
}

/// Human-readable one-liner for a tool call, e.g. `Read /tmp/foo.py`.
pub(crate) fn summarize_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| str_field(input, key).to_string();

    let summary = match name {
        "Read" | "Write" | "Edit" | "MultiEdit" => field("file_path"),
        "NotebookEdit" => field("notebook_path"),
        "Bash" => field("command"),
        "Grep" => {
            let pattern = field("pattern");
            let path = field("path");
            if path.is_empty() {
                pattern
            } else {
                format!("{} in {}", pattern, path)
            }
        }
        "Glob" => field("pattern"),
        "WebFetch" => field("url"),
        "WebSearch" => field("query"),
        "Task" | "Agent" => field("description"),
        "TodoWrite" => {
            let count = input
                .get("todos")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("{} todos", count)
        }
        _ => match input {
            Value::Object(map) if map.is_empty() => String::new(),
            Value::Object(map) => map
                .values()
                .find_map(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| input.to_string()),
            Value::Null => String::new(),
            other => other.to_string(),
        },
    };

    let name = if name.is_empty() { "tool" } else { name };
    let display = if summary.trim().is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, summary.split_whitespace().collect::<Vec<_>>().join(" "))
    };
    truncate_chars(&display, 200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(p: &mut ClaudeCliParser, value: Value) -> Option<AgentEvent> {
        p.parse_line(&value.to_string())
    }

    #[test]
    fn test_system_init() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({
                "type": "system", "subtype": "init",
                "model": "claude-sonnet-4-6", "tools": ["Read", "Write"],
                "claude_code_version": "2.1.0", "session_id": "sess-abc"
            }),
        )
        .unwrap();
        assert_eq!(ev.agent, Agent::Claude);
        assert_eq!(ev.action, ActionType::Init);
        assert_eq!(ev.content, "claude-sonnet-4-6 | 2 tools | v2.1.0");
        assert_eq!(ev.session_id, "sess-abc");
    }

    #[test]
    fn test_session_id_carried_forward() {
        let mut p = ClaudeCliParser::new();
        parse(
            &mut p,
            json!({"type": "system", "subtype": "init", "model": "sonnet", "session_id": "s123"}),
        );
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [{"type": "text", "text": "hi"}]}}),
        )
        .unwrap();
        assert_eq!(ev.session_id, "s123");
    }

    #[test]
    fn test_assistant_first_block_wins() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [
                {"type": "text", "text": "   "},
                {"type": "tool_use", "name": "Read", "input": {"file_path": "/tmp/foo.py"}},
                {"type": "text", "text": "after"}
            ]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolUse);
        assert_eq!(ev.content, "Read /tmp/foo.py");
    }

    #[test]
    fn test_assistant_text_truncated() {
        let mut p = ClaudeCliParser::new();
        let long = "a".repeat(1000);
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [{"type": "text", "text": long}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TextDelta);
        assert_eq!(ev.content.chars().count(), 400);
    }

    #[test]
    fn test_assistant_thinking() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [{"type": "thinking", "thinking": "Let me think"}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Thinking);
    }

    #[test]
    fn test_user_tool_result_and_error() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": [{"type": "tool_result", "content": "file contents here"}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolResult);
        assert_eq!(ev.content, "file contents here");

        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": [
                {"type": "tool_result", "content": [{"type": "text", "text": "File not found"}], "is_error": true}
            ]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "Tool error: File not found");

        assert!(parse(
            &mut p,
            json!({"type": "user", "message": {"content": [{"type": "tool_result", "content": ""}]}}),
        )
        .is_none());
    }

    #[test]
    fn test_result_success_keeps_raw_cost() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({
                "type": "result", "subtype": "success",
                "total_cost_usd": 0.0342, "num_turns": 3, "duration_ms": 14200,
                "usage": {"input_tokens": 12847, "output_tokens": 1203}
            }),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Result);
        assert_eq!(ev.content, "3 turns | $0.0342 | 14.2s | 12,847+1,203 tok");
        assert_eq!(ev.metadata["total_cost_usd"], json!(0.0342));
        assert_eq!(ev.metadata["num_turns"], json!(3));
    }

    #[test]
    fn test_result_error() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "result", "subtype": "error_max_turns", "errors": ["Hit turn limit"]}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "Hit turn limit");

        let ev = parse(&mut p, json!({"type": "result", "subtype": "error_during_execution"})).unwrap();
        assert_eq!(ev.content, "error_during_execution");
    }

    #[test]
    fn test_stream_event() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "stream_event", "event": {"type": "content_block_delta", "delta": {"type": "text_delta", "text": "streaming..."}}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TextDelta);
        assert_eq!(ev.content, "streaming...");

        let ev = parse(
            &mut p,
            json!({"type": "stream_event", "event": {"type": "message_start", "message": {"model": "claude-opus-4"}}}),
        )
        .unwrap();
        assert_eq!(ev.content, "Response (claude-opus-4)");

        assert!(parse(
            &mut p,
            json!({"type": "stream_event", "event": {"type": "message_start", "message": {}}}),
        )
        .is_none());
    }

    #[test]
    fn test_compaction() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "compact_boundary", "compact_metadata": {"trigger": "auto", "pre_tokens": 50000}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Compact);
        assert_eq!(ev.content, "Context compacted (auto, 50,000 tokens)");

        let ev = parse(&mut p, json!({"type": "system", "subtype": "status", "status": "compacting"})).unwrap();
        assert_eq!(ev.content, "Compacting context...");
        assert!(parse(&mut p, json!({"type": "system", "subtype": "status", "status": null})).is_none());
    }

    #[test]
    fn test_tasks() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "task_started", "description": "Explore auth"}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TaskUpdate);
        assert_eq!(ev.content, "Task started: Explore auth");

        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "task_notification", "status": "completed", "summary": "Found 3 files"}),
        )
        .unwrap();
        assert_eq!(ev.content, "Task completed: Found 3 files");

        assert!(parse(
            &mut p,
            json!({"type": "system", "subtype": "task_progress", "usage": {"tool_uses": 0}}),
        )
        .is_none());
        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "task_progress", "usage": {"tool_uses": 4}, "last_tool_name": "Grep"}),
        )
        .unwrap();
        assert_eq!(ev.content, "Task progress: 4 tool uses (Grep)");
    }

    #[test]
    fn test_tool_progress_threshold() {
        let mut p = ClaudeCliParser::new();
        assert!(parse(
            &mut p,
            json!({"type": "tool_progress", "tool_name": "Bash", "elapsed_time_seconds": 1.5}),
        )
        .is_none());
        let ev = parse(
            &mut p,
            json!({"type": "tool_progress", "tool_name": "Bash", "elapsed_time_seconds": 7}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolUse);
        assert_eq!(ev.content, "Bash running (7s)");
    }

    #[test]
    fn test_rate_limit_and_auth() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "rate_limit_event", "rate_limit_info": {"status": "rejected"}}),
        )
        .unwrap();
        assert_eq!(ev.content, "Rate limited");
        assert!(parse(
            &mut p,
            json!({"type": "rate_limit_event", "rate_limit_info": {"status": "allowed"}}),
        )
        .is_none());

        let ev = parse(&mut p, json!({"type": "auth_status", "error": "token expired"})).unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "Auth: token expired");
        assert!(parse(&mut p, json!({"type": "auth_status", "isAuthenticating": true})).is_none());
    }

    #[test]
    fn test_tool_use_summary() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(&mut p, json!({"type": "tool_use_summary", "summary": "Read 3 files"})).unwrap();
        assert_eq!(ev.action, ActionType::ToolResult);
        assert!(parse(&mut p, json!({"type": "tool_use_summary", "summary": ""})).is_none());
    }

    #[test]
    fn test_unknown_type_dropped() {
        let mut p = ClaudeCliParser::new();
        assert!(parse(&mut p, json!({"type": "future_new_type"})).is_none());
        assert!(parse(&mut p, json!({"type": "prompt_suggestion", "suggestion": "x"})).is_none());
    }

    #[test]
    fn test_bad_json() {
        let mut p = ClaudeCliParser::new();
        let ev = p.parse_line("{broken json\n").unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "Bad JSON: {broken json");
    }

    #[test]
    fn test_payload_timestamp_used() {
        let mut p = ClaudeCliParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "timestamp": "2025-03-01T10:00:00Z",
                   "message": {"content": [{"type": "text", "text": "hi"}]}}),
        )
        .unwrap();
        assert_eq!(ev.timestamp.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_summarize_tool_use() {
        assert_eq!(
            summarize_tool_use("Bash", &json!({"command": "cargo test\n  --all"})),
            "Bash cargo test --all"
        );
        assert_eq!(
            summarize_tool_use("Grep", &json!({"pattern": "fn main", "path": "src"})),
            "Grep fn main in src"
        );
        assert_eq!(
            summarize_tool_use("TodoWrite", &json!({"todos": [{}, {}, {}]})),
            "TodoWrite 3 todos"
        );
        assert_eq!(
            summarize_tool_use("mcp__docs__search", &json!({"limit": 5, "q": "tokio"})),
            "mcp__docs__search tokio"
        );
        assert_eq!(summarize_tool_use("ExitPlanMode", &json!({})), "ExitPlanMode");
        let long = summarize_tool_use("Bash", &json!({"command": "x".repeat(500)}));
        assert_eq!(long.chars().count(), 200);
    }
}
