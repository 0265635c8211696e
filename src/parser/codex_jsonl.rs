//! Codex `exec --json` parser
//!
//! Every line is a complete object whose dotted `type` names a thread, turn or item
//! lifecycle step.

use super::common::*;
use super::LineParser;
use crate::event::{ActionType, Agent, AgentEvent};
use serde_json::Value;

/// Parser for Codex JSONL output
#[derive(Debug, Default)]
pub struct CodexJsonlParser {
    thread_id: String,
}

impl CodexJsonlParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn dispatch(&mut self, data: &Value) -> Option<AgentEvent> {
        let etype = str_field(data, "type");
        match etype {
            "thread.started" => {
                let tid = str_field(data, "thread_id");
                let short = if tid.is_empty() {
                    "?".to_string()
                } else {
                    truncate_chars(tid, 8)
                };
                if !tid.is_empty() {
                    self.thread_id = tid.to_string();
                }
                Some(AgentEvent::new(
                    Agent::Codex,
                    ActionType::ThreadStart,
                    format!("Thread {}", short),
                ))
            }
            "turn.started" => Some(AgentEvent::new(
                Agent::Codex,
                ActionType::TurnStart,
                "New turn",
            )),
            "turn.completed" => {
                let usage = data.get("usage").cloned().unwrap_or(Value::Null);
                let input = int_field(&usage, "input_tokens");
                let cached = int_field(&usage, "cached_input_tokens");
                let output = int_field(&usage, "output_tokens");

                let mut parts = vec![format!("{} in", fmt_thousands(input))];
                if cached > 0 {
                    parts.push(format!("{} cached", fmt_thousands(cached)));
                }
                parts.push(format!("{} out", fmt_thousands(output)));

                Some(
                    AgentEvent::new(Agent::Codex, ActionType::TurnComplete, parts.join(" / "))
                        .with_meta("usage", usage),
                )
            }
            "turn.failed" => {
                let message = data
                    .get("error")
                    .map(|e| str_field(e, "message"))
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Unknown failure");
                Some(AgentEvent::new(
                    Agent::Codex,
                    ActionType::TurnFailed,
                    truncate_chars(message, 200),
                ))
            }
            "item.started" | "item.updated" | "item.completed" => {
                let item = data.get("item")?;
                item_event(
                    item,
                    etype == "item.started",
                    etype == "item.completed",
                )
            }
            "error" => {
                let message = match str_field(data, "message") {
                    "" => data
                        .get("error")
                        .map(|e| str_field(e, "message"))
                        .unwrap_or(""),
                    m => m,
                };
                if message.contains("Reconnecting") {
                    return None;
                }
                let message = if message.is_empty() {
                    "Unknown error"
                } else {
                    message
                };
                Some(AgentEvent::new(
                    Agent::Codex,
                    ActionType::Error,
                    truncate_chars(message, 200),
                ))
            }
            "" => Some(AgentEvent::new(Agent::Codex, ActionType::Unknown, "unknown")),
            other => Some(AgentEvent::new(Agent::Codex, ActionType::Unknown, other)),
        }
    }
}

impl LineParser for CodexJsonlParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        if is_blank(line) {
            return None;
        }
        let raw = line.trim();
        let data = match parse_object(raw) {
            Some(v) => v,
            None => return Some(bad_json(Agent::Codex, raw).with_session(&self.thread_id)),
        };

        let event = self.dispatch(&data)?;
        Some(
            event
                .with_session(&self.thread_id)
                .with_timestamp(payload_timestamp(&data)),
        )
    }

    fn name(&self) -> &'static str {
        "codex"
    }
}

fn item_event(item: &Value, is_start: bool, is_complete: bool) -> Option<AgentEvent> {
    let item_type = match str_field(item, "type") {
        "assistant_message" => "agent_message",
        t => t,
    };

    match item_type {
        "agent_message" => {
            let text = str_field(item, "text");
            if text.trim().is_empty() {
                return None;
            }
            Some(AgentEvent::new(
                Agent::Codex,
                ActionType::AgentMessage,
                truncate_str(text, 400),
            ))
        }
        "command_execution" => command_event(item, is_start, is_complete),
        "file_change" => {
            let changes = item.get("changes").and_then(Value::as_array)?;
            if changes.is_empty() {
                return None;
            }
            let mut summary = changes
                .iter()
                .take(4)
                .map(|change| {
                    let marker = match str_field(change, "kind") {
                        "add" => "+",
                        "delete" => "-",
                        "update" => "~",
                        _ => "",
                    };
                    let path = match str_field(change, "path") {
                        "" => "?",
                        p => p,
                    };
                    format!("{}{}", marker, path)
                })
                .collect::<Vec<_>>()
                .join(", ");
            if changes.len() > 4 {
                summary.push_str(&format!(" +{} more", changes.len() - 4));
            }
            Some(
                AgentEvent::new(Agent::Codex, ActionType::FileChange, summary)
                    .with_meta("files", changes.len()),
            )
        }
        "reasoning" => {
            let text = match str_field(item, "text") {
                "" => summary_text(item.get("summary").unwrap_or(&Value::Null)),
                t => t.to_string(),
            };
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(AgentEvent::new(
                Agent::Codex,
                ActionType::Reasoning,
                truncate_chars(text, 200),
            ))
        }
        "mcp_tool_call" => {
            let server = match str_field(item, "server") {
                "" => "?",
                s => s,
            };
            let tool = match str_field(item, "tool") {
                "" => "?",
                t => t,
            };
            Some(AgentEvent::new(
                Agent::Codex,
                ActionType::McpTool,
                format!("{}/{} ({})", server, tool, str_field(item, "status")),
            ))
        }
        "web_search" => Some(AgentEvent::new(
            Agent::Codex,
            ActionType::WebSearch,
            truncate_chars(str_field(item, "query"), 200),
        )),
        "error" => {
            let message = [str_field(item, "text"), str_field(item, "message")]
                .into_iter()
                .find(|m| !m.is_empty())
                .unwrap_or("Unknown error");
            Some(AgentEvent::new(
                Agent::Codex,
                ActionType::Error,
                truncate_chars(message, 200),
            ))
        }
        _ => None,
    }
}

fn command_event(item: &Value, is_start: bool, is_complete: bool) -> Option<AgentEvent> {
    let command = match item.get("command") {
        Some(Value::Array(argv)) => argv.iter().map(value_text).collect::<Vec<_>>().join(" "),
        Some(v) => value_text(v),
        None => String::new(),
    };

    if is_start {
        if command.is_empty() {
            return None;
        }
        return Some(AgentEvent::new(
            Agent::Codex,
            ActionType::Command,
            truncate_chars(&command, 200),
        ));
    }
    if !is_complete {
        return None;
    }

    let exit_code = item.get("exit_code").and_then(Value::as_i64);
    let output = str_field(item, "aggregated_output");

    match exit_code {
        Some(code) if code != 0 => {
            let content = format!("exit {}: {} {}", code, command, truncate_chars(output, 120));
            Some(
                AgentEvent::new(Agent::Codex, ActionType::Error, content.trim())
                    .with_meta("exit_code", code),
            )
        }
        _ if !output.trim().is_empty() => Some(AgentEvent::new(
            Agent::Codex,
            ActionType::Command,
            format!("{} -> {}", command, truncate_chars(output.trim(), 150)),
        )),
        _ => None,
    }
}

/// Reasoning summaries arrive as a string, a list of strings, or a list of
/// `{type: "summary_text", text}` parts.
fn summary_text(summary: &Value) -> String {
    match summary {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => str_field(other, "text").to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(p: &mut CodexJsonlParser, value: Value) -> Option<AgentEvent> {
        p.parse_line(&value.to_string())
    }

    #[test]
    fn test_thread_started_sets_session() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "thread.started", "thread_id": "abcdef1234567890"}),
        )
        .unwrap();
        assert_eq!(ev.agent, Agent::Codex);
        assert_eq!(ev.action, ActionType::ThreadStart);
        assert_eq!(ev.content, "Thread abcdef12");
        assert_eq!(ev.session_id, "abcdef1234567890");

        let ev = parse(&mut p, json!({"type": "turn.started"})).unwrap();
        assert_eq!(ev.action, ActionType::TurnStart);
        assert_eq!(ev.session_id, "abcdef1234567890");
    }

    #[test]
    fn test_turn_completed() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "turn.completed", "usage": {"input_tokens": 1000, "output_tokens": 200}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TurnComplete);
        assert_eq!(ev.content, "1,000 in / 200 out");
        assert_eq!(ev.metadata["usage"]["input_tokens"], 1000);

        let ev = parse(
            &mut p,
            json!({"type": "turn.completed", "usage": {"input_tokens": 24763, "cached_input_tokens": 24448, "output_tokens": 122}}),
        )
        .unwrap();
        assert_eq!(ev.content, "24,763 in / 24,448 cached / 122 out");
    }

    #[test]
    fn test_turn_failed() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "turn.failed", "error": {"message": "Something broke"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TurnFailed);
        assert_eq!(ev.content, "Something broke");

        let ev = parse(&mut p, json!({"type": "turn.failed"})).unwrap();
        assert_eq!(ev.content, "Unknown failure");
    }

    #[test]
    fn test_agent_message() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "assistant_message", "text": "Done"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::AgentMessage);
        assert_eq!(ev.content, "Done");

        let long = "w".repeat(450);
        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "agent_message", "text": long}}),
        )
        .unwrap();
        assert_eq!(ev.content.chars().count(), 403);
        assert!(ev.content.ends_with("..."));
    }

    #[test]
    fn test_command_execution_lifecycle() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "item.started", "item": {"type": "command_execution", "command": "npm test"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Command);
        assert_eq!(ev.content, "npm test");

        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {
                "type": "command_execution", "command": "npm build",
                "exit_code": 1, "aggregated_output": "Error: module not found"
            }}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "exit 1: npm build Error: module not found");

        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {
                "type": "command_execution", "command": "ls",
                "exit_code": 0, "aggregated_output": "  Cargo.toml\nsrc\n"
            }}),
        )
        .unwrap();
        assert_eq!(ev.content, "ls -> Cargo.toml\nsrc");

        assert!(parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "command_execution", "command": "true", "exit_code": 0, "aggregated_output": ""}}),
        )
        .is_none());
        assert!(parse(
            &mut p,
            json!({"type": "item.updated", "item": {"type": "command_execution", "command": "sleep 5"}}),
        )
        .is_none());
    }

    #[test]
    fn test_file_change() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "file_change", "changes": [
                {"path": "src/app.py", "kind": "update"},
                {"path": "src/new.py", "kind": "add"},
                {"path": "old.py", "kind": "delete"},
                {"path": "x.py", "kind": "rename"},
                {"path": "y.py", "kind": "add"},
                {"path": "z.py", "kind": "add"}
            ]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::FileChange);
        assert_eq!(ev.content, "~src/app.py, +src/new.py, -old.py, x.py +2 more");

        assert!(parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "file_change", "changes": []}}),
        )
        .is_none());
    }

    #[test]
    fn test_reasoning() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "reasoning", "text": "Analyzing codebase"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Reasoning);

        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "reasoning", "summary": [{"type": "summary_text", "text": "Planning"}]}}),
        )
        .unwrap();
        assert_eq!(ev.content, "Planning");

        assert!(parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "reasoning", "text": ""}}),
        )
        .is_none());
    }

    #[test]
    fn test_mcp_search_and_item_error() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "mcp_tool_call", "server": "docs", "tool": "search", "status": "completed"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::McpTool);
        assert_eq!(ev.content, "docs/search (completed)");

        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "web_search", "query": "tokio select"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::WebSearch);
        assert_eq!(ev.content, "tokio select");

        let ev = parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "error", "message": "sandbox denied"}}),
        )
        .unwrap();
        assert_eq!(ev.content, "sandbox denied");

        assert!(parse(
            &mut p,
            json!({"type": "item.completed", "item": {"type": "todo_list", "items": []}}),
        )
        .is_none());
    }

    #[test]
    fn test_error_and_reconnecting() {
        let mut p = CodexJsonlParser::new();
        assert!(parse(&mut p, json!({"type": "error", "message": "Reconnecting... 1/5"})).is_none());
        let ev = parse(&mut p, json!({"type": "error", "message": "API error"})).unwrap();
        assert_eq!(ev.action, ActionType::Error);
        assert_eq!(ev.content, "API error");
    }

    #[test]
    fn test_unknown_type_surfaced() {
        let mut p = CodexJsonlParser::new();
        let ev = parse(&mut p, json!({"type": "session.renamed"})).unwrap();
        assert_eq!(ev.action, ActionType::Unknown);
        assert_eq!(ev.content, "session.renamed");
    }

    #[test]
    fn test_bad_json() {
        let mut p = CodexJsonlParser::new();
        let ev = p.parse_line("not json at all").unwrap();
        assert_eq!(ev.agent, Agent::Codex);
        assert_eq!(ev.action, ActionType::Error);
        assert!(ev.content.starts_with("Bad JSON: "));
    }
}
