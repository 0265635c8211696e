//! Codex interactive rollout parser
//!
//! Parses `~/.codex/sessions/**/rollout-*.jsonl`. Each record wraps its real payload
//! in `payload`, keyed by an outer `type` (`session_meta`, `event_msg`,
//! `response_item`, `turn_context`).

use super::common::*;
use super::LineParser;
use crate::event::{ActionType, Agent, AgentEvent};
use serde_json::Value;

/// Parser for Codex rollout logs
#[derive(Debug, Default)]
pub struct CodexInteractiveParser {
    session_id: String,
    model: String,
    cwd_project: String,
}

impl CodexInteractiveParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model announced by the latest `turn_context`
    pub fn model(&self) -> Option<&str> {
        (!self.model.is_empty()).then_some(self.model.as_str())
    }

    /// Last path segment of the session's working directory
    pub fn cwd_project(&self) -> Option<&str> {
        (!self.cwd_project.is_empty()).then_some(self.cwd_project.as_str())
    }

    fn session_meta(&mut self, payload: &Value) -> Option<AgentEvent> {
        let id = str_field(payload, "id");
        if !id.is_empty() {
            self.session_id = id.to_string();
        }
        let cwd = str_field(payload, "cwd");
        if let Some(project) = last_path_segment(cwd) {
            self.cwd_project = project.to_string();
        }

        let provider = match str_field(payload, "model_provider") {
            "" => "codex",
            p => p,
        };
        let mut parts = vec![provider.to_string()];
        let version = str_field(payload, "cli_version");
        if !version.is_empty() {
            parts.push(format!("v{}", version));
        }
        if !cwd.is_empty() {
            parts.push(cwd.to_string());
        }

        let mut event = AgentEvent::new(Agent::Codex, ActionType::Init, parts.join(" | "));
        if !cwd.is_empty() {
            event = event.with_meta("cwd", cwd);
        }
        Some(event)
    }
}

impl LineParser for CodexInteractiveParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        if is_blank(line) {
            return None;
        }
        let data = parse_object(line)?;
        let payload = data.get("payload").unwrap_or(&Value::Null);

        let event = match str_field(&data, "type") {
            "session_meta" => self.session_meta(payload),
            "turn_context" => {
                let model = str_field(payload, "model");
                if !model.is_empty() {
                    self.model = model.to_string();
                }
                None
            }
            "event_msg" => event_msg(payload),
            "response_item" => response_item(payload),
            _ => None,
        }?;

        let mut event = event
            .with_session(&self.session_id)
            .with_timestamp(payload_timestamp(&data));
        if !self.cwd_project.is_empty() {
            event = event.with_meta("cwd_project", self.cwd_project.as_str());
        }
        Some(event)
    }

    fn name(&self) -> &'static str {
        "codex-interactive"
    }
}

fn event_msg(payload: &Value) -> Option<AgentEvent> {
    let text_event = |action: ActionType, key: &str, limit: usize| {
        let text = str_field(payload, key).trim();
        (!text.is_empty())
            .then(|| AgentEvent::new(Agent::Codex, action, truncate_chars(text, limit)))
    };

    match str_field(payload, "type") {
        "task_started" => Some(AgentEvent::new(
            Agent::Codex,
            ActionType::TurnStart,
            "New turn",
        )),
        "user_message" => text_event(ActionType::UserPrompt, "message", 200),
        "agent_reasoning" => text_event(ActionType::Reasoning, "text", 200),
        "agent_message" => text_event(ActionType::AgentMessage, "message", 400),
        "task_complete" => {
            let last = str_field(payload, "last_agent_message").trim();
            let content = if last.is_empty() {
                "Done".to_string()
            } else {
                truncate_chars(last, 200)
            };
            Some(AgentEvent::new(Agent::Codex, ActionType::TurnComplete, content))
        }
        // token_count and other telemetry
        _ => None,
    }
}

fn response_item(payload: &Value) -> Option<AgentEvent> {
    match str_field(payload, "type") {
        "function_call" => {
            let name = str_field(payload, "name");
            let command = extract_command(payload.get("arguments").unwrap_or(&Value::Null));
            let display = format!("{} {}", name, command);
            Some(
                AgentEvent::new(
                    Agent::Codex,
                    ActionType::Command,
                    truncate_chars(display.trim(), 200),
                )
                .with_meta("tool", name),
            )
        }
        "function_call_output" => {
            let output = tool_output(payload.get("output").unwrap_or(&Value::Null));
            match output.exit_code {
                Some(code) if code != 0 => {
                    let content = if output.text.is_empty() {
                        format!("exit {}", code)
                    } else {
                        truncate_chars(&output.text, 200)
                    };
                    Some(
                        AgentEvent::new(Agent::Codex, ActionType::Error, content)
                            .with_meta("exit_code", code),
                    )
                }
                _ if output.text.trim().is_empty() => None,
                _ => Some(AgentEvent::new(
                    Agent::Codex,
                    ActionType::ToolResult,
                    truncate_chars(&output.text, 200),
                )),
            }
        }
        "custom_tool_call" => {
            let name = match str_field(payload, "name") {
                "" => "tool",
                n => n,
            };
            Some(AgentEvent::new(Agent::Codex, ActionType::ToolUse, name).with_meta("tool", name))
        }
        "custom_tool_call_output" => {
            let output = tool_output(payload.get("output").unwrap_or(&Value::Null));
            let text = output.text.trim();
            (!text.is_empty()).then(|| {
                AgentEvent::new(Agent::Codex, ActionType::ToolResult, truncate_chars(text, 200))
            })
        }
        "reasoning" => {
            let text = reasoning_summary(payload.get("summary").unwrap_or(&Value::Null));
            let text = text.trim();
            (!text.is_empty()).then(|| {
                AgentEvent::new(Agent::Codex, ActionType::Reasoning, truncate_chars(text, 200))
            })
        }
        // message items carry developer/system prompts
        _ => None,
    }
}

/// Command line from `function_call.arguments`: `cmd`, then `command`, else raw.
fn extract_command(arguments: &Value) -> String {
    let decoded = match arguments {
        Value::String(s) => serde_json::from_str::<Value>(s).ok(),
        Value::Object(_) => Some(arguments.clone()),
        _ => None,
    };

    if let Some(args) = decoded.as_ref().filter(|v| v.is_object()) {
        for key in ["cmd", "command"] {
            match args.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Array(argv)) if !argv.is_empty() => {
                    return argv.iter().map(value_text).collect::<Vec<_>>().join(" ")
                }
                _ => {}
            }
        }
    }

    value_text(arguments)
}

fn reasoning_summary(summary: &Value) -> String {
    match summary {
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        other => value_text(other),
    }
}

fn last_path_segment(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\']).find(|s| !s.is_empty())
}

// ============================================================================
// function_call_output wrapper
// ============================================================================

/// Header lines Codex prepends to exec output before the `Output:` marker.
const WRAPPER_HEADERS: [&str; 4] = [
    "Chunk ID:",
    "Wall time:",
    "Process exited with code",
    "Original token count:",
];
const OUTPUT_MARKER: &str = "Output:";
const EXIT_PREFIX: &str = "Process exited with code";

/// Tool output with any exec wrapper removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub exit_code: Option<i64>,
}

/// Normalize a `function_call_output.output` value.
///
/// Accepts the structured form `{output, metadata: {exit_code}}` (also when
/// JSON-encoded into a string) and the plain-text form, which may be wrapped in
/// `Chunk ID:` / `Wall time:` / `Process exited with code N` /
/// `Original token count:` headers followed by `Output:` and the real body.
pub fn tool_output(output: &Value) -> ToolOutput {
    let structured = match output {
        Value::Object(_) => Some(output.clone()),
        Value::String(s) if s.trim_start().starts_with('{') => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| v.get("output").is_some()),
        _ => None,
    };

    if let Some(obj) = structured {
        let exit_code = obj
            .get("metadata")
            .and_then(|m| m.get("exit_code"))
            .and_then(Value::as_i64);
        let inner = strip_exec_wrapper(&value_text(obj.get("output").unwrap_or(&Value::Null)));
        return ToolOutput {
            text: inner.text,
            exit_code: exit_code.or(inner.exit_code),
        };
    }

    strip_exec_wrapper(&value_text(output))
}

/// Remove the exec metadata header block, if the text starts with one.
pub fn strip_exec_wrapper(raw: &str) -> ToolOutput {
    let first = raw.lines().next().unwrap_or("");
    let is_header = |line: &str| {
        WRAPPER_HEADERS.iter().any(|h| line.starts_with(h)) || line.starts_with(OUTPUT_MARKER)
    };
    if !is_header(first) {
        return ToolOutput {
            text: raw.to_string(),
            exit_code: None,
        };
    }

    let mut exit_code = None;
    let mut body = Vec::new();
    let mut in_body = false;
    for line in raw.lines() {
        if in_body {
            body.push(line);
        } else if let Some(rest) = line.strip_prefix(OUTPUT_MARKER) {
            in_body = true;
            if !rest.trim().is_empty() {
                body.push(rest.trim_start());
            }
        } else if let Some(code) = line.strip_prefix(EXIT_PREFIX) {
            exit_code = code.trim().parse().ok();
        } else if !is_header(line) {
            body.push(line);
        }
    }

    ToolOutput {
        text: strip_ansi(body.join("\n").trim()),
        exit_code,
    }
}
