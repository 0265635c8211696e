//! Claude interactive session log parser
//!
//! Parses the JSONL files Claude writes under `~/.claude/projects/<project>/`.
//! These files are tailed while they are being written, so undecodable lines are
//! treated as partial writes and dropped.

use super::claude_cli::{assistant_event, compact_event, tool_result_event};
use super::common::*;
use super::LineParser;
use crate::event::{ActionType, Agent, AgentEvent};
use serde_json::Value;

/// Parser for Claude interactive session logs
#[derive(Debug, Default)]
pub struct ClaudeInteractiveParser {
    session_id: String,
    slug: String,
}

impl ClaudeInteractiveParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent human-readable session name seen on this stream
    pub fn slug(&self) -> Option<&str> {
        (!self.slug.is_empty()).then_some(self.slug.as_str())
    }

    fn dispatch(&self, data: &Value) -> Option<AgentEvent> {
        match str_field(data, "type") {
            "file-history-snapshot" => None,
            "progress" => progress_event(data.get("data")?),
            "assistant" => assistant_event(data.get("message")?),
            "user" => user_event(data),
            "system" => match str_field(data, "subtype") {
                "stop_hook_summary" => Some(AgentEvent::new(
                    Agent::Claude,
                    ActionType::MessageStop,
                    "Session hook stopped",
                )),
                "compact_boundary" => {
                    let meta = data
                        .get("compactMetadata")
                        .or_else(|| data.get("compact_metadata"))
                        .unwrap_or(&Value::Null);
                    Some(compact_event(meta))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl LineParser for ClaudeInteractiveParser {
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent> {
        if is_blank(line) {
            return None;
        }
        let data = parse_object(line)?;

        let sid = match str_field(&data, "sessionId") {
            "" => str_field(&data, "session_id"),
            s => s,
        };
        if !sid.is_empty() {
            self.session_id = sid.to_string();
        }
        let slug = str_field(&data, "slug");
        if !slug.is_empty() {
            self.slug = slug.to_string();
        }

        let mut event = self
            .dispatch(&data)?
            .with_session(&self.session_id)
            .with_timestamp(payload_timestamp(&data));
        if !self.slug.is_empty() {
            event = event.with_meta("slug", self.slug.as_str());
        }
        Some(event)
    }

    fn name(&self) -> &'static str {
        "claude-interactive"
    }
}

fn user_event(data: &Value) -> Option<AgentEvent> {
    if data.get("isMeta").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let content = data.get("message")?.get("content")?;

    if let Some(prompt) = content.as_str() {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        return Some(AgentEvent::new(
            Agent::Claude,
            ActionType::UserPrompt,
            truncate_chars(prompt, 200),
        ));
    }

    tool_result_event(content).or_else(|| {
        let text = content
            .as_array()?
            .iter()
            .filter(|b| str_field(b, "type") == "text")
            .map(|b| str_field(b, "text").trim())
            .find(|t| !t.is_empty())?;
        Some(AgentEvent::new(
            Agent::Claude,
            ActionType::UserPrompt,
            truncate_chars(text, 200),
        ))
    })
}

fn progress_event(data: &Value) -> Option<AgentEvent> {
    match str_field(data, "type") {
        "bash_progress" => {
            let elapsed = data
                .get("elapsedTimeSeconds")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            if elapsed < 3.0 {
                return None;
            }
            let output = strip_ansi(str_field(data, "output"));
            let snippet = output
                .lines()
                .map(str::trim)
                .rev()
                .find(|l| !l.is_empty())
                .map(|l| truncate_chars(l, 120))
                .unwrap_or_else(|| format!("running ({:.0}s)", elapsed));
            Some(AgentEvent::new(
                Agent::Claude,
                ActionType::ToolUse,
                format!("Bash {}", snippet),
            ))
        }
        "agent_progress" => {
            let prompt = str_field(data, "prompt").trim();
            if prompt.is_empty() {
                return None;
            }
            Some(AgentEvent::new(
                Agent::Claude,
                ActionType::TaskUpdate,
                format!("Subagent: {}", truncate_chars(prompt, 120)),
            ))
        }
        // hook_progress and anything newer
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(p: &mut ClaudeInteractiveParser, value: Value) -> Option<AgentEvent> {
        p.parse_line(&value.to_string())
    }

    #[test]
    fn test_assistant_text_with_camelcase_session() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "sessionId": "fa32-abcd",
                   "message": {"content": [{"type": "text", "text": "Hello world"}]}}),
        )
        .unwrap();
        assert_eq!(ev.agent, Agent::Claude);
        assert_eq!(ev.action, ActionType::TextDelta);
        assert_eq!(ev.session_id, "fa32-abcd");

        let ev = parse(&mut p, json!({"type": "user", "message": {"content": "follow up"}})).unwrap();
        assert_eq!(ev.session_id, "fa32-abcd");
    }

    #[test]
    fn test_tool_use() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [
                {"type": "tool_use", "name": "Read", "input": {"file_path": "/tmp/foo.py"}}
            ]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolUse);
        assert!(ev.content.contains("/tmp/foo.py"));
    }

    #[test]
    fn test_user_prompt_forms() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": "Fix the login bug"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::UserPrompt);
        assert_eq!(ev.content, "Fix the login bug");

        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": [{"type": "text", "text": "and the signup one"}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::UserPrompt);

        assert!(parse(
            &mut p,
            json!({"type": "user", "isMeta": true, "message": {"content": "<command-name>/clear</command-name>"}}),
        )
        .is_none());
    }

    #[test]
    fn test_user_tool_results() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": [{"type": "tool_result", "content": "file contents here"}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolResult);

        let ev = parse(
            &mut p,
            json!({"type": "user", "message": {"content": [{"type": "tool_result", "content": "File not found", "is_error": true}]}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::Error);
    }

    #[test]
    fn test_progress() {
        let mut p = ClaudeInteractiveParser::new();
        assert!(parse(&mut p, json!({"type": "progress", "data": {"type": "hook_progress"}})).is_none());
        assert!(parse(
            &mut p,
            json!({"type": "progress", "data": {"type": "bash_progress", "elapsedTimeSeconds": 1}}),
        )
        .is_none());

        let ev = parse(
            &mut p,
            json!({"type": "progress", "data": {"type": "bash_progress", "elapsedTimeSeconds": 5, "output": "compiling\nbuilding...\n"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::ToolUse);
        assert_eq!(ev.content, "Bash building...");

        let ev = parse(
            &mut p,
            json!({"type": "progress", "data": {"type": "bash_progress", "elapsedTimeSeconds": 12}}),
        )
        .unwrap();
        assert_eq!(ev.content, "Bash running (12s)");

        let ev = parse(
            &mut p,
            json!({"type": "progress", "data": {"type": "agent_progress", "prompt": "Research auth patterns"}}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::TaskUpdate);
        assert_eq!(ev.content, "Subagent: Research auth patterns");
    }

    #[test]
    fn test_dropped_records() {
        let mut p = ClaudeInteractiveParser::new();
        assert!(parse(
            &mut p,
            json!({"type": "file-history-snapshot", "messageId": "abc", "snapshot": {}}),
        )
        .is_none());
        assert!(parse(&mut p, json!({"type": "summary", "summary": "Login fix"})).is_none());
        assert!(p.parse_line("{broken json").is_none());
        assert!(p.parse_line("").is_none());
    }

    #[test]
    fn test_system_records() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "stop_hook_summary", "sessionId": "s1"}),
        )
        .unwrap();
        assert_eq!(ev.action, ActionType::MessageStop);
        assert_eq!(ev.content, "Session hook stopped");

        let ev = parse(
            &mut p,
            json!({"type": "system", "subtype": "compact_boundary", "compactMetadata": {"trigger": "manual", "preTokens": 120000}}),
        )
        .unwrap();
        assert_eq!(ev.content, "Context compacted (manual, 120,000 tokens)");
    }

    #[test]
    fn test_slug_attached_once_seen() {
        let mut p = ClaudeInteractiveParser::new();
        let ev = parse(
            &mut p,
            json!({"type": "assistant", "message": {"content": [{"type": "text", "text": "before"}]}}),
        )
        .unwrap();
        assert!(!ev.metadata.contains_key("slug"));

        parse(
            &mut p,
            json!({"type": "assistant", "sessionId": "s1", "slug": "sparkling-crafting-hummingbird",
                   "message": {"content": [{"type": "text", "text": "hi"}]}}),
        );
        let ev = parse(&mut p, json!({"type": "user", "message": {"content": "next"}})).unwrap();
        assert_eq!(ev.metadata["slug"], "sparkling-crafting-hummingbird");
        assert_eq!(p.slug(), Some("sparkling-crafting-hummingbird"));
    }
}
