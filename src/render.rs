//! Console rendering of events

use crate::event::{ActionType, AgentEvent};
use chrono::Local;

/// Two-character glyph shown before the agent name
pub fn action_icon(action: ActionType) -> &'static str {
    match action {
        ActionType::TextDelta | ActionType::AgentMessage => ">>",
        ActionType::Thinking | ActionType::Reasoning => "<>",
        ActionType::ToolUse | ActionType::McpTool => "{}",
        ActionType::ToolResult => "<-",
        ActionType::Command => "$ ",
        ActionType::FileChange => "+-",
        ActionType::Error | ActionType::TurnFailed => "!!",
        ActionType::Init => "**",
        ActionType::Result => "==",
        ActionType::MessageStart | ActionType::ThreadStart => "->",
        ActionType::MessageStop => "[]",
        ActionType::StreamStart | ActionType::StreamEnd => "::",
        ActionType::TurnStart => "~~",
        ActionType::TurnComplete => "OK",
        ActionType::WebSearch => "??",
        ActionType::Compact => "><",
        ActionType::TaskUpdate => "##",
        ActionType::UserPrompt => "> ",
        ActionType::Ping => "..",
        ActionType::Unknown => "  ",
    }
}

/// One plain line: `HH:MM:SS | {icon} {AGENT} | {action} {content}`.
///
/// The time is shown in the local timezone. Newlines inside the content are folded
/// so every event stays on one line.
pub fn plain_line(event: &AgentEvent) -> String {
    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let content = event.content.replace(['\r', '\n'], " ");
    format!(
        "{} | {} {:<6} | {:<11} {}",
        time,
        action_icon(event.action),
        event.agent.as_str().to_uppercase(),
        event.action.as_str(),
        content
    )
}

/// Serialize the event as a single JSON line.
pub fn json_line(event: &AgentEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Output mode of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Plain,
    Json,
}

impl RenderMode {
    pub fn render(&self, event: &AgentEvent) -> String {
        match self {
            RenderMode::Plain => plain_line(event),
            RenderMode::Json => json_line(event),
        }
    }
}
