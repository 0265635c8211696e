//! Normalized event model
//!
//! Every parser, adapter and consumer in the crate speaks `AgentEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Producer of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    Claude,
    Codex,
    /// Lifecycle and error events synthesized by agentstream itself
    System,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::Claude => "claude",
            Agent::Codex => "codex",
            Agent::System => "system",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized action kind, used for display routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "text")]
    TextDelta,
    #[serde(rename = "thinking")]
    Thinking,
    #[serde(rename = "reasoning")]
    Reasoning,
    #[serde(rename = "tool_use")]
    ToolUse,
    #[serde(rename = "tool_result")]
    ToolResult,
    #[serde(rename = "command")]
    Command,
    #[serde(rename = "file_edit")]
    FileChange,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "init")]
    Init,
    #[serde(rename = "result")]
    Result,
    #[serde(rename = "msg_start")]
    MessageStart,
    #[serde(rename = "msg_stop")]
    MessageStop,
    #[serde(rename = "stream")]
    StreamStart,
    #[serde(rename = "stream_end")]
    StreamEnd,
    #[serde(rename = "thread")]
    ThreadStart,
    #[serde(rename = "turn")]
    TurnStart,
    #[serde(rename = "turn_done")]
    TurnComplete,
    #[serde(rename = "turn_fail")]
    TurnFailed,
    #[serde(rename = "message")]
    AgentMessage,
    #[serde(rename = "mcp_tool")]
    McpTool,
    #[serde(rename = "search")]
    WebSearch,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "task")]
    TaskUpdate,
    #[serde(rename = "user_prompt")]
    UserPrompt,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ActionType {
    /// Wire tag, identical to the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::TextDelta => "text",
            ActionType::Thinking => "thinking",
            ActionType::Reasoning => "reasoning",
            ActionType::ToolUse => "tool_use",
            ActionType::ToolResult => "tool_result",
            ActionType::Command => "command",
            ActionType::FileChange => "file_edit",
            ActionType::Error => "error",
            ActionType::Init => "init",
            ActionType::Result => "result",
            ActionType::MessageStart => "msg_start",
            ActionType::MessageStop => "msg_stop",
            ActionType::StreamStart => "stream",
            ActionType::StreamEnd => "stream_end",
            ActionType::ThreadStart => "thread",
            ActionType::TurnStart => "turn",
            ActionType::TurnComplete => "turn_done",
            ActionType::TurnFailed => "turn_fail",
            ActionType::AgentMessage => "message",
            ActionType::McpTool => "mcp_tool",
            ActionType::WebSearch => "search",
            ActionType::Compact => "compact",
            ActionType::TaskUpdate => "task",
            ActionType::UserPrompt => "user_prompt",
            ActionType::Ping => "ping",
            ActionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized unit of the stream.
///
/// `content` is always a bounded display string (parsers truncate), `session_id` may be
/// empty, and `metadata` is always an object, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub agent: Agent,
    pub action: ActionType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentEvent {
    pub fn new(agent: Agent, action: ActionType, content: impl Into<String>) -> Self {
        AgentEvent {
            agent,
            action,
            content: content.into(),
            timestamp: Utc::now(),
            session_id: String::new(),
            metadata: Map::new(),
        }
    }

    /// Lifecycle/error event synthesized by an adapter
    pub fn system(action: ActionType, content: impl Into<String>) -> Self {
        Self::new(Agent::System, action, content)
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        if let Some(ts) = timestamp {
            self.timestamp = ts;
        }
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Cost attached by a Claude `result` line, if any
    pub fn total_cost_usd(&self) -> Option<f64> {
        self.metadata.get("total_cost_usd").and_then(Value::as_f64)
    }
}
