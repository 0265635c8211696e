//! Built-in demo script
//!
//! Two interleaved simulated sessions (one Claude, one Codex), replayed forever.

use super::{emit, emit_system, EventSender};
use crate::event::{ActionType, Agent, AgentEvent};
use std::time::Duration;

pub const DEMO_CLAUDE_SESSION: &str = "demo-cl-a1b2c3d4";
pub const DEMO_CODEX_SESSION: &str = "demo-cx-e5f6a7b8";

/// Pause between two passes over the script
const CYCLE_PAUSE: Duration = Duration::from_secs(3);

/// One scripted event: delay before it (ms), producer, action, content.
#[derive(Debug, Clone, Copy)]
pub struct DemoStep {
    pub delay_ms: u64,
    pub agent: Agent,
    pub action: ActionType,
    pub content: &'static str,
}

const fn step(delay_ms: u64, agent: Agent, action: ActionType, content: &'static str) -> DemoStep {
    DemoStep {
        delay_ms,
        agent,
        action,
        content,
    }
}

use ActionType as A;
use Agent::{Claude as CL, Codex as CX};

pub static DEMO_SCRIPT: &[DemoStep] = &[
    step(600, CL, A::Init, "claude-sonnet-4-6 | 24 tools | v2.1.0"),
    step(800, CL, A::Thinking, "Analyzing the user's request for code refactoring..."),
    step(500, CL, A::Thinking, "I should examine the existing codebase structure first"),
    step(700, CX, A::ThreadStart, "Thread a7f3b201"),
    step(400, CX, A::TurnStart, "New turn"),
    step(300, CX, A::Reasoning, "Searching for Rust files in the project"),
    step(500, CX, A::Command, "find src/ -name '*.rs' -type f | head -20"),
    step(800, CX, A::AgentMessage, "Found 14 Rust files in src/"),
    step(600, CL, A::TextDelta, "I'll help you refactor the authentication module."),
    step(300, CL, A::TextDelta, "Let me first examine the current implementation."),
    step(500, CL, A::ToolUse, "Read src/auth/handler.rs"),
    step(400, CL, A::ToolResult, "pub struct AuthHandler { ... }"),
    step(600, CX, A::Command, "cargo test -q"),
    step(700, CX, A::AgentMessage, "23 passed; 0 failed"),
    step(500, CL, A::TextDelta, "The current auth handler has several issues:"),
    step(300, CL, A::TextDelta, "1. Token validation is mixed with route handling"),
    step(300, CL, A::TextDelta, "2. No rate limiting on login attempts"),
    step(300, CL, A::TextDelta, "3. Session management could be more efficient"),
    step(400, CL, A::ToolUse, "Edit src/auth/handler.rs"),
    step(300, CL, A::ToolResult, "Applied 3 edits to handler.rs"),
    step(600, CX, A::FileChange, "~src/auth/handler.rs, +src/auth/middleware.rs"),
    step(500, CX, A::Command, "cargo test -q"),
    step(600, CX, A::AgentMessage, "25 passed (2 new); 0 failed"),
    step(400, CX, A::TurnComplete, "2,891 in / 456 out"),
    step(500, CL, A::ToolUse, "Write src/auth/session.rs"),
    step(300, CL, A::ToolResult, "Created src/auth/session.rs (87 lines)"),
    step(400, CL, A::TextDelta, "Created a session manager backed by Redis."),
    step(300, CL, A::MessageStop, "end_turn | 847 tokens"),
    step(700, CX, A::TurnStart, "New turn"),
    step(500, CX, A::Command, "cargo build --release"),
    step(800, CX, A::Error, "exit 101: cargo build --release error[E0432]: unresolved import `redis`"),
    step(400, CX, A::Command, "cargo add redis"),
    step(500, CX, A::Command, "cargo build --release"),
    step(400, CX, A::AgentMessage, "Build succeeded after adding redis"),
    step(300, CX, A::TurnComplete, "1,203 in / 189 out"),
    step(500, CL, A::MessageStart, "Response (claude-sonnet-4-6)"),
    step(400, CL, A::TextDelta, "All changes have been applied successfully."),
    step(300, CL, A::TextDelta, "- Separated token validation (handler.rs)"),
    step(300, CL, A::TextDelta, "- Rate limiting middleware (middleware.rs)"),
    step(300, CL, A::TextDelta, "- Redis-backed sessions (session.rs)"),
    step(400, CL, A::MessageStop, "end_turn | 312 tokens"),
    step(600, CX, A::TurnStart, "New turn"),
    step(500, CX, A::WebSearch, "redis session best practices"),
    step(600, CX, A::McpTool, "docs-server/search_docs (completed)"),
    step(500, CX, A::AgentMessage, "Applied security hardening from the Redis docs"),
    step(400, CX, A::FileChange, "~src/auth/session.rs"),
    step(300, CX, A::TurnComplete, "3,412 in / 287 out"),
    step(600, CL, A::Result, "3 turns | $0.0342 | 14.2s | 12,847+1,203 tok"),
];

impl DemoStep {
    /// Materialize the step as an event of its demo session.
    pub fn to_event(&self) -> AgentEvent {
        let session = match self.agent {
            Agent::Claude => DEMO_CLAUDE_SESSION,
            Agent::Codex => DEMO_CODEX_SESSION,
            Agent::System => "",
        };
        let mut event = AgentEvent::new(self.agent, self.action, self.content).with_session(session);
        if self.action == ActionType::Result {
            event = event
                .with_meta("total_cost_usd", 0.0342)
                .with_meta("num_turns", 3);
        }
        event
    }
}

/// Replay [`DEMO_SCRIPT`] until every receiver is gone.
pub async fn run_demo(tx: &EventSender) {
    run_script(DEMO_SCRIPT, 1.0, tx).await
}

/// Replay `script` forever, scaling every delay by `speed` (2.0 = twice as fast).
pub async fn run_script(script: &[DemoStep], speed: f64, tx: &EventSender) {
    if !emit_system(
        tx,
        ActionType::StreamStart,
        "Demo mode - streaming simulated events".to_string(),
    )
    .await
    {
        return;
    }

    let scale = if speed > 0.0 { 1.0 / speed } else { 1.0 };
    loop {
        for step in script {
            tokio::time::sleep(Duration::from_millis(step.delay_ms).mul_f64(scale)).await;
            if !emit(tx, step.to_event()).await {
                return;
            }
        }
        if !emit_system(
            tx,
            ActionType::StreamEnd,
            "Demo cycle complete, restarting...".to_string(),
        )
        .await
        {
            return;
        }
        tokio::time::sleep(CYCLE_PAUSE.mul_f64(scale)).await;
    }
}
