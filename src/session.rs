//! Per-session aggregation
//!
//! Sessions are keyed by the `session_id` of the events that mention them. The
//! registry is plain data; callers that share it across threads wrap it in a lock
//! (see [`crate::buffer::EventBuffer`]).

use crate::event::{ActionType, Agent, AgentEvent};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Color pairs (primary, dim) handed out to sessions
pub static SESSION_PALETTE: [(&str, &str); 8] = [
    ("#a78bfa", "#7c6bc4"),
    ("#4ade80", "#34a65d"),
    ("#60a5fa", "#3b7dd8"),
    ("#f472b6", "#c2508e"),
    ("#fbbf24", "#c9961a"),
    ("#22d3ee", "#1aa5ba"),
    ("#fb923c", "#c96f2a"),
    ("#a3e635", "#7fb327"),
];

/// Display name of every demo-mode session
const DEMO_NAME: &str = "Demo";

/// Deterministic color pair for a session id.
///
/// FNV-1a over the id bytes, so the choice is stable across runs and platforms.
pub fn session_color(session_id: &str) -> (&'static str, &'static str) {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in session_id.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    SESSION_PALETTE[(hash as usize) % SESSION_PALETTE.len()]
}

/// Human-readable name for a session, derived from the first event that names it.
pub fn display_name(event: &AgentEvent) -> String {
    let sid = &event.session_id;
    if sid.starts_with("demo-") {
        return DEMO_NAME.to_string();
    }

    let meta_str = |key: &str| {
        event
            .metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    if let Some(slug) = meta_str("slug") {
        return slug.rsplit('-').next().unwrap_or(slug).to_string();
    }
    if let Some(project) = meta_str("project_name") {
        return project.to_string();
    }
    if let Some(cwd) = meta_str("cwd_project") {
        return cwd.to_string();
    }
    sid.chars().take(8).collect()
}

/// Coarse lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Idle => "idle",
            SessionStatus::Failed => "failed",
        }
    }

    /// State implied by an action, or `None` when the action says nothing about it
    fn from_action(action: ActionType) -> Option<Self> {
        match action {
            ActionType::TurnFailed => Some(SessionStatus::Failed),
            ActionType::Result
            | ActionType::TurnComplete
            | ActionType::MessageStop
            | ActionType::StreamEnd => Some(SessionStatus::Idle),
            ActionType::Ping | ActionType::Unknown => None,
            _ => Some(SessionStatus::Active),
        }
    }
}

/// Aggregated view of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub agent: Agent,
    pub display_name: String,
    pub event_count: u64,
    pub status: SessionStatus,
    pub total_cost: f64,
    pub color: &'static str,
    pub color_dim: &'static str,
    /// Console filter toggle; hidden sessions are still counted
    pub visible: bool,
}

impl SessionInfo {
    fn register(event: &AgentEvent) -> Self {
        let (color, color_dim) = session_color(&event.session_id);
        SessionInfo {
            session_id: event.session_id.clone(),
            agent: event.agent,
            display_name: display_name(event),
            event_count: 0,
            status: SessionStatus::Active,
            total_cost: 0.0,
            color,
            color_dim,
            visible: true,
        }
    }
}

/// Registry of every session seen on the stream
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionInfo>,
    /// Insertion order, for stable listings
    order: Vec<String>,
    agent_counts: HashMap<Agent, u64>,
    total_cost: f64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the aggregates.
    pub fn observe(&mut self, event: &AgentEvent) {
        *self.agent_counts.entry(event.agent).or_insert(0) += 1;

        let cost = event.total_cost_usd().filter(|c| *c != 0.0);
        if let Some(cost) = cost {
            self.total_cost += cost;
        }

        let sid = &event.session_id;
        if sid.is_empty() {
            return;
        }
        if !self.sessions.contains_key(sid) {
            self.sessions
                .insert(sid.clone(), SessionInfo::register(event));
            self.order.push(sid.clone());
        }
        if let Some(info) = self.sessions.get_mut(sid) {
            info.event_count += 1;
            if let Some(cost) = cost {
                info.total_cost += cost;
            }
            if let Some(status) = SessionStatus::from_action(event.action) {
                info.status = status;
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionInfo> {
        self.sessions.get(session_id)
    }

    /// Sessions in first-seen order
    pub fn list(&self) -> Vec<SessionInfo> {
        self.order
            .iter()
            .filter_map(|sid| self.sessions.get(sid))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Events seen from `agent`, session-bound or not
    pub fn agent_count(&self, agent: Agent) -> u64 {
        self.agent_counts.get(&agent).copied().unwrap_or(0)
    }

    /// Running cost over every session
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Flip a session's visibility. Returns the new state, or `None` for unknown ids.
    pub fn toggle_visible(&mut self, session_id: &str) -> Option<bool> {
        let info = self.sessions.get_mut(session_id)?;
        info.visible = !info.visible;
        Some(info.visible)
    }

    /// Whether events of this session should be shown. Unknown sessions are visible.
    pub fn is_visible(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|info| info.visible)
            .unwrap_or(true)
    }
}
