//! HTTP route handlers for the API

use super::AppState;
use crate::event::AgentEvent;
use crate::session::SessionInfo;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Health Check
// ============================================================================

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "events": state.buffer.counter(),
        "sessions": state.buffer.sessions().len(),
    }))
}

// ============================================================================
// Sessions
// ============================================================================

/// Wire view of a session
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub agent: String,
    pub display_name: String,
    pub event_count: u64,
    pub status: String,
    pub total_cost: f64,
    pub color: String,
    pub visible: bool,
}

impl From<SessionInfo> for SessionView {
    fn from(info: SessionInfo) -> Self {
        SessionView {
            agent: info.agent.as_str().to_string(),
            status: info.status.as_str().to_string(),
            session_id: info.session_id,
            display_name: info.display_name,
            event_count: info.event_count,
            total_cost: info.total_cost,
            color: info.color.to_string(),
            visible: info.visible,
        }
    }
}

/// `GET /api/sessions`: session id -> session view
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions: BTreeMap<String, SessionView> = state
        .buffer
        .sessions()
        .into_iter()
        .map(|info| (info.session_id.clone(), SessionView::from(info)))
        .collect();
    Json(sessions)
}

/// `POST /api/sessions/:id/toggle`: flip console visibility
pub async fn toggle_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.buffer.toggle_session(&id) {
        Some(visible) => (
            StatusCode::OK,
            Json(serde_json::json!({ "session_id": id, "visible": visible })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Session not found: {}", id) })),
        ),
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Only events with a sequence number greater than this
    pub since: Option<u64>,
    /// Keep only the newest `limit` events
    pub limit: Option<usize>,
}

/// `GET /api/history`: buffered events, oldest first
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let mut events: Vec<AgentEvent> = match query.since {
        Some(since) => state
            .buffer
            .events_since(since)
            .into_iter()
            .map(|(_, e)| e)
            .collect(),
        None => state.buffer.all_events(),
    };
    if let Some(limit) = query.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    Json(events)
}
