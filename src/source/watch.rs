//! Session discovery and multiplexed tailing
//!
//! Periodically scans one or more roots for recently modified session logs, spawns
//! one tail task per file and lets them all write into the shared event channel.
//! Tails retire themselves once their file stops growing.

use super::lines::FileTail;
use super::{emit, emit_system, EventSender};
use crate::event::{ActionType, AgentEvent};
use crate::parser::{common::truncate_chars, create_parser, ParserKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;

/// One directory tree to scan
#[derive(Debug, Clone, PartialEq)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub parser: ParserKind,
}

/// Discovery and tailing knobs
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub roots: Vec<WatchRoot>,
    pub scan_interval: Duration,
    /// Files not modified within this window are ignored
    pub max_age: Duration,
    /// A tail stops after this long without new data
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            roots: Vec::new(),
            scan_interval: Duration::from_secs(5),
            max_age: Duration::from_secs(600),
            idle_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(150),
        }
    }
}

/// A session file found by a scan
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredSession {
    pub path: PathBuf,
    pub project: String,
    pub parser: ParserKind,
}

impl DiscoveredSession {
    /// `project/abcdef12` style label used in lifecycle events
    pub fn label(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?");
        format!("{}/{}", self.project, truncate_chars(stem, 8))
    }
}

/// Display name of a Claude project directory.
///
/// Directory names encode the project path with `-` separators
/// (`-Users-nick-Dev-agentstream` -> `agentstream`).
pub fn project_name(dir_name: &str) -> String {
    dir_name
        .split('-')
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| truncate_chars(dir_name, 16))
}

/// Scan `root` for session files modified within `max_age` of `now`.
pub fn discover_sessions(root: &WatchRoot, max_age: Duration, now: SystemTime) -> Vec<DiscoveredSession> {
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let is_recent = |path: &Path| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(|mtime| mtime >= cutoff)
            .unwrap_or(false)
    };

    let mut found = Vec::new();
    if root.parser == ParserKind::CodexInteractive {
        let mut files = Vec::new();
        collect_rollouts(&root.path, &mut files);
        for path in files.into_iter().filter(|p| is_recent(p)) {
            found.push(DiscoveredSession {
                path,
                project: "codex".to_string(),
                parser: root.parser,
            });
        }
        return found;
    }

    let Ok(projects) = std::fs::read_dir(&root.path) else {
        return found;
    };
    for project_dir in projects.flatten().map(|e| e.path()).filter(|p| p.is_dir()) {
        let project = project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(project_name)
            .unwrap_or_default();

        let Ok(entries) = std::fs::read_dir(&project_dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            // <project>/<id>.jsonl
            if path.is_file() && has_jsonl_ext(&path) {
                if is_recent(&path) {
                    found.push(DiscoveredSession {
                        path,
                        project: project.clone(),
                        parser: root.parser,
                    });
                }
                continue;
            }
            // <project>/<id>/subagents/agent-*.jsonl
            let subagents = path.join("subagents");
            let Ok(subs) = std::fs::read_dir(&subagents) else {
                continue;
            };
            for sub in subs.flatten().map(|e| e.path()) {
                let is_agent_log = sub
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("agent-"));
                if is_agent_log && has_jsonl_ext(&sub) && is_recent(&sub) {
                    found.push(DiscoveredSession {
                        path: sub,
                        project: project.clone(),
                        parser: root.parser,
                    });
                }
            }
        }
    }
    found
}

fn has_jsonl_ext(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("jsonl")
}

fn collect_rollouts(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_rollouts(&path, out);
        } else if has_jsonl_ext(&path)
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("rollout-"))
        {
            out.push(path);
        }
    }
}

/// Running tail tasks keyed by file. Dropping the set cancels every tail.
#[derive(Default)]
struct TailSet {
    tails: HashMap<PathBuf, JoinHandle<()>>,
}

impl TailSet {
    fn reap(&mut self) {
        self.tails.retain(|_, handle| !handle.is_finished());
    }

    fn is_tailing(&self, path: &Path) -> bool {
        self.tails.contains_key(path)
    }

    fn insert(&mut self, path: PathBuf, handle: JoinHandle<()>) {
        self.tails.insert(path, handle);
    }

    fn is_empty(&self) -> bool {
        self.tails.is_empty()
    }
}

impl Drop for TailSet {
    fn drop(&mut self) {
        for handle in self.tails.values() {
            handle.abort();
        }
    }
}

/// Discover and tail sessions until every receiver is gone.
pub async fn run_watch(opts: &WatchOptions, tx: &EventSender) {
    let roots: Vec<String> = opts
        .roots
        .iter()
        .map(|r| r.path.display().to_string())
        .collect();
    if !emit_system(
        tx,
        ActionType::StreamStart,
        format!("Watch mode: scanning {} for active sessions", roots.join(", ")),
    )
    .await
    {
        return;
    }
    tracing::info!("Watching {} root(s): {}", roots.len(), roots.join(", "));

    let mut tails = TailSet::default();
    let mut ticker = tokio::time::interval(opts.scan_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            return;
        }
        tails.reap();

        let now = SystemTime::now();
        let mut found = Vec::new();
        for root in &opts.roots {
            found.extend(discover_sessions(root, opts.max_age, now));
        }

        for session in found {
            if tails.is_tailing(&session.path) {
                continue;
            }
            tracing::debug!("Discovered {}", session.path.display());
            let path = session.path.clone();
            let handle = tokio::spawn(tail_session(session, opts.clone(), tx.clone()));
            tails.insert(path, handle);
        }

        if tails.is_empty()
            && !emit_system(
                tx,
                ActionType::Ping,
                "Scanning for active sessions...".to_string(),
            )
            .await
        {
            return;
        }
    }
}

/// Tail one discovered file until it goes idle.
async fn tail_session(session: DiscoveredSession, opts: WatchOptions, tx: EventSender) {
    let label = session.label();
    if !emit_system(&tx, ActionType::StreamStart, format!("Watching {}", label)).await {
        return;
    }

    let result = follow(&session, &opts, &tx).await;
    match result {
        Ok(true) => {
            tracing::debug!("Session idle: {}", label);
            emit_system(&tx, ActionType::StreamEnd, format!("Session idle: {}", label)).await;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("Tail of {} failed: {}", session.path.display(), e);
            emit_system(
                &tx,
                ActionType::Error,
                format!("Watch error ({}): {}", session.project, e),
            )
            .await;
        }
    }
}

/// `Ok(true)` when the file went idle, `Ok(false)` when the consumer went away.
async fn follow(
    session: &DiscoveredSession,
    opts: &WatchOptions,
    tx: &EventSender,
) -> std::io::Result<bool> {
    let mut tail = FileTail::open(&session.path, false).await?;
    let mut parser = create_parser(session.parser);
    let tag_project = session.parser != ParserKind::CodexInteractive;
    let mut last_data = Instant::now();

    loop {
        let lines = tail.read_lines().await?;
        if !lines.is_empty() {
            last_data = Instant::now();
        }
        for line in lines {
            if let Some(event) = parser.parse_line(&line) {
                if !emit(tx, tag(event, session, tag_project)).await {
                    return Ok(false);
                }
            }
        }
        if last_data.elapsed() >= opts.idle_timeout {
            return Ok(true);
        }
        if tx.is_closed() {
            return Ok(false);
        }
        tokio::time::sleep(opts.poll_interval).await;
    }
}

fn tag(event: AgentEvent, session: &DiscoveredSession, tag_project: bool) -> AgentEvent {
    if tag_project {
        event.with_meta("project_name", session.project.as_str())
    } else {
        event
    }
}
