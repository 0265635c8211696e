//! agentstream - normalize Claude and Codex agent output into one event stream
//!
//! This crate provides:
//! - Line parsers for the Claude CLI, Claude SSE, Claude interactive session logs,
//!   Codex JSONL and Codex interactive rollout logs, plus an auto-detecting dispatcher
//! - Line-source adapters (stdin, followed files, subprocesses, live-session
//!   discovery, a demo script) that turn those formats into [`AgentEvent`]s
//! - A bounded shared event buffer with per-session aggregation
//! - An HTTP/SSE surface over that buffer
//!
//! # Usage
//!
//! As a library:
//! ```ignore
//! use agentstream::parser::{create_parser, ParserKind};
//!
//! let mut parser = create_parser(ParserKind::Auto);
//! for line in std::io::stdin().lines() {
//!     if let Some(event) = parser.parse_line(&line?) {
//!         println!("{}", agentstream::render::plain_line(&event));
//!     }
//! }
//! ```
//!
//! As a CLI:
//! ```text
//! claude -p "..." --output-format stream-json | agentstream
//! agentstream --watch --serve
//! ```

pub mod api;
pub mod background;
pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod parser;
pub mod render;
pub mod session;
pub mod source;

// Re-export main types for convenience
pub use buffer::EventBuffer;
pub use config::Config;
pub use error::{CoreError, Result};
pub use event::{ActionType, Agent, AgentEvent};
pub use parser::{create_parser, LineParser, ParserKind};
pub use source::Source;

use background::BackgroundWatcher;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Coordinates sources, the shared buffer and the HTTP server
pub struct Core {
    /// Configuration
    pub config: Config,

    /// Event history shared with the HTTP surface
    buffer: Arc<EventBuffer>,

    /// Watcher thread (only while background sources are running)
    watcher: Mutex<Option<BackgroundWatcher>>,
}

impl Core {
    /// Create a new Core instance with the given configuration
    pub fn new(config: Config) -> Self {
        let buffer = Arc::new(EventBuffer::new(config.buffer.max_events));
        Core {
            config,
            buffer,
            watcher: Mutex::new(None),
        }
    }

    pub fn buffer(&self) -> &Arc<EventBuffer> {
        &self.buffer
    }

    /// Channel sized from `[stream] channel_capacity`
    pub fn channel(&self) -> (mpsc::Sender<AgentEvent>, mpsc::Receiver<AgentEvent>) {
        mpsc::channel(self.config.stream.channel_capacity.max(1))
    }

    /// File source using the configured poll interval and start position
    pub fn file_source(&self, path: PathBuf, parser: ParserKind) -> Source {
        Source::File {
            path: config::expand_path(&path),
            parser,
            from_start: self.config.stream.from_start,
            poll_interval: self.config.stream.poll_interval(),
        }
    }

    /// Session-discovery source over the configured roots
    pub fn watch_source(&self) -> Source {
        Source::Watch(self.config.watch.to_options())
    }

    /// Run `sources` on the background watcher thread, feeding the buffer.
    ///
    /// Replaces (and stops) any watcher started earlier.
    pub fn start_background(&self, sources: Vec<Source>) -> Result<()> {
        if sources.is_empty() {
            return Err(CoreError::Source("No sources to run".to_string()));
        }
        tracing::info!(
            "Starting background sources: {}",
            sources
                .iter()
                .map(Source::label)
                .collect::<Vec<_>>()
                .join(", ")
        );
        let watcher = BackgroundWatcher::start(
            sources,
            self.buffer.clone(),
            self.config.stream.channel_capacity,
        )?;
        let previous = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(watcher);
        if let Some(previous) = previous {
            previous.stop();
        }
        Ok(())
    }

    /// Stop the background watcher, if running
    pub fn stop_background(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }
    }

    /// Start the HTTP API server and run it until `shutdown` resolves
    pub async fn start_api_server<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        api::serve(&self.config.server, self.buffer.clone(), shutdown).await
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.stop_background();
    }
}
