//! Line-source adapters
//!
//! Each adapter turns an external byte source (stdin, a growing file, a child
//! process, a directory of live session logs, or the built-in demo script) into
//! normalized events pushed onto an mpsc channel. Adapters bracket their output with
//! STREAM_START / STREAM_END system events and convert I/O failures into ERROR
//! events. Cancellation is dropping (or aborting) the adapter's future; no events
//! are sent after that.

pub mod demo;
pub mod exec;
pub mod file;
pub mod lines;
pub mod stdin;
pub mod watch;

pub use lines::{FileTail, LineBuffer};
pub use watch::{WatchOptions, WatchRoot};

use crate::event::{ActionType, AgentEvent};
use crate::parser::{LineParser, ParserKind};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Channel every adapter writes into
pub type EventSender = mpsc::Sender<AgentEvent>;

/// A configured event source
#[derive(Debug, Clone)]
pub enum Source {
    /// Line-buffered standard input
    Stdin { parser: ParserKind },
    /// Follow a file as it grows
    File {
        path: PathBuf,
        parser: ParserKind,
        from_start: bool,
        poll_interval: Duration,
    },
    /// Run a shell command and parse its stdout
    Exec { command: String, parser: ParserKind },
    /// Discover and tail live session logs
    Watch(WatchOptions),
    /// Replay the built-in demo script forever
    Demo,
}

impl Source {
    /// Short description used in logs
    pub fn label(&self) -> String {
        match self {
            Source::Stdin { parser } => format!("stdin ({})", parser),
            Source::File { path, parser, .. } => format!("file {} ({})", path.display(), parser),
            Source::Exec { command, parser } => format!("exec `{}` ({})", command, parser),
            Source::Watch(opts) => format!("watch ({} roots)", opts.roots.len()),
            Source::Demo => "demo".to_string(),
        }
    }

    /// Sources that are meant to run forever and are restarted when they stop.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Source::Watch(_) | Source::Demo)
    }

    /// Drive the source until it ends or every receiver is gone.
    pub async fn run(self, tx: EventSender) {
        tracing::debug!("Source starting: {}", self.label());
        match self {
            Source::Stdin { parser } => stdin::run_stdin(parser, &tx).await,
            Source::File {
                path,
                parser,
                from_start,
                poll_interval,
            } => file::run_file(&path, parser, from_start, poll_interval, &tx).await,
            Source::Exec { command, parser } => exec::run_exec(&command, parser, &tx).await,
            Source::Watch(opts) => watch::run_watch(&opts, &tx).await,
            Source::Demo => demo::run_demo(&tx).await,
        }
    }

    /// Run the source as its own task. Aborting the handle cancels it.
    pub fn spawn(self, tx: EventSender) -> JoinHandle<()> {
        let label = self.label();
        tokio::spawn(async move {
            self.run(tx).await;
            tracing::debug!("Source finished: {}", label);
        })
    }
}

/// Send one event. `false` means the consumer is gone and the adapter should stop.
pub(crate) async fn emit(tx: &EventSender, event: AgentEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Send a synthesized system event.
pub(crate) async fn emit_system(tx: &EventSender, action: ActionType, content: String) -> bool {
    emit(tx, AgentEvent::system(action, content)).await
}

/// Feed lines through `parser`, forwarding every produced event.
pub(crate) async fn forward_lines<I>(
    parser: &mut dyn LineParser,
    lines: I,
    tx: &EventSender,
) -> bool
where
    I: IntoIterator<Item = String>,
{
    for line in lines {
        if let Some(event) = parser.parse_line(&line) {
            if !emit(tx, event).await {
                return false;
            }
        }
    }
    true
}
