//! Background watcher thread
//!
//! Runs a set of sources on a dedicated OS thread with its own tokio runtime and
//! feeds everything they produce into a shared [`EventBuffer`]. Useful when the host
//! process (an HTTP server, a UI) must not share its executor with file polling.

use crate::buffer::EventBuffer;
use crate::error::{CoreError, Result};
use crate::event::{ActionType, AgentEvent};
use crate::source::Source;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Pause before a failed or finished long-running source is started again
pub const RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// Handle to the watcher thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct BackgroundWatcher {
    stop_tx: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundWatcher {
    /// Start `sources` on a new thread, pushing their events into `buffer`.
    pub fn start(
        sources: Vec<Source>,
        buffer: Arc<EventBuffer>,
        channel_capacity: usize,
    ) -> Result<Self> {
        Self::start_with_backoff(sources, buffer, channel_capacity, RESTART_BACKOFF)
    }

    pub fn start_with_backoff(
        sources: Vec<Source>,
        buffer: Arc<EventBuffer>,
        channel_capacity: usize,
        backoff: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let capacity = channel_capacity.max(1);

        let thread = std::thread::Builder::new()
            .name("agentstream-watcher".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("Failed to create watcher runtime: {}", e);
                        buffer.push(AgentEvent::system(
                            ActionType::Error,
                            format!("Watcher error: {}", e),
                        ));
                        return;
                    }
                };

                rt.block_on(async move {
                    let tasks = sources.into_iter().map(|source| {
                        supervise(source, buffer.clone(), capacity, backoff, stop_rx.clone())
                    });
                    futures::future::join_all(tasks).await;
                });
                tracing::debug!("Watcher thread exiting");
            })
            .map_err(|e| CoreError::Source(format!("Failed to spawn watcher thread: {}", e)))?;

        tracing::info!("Background watcher started");
        Ok(BackgroundWatcher {
            stop_tx,
            thread: Some(thread),
        })
    }

    /// Whether the watcher thread is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Signal every source to stop and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Watcher thread panicked");
            }
            tracing::info!("Background watcher stopped");
        }
    }
}

impl Drop for BackgroundWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Keep one source alive until stopped.
///
/// A panicking source is reported as an ERROR event and restarted after `backoff`.
/// Long-running sources (watch, demo) are also restarted when they end; one-shot
/// sources (stdin, file, exec) are not.
async fn supervise(
    source: Source,
    buffer: Arc<EventBuffer>,
    capacity: usize,
    backoff: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let label = source.label();
    loop {
        if *stop_rx.borrow() {
            return;
        }

        let (tx, mut rx) = mpsc::channel(capacity);
        let mut task = source.clone().spawn(tx);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    task.abort();
                    return;
                }
                received = rx.recv() => match received {
                    Some(event) => {
                        buffer.push(event);
                    }
                    None => break,
                },
            }
        }

        match (&mut task).await {
            Ok(()) if !source.is_long_running() => {
                tracing::debug!("Source {} finished", label);
                return;
            }
            Ok(()) => {
                tracing::info!("Source {} ended, restarting in {:?}", label, backoff);
            }
            Err(e) if e.is_panic() => {
                tracing::error!("Source {} panicked: {}", label, e);
                buffer.push(AgentEvent::system(
                    ActionType::Error,
                    format!("Watcher error: {}", e),
                ));
            }
            Err(_) => return,
        }

        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserKind;
    use std::io::Write;
    use std::time::Instant;

    fn wait_for(buffer: &EventBuffer, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.counter() < count {
            assert!(Instant::now() < deadline, "timed out waiting for events");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_one_shot_source_is_not_restarted() {
        let buffer = Arc::new(EventBuffer::new(100));
        let watcher = BackgroundWatcher::start_with_backoff(
            vec![Source::Exec {
                command: r#"echo '{"type":"turn.started"}'"#.to_string(),
                parser: ParserKind::Codex,
            }],
            buffer.clone(),
            16,
            Duration::from_millis(10),
        )
        .unwrap();

        wait_for(&buffer, 3);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(buffer.counter(), 3);
        let actions: Vec<_> = buffer.all_events().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ActionType::StreamStart,
                ActionType::TurnStart,
                ActionType::StreamEnd
            ]
        );
        watcher.stop();
    }

    #[test]
    fn test_stop_cancels_following_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"thread.started","thread_id":"abc"}}"#).unwrap();
        file.flush().unwrap();

        let buffer = Arc::new(EventBuffer::new(100));
        let watcher = BackgroundWatcher::start(
            vec![Source::File {
                path: file.path().to_path_buf(),
                parser: ParserKind::Codex,
                from_start: true,
                poll_interval: Duration::from_millis(10),
            }],
            buffer.clone(),
            16,
        )
        .unwrap();

        wait_for(&buffer, 2);
        assert!(watcher.is_running());
        assert_eq!(buffer.sessions()[0].session_id, "abc");

        watcher.stop();
        let settled = buffer.counter();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(buffer.counter(), settled);
    }
}
