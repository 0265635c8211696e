//! File-follow adapter (`tail -f` semantics)

use super::lines::FileTail;
use super::{emit_system, forward_lines, EventSender};
use crate::event::ActionType;
use crate::parser::{create_parser, ParserKind};
use std::path::Path;
use std::time::Duration;

/// Follow `path`, parsing every appended line.
///
/// Without `from_start` only lines written after the adapter starts are shown.
pub async fn run_file(
    path: &Path,
    parser: ParserKind,
    from_start: bool,
    poll_interval: Duration,
    tx: &EventSender,
) {
    let shown = path.display();
    if !emit_system(tx, ActionType::StreamStart, format!("Watching {}", shown)).await {
        return;
    }

    let mut tail = match FileTail::open(path, from_start).await {
        Ok(tail) => tail,
        Err(e) => {
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("File not found: {}", shown)
            } else {
                format!("File error: {}", e)
            };
            tracing::warn!("{}", message);
            if emit_system(tx, ActionType::Error, message).await {
                emit_system(
                    tx,
                    ActionType::StreamEnd,
                    format!("Stopped watching {} (not opened)", shown),
                )
                .await;
            }
            return;
        }
    };
    tracing::info!("Following {} from byte {}", shown, tail.position());

    let mut parser = create_parser(parser);
    loop {
        match tail.read_lines().await {
            Ok(lines) => {
                if !forward_lines(parser.as_mut(), lines, tx).await {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Read failed for {}: {}", shown, e);
                if !emit_system(tx, ActionType::Error, format!("File error: {}", e)).await {
                    return;
                }
                break;
            }
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(poll_interval).await;
    }

    emit_system(
        tx,
        ActionType::StreamEnd,
        format!("Stopped watching {}", shown),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Agent, AgentEvent};
    use std::io::Write;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn next(rx: &mut mpsc::Receiver<AgentEvent>) -> AgentEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.jsonl");
        let (tx, mut rx) = mpsc::channel(16);

        run_file(&path, ParserKind::Codex, false, Duration::from_millis(10), &tx).await;

        let start = next(&mut rx).await;
        assert_eq!(start.action, ActionType::StreamStart);
        let err = next(&mut rx).await;
        assert_eq!(err.agent, Agent::System);
        assert_eq!(err.action, ActionType::Error);
        assert!(err.content.starts_with("File not found:"));
        let end = next(&mut rx).await;
        assert_eq!(end.action, ActionType::StreamEnd);
    }

    #[tokio::test]
    async fn test_follows_new_lines_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"type\":\"turn.started\"}}").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let path = file.path().to_path_buf();
        let handle = tokio::spawn(async move {
            run_file(&path, ParserKind::Codex, false, Duration::from_millis(20), &tx).await;
        });

        assert_eq!(next(&mut rx).await.action, ActionType::StreamStart);
        // Let the tail settle at EOF before appending
        tokio::time::sleep(Duration::from_millis(60)).await;
        writeln!(file, "{{\"type\":\"thread.started\",\"thread_id\":\"t1\"}}").unwrap();
        file.flush().unwrap();

        let ev = next(&mut rx).await;
        assert_eq!(ev.action, ActionType::ThreadStart);
        assert_eq!(ev.session_id, "t1");

        handle.abort();
        let _ = handle.await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_from_start_replays_existing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"type\":\"turn.started\"}}").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let path = file.path().to_path_buf();
        let handle = tokio::spawn(async move {
            run_file(&path, ParserKind::Codex, true, Duration::from_millis(20), &tx).await;
        });

        assert_eq!(next(&mut rx).await.action, ActionType::StreamStart);
        assert_eq!(next(&mut rx).await.action, ActionType::TurnStart);
        handle.abort();
    }
}
