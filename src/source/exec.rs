//! Subprocess adapter
//!
//! Runs a shell command, parses its stdout and drains stderr concurrently so a
//! chatty child can never block on a full pipe.

use super::{emit, emit_system, EventSender};
use crate::event::ActionType;
use crate::parser::common::{strip_ansi, truncate_chars};
use crate::parser::{create_parser, ParserKind};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Shell exit status for "command not found"
const NOT_FOUND_EXIT: i32 = 127;

/// Run `command` through `sh -c` and stream its parsed stdout.
///
/// The child is killed if the adapter is cancelled.
pub async fn run_exec(command: &str, parser: ParserKind, tx: &EventSender) {
    let command = command.trim();
    if command.is_empty() {
        emit_system(tx, ActionType::Error, "Empty command".to_string()).await;
        return;
    }
    let program = command.split_whitespace().next().unwrap_or(command);

    if !emit_system(tx, ActionType::StreamStart, format!("Running: {}", command)).await {
        return;
    }

    let spawned = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!("Failed to spawn `{}`: {}", command, e);
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("Command not found: {}", program)
            } else {
                format!("Exec error: {}", e)
            };
            if emit_system(tx, ActionType::Error, message).await {
                emit_system(tx, ActionType::StreamEnd, "Process failed to start".to_string())
                    .await;
            }
            return;
        }
    };
    tracing::info!("Spawned `{}` (pid {:?})", command, child.id());

    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            strip_ansi(String::from_utf8_lossy(&buf).trim())
        })
    });

    let mut parser = create_parser(parser);
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Some(event) = parser.parse_line(&line) {
                        if !emit(tx, event).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    if !emit_system(tx, ActionType::Error, format!("Exec error: {}", e)).await {
                        return;
                    }
                    break;
                }
            }
        }
    }
    if let Some(event) = parser.parse_line("") {
        if !emit(tx, event).await {
            return;
        }
    }

    let exit_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            if !emit_system(tx, ActionType::Error, format!("Exec error: {}", e)).await {
                return;
            }
            -1
        }
    };
    let stderr_text = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    tracing::info!("`{}` exited with {}", command, exit_code);

    if exit_code == NOT_FOUND_EXIT {
        if !emit_system(
            tx,
            ActionType::Error,
            format!("Command not found: {}", program),
        )
        .await
        {
            return;
        }
    } else if exit_code != 0 && !stderr_text.is_empty() {
        if !emit_system(
            tx,
            ActionType::Error,
            format!("Process stderr: {}", truncate_chars(&stderr_text, 200)),
        )
        .await
        {
            return;
        }
    }

    emit_system(
        tx,
        ActionType::StreamEnd,
        format!("Process exited ({})", exit_code),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Agent, AgentEvent};
    use tokio::sync::mpsc;

    async fn collect(command: &str, parser: ParserKind) -> Vec<AgentEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        run_exec(command, parser, &tx).await;
        drop(tx);
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_empty_command() {
        let events = collect("   ", ParserKind::Auto).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ActionType::Error);
        assert_eq!(events[0].content, "Empty command");
    }

    #[tokio::test]
    async fn test_parses_stdout() {
        let events = collect(
            r#"printf '%s\n' '{"type":"thread.started","thread_id":"t1"}' '{"type":"turn.started"}'"#,
            ParserKind::Codex,
        )
        .await;
        let actions: Vec<_> = events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                ActionType::StreamStart,
                ActionType::ThreadStart,
                ActionType::TurnStart,
                ActionType::StreamEnd
            ]
        );
        assert_eq!(events[2].session_id, "t1");
        assert_eq!(events[3].content, "Process exited (0)");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let events = collect("echo boom >&2; exit 3", ParserKind::Codex).await;
        let err = events
            .iter()
            .find(|e| e.action == ActionType::Error)
            .unwrap();
        assert_eq!(err.agent, Agent::System);
        assert_eq!(err.content, "Process stderr: boom");
        let end = events.last().unwrap();
        assert_eq!(end.action, ActionType::StreamEnd);
        assert!(end.content.contains('3'));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let events = collect("definitely-not-a-real-binary-xyz --flag", ParserKind::Auto).await;
        assert!(events
            .iter()
            .any(|e| e.content == "Command not found: definitely-not-a-real-binary-xyz"));
        assert_eq!(events.last().unwrap().content, "Process exited (127)");
    }

    #[tokio::test]
    async fn test_large_stderr_does_not_block() {
        let events = collect(
            "i=0; while [ $i -lt 2000 ]; do echo 'noise noise noise noise noise noise' >&2; i=$((i+1)); done; echo '{\"type\":\"turn.started\"}'",
            ParserKind::Codex,
        )
        .await;
        assert!(events.iter().any(|e| e.action == ActionType::TurnStart));
        assert_eq!(events.last().unwrap().content, "Process exited (0)");
    }
}
