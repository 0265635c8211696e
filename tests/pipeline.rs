//! End-to-end checks through the public API: sources, parsers and the buffer.

use agentstream::parser::{create_parser, ParserKind};
use agentstream::source::Source;
use agentstream::{ActionType, Agent, AgentEvent, EventBuffer};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next(rx: &mut mpsc::Receiver<AgentEvent>) -> AgentEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

#[tokio::test]
async fn growing_file_with_codex_parser() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let (tx, mut rx) = mpsc::channel(32);
    let handle = Source::File {
        path: file.path().to_path_buf(),
        parser: ParserKind::Codex,
        from_start: false,
        poll_interval: Duration::from_millis(20),
    }
    .spawn(tx);

    let start = next(&mut rx).await;
    assert_eq!(start.agent, Agent::System);
    assert_eq!(start.action, ActionType::StreamStart);

    tokio::time::sleep(Duration::from_millis(60)).await;
    // Written in two pieces: the torn half must wait for the rest of the line
    write!(file, r#"{{"type":"thread.started","#).unwrap();
    file.flush().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    writeln!(file, r#""thread_id":"0199a213-81c0-7800-8aa1-bbab2a035a53"}}"#).unwrap();
    file.flush().unwrap();

    let thread = next(&mut rx).await;
    assert_eq!(thread.agent, Agent::Codex);
    assert_eq!(thread.action, ActionType::ThreadStart);
    assert_eq!(thread.content, "Thread 0199a213");
    assert_eq!(thread.session_id, "0199a213-81c0-7800-8aa1-bbab2a035a53");

    handle.abort();
}

#[tokio::test]
async fn exec_nonzero_exit_ends_with_code() {
    let (tx, mut rx) = mpsc::channel(32);
    Source::Exec {
        command: "echo 'not json'; echo oops >&2; exit 2".to_string(),
        parser: ParserKind::Codex,
    }
    .run(tx)
    .await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let actions: Vec<_> = events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            ActionType::StreamStart,
            ActionType::Error,
            ActionType::Error,
            ActionType::StreamEnd
        ]
    );
    assert!(events[1].content.starts_with("Bad JSON: not json"));
    assert_eq!(events[2].content, "Process stderr: oops");
    assert!(events[3].content.contains('2'));
}

#[test]
fn auto_detect_locks_onto_first_recognized_format() {
    let mut parser = create_parser(ParserKind::Auto);
    assert_eq!(parser.detected_format(), None);

    assert!(parser.parse_line("\n").is_none());
    let init = parser
        .parse_line(
            r#"{"type":"system","subtype":"init","session_id":"s-1","model":"claude-sonnet-4-6","tools":["Read","Bash"],"claude_code_version":"2.1.0"}"#,
        )
        .unwrap();
    assert_eq!(init.action, ActionType::Init);
    assert_eq!(parser.detected_format(), Some("claude-cli"));

    // Once locked, Codex lines are no longer recognized
    let other = parser.parse_line(r#"{"type":"turn.started"}"#);
    assert!(other.map(|e| e.action != ActionType::TurnStart).unwrap_or(true));
}

#[test]
fn buffer_aggregates_parsed_sessions() {
    let buffer = EventBuffer::new(100);
    let mut parser = create_parser(ParserKind::Claude);
    for line in [
        r#"{"type":"system","subtype":"init","session_id":"abcdef123456","model":"m"}"#,
        r#"{"type":"result","subtype":"success","session_id":"abcdef123456","total_cost_usd":0.0125,"num_turns":2,"duration_ms":1500,"usage":{"input_tokens":10,"output_tokens":5}}"#,
    ] {
        if let Some(event) = parser.parse_line(line) {
            buffer.push(event);
        }
    }

    let sessions = buffer.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].display_name, "abcdef12");
    assert_eq!(sessions[0].event_count, 2);
    assert!((sessions[0].total_cost - 0.0125).abs() < 1e-9);
}
