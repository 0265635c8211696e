//! Standard-input adapter

use super::{emit, emit_system, EventSender};
use crate::event::ActionType;
use crate::parser::{create_parser, ParserKind};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Parse process stdin until EOF.
pub async fn run_stdin(parser: ParserKind, tx: &EventSender) {
    run_reader(tokio::io::stdin(), "stdin", parser, tx).await
}

/// Parse any async reader line by line until EOF.
pub async fn run_reader<R>(reader: R, label: &str, parser: ParserKind, tx: &EventSender)
where
    R: AsyncRead + Unpin,
{
    if !emit_system(
        tx,
        ActionType::StreamStart,
        format!("Reading from {} ({})", label, parser),
    )
    .await
    {
        return;
    }

    let mut parser = create_parser(parser);
    let mut reader = BufReader::new(reader);
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
                tracing::warn!("{} read failed: {}", label, e);
                if !emit_system(tx, ActionType::Error, format!("{} error: {}", label, e)).await {
                    return;
                }
                break;
            }
        }
    }

    // SSE streams may end without a trailing blank line
    if let Some(event) = parser.parse_line("") {
        if !emit(tx, event).await {
            return;
        }
    }
    emit_system(tx, ActionType::StreamEnd, format!("{} stream ended", label)).await;
}
