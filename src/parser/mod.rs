//! Line-oriented stream parsers
//!
//! This module contains one stateful parser per agent wire format plus an
//! auto-detecting wrapper. Every parser turns exactly one raw line into at most
//! one normalized [`AgentEvent`](crate::event::AgentEvent).

pub mod auto_detect;
pub mod claude_cli;
pub mod claude_interactive;
pub mod claude_sse;
pub mod codex_interactive;
pub mod codex_jsonl;
pub mod common;

pub use auto_detect::AutoDetectParser;
pub use claude_cli::ClaudeCliParser;
pub use claude_interactive::ClaudeInteractiveParser;
pub use claude_sse::ClaudeSseParser;
pub use codex_interactive::CodexInteractiveParser;
pub use codex_jsonl::CodexJsonlParser;

use crate::error::CoreError;
use crate::event::AgentEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parser trait for line-oriented agent formats.
///
/// Implementations own all of their accumulation state (session id, SSE buffers,
/// cached names) and must never panic on malformed input.
pub trait LineParser: Send {
    /// Consume one raw line (with or without its line terminator).
    fn parse_line(&mut self, line: &str) -> Option<AgentEvent>;

    /// Stable format tag of this parser
    fn name(&self) -> &'static str;

    /// Format actually in use. Only the auto-detector can answer `None`.
    fn detected_format(&self) -> Option<&'static str> {
        Some(self.name())
    }
}

/// Parser selection key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    /// Claude CLI `--output-format stream-json`
    Claude,
    ClaudeSse,
    ClaudeInteractive,
    /// Codex `exec --json`
    Codex,
    CodexInteractive,
    #[default]
    Auto,
}

impl ParserKind {
    /// Resolve a selection key. Anything unrecognized selects auto-detection.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "claude" => ParserKind::Claude,
            "claude-sse" => ParserKind::ClaudeSse,
            "claude-interactive" => ParserKind::ClaudeInteractive,
            "codex" => ParserKind::Codex,
            "codex-interactive" => ParserKind::CodexInteractive,
            _ => ParserKind::Auto,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ParserKind::Claude => "claude",
            ParserKind::ClaudeSse => "claude-sse",
            ParserKind::ClaudeInteractive => "claude-interactive",
            ParserKind::Codex => "codex",
            ParserKind::CodexInteractive => "codex-interactive",
            ParserKind::Auto => "auto",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Strict lookup: unlike [`ParserKind::from_key`], unknown keys are an error.
impl FromStr for ParserKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = ParserKind::from_key(s);
        if kind == ParserKind::Auto && !s.trim().eq_ignore_ascii_case("auto") {
            return Err(CoreError::NotFound("Parser", s.to_string()));
        }
        Ok(kind)
    }
}

/// Build a fresh parser instance. Instances never share state.
pub fn create_parser(kind: ParserKind) -> Box<dyn LineParser> {
    match kind {
        ParserKind::Claude => Box::new(ClaudeCliParser::new()),
        ParserKind::ClaudeSse => Box::new(ClaudeSseParser::new()),
        ParserKind::ClaudeInteractive => Box::new(ClaudeInteractiveParser::new()),
        ParserKind::Codex => Box::new(CodexJsonlParser::new()),
        ParserKind::CodexInteractive => Box::new(CodexInteractiveParser::new()),
        ParserKind::Auto => Box::new(AutoDetectParser::new()),
    }
}

/// Convenience: [`create_parser`] from a raw selection key.
pub fn parser_for_key(key: &str) -> Box<dyn LineParser> {
    create_parser(ParserKind::from_key(key))
}
