//! Configuration management
//!
//! Loads settings from TOML file at ~/.agentstream/config.toml

use crate::error::{CoreError, Result};
use crate::parser::ParserKind;
use crate::source::{WatchOptions, WatchRoot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// File and process streaming
    #[serde(default)]
    pub stream: StreamConfig,

    /// Session discovery
    #[serde(default)]
    pub watch: WatchConfig,

    /// Shared event history
    #[serde(default)]
    pub buffer: BufferConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: 127.0.0.1 - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// First port to try (default: 7891)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of consecutive ports to try before giving up
    #[serde(default = "default_port_span")]
    pub port_span: u16,

    /// Optional API key for authentication
    /// Required in Authorization header if set: "Authorization: Bearer <key>"
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7891
}

fn default_port_span() -> u16 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            port_span: default_port_span(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// File poll interval while waiting for new bytes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Replay existing file contents instead of starting at EOF
    #[serde(default)]
    pub from_start: bool,

    /// Capacity of the channel between sources and the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            poll_interval_ms: default_poll_interval_ms(),
            from_start: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Session discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Files modified longer ago than this are not picked up
    #[serde(default = "default_ten_minutes")]
    pub session_max_age_secs: u64,

    /// A tail with no new data for this long is retired
    #[serde(default = "default_ten_minutes")]
    pub tail_idle_timeout_secs: u64,

    #[serde(default = "default_tail_poll_interval_ms")]
    pub tail_poll_interval_ms: u64,

    /// Directories to scan
    #[serde(default = "default_roots")]
    pub roots: Vec<WatchRootConfig>,
}

/// One scanned directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRootConfig {
    pub path: PathBuf,

    /// Parser key (claude-interactive, codex-interactive, ...)
    #[serde(default = "default_root_parser")]
    pub parser: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_scan_interval() -> u64 {
    5
}

fn default_ten_minutes() -> u64 {
    600
}

fn default_tail_poll_interval_ms() -> u64 {
    150
}

fn default_root_parser() -> String {
    ParserKind::ClaudeInteractive.key().to_string()
}

fn default_true() -> bool {
    true
}

fn default_roots() -> Vec<WatchRootConfig> {
    vec![WatchRootConfig {
        path: PathBuf::from("~/.claude/projects"),
        parser: default_root_parser(),
        enabled: true,
    }]
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            scan_interval_secs: default_scan_interval(),
            session_max_age_secs: default_ten_minutes(),
            tail_idle_timeout_secs: default_ten_minutes(),
            tail_poll_interval_ms: default_tail_poll_interval_ms(),
            roots: default_roots(),
        }
    }
}

impl WatchConfig {
    /// Resolve into the options the watch source runs with.
    pub fn to_options(&self) -> WatchOptions {
        WatchOptions {
            roots: self
                .roots
                .iter()
                .filter(|r| r.enabled)
                .map(|r| WatchRoot {
                    path: expand_path(&r.path),
                    parser: ParserKind::from_key(&r.parser),
                })
                .collect(),
            scan_interval: Duration::from_secs(self.scan_interval_secs.max(1)),
            max_age: Duration::from_secs(self.session_max_age_secs),
            idle_timeout: Duration::from_secs(self.tail_idle_timeout_secs),
            poll_interval: Duration::from_millis(self.tail_poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

fn default_max_events() -> usize {
    crate::buffer::DEFAULT_MAX_EVENTS
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            max_events: default_max_events(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Load from `path` when it exists, defaults otherwise; environment overrides
    /// are applied either way.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());
        let mut config = if expanded_path.exists() {
            Self::from_file(&expanded_path)?
        } else {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                expanded_path.display()
            );
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|p| p.join(".agentstream").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".agentstream/config.toml"))
    }

    /// Apply environment variable overrides (server options only)
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("AGENTSTREAM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("AGENTSTREAM_SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid AGENTSTREAM_SERVER_PORT: {}", port),
            }
        }
        if let Some(key) = var("AGENTSTREAM_SERVER_API_KEY") {
            self.server.api_key = if key.is_empty() { None } else { Some(key) };
        }
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# agentstream configuration

[server]
# Host to bind to
# "127.0.0.1" = localhost only (recommended)
host = "127.0.0.1"

# First port to try; the next `port_span - 1` ports are tried if it is taken
port = 7891
port_span = 10

# Optional API key for authentication
# If set, clients must send: Authorization: Bearer <api_key>
# api_key = "your-secret-key"

[stream]
# How often followed files are polled for new bytes
poll_interval_ms = 100
# Replay existing file contents instead of starting at the end
from_start = false
channel_capacity = 1024

[watch]
scan_interval_secs = 5
# Only sessions modified within this window are tailed
session_max_age_secs = 600
# Tails with no new data for this long are retired
tail_idle_timeout_secs = 600
tail_poll_interval_ms = 150

[[watch.roots]]
path = "~/.claude/projects"
parser = "claude-interactive"
enabled = true

# Codex rollout logs:
# [[watch.roots]]
# path = "~/.codex/sessions"
# parser = "codex-interactive"
# enabled = true

[buffer]
max_events = 20000
"#;

        let path = expand_path(path.as_ref());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
