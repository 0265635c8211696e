//! agentstream CLI - live, normalized view of Claude and Codex agent activity

use agentstream::render::RenderMode;
use agentstream::{AgentEvent, Config, Core, ParserKind, Source};
use anyhow::Context;
use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "agentstream")]
#[command(version)]
#[command(about = "Stream Claude and Codex agent activity as one normalized feed", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.agentstream/config.toml")]
    config: PathBuf,

    /// Initialize a new config file with defaults
    #[arg(long)]
    init: bool,

    /// Replay the built-in demo script
    #[arg(long)]
    demo: bool,

    /// Read standard input with the given parser (claude, claude-sse,
    /// claude-interactive, codex, codex-interactive, auto)
    #[arg(long, value_name = "FORMAT")]
    stdin: Option<String>,

    /// Follow a file with the given parser (repeatable)
    #[arg(long, num_args = 2, value_names = ["FORMAT", "PATH"], action = clap::ArgAction::Append)]
    file: Vec<String>,

    /// Run a shell command and parse its stdout (repeatable)
    #[arg(long, num_args = 2, value_names = ["FORMAT", "CMD"], action = clap::ArgAction::Append)]
    exec: Vec<String>,

    /// Discover and tail live session logs under the configured roots
    #[arg(long)]
    watch: bool,

    /// Serve the event buffer over HTTP (SSE + JSON)
    #[arg(long)]
    serve: bool,

    /// Override server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Replay followed files from the beginning
    #[arg(long)]
    from_start: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parser_kind(key: &str) -> anyhow::Result<ParserKind> {
    key.parse::<ParserKind>().with_context(|| {
        "expected one of: claude, claude-sse, claude-interactive, codex, codex-interactive, auto"
    })
}

fn build_sources(args: &Args, core: &Core) -> anyhow::Result<Vec<Source>> {
    let mut sources = Vec::new();

    if args.demo {
        sources.push(Source::Demo);
    }
    if let Some(format) = &args.stdin {
        sources.push(Source::Stdin {
            parser: parser_kind(format)?,
        });
    }
    for pair in args.file.chunks(2) {
        if let [format, path] = pair {
            sources.push(core.file_source(PathBuf::from(path), parser_kind(format)?));
        }
    }
    for pair in args.exec.chunks(2) {
        if let [format, command] = pair {
            sources.push(Source::Exec {
                command: command.clone(),
                parser: parser_kind(format)?,
            });
        }
    }
    if args.watch {
        sources.push(core.watch_source());
    }

    if sources.is_empty() {
        if std::io::stdin().is_terminal() {
            tracing::info!("No source given and stdin is a terminal, starting demo mode");
            sources.push(Source::Demo);
        } else {
            sources.push(Source::Stdin {
                parser: ParserKind::Auto,
            });
        }
    }
    Ok(sources)
}

/// Write one event to stdout. An error means stdout is gone (closed pipe).
fn print_event(mode: RenderMode, event: &AgentEvent) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", mode.render(event))?;
    out.flush()
}

/// Run sources on this runtime and print until they all end or Ctrl+C.
async fn run_console(core: &Core, sources: Vec<Source>, mode: RenderMode) -> anyhow::Result<()> {
    let (tx, mut rx) = core.channel();
    let handles: Vec<_> = sources.into_iter().map(|s| s.spawn(tx.clone())).collect();
    drop(tx);

    let shutdown = agentstream::api::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = rx.recv() => match received {
                Some(event) => {
                    let visible = core.buffer().is_visible(&event.session_id);
                    core.buffer().push(event.clone());
                    if visible && print_event(mode, &event).is_err() {
                        tracing::debug!("stdout closed, stopping");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

/// Run sources on the background watcher thread and serve the buffer over HTTP,
/// echoing events to the console as they arrive.
async fn run_server(core: Arc<Core>, sources: Vec<Source>, mode: RenderMode) -> anyhow::Result<()> {
    let mut live = core.buffer().subscribe();
    core.start_background(sources)
        .context("Failed to start background sources")?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server_core = core.clone();
    let server = tokio::spawn(async move {
        server_core
            .start_api_server(async move {
                tokio::select! {
                    _ = agentstream::api::shutdown_signal() => {},
                    _ = stop_rx => {},
                }
            })
            .await
    });
    tokio::pin!(server);

    let mut console_open = true;
    let result = loop {
        tokio::select! {
            joined = &mut server => break joined.context("HTTP server task failed")?,
            received = live.recv(), if console_open => match received {
                Ok((_, event)) => {
                    if core.buffer().is_visible(&event.session_id)
                        && print_event(mode, &event).is_err()
                    {
                        console_open = false;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Console fell behind, skipped {} events", n);
                }
                Err(RecvError::Closed) => console_open = false,
            },
        }
    };

    let _ = stop_tx.send(());
    core.stop_background();
    result.context("HTTP server failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for events
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("agentstream={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Handle --init flag
    if args.init {
        let config_path = agentstream::config::expand_path(&args.config);
        if config_path.exists() {
            tracing::warn!("Config file already exists: {}", config_path.display());
            return Ok(());
        }
        Config::create_default(&config_path)?;
        tracing::info!("Created default config at: {}", config_path.display());
        return Ok(());
    }

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.from_start {
        config.stream.from_start = true;
    }

    let core = Core::new(config);
    let sources = build_sources(&args, &core)?;
    let mode = if args.json {
        RenderMode::Json
    } else {
        RenderMode::Plain
    };

    if args.serve {
        run_server(Arc::new(core), sources, mode).await
    } else {
        run_console(&core, sources, mode).await
    }
}
