//! vrlink client
//!
//! Keeps a persistent websocket session to the tracking and haptics server,
//! polls it at the configured frame rate and accepts commands on stdin.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vl_client::restart::restart_process;
use vl_client::{
    FrameLoop, SendOutcome, SessionExit, SessionHandle, SessionManager, SessionOptions,
    StatusSink, WsConnector,
};
use vl_core::config::{self, BackoffConfig, ClientConfig};
use vl_core::log::RingLog;
use vl_core::RestartPolicy;
use vl_protocol::{Command, Outbound};

#[derive(Parser)]
#[command(name = "vrlink")]
#[command(about = "vrlink client - streams tracking state from a VR server and sends haptics")]
#[command(version)]
struct Args {
    /// Server hostname
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Transport scheme (ws or wss)
    #[arg(long)]
    transport: Option<String>,

    /// Subprotocol to offer; repeat for several
    #[arg(long = "protocol")]
    protocols: Vec<String>,

    /// Fixed delay before reconnecting, in milliseconds
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// Reconnect within this process after a disconnect instead of restarting it
    #[arg(long, conflicts_with = "reload_on_disconnect")]
    reconnect_in_place: bool,

    /// Restart the whole process after a disconnect (the default)
    #[arg(long)]
    reload_on_disconnect: bool,

    /// Frames polled per second
    #[arg(long)]
    fps: Option<u32>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("vrlink client starting...");

    let config = load_client_config(&args)?;
    config.validate().context("Invalid client configuration")?;

    let endpoint = config.endpoint();
    if endpoint.is_secure() && !cfg!(feature = "tls") {
        tracing::warn!(
            "{} needs TLS support; rebuild with `--features tls`",
            endpoint
        );
    }
    tracing::info!(
        "Connecting to {} (restart policy: {}, {} fps)",
        endpoint,
        config.restart_policy,
        config.frame_rate
    );

    let log = Arc::new(RingLog::new());
    let cancel = CancellationToken::new();

    let manager = SessionManager::new(
        SessionOptions::from_config(&config),
        WsConnector::new(),
        log.clone(),
    );
    let (session, session_task) = manager.spawn(cancel.child_token());

    let frame_loop = FrameLoop::new(session.clone(), config.frame_interval());
    let frame_cancel = cancel.child_token();
    let frames = tokio::spawn(async move {
        let mut sink = StatusSink::new();
        frame_loop.run(&mut sink, frame_cancel).await
    });

    let console = tokio::spawn(run_console(
        session.clone(),
        Arc::clone(&log),
        spawn_stdin_reader(),
        cancel.child_token(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            signal_cancel.cancel();
        }
    });

    let exit = session_task.await.context("Session task failed")?;
    cancel.cancel();

    let stats = frames.await.context("Frame loop failed")?;
    let _ = console.await;
    tracing::debug!("Frames rendered: {}", stats.rendered);

    match exit {
        SessionExit::Cancelled => {
            tracing::info!("Session closed");
            Ok(())
        }
        SessionExit::RestartRequested => {
            let error = restart_process();
            Err(error).context("Failed to restart vrlink")
        }
        SessionExit::Aborted(e) => Err(e).context("Session aborted"),
    }
}

/// Load the config file (if any) and apply command-line overrides
fn load_client_config(args: &Args) -> Result<ClientConfig> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };

    if let Some(host) = &args.host {
        config.hostname = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(transport) = &args.transport {
        config.transport = transport.clone();
    }
    if !args.protocols.is_empty() {
        config.subprotocols = args.protocols.clone();
    }
    if let Some(ms) = args.reconnect_ms {
        config.reconnect = BackoffConfig::fixed(Duration::from_millis(ms));
    }
    if args.reconnect_in_place || args.reload_on_disconnect {
        config.restart_policy = RestartPolicy::from_reload_flag(args.reload_on_disconnect);
    }
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }

    Ok(config)
}

/// Read stdin lines on a plain thread.
///
/// A blocking stdin read would otherwise hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Handle console commands until cancelled or stdin closes
async fn run_console(
    session: SessionHandle,
    log: Arc<RingLog>,
    mut lines: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "log" {
            println!("{}", log.render());
            continue;
        }

        let outcome = session.send(console_message(input));
        if outcome != SendOutcome::Sent {
            tracing::debug!("Console command '{}' not sent: {:?}", input, outcome);
        }
    }
}

/// Map one console line to an outbound message
fn console_message(input: &str) -> Outbound {
    match input {
        "haptics" => Command::SendHaptics.into(),
        "haptics_back" => Command::SendHapticsBack.into(),
        "get" => Command::GetData.into(),
        other => match serde_json::from_str::<serde_json::Value>(other) {
            Ok(value) => value.into(),
            Err(_) => other.into(),
        },
    }
}
