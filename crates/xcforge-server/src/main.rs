use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, Instrument};

mod server;
use server::ServerState;

use xcforge_core::config::XcforgeConfig;
use xcforge_core::exec::ShellExecutor;
use xcforge_core::ipc::{socket_path, xcforge_dir, ToolReply, ToolResponse};

#[derive(Parser)]
#[command(name = "xcforge-server")]
#[command(about = "Tool server exposing simulator and xcodebuild operations")]
struct Args {
    /// Socket path override (default: ~/.xcforge/xcforge.sock)
    #[arg(short, long, env = "XCFORGE_SOCKET")]
    socket: Option<PathBuf>,

    /// Directory for the server log file (default: ~/.xcforge/logs)
    #[arg(long, env = "XCFORGE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let log_dir = args.log_dir.unwrap_or_else(|| {
        let dir = xcforge_dir().join("logs");
        std::fs::create_dir_all(&dir).ok();
        dir
    });
    let file_appender = tracing_appender::rolling::never(&log_dir, "xcforge-server.log");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,xcforge_core=debug".into()),
        )
        .with_writer(file_appender)
        .with_ansi(false)
        .init();

    let config = XcforgeConfig::load();
    info!(timeout = ?config.command_timeout_secs, "Starting xcforge-server");

    let state = Arc::new(Mutex::new(ServerState::new(
        Arc::new(ShellExecutor),
        config,
    )));

    // Remove existing socket
    let sock_path = args.socket.unwrap_or_else(socket_path);
    let _ = std::fs::remove_file(&sock_path);

    let listener = UnixListener::bind(&sock_path)?;
    info!(path = %sock_path.display(), "Listening on socket");

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = run_accept_loop(&listener, state) => {
            if let Err(e) = result {
                info!(error = %e, "Accept loop exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }

    let _ = std::fs::remove_file(&sock_path);
    info!("Server stopped");
    Ok(())
}

async fn run_accept_loop(
    listener: &UnixListener,
    state: Arc<Mutex<ServerState>>,
) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                debug!(error = %e, "Connection closed with error");
            }
        });
    }
}

/// Serve one client: newline-delimited JSON requests, one reply per line.
///
/// Operations run one at a time: the state lock is held across the
/// orchestrator call, so concurrent clients queue rather than interleave
/// mutating commands.
async fn handle_connection(
    stream: UnixStream,
    state: Arc<Mutex<ServerState>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<xcforge_core::ipc::ToolRequest>(trimmed) {
            Ok(request) => {
                let span = info_span!("tool_request");
                async {
                    info!(request = %request_name(&request), "dispatching");
                    state.lock().await.handle_request(request).await
                }
                .instrument(span)
                .await
            }
            Err(e) => ToolResponse::Error {
                message: format!("malformed request: {e}"),
            },
        };

        let reply = ToolReply::now(response);
        let mut payload = serde_json::to_string(&reply).unwrap_or_else(|e| {
            format!("{{\"type\":\"Error\",\"message\":\"encode failure: {e}\"}}")
        });
        payload.push('\n');
        reader.get_mut().write_all(payload.as_bytes()).await?;
    }
}

fn request_name(request: &xcforge_core::ipc::ToolRequest) -> &'static str {
    use xcforge_core::ipc::ToolRequest::*;
    match request {
        BootSimulator { .. } => "boot_simulator",
        ShutdownSimulator { .. } => "shutdown_simulator",
        InstallApp { .. } => "install_app",
        ListSimulators { .. } => "list_simulators",
        Build { .. } => "build",
        Test { .. } => "test",
        ListTools => "list_tools",
    }
}
