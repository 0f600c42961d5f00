//! CLI client for the xcforge tool server.
//!
//! Sends one tool request to a running `xcforge-server` over its Unix
//! socket and renders the reply.
//!
//! # Usage
//!
//! ```bash
//! # Boot a simulator by name or UDID
//! xcforge boot "iPhone 16 Pro"
//!
//! # Shut it down again (idempotent)
//! xcforge shutdown "iPhone 16 Pro"
//!
//! # Install an app on the booted simulator
//! xcforge install ./build/MyApp.app
//!
//! # List booted iOS simulators
//! xcforge list --platform iOS --state Booted
//!
//! # Build a workspace scheme for the iOS simulator
//! xcforge build ./App.xcworkspace --workspace --scheme App
//!
//! # Run one test class and show the parsed summary
//! xcforge test ./App.xcodeproj --scheme App --only-testing AppTests/CartTests
//!
//! # Machine-readable output
//! xcforge --format json list
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use xcforge_core::ipc::{socket_path, IpcClient, ToolRequest, ToolResponse};

/// CLI client for the xcforge tool server.
#[derive(Parser)]
#[command(name = "xcforge")]
#[command(about = "Drive simulators and xcodebuild through a running xcforge-server")]
#[command(version)]
struct Cli {
    /// Socket path override (default: ~/.xcforge/xcforge.sock)
    #[arg(short, long, env = "XCFORGE_SOCKET")]
    socket: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Boot a simulator by UDID or name
    Boot {
        /// Device UDID or display name
        device: String,
    },

    /// Shut down a simulator by UDID or name
    Shutdown {
        /// Device UDID or display name
        device: String,
    },

    /// Install a .app bundle onto a simulator
    Install {
        /// Path to the .app bundle
        app_path: String,
        /// Target device; defaults to the booted simulator
        #[arg(short, long)]
        device: Option<String>,
    },

    /// List simulators
    List {
        /// Filter by platform (iOS, tvOS, watchOS, visionOS)
        #[arg(short, long)]
        platform: Option<String>,
        /// Filter by state (Booted, Shutdown, ...)
        #[arg(short = 'S', long)]
        state: Option<String>,
    },

    /// Build a scheme with xcodebuild
    Build {
        /// Path to the .xcodeproj or .xcworkspace
        project_path: String,
        /// Treat the path as a workspace
        #[arg(short, long)]
        workspace: bool,
        #[arg(short = 'c', long, default_value = "Debug")]
        configuration: String,
        #[arg(short = 'p', long, default_value = "iOS")]
        platform: String,
        #[arg(long)]
        scheme: Option<String>,
        /// Target hardware instead of the simulator
        #[arg(long)]
        device_class: bool,
        /// Build all architectures instead of only the host's
        #[arg(short, long)]
        universal: bool,
        /// Pin the destination to a specific device
        #[arg(short, long)]
        device: Option<String>,
        #[arg(long)]
        derived_data_path: Option<String>,
    },

    /// Run tests with xcodebuild and parse the results
    Test {
        /// Path to the .xcodeproj or .xcworkspace
        project_path: String,
        #[arg(short, long)]
        workspace: bool,
        #[arg(short = 'c', long, default_value = "Debug")]
        configuration: String,
        #[arg(short = 'p', long, default_value = "iOS")]
        platform: String,
        #[arg(long)]
        scheme: Option<String>,
        #[arg(short, long)]
        device: Option<String>,
        #[arg(long)]
        derived_data_path: Option<String>,
        /// Result bundle path (generated when omitted)
        #[arg(long)]
        result_bundle_path: Option<String>,
        /// Restrict the run: target, class, or single test (repeatable)
        #[arg(long = "only-testing")]
        only_testing: Vec<String>,
    },

    /// List the tools the server exposes
    Tools,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Connection(String),
    ToolFailed(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Connection(_) => ExitCode::from(2),
            CliError::ToolFailed(_) => ExitCode::from(1),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Connection(msg) => {
                write!(f, "Connection error: {msg} (is xcforge-server running?)")
            }
            CliError::ToolFailed(msg) => write!(f, "{msg}"),
        }
    }
}

fn to_request(command: Command) -> ToolRequest {
    match command {
        Command::Boot { device } => ToolRequest::BootSimulator { device_id: device },
        Command::Shutdown { device } => ToolRequest::ShutdownSimulator { device_id: device },
        Command::Install { app_path, device } => ToolRequest::InstallApp {
            app_path,
            device_id: device,
        },
        Command::List { platform, state } => ToolRequest::ListSimulators { platform, state },
        Command::Build {
            project_path,
            workspace,
            configuration,
            platform,
            scheme,
            device_class,
            universal,
            device,
            derived_data_path,
        } => ToolRequest::Build {
            project_path,
            workspace,
            scheme,
            configuration,
            platform,
            simulator: !device_class,
            universal,
            device_id: device,
            derived_data_path,
        },
        Command::Test {
            project_path,
            workspace,
            configuration,
            platform,
            scheme,
            device,
            derived_data_path,
            result_bundle_path,
            only_testing,
        } => ToolRequest::Test {
            project_path,
            workspace,
            scheme,
            configuration,
            platform,
            simulator: true,
            universal: false,
            device_id: device,
            derived_data_path,
            result_bundle_path,
            only_testing,
        },
        Command::Tools => ToolRequest::ListTools,
        Command::Completions { .. } => unreachable!("handled before connecting"),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "xcforge", &mut std::io::stdout());
        return Ok(());
    }

    let path = cli.socket.unwrap_or_else(socket_path);
    let mut client = IpcClient::connect(&path)
        .await
        .map_err(|e| CliError::Connection(e.to_string()))?;

    let request = to_request(cli.command);
    let reply = client
        .send(&request)
        .await
        .map_err(|e| CliError::Connection(e.to_string()))?;

    if cli.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reply)
                .map_err(|e| CliError::Connection(e.to_string()))?
        );
        return match &reply.response {
            ToolResponse::Error { message } => Err(CliError::ToolFailed(message.clone())),
            _ => Ok(()),
        };
    }

    render_text(reply.response)
}

fn render_text(response: ToolResponse) -> Result<(), CliError> {
    match response {
        ToolResponse::Boot { message, .. } | ToolResponse::Shutdown { message, .. } => {
            println!("{message}");
            Ok(())
        }
        ToolResponse::Install { message, .. } => {
            println!("{message}");
            Ok(())
        }
        ToolResponse::List { devices } => {
            for device in devices {
                println!(
                    "{}  {}  [{}] ({})",
                    device.udid, device.name, device.state, device.platform
                );
            }
            Ok(())
        }
        ToolResponse::Build {
            outcome,
            exit_code,
            issues,
            message,
        } => {
            for issue in &issues {
                let location = match (&issue.file, issue.line, issue.column) {
                    (Some(file), Some(line), Some(column)) => {
                        format!("{file}:{line}:{column}: ")
                    }
                    _ => String::new(),
                };
                println!("{location}{:?}: {}", issue.severity, issue.message);
            }
            match message {
                None => {
                    println!("Build succeeded ({outcome:?})");
                    Ok(())
                }
                Some(message) => Err(CliError::ToolFailed(format!(
                    "Build failed (exit {exit_code:?}): {message}"
                ))),
            }
        }
        ToolResponse::Test {
            summary,
            result_bundle_path,
            message,
            ..
        } => {
            if let Some(summary) = &summary {
                println!(
                    "{} passed, {} failed",
                    summary.passed, summary.failed
                );
                for test in &summary.failing_tests {
                    println!("  ✘ {test}");
                }
            }
            println!("Result bundle: {result_bundle_path}");
            match summary {
                Some(summary) if !summary.success => {
                    Err(CliError::ToolFailed("Tests failed".to_string()))
                }
                None => match message {
                    Some(message) => Err(CliError::ToolFailed(message)),
                    None => Ok(()),
                },
                _ => Ok(()),
            }
        }
        ToolResponse::Tools { tools } => {
            for tool in tools {
                println!("{}  {}", tool.name, tool.description);
            }
            Ok(())
        }
        ToolResponse::Error { message } => Err(CliError::ToolFailed(message)),
    }
}
