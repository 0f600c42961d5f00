//! Tool protocol and client transport.
//!
//! Operations are exposed as named tools over a Unix socket using a
//! JSON-over-newlines protocol: each message is a single line of JSON.
//! [`ToolRequest`] travels client → server, [`ToolReply`] (a request id,
//! a completion timestamp, and the tagged [`ToolResponse`]) travels back.
//!
//! Request payloads are raw wire strings; the server validates them
//! through the smart constructors before anything touches an external
//! tool, so malformed input turns into [`ToolResponse::Error`] without a
//! single shell invocation.
//!
//! # Socket Location
//!
//! The socket lives at `~/.xcforge/xcforge.sock`; use [`socket_path`] for
//! the default and pass an override where a custom location is needed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use uuid::Uuid;

use crate::device::SimulatorInfo;
use crate::diagnostics::BuildIssue;
use crate::ops::boot::BootOutcome;
use crate::ops::build::BuildOutcome;
use crate::ops::install::InstallOutcome;
use crate::ops::shutdown::ShutdownOutcome;
use crate::ops::test::TestOutcome;
use crate::test_results::TestSummary;

/// Errors that can occur during protocol transport.
#[derive(Error, Debug)]
pub enum IpcError {
    /// An I/O error occurred (connection, read, write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server closed the connection before replying.
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,
}

/// Returns the xcforge directory path (`~/.xcforge/`).
///
/// Creates the directory if it doesn't exist.
///
/// # Panics
///
/// Panics if the home directory cannot be determined.
pub fn xcforge_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".xcforge");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns the default Unix socket path (`~/.xcforge/xcforge.sock`).
pub fn socket_path() -> PathBuf {
    xcforge_dir().join("xcforge.sock")
}

fn default_configuration() -> String {
    "Debug".to_string()
}

fn default_platform() -> String {
    "iOS".to_string()
}

fn default_true() -> bool {
    true
}

/// A tool invocation sent from client to server.
///
/// Serialized as JSON with a `type` tag discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolRequest {
    /// Boot a simulator by UDID or name.
    BootSimulator { device_id: String },

    /// Shut down a simulator by UDID or name.
    ShutdownSimulator { device_id: String },

    /// Install an app bundle; targets the booted device when no id is
    /// given.
    InstallApp {
        app_path: String,
        #[serde(default)]
        device_id: Option<String>,
    },

    /// List simulators, optionally filtered by platform and/or state.
    ListSimulators {
        #[serde(default)]
        platform: Option<String>,
        #[serde(default)]
        state: Option<String>,
    },

    /// Run `xcodebuild … build`.
    Build {
        project_path: String,
        /// True for an `.xcworkspace`, false for an `.xcodeproj`.
        #[serde(default)]
        workspace: bool,
        #[serde(default)]
        scheme: Option<String>,
        #[serde(default = "default_configuration")]
        configuration: String,
        #[serde(default = "default_platform")]
        platform: String,
        /// Target the simulator device class (the default) or hardware.
        #[serde(default = "default_true")]
        simulator: bool,
        /// Build all architectures instead of only the host's.
        #[serde(default)]
        universal: bool,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        derived_data_path: Option<String>,
    },

    /// Run `xcodebuild … test` and parse the results.
    Test {
        project_path: String,
        #[serde(default)]
        workspace: bool,
        #[serde(default)]
        scheme: Option<String>,
        #[serde(default = "default_configuration")]
        configuration: String,
        #[serde(default = "default_platform")]
        platform: String,
        #[serde(default = "default_true")]
        simulator: bool,
        #[serde(default)]
        universal: bool,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        derived_data_path: Option<String>,
        #[serde(default)]
        result_bundle_path: Option<String>,
        #[serde(default)]
        only_testing: Vec<String>,
    },

    /// Enumerate the registered tools.
    ListTools,
}

/// Describes one registered tool for discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// A tool result sent from server to client.
///
/// Serialized as JSON with a `type` tag discriminator. Failure variants
/// carry a rendered, contextful message, never a stack trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolResponse {
    Boot {
        outcome: BootOutcome,
        device_id: String,
        device_name: Option<String>,
        message: String,
    },

    Shutdown {
        outcome: ShutdownOutcome,
        device_id: String,
        device_name: Option<String>,
        message: String,
    },

    Install {
        outcome: InstallOutcome,
        app_name: String,
        device_name: Option<String>,
        message: String,
    },

    List {
        devices: Vec<SimulatorInfo>,
    },

    Build {
        outcome: BuildOutcome,
        exit_code: Option<i32>,
        issues: Vec<BuildIssue>,
        message: Option<String>,
    },

    Test {
        outcome: TestOutcome,
        summary: Option<TestSummary>,
        issues: Vec<BuildIssue>,
        result_bundle_path: String,
        message: Option<String>,
    },

    Tools {
        tools: Vec<ToolDescriptor>,
    },

    /// Validation failures, missing dependencies, malformed requests.
    Error {
        message: String,
    },
}

/// Reply envelope: the response plus per-request bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReply {
    pub request_id: Uuid,
    pub completed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub response: ToolResponse,
}

impl ToolReply {
    pub fn now(response: ToolResponse) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            completed_at: Utc::now(),
            response,
        }
    }
}

/// Client side of the tool protocol.
pub struct IpcClient {
    reader: BufReader<UnixStream>,
}

impl IpcClient {
    /// Connect to a running server's socket.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Send one request and wait for its reply.
    pub async fn send(&mut self, request: &ToolRequest) -> Result<ToolReply, IpcError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.reader.get_mut().write_all(line.as_bytes()).await?;

        let mut reply_line = String::new();
        let n = self.reader.read_line(&mut reply_line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }
        Ok(serde_json::from_str(&reply_line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip_through_tagged_json() {
        let request = ToolRequest::InstallApp {
            app_path: "/tmp/MyApp.app".to_string(),
            device_id: Some("UDID-1".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"InstallApp\""));
        let back: ToolRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ToolRequest::InstallApp { .. }));
    }

    #[test]
    fn build_request_defaults_apply() {
        let request: ToolRequest =
            serde_json::from_str(r#"{"type": "Build", "project_path": "/p/App.xcodeproj"}"#)
                .unwrap();
        match request {
            ToolRequest::Build {
                configuration,
                platform,
                simulator,
                universal,
                workspace,
                ..
            } => {
                assert_eq!(configuration, "Debug");
                assert_eq!(platform, "iOS");
                assert!(simulator);
                assert!(!universal);
                assert!(!workspace);
            }
            other => panic!("expected Build, got {other:?}"),
        }
    }

    #[test]
    fn reply_envelope_flattens_response() {
        let reply = ToolReply::now(ToolResponse::Error {
            message: "nope".to_string(),
        });
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("\"type\":\"Error\""));
        assert!(json.contains("request_id"));
        let back: ToolReply = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.response, ToolResponse::Error { .. }));
    }

    #[test]
    fn response_roundtrip_with_outcome_payload() {
        let response = ToolResponse::Boot {
            outcome: BootOutcome::AlreadyBooted,
            device_id: "UDID-1".to_string(),
            device_name: Some("iPhone 16".to_string()),
            message: "Simulator iPhone 16 (UDID-1) is already booted".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"outcome\":\"already_booted\""));
        let back: ToolResponse = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            ToolResponse::Boot {
                outcome: BootOutcome::AlreadyBooted,
                ..
            }
        ));
    }
}
