//! Build workflow: construct the invocation, execute, extract diagnostics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::command::{BuildCommandBuilder, ProjectRef};
use crate::destination::BuildDestination;
use crate::diagnostics::{parse_build_output, BuildIssue};
use crate::exec::{CommandExecutor, ExecOptions};
use crate::ident::DeviceId;

/// Closed outcome set for a build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

/// Closed error set for a build request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("build command failed: {stderr}")]
    BuildCommandFailed { stderr: String },
}

/// A validated build request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub project: ProjectRef,
    pub scheme: Option<String>,
    pub configuration: String,
    pub destination: BuildDestination,
    pub device: Option<DeviceId>,
    pub derived_data_path: Option<String>,
}

impl BuildRequest {
    fn to_builder(&self) -> BuildCommandBuilder {
        BuildCommandBuilder::new(
            self.project.clone(),
            self.configuration.clone(),
            self.destination,
        )
        .device(self.device.clone())
        .scheme(self.scheme.clone())
        .derived_data_path(self.derived_data_path.clone())
    }
}

#[derive(Debug, Clone)]
pub struct BuildRunResult {
    pub outcome: BuildOutcome,
    /// Deduplicated errors and warnings; populated for successful builds
    /// too (warnings survive a zero exit).
    pub issues: Vec<BuildIssue>,
    pub exit_code: Option<i32>,
    pub error: Option<BuildError>,
}

impl BuildRunResult {
    pub fn success(&self) -> bool {
        self.outcome == BuildOutcome::Succeeded
    }
}

/// Orchestrates one build request.
pub struct BuildOp {
    executor: Arc<dyn CommandExecutor>,
    options: ExecOptions,
}

impl BuildOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            options: ExecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self, request: &BuildRequest) -> BuildRunResult {
        let command = request.to_builder().build();
        debug!(scheme = ?request.scheme, destination = %request.destination, "starting build");

        let output = match self.executor.run(&command, &self.options).await {
            Ok(output) => output,
            Err(e) => {
                return BuildRunResult {
                    outcome: BuildOutcome::Failed,
                    issues: Vec::new(),
                    exit_code: None,
                    error: Some(BuildError::BuildCommandFailed {
                        stderr: e.to_string(),
                    }),
                };
            }
        };

        // Diagnostics appear on both streams depending on toolchain
        // version and beautification.
        let mut combined = output.stdout.clone();
        combined.push('\n');
        combined.push_str(&output.stderr);
        let issues = parse_build_output(&combined);

        if output.success() {
            debug!(warnings = issues.len(), "build succeeded");
            BuildRunResult {
                outcome: BuildOutcome::Succeeded,
                issues,
                exit_code: output.exit_code,
                error: None,
            }
        } else {
            debug!(exit_code = ?output.exit_code, issues = issues.len(), "build failed");
            BuildRunResult {
                outcome: BuildOutcome::Failed,
                issues,
                exit_code: output.exit_code,
                error: Some(BuildError::BuildCommandFailed {
                    stderr: output.stderr,
                }),
            }
        }
    }
}
