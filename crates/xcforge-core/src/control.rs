//! Simulator control commands and exit-code classification.
//!
//! `simctl` conflates several conditions into the same exit status, so a
//! zero/nonzero check alone is never enough: exit 149 with an "Unable to
//! boot device in current state" message means the device already satisfies
//! the goal, and exit 164 means the identifier resolved to nothing. This
//! module issues the boot/shutdown/install commands and classifies their
//! raw output into a small closed [`ControlOutcome`] set that the
//! orchestrators can branch on.

use std::sync::Arc;

use tracing::debug;

use crate::command::shell_quote;
use crate::exec::{CommandExecutor, CommandOutput, ExecError, ExecOptions};
use crate::ident::{AppPath, DeviceId};

/// Exit code `simctl` uses when the device is already in the requested
/// state (accompanied by an "Unable to … current state" stderr message).
pub const ALREADY_IN_STATE_EXIT: i32 = 149;

/// Exit code `simctl` uses when the device identifier does not resolve.
pub const INVALID_DEVICE_EXIT: i32 = 164;

/// Classified outcome of a state-transition command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The command ran and the transition was applied.
    Applied,
    /// The device was already in the requested state; the command was
    /// issued but had no effect, which counts as success.
    AlreadyInState,
    /// The identifier did not resolve to a device.
    NotFound,
    /// Any other failure; carries raw stderr for diagnostics.
    Failed { stderr: String },
}

/// Outcome of an install command (no already-in-state case exists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// Nonzero exit; `stderr` falls back to a generic message when the
    /// tool printed nothing.
    Failed { stderr: String },
}

/// Issues boot/shutdown commands against a specific device.
pub struct SimulatorControl {
    executor: Arc<dyn CommandExecutor>,
    options: ExecOptions,
}

impl SimulatorControl {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            options: ExecOptions::default(),
        }
    }

    /// `xcrun simctl boot "<device>"`.
    pub async fn boot(&self, device: &DeviceId) -> Result<ControlOutcome, ExecError> {
        let command = format!("xcrun simctl boot {}", shell_quote(device.as_str()));
        let output = self.executor.run(&command, &self.options).await?;
        let outcome = classify_transition(&output);
        debug!(device = %device, ?outcome, "boot command classified");
        Ok(outcome)
    }

    /// `xcrun simctl shutdown "<device>"`.
    pub async fn shutdown(&self, device: &DeviceId) -> Result<ControlOutcome, ExecError> {
        let command = format!("xcrun simctl shutdown {}", shell_quote(device.as_str()));
        let output = self.executor.run(&command, &self.options).await?;
        let outcome = classify_transition(&output);
        debug!(device = %device, ?outcome, "shutdown command classified");
        Ok(outcome)
    }
}

/// Installs an app bundle onto a booted device.
pub struct AppInstaller {
    executor: Arc<dyn CommandExecutor>,
    options: ExecOptions,
}

impl AppInstaller {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            options: ExecOptions::default(),
        }
    }

    /// `xcrun simctl install "<device>" "<app>"`.
    pub async fn install(
        &self,
        device: &DeviceId,
        app: &AppPath,
    ) -> Result<InstallOutcome, ExecError> {
        let command = format!(
            "xcrun simctl install {} {}",
            shell_quote(device.as_str()),
            shell_quote(app.as_str())
        );
        let output = self.executor.run(&command, &self.options).await?;
        if output.success() {
            return Ok(InstallOutcome::Installed);
        }
        let stderr = if output.stderr.trim().is_empty() {
            format!("install failed with exit code {:?}", output.exit_code)
        } else {
            output.stderr
        };
        Ok(InstallOutcome::Failed { stderr })
    }
}

/// Map a boot/shutdown command's raw output onto [`ControlOutcome`].
///
/// Exit code conventions (mirrored for boot and shutdown):
/// - `0`: transition applied
/// - `149` + "current state" stderr: already satisfied, still a success
/// - `164`: invalid device
/// - anything else: failure, stderr carried verbatim
pub fn classify_transition(output: &CommandOutput) -> ControlOutcome {
    match output.exit_code {
        Some(0) if !output.timed_out => ControlOutcome::Applied,
        Some(ALREADY_IN_STATE_EXIT) if output.stderr.contains("current state") => {
            ControlOutcome::AlreadyInState
        }
        Some(INVALID_DEVICE_EXIT) => ControlOutcome::NotFound,
        _ => ControlOutcome::Failed {
            stderr: output.stderr.clone(),
        },
    }
}
