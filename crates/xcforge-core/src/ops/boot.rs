//! Boot workflow: `{queried} → {AlreadyTarget | CommandIssued} → {Succeeded | Failed}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::control::{ControlOutcome, SimulatorControl};
use crate::device::SimulatorState;
use crate::exec::CommandExecutor;
use crate::ident::DeviceId;
use crate::locator::SimulatorLocator;

/// Closed outcome set for a boot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootOutcome {
    /// The device transitioned to Booted because of this request.
    Booted,
    /// The device already satisfied the goal; idempotent success.
    AlreadyBooted,
    Failed,
}

/// Closed error set for a boot request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    #[error("simulator not found: {id}")]
    SimulatorNotFound { id: String },

    /// The device is mid-transition away from the goal and cannot boot.
    #[error("simulator {id} is {state} and cannot boot right now")]
    SimulatorBusy { id: String, state: SimulatorState },

    #[error("boot command failed for {id}: {stderr}")]
    BootCommandFailed { id: String, stderr: String },
}

/// Boot result: tagged outcome plus the diagnostics known at failure time.
#[derive(Debug, Clone)]
pub struct BootResult {
    pub outcome: BootOutcome,
    pub device_id: DeviceId,
    /// Display name, when the device resolved before the failure point.
    pub device_name: Option<String>,
    pub error: Option<BootError>,
}

impl BootResult {
    pub fn success(&self) -> bool {
        self.outcome != BootOutcome::Failed
    }

    /// User-facing message with whatever context is available.
    pub fn message(&self) -> String {
        let label = match &self.device_name {
            Some(name) => format!("{name} ({})", self.device_id),
            None => self.device_id.to_string(),
        };
        match (&self.outcome, &self.error) {
            (BootOutcome::Booted, _) => format!("Booted simulator {label}"),
            (BootOutcome::AlreadyBooted, _) => format!("Simulator {label} is already booted"),
            (BootOutcome::Failed, Some(error)) => error.to_string(),
            (BootOutcome::Failed, None) => format!("Boot failed for {label}"),
        }
    }
}

/// Orchestrates one boot request.
pub struct BootOp {
    locator: SimulatorLocator,
    control: SimulatorControl,
}

impl BootOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            locator: SimulatorLocator::new(executor.clone()),
            control: SimulatorControl::new(executor),
        }
    }

    /// Resolve the device, short-circuit when the goal is already met,
    /// otherwise issue the boot command and classify its outcome.
    ///
    /// A `Booting` device still gets the explicit command: the tool itself
    /// must be asked to wait for and confirm the transition. A
    /// `ShuttingDown` device is busy and fails without a command.
    pub async fn run(&self, device: &DeviceId) -> BootResult {
        let failed = |name: Option<String>, error: BootError| BootResult {
            outcome: BootOutcome::Failed,
            device_id: device.clone(),
            device_name: name,
            error: Some(error),
        };

        let info = match self.locator.find(device).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!(device = %device, "boot target not in inventory");
                return failed(
                    None,
                    BootError::SimulatorNotFound {
                        id: device.to_string(),
                    },
                );
            }
            Err(e) => {
                return failed(
                    None,
                    BootError::BootCommandFailed {
                        id: device.to_string(),
                        stderr: e.to_string(),
                    },
                );
            }
        };

        match info.state {
            SimulatorState::Booted => {
                debug!(device = %device, "already booted, skipping command");
                return BootResult {
                    outcome: BootOutcome::AlreadyBooted,
                    device_id: device.clone(),
                    device_name: Some(info.name),
                    error: None,
                };
            }
            SimulatorState::ShuttingDown => {
                return failed(
                    Some(info.name),
                    BootError::SimulatorBusy {
                        id: device.to_string(),
                        state: info.state,
                    },
                );
            }
            // Shutdown, Booting and Unknown all require the explicit
            // command; classification sorts out what actually happened.
            _ => {}
        }

        match self.control.boot(device).await {
            Ok(ControlOutcome::Applied) => BootResult {
                outcome: BootOutcome::Booted,
                device_id: device.clone(),
                device_name: Some(info.name),
                error: None,
            },
            Ok(ControlOutcome::AlreadyInState) => BootResult {
                outcome: BootOutcome::AlreadyBooted,
                device_id: device.clone(),
                device_name: Some(info.name),
                error: None,
            },
            Ok(ControlOutcome::NotFound) => failed(
                Some(info.name),
                BootError::SimulatorNotFound {
                    id: device.to_string(),
                },
            ),
            Ok(ControlOutcome::Failed { stderr }) => failed(
                Some(info.name),
                BootError::BootCommandFailed {
                    id: device.to_string(),
                    stderr,
                },
            ),
            Err(e) => failed(
                Some(info.name),
                BootError::BootCommandFailed {
                    id: device.to_string(),
                    stderr: e.to_string(),
                },
            ),
        }
    }
}
