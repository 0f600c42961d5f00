//! Shutdown workflow, mirroring the boot state machine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::control::{ControlOutcome, SimulatorControl};
use crate::device::SimulatorState;
use crate::exec::CommandExecutor;
use crate::ident::DeviceId;
use crate::locator::SimulatorLocator;

/// Closed outcome set for a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownOutcome {
    ShutDown,
    /// Covers both `Shutdown` and `Shutting Down`: a device already on
    /// its way down needs no further command.
    AlreadyShutdown,
    Failed,
}

/// Closed error set for a shutdown request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("simulator not found: {id}")]
    SimulatorNotFound { id: String },

    /// Booting devices cannot be shut down mid-transition.
    #[error("simulator {id} is {state} and cannot shut down right now")]
    SimulatorBusy { id: String, state: SimulatorState },

    #[error("shutdown command failed for {id}: {stderr}")]
    ShutdownCommandFailed { id: String, stderr: String },
}

#[derive(Debug, Clone)]
pub struct ShutdownResult {
    pub outcome: ShutdownOutcome,
    pub device_id: DeviceId,
    pub device_name: Option<String>,
    pub error: Option<ShutdownError>,
}

impl ShutdownResult {
    pub fn success(&self) -> bool {
        self.outcome != ShutdownOutcome::Failed
    }

    pub fn message(&self) -> String {
        let label = match &self.device_name {
            Some(name) => format!("{name} ({})", self.device_id),
            None => self.device_id.to_string(),
        };
        match (&self.outcome, &self.error) {
            (ShutdownOutcome::ShutDown, _) => format!("Shut down simulator {label}"),
            (ShutdownOutcome::AlreadyShutdown, _) => {
                format!("Simulator {label} is already shut down")
            }
            (ShutdownOutcome::Failed, Some(error)) => error.to_string(),
            (ShutdownOutcome::Failed, None) => format!("Shutdown failed for {label}"),
        }
    }
}

/// Orchestrates one shutdown request.
pub struct ShutdownOp {
    locator: SimulatorLocator,
    control: SimulatorControl,
}

impl ShutdownOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            locator: SimulatorLocator::new(executor.clone()),
            control: SimulatorControl::new(executor),
        }
    }

    /// Resolve, short-circuit on `Shutdown`/`Shutting Down`, otherwise
    /// issue the command. Calling this twice in a row is idempotent: the
    /// second call reports `AlreadyShutdown`, never an error.
    pub async fn run(&self, device: &DeviceId) -> ShutdownResult {
        let failed = |name: Option<String>, error: ShutdownError| ShutdownResult {
            outcome: ShutdownOutcome::Failed,
            device_id: device.clone(),
            device_name: name,
            error: Some(error),
        };

        let info = match self.locator.find(device).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!(device = %device, "shutdown target not in inventory");
                return failed(
                    None,
                    ShutdownError::SimulatorNotFound {
                        id: device.to_string(),
                    },
                );
            }
            Err(e) => {
                return failed(
                    None,
                    ShutdownError::ShutdownCommandFailed {
                        id: device.to_string(),
                        stderr: e.to_string(),
                    },
                );
            }
        };

        match info.state {
            SimulatorState::Shutdown | SimulatorState::ShuttingDown => {
                debug!(device = %device, state = %info.state, "already shut(ting) down, skipping command");
                return ShutdownResult {
                    outcome: ShutdownOutcome::AlreadyShutdown,
                    device_id: device.clone(),
                    device_name: Some(info.name),
                    error: None,
                };
            }
            SimulatorState::Booting => {
                return failed(
                    Some(info.name),
                    ShutdownError::SimulatorBusy {
                        id: device.to_string(),
                        state: info.state,
                    },
                );
            }
            _ => {}
        }

        match self.control.shutdown(device).await {
            Ok(ControlOutcome::Applied) => ShutdownResult {
                outcome: ShutdownOutcome::ShutDown,
                device_id: device.clone(),
                device_name: Some(info.name),
                error: None,
            },
            Ok(ControlOutcome::AlreadyInState) => ShutdownResult {
                outcome: ShutdownOutcome::AlreadyShutdown,
                device_id: device.clone(),
                device_name: Some(info.name),
                error: None,
            },
            Ok(ControlOutcome::NotFound) => failed(
                Some(info.name),
                ShutdownError::SimulatorNotFound {
                    id: device.to_string(),
                },
            ),
            Ok(ControlOutcome::Failed { stderr }) => failed(
                Some(info.name),
                ShutdownError::ShutdownCommandFailed {
                    id: device.to_string(),
                    stderr,
                },
            ),
            Err(e) => failed(
                Some(info.name),
                ShutdownError::ShutdownCommandFailed {
                    id: device.to_string(),
                    stderr: e.to_string(),
                },
            ),
        }
    }
}
