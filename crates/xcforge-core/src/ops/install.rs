//! Install workflow: validate, resolve a target, auto-boot if needed,
//! install.
//!
//! Every branch emits a `tracing` debug event keyed by a stable event name
//! and the app's display name, for offline diagnosis. The logging is a
//! side effect, not part of the returned contract.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::control::{AppInstaller, InstallOutcome as RawInstallOutcome};
use crate::device::SimulatorState;
use crate::exec::CommandExecutor;
use crate::ident::{AppPath, DeviceId, ValidationError};
use crate::locator::SimulatorLocator;
use crate::ops::boot::{BootOp, BootOutcome};

/// Closed outcome set for an install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed,
    Failed,
}

/// Closed error set for an install request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// No device id was given and nothing is booted.
    #[error("no booted simulator found to install {app} onto")]
    NoBootedSimulator { app: String },

    #[error("simulator not found: {id}")]
    SimulatorNotFound { id: String },

    /// The auto-boot before installing failed; carries the boot context.
    #[error("could not boot simulator {id} before installing {app}: {detail}")]
    BootFailed { id: String, app: String, detail: String },

    #[error("install command failed for {app}: {stderr}")]
    InstallCommandFailed { app: String, stderr: String },
}

/// A validated install request.
///
/// Construction validates both the app path and the optional device id up
/// front, independent of any external call.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub app: AppPath,
    pub device: Option<DeviceId>,
}

impl InstallRequest {
    pub fn new(app_path: &str, device_id: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            app: AppPath::new(app_path)?,
            device: device_id.map(DeviceId::new).transpose()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InstallResult {
    pub outcome: InstallOutcome,
    /// Display name of the bundle, always known after validation.
    pub app_name: String,
    /// Target device, once one was resolved.
    pub device_id: Option<DeviceId>,
    pub device_name: Option<String>,
    pub error: Option<InstallError>,
}

impl InstallResult {
    pub fn success(&self) -> bool {
        self.outcome == InstallOutcome::Installed
    }

    pub fn message(&self) -> String {
        match (&self.outcome, &self.error) {
            (InstallOutcome::Installed, _) => match &self.device_name {
                Some(name) => format!("Installed {} on {name}", self.app_name),
                None => format!("Installed {}", self.app_name),
            },
            (InstallOutcome::Failed, Some(error)) => error.to_string(),
            (InstallOutcome::Failed, None) => format!("Install failed for {}", self.app_name),
        }
    }
}

/// Orchestrates one install request.
pub struct InstallOp {
    locator: SimulatorLocator,
    installer: AppInstaller,
    boot: BootOp,
}

impl InstallOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            locator: SimulatorLocator::new(executor.clone()),
            installer: AppInstaller::new(executor.clone()),
            boot: BootOp::new(executor),
        }
    }

    /// Resolve the target device (explicit id, or the single booted one),
    /// auto-boot a shut-down explicit target, then install.
    pub async fn run(&self, request: &InstallRequest) -> InstallResult {
        let app_name = request.app.name().to_string();

        let failed = |device_id: Option<DeviceId>, name: Option<String>, error: InstallError| {
            InstallResult {
                outcome: InstallOutcome::Failed,
                app_name: app_name.clone(),
                device_id,
                device_name: name,
                error: Some(error),
            }
        };

        // Resolve the target device.
        let info = match &request.device {
            Some(id) => match self.locator.find(id).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    debug!(event = "install.simulator_not_found", app = %app_name, device = %id);
                    return failed(
                        Some(id.clone()),
                        None,
                        InstallError::SimulatorNotFound { id: id.to_string() },
                    );
                }
                Err(e) => {
                    debug!(event = "install.inventory_failed", app = %app_name, error = %e);
                    return failed(
                        Some(id.clone()),
                        None,
                        InstallError::InstallCommandFailed {
                            app: app_name.clone(),
                            stderr: e.to_string(),
                        },
                    );
                }
            },
            None => match self.locator.find_booted().await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    debug!(event = "install.no_booted_simulator", app = %app_name);
                    return failed(
                        None,
                        None,
                        InstallError::NoBootedSimulator {
                            app: app_name.clone(),
                        },
                    );
                }
                Err(e) => {
                    debug!(event = "install.inventory_failed", app = %app_name, error = %e);
                    return failed(
                        None,
                        None,
                        InstallError::InstallCommandFailed {
                            app: app_name.clone(),
                            stderr: e.to_string(),
                        },
                    );
                }
            },
        };

        let target = match DeviceId::new(&info.udid) {
            Ok(target) => target,
            Err(e) => {
                // A blank udid in the inventory would be a simctl defect;
                // fail with context rather than panic.
                return failed(
                    None,
                    Some(info.name),
                    InstallError::InstallCommandFailed {
                        app: app_name.clone(),
                        stderr: e.to_string(),
                    },
                );
            }
        };

        // An explicitly-addressed device that is shut down gets booted
        // first, reusing the boot workflow's idempotence semantics.
        if request.device.is_some() && info.state == SimulatorState::Shutdown {
            debug!(event = "install.auto_boot", app = %app_name, device = %target);
            let boot = self.boot.run(&target).await;
            if boot.outcome == BootOutcome::Failed {
                let detail = boot
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "boot failed".to_string());
                debug!(event = "install.auto_boot_failed", app = %app_name, device = %target, %detail);
                return failed(
                    Some(target),
                    Some(info.name),
                    InstallError::BootFailed {
                        id: info.udid,
                        app: app_name.clone(),
                        detail,
                    },
                );
            }
        }

        match self.installer.install(&target, &request.app).await {
            Ok(RawInstallOutcome::Installed) => {
                debug!(event = "install.app_installed", app = %app_name, device = %target);
                InstallResult {
                    outcome: InstallOutcome::Installed,
                    app_name,
                    device_id: Some(target),
                    device_name: Some(info.name),
                    error: None,
                }
            }
            Ok(RawInstallOutcome::Failed { stderr }) => {
                debug!(event = "install.install_failed", app = %app_name, device = %target);
                failed(
                    Some(target),
                    Some(info.name),
                    InstallError::InstallCommandFailed {
                        app: app_name.clone(),
                        stderr,
                    },
                )
            }
            Err(e) => failed(
                Some(target),
                Some(info.name),
                InstallError::InstallCommandFailed {
                    app: app_name.clone(),
                    stderr: e.to_string(),
                },
            ),
        }
    }
}
