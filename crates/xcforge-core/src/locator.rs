//! Simulator inventory queries.
//!
//! [`SimulatorLocator`] resolves device identifiers or names to
//! [`SimulatorInfo`] snapshots by running `xcrun simctl list devices --json`
//! and parsing the resulting runtime-keyed tree. The inventory is fetched
//! fresh on every query: all device state lives in CoreSimulator, and a
//! cached snapshot would race against boots and shutdowns happening outside
//! this process.
//!
//! The JSON payload is an undifferentiated tree keyed by runtime identifier,
//! not by platform or state, so any platform/state filtering happens
//! client-side on the flattened list.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::device::{Platform, SimulatorInfo, SimulatorState};
use crate::exec::{CommandExecutor, ExecError, ExecOptions};
use crate::ident::DeviceId;

/// The one inventory query everything else is built on.
pub const LIST_COMMAND: &str = "xcrun simctl list devices --json";

/// Errors from inventory queries.
#[derive(Error, Debug)]
pub enum LocatorError {
    /// `simctl list` itself exited nonzero.
    #[error("simctl list failed: {0}")]
    ListCommand(String),

    /// The inventory payload was not parseable as the expected tree.
    #[error("simulator inventory was not valid JSON: {0}")]
    InventoryParse(String),

    /// The shell could not be spawned.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Deserialize)]
struct Inventory {
    devices: HashMap<String, Vec<RawDevice>>,
}

#[derive(Deserialize)]
struct RawDevice {
    udid: String,
    name: String,
    state: String,
}

/// Resolves devices against the live `simctl` inventory.
pub struct SimulatorLocator {
    executor: Arc<dyn CommandExecutor>,
    options: ExecOptions,
}

impl SimulatorLocator {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            options: ExecOptions::default(),
        }
    }

    /// Fetch the full device inventory across all platforms and runtimes.
    ///
    /// # Errors
    ///
    /// - [`LocatorError::ListCommand`] if `simctl list` exits nonzero
    /// - [`LocatorError::InventoryParse`] if stdout is not the expected tree
    pub async fn list_all(&self) -> Result<Vec<SimulatorInfo>, LocatorError> {
        let output = self.executor.run(LIST_COMMAND, &self.options).await?;
        if !output.success() {
            return Err(LocatorError::ListCommand(output.stderr));
        }
        let devices = Self::parse_inventory(&output.stdout)?;
        debug!(devices = devices.len(), "simulator inventory fetched");
        Ok(devices)
    }

    /// Resolve a device by UDID or display name.
    ///
    /// UDID matches take precedence; a name match returns the first device
    /// carrying that name (names are not unique across runtimes).
    pub async fn find(&self, device: &DeviceId) -> Result<Option<SimulatorInfo>, LocatorError> {
        let devices = self.list_all().await?;
        let needle = device.as_str();
        let by_udid = devices.iter().find(|d| d.udid == needle).cloned();
        Ok(by_udid.or_else(|| devices.into_iter().find(|d| d.name == needle)))
    }

    /// Find any currently booted device.
    pub async fn find_booted(&self) -> Result<Option<SimulatorInfo>, LocatorError> {
        let devices = self.list_all().await?;
        Ok(devices
            .into_iter()
            .find(|d| d.state == SimulatorState::Booted))
    }

    /// Query the current lifecycle state of one device.
    ///
    /// A device absent from the inventory reports
    /// [`SimulatorState::Unknown`]; absence itself is handled by callers
    /// that need to distinguish it (via [`find`](Self::find)).
    pub async fn state_of(&self, device: &DeviceId) -> Result<SimulatorState, LocatorError> {
        Ok(self
            .find(device)
            .await?
            .map(|d| d.state)
            .unwrap_or(SimulatorState::Unknown))
    }

    /// Parse raw inventory JSON into a flat device list.
    ///
    /// Exposed for tests; [`list_all`](Self::list_all) is the production
    /// path. The runtime key orders are whatever serde's map iteration
    /// yields, so callers must not rely on device ordering.
    pub fn parse_inventory(json: &str) -> Result<Vec<SimulatorInfo>, LocatorError> {
        let inventory: Inventory = serde_json::from_str(json)
            .map_err(|e| LocatorError::InventoryParse(e.to_string()))?;
        let mut devices = Vec::new();
        for (runtime, entries) in inventory.devices {
            let platform = Platform::from_runtime_id(&runtime);
            for raw in entries {
                devices.push(SimulatorInfo {
                    udid: raw.udid,
                    name: raw.name,
                    state: SimulatorState::parse(&raw.state),
                    platform,
                    runtime: runtime.clone(),
                });
            }
        }
        Ok(devices)
    }
}
