//! List workflow: one inventory fetch, pure client-side filtering.
//!
//! The inventory source returns an undifferentiated tree keyed by runtime
//! identifier, so platform/state filters never influence the external call;
//! they are applied to the flattened snapshot afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{Platform, SimulatorInfo, SimulatorState};
use crate::exec::CommandExecutor;
use crate::locator::{LocatorError, SimulatorLocator};

/// Closed outcome set for a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOutcome {
    Listed,
    Failed,
}

/// Closed error set for a list request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// The inventory payload was not parseable as the expected tree.
    #[error("could not parse simulator inventory: {0}")]
    SimulatorListParse(String),

    #[error("simctl list failed: {0}")]
    ListCommandFailed(String),
}

/// Optional post-processing filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    pub platform: Option<Platform>,
    pub state: Option<SimulatorState>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub outcome: ListOutcome,
    pub devices: Vec<SimulatorInfo>,
    pub error: Option<ListError>,
}

impl ListResult {
    pub fn success(&self) -> bool {
        self.outcome == ListOutcome::Listed
    }
}

/// Orchestrates one list request.
pub struct ListOp {
    locator: SimulatorLocator,
}

impl ListOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            locator: SimulatorLocator::new(executor),
        }
    }

    pub async fn run(&self, filter: &ListFilter) -> ListResult {
        let devices = match self.locator.list_all().await {
            Ok(devices) => devices,
            Err(e) => {
                let error = match e {
                    LocatorError::InventoryParse(detail) => {
                        ListError::SimulatorListParse(detail)
                    }
                    other => ListError::ListCommandFailed(other.to_string()),
                };
                return ListResult {
                    outcome: ListOutcome::Failed,
                    devices: Vec::new(),
                    error: Some(error),
                };
            }
        };

        let devices = devices
            .into_iter()
            .filter(|d| filter.platform.map_or(true, |p| d.platform == p))
            .filter(|d| filter.state.map_or(true, |s| d.state == s))
            .collect();

        ListResult {
            outcome: ListOutcome::Listed,
            devices,
            error: None,
        }
    }
}
