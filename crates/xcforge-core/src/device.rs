//! Simulator device vocabulary: platforms, lifecycle states, snapshots.
//!
//! State strings mirror the `simctl` vocabulary verbatim (`"Shutting Down"`
//! keeps its space) so that inventory JSON can be compared directly without
//! translation. [`SimulatorInfo`] is an immutable point-in-time snapshot;
//! it is re-queried on every operation and never cached across calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Apple target platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "tvOS")]
    Tvos,
    #[serde(rename = "watchOS")]
    Watchos,
    #[serde(rename = "visionOS")]
    Visionos,
    #[serde(rename = "macOS")]
    Macos,
}

/// Failures when parsing a platform out of loosely-typed input.
///
/// The two kinds stay distinct because callers render them differently:
/// a non-string is a malformed payload, an unknown name is a user mistake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformParseError {
    /// The value was not a string at all (e.g. a JSON number).
    #[error("platform must be a string, got: {0}")]
    NotAString(String),

    /// The string was not one of the known platform names.
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

impl Platform {
    /// Canonical platform name as Apple spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Tvos => "tvOS",
            Platform::Watchos => "watchOS",
            Platform::Visionos => "visionOS",
            Platform::Macos => "macOS",
        }
    }

    /// The `xcodebuild -destination` platform marker for simulators.
    ///
    /// macOS has no simulator; callers guard against that combination
    /// before asking for this marker (see `destination`).
    pub fn simulator_marker(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS Simulator",
            Platform::Tvos => "tvOS Simulator",
            Platform::Watchos => "watchOS Simulator",
            Platform::Visionos => "visionOS Simulator",
            Platform::Macos => "macOS",
        }
    }

    /// Parse a platform from a user- or wire-supplied name.
    ///
    /// Matching is case-insensitive on the canonical names; `xrOS` is
    /// accepted as the runtime spelling of visionOS.
    pub fn from_name(name: &str) -> Result<Self, PlatformParseError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "tvos" => Ok(Platform::Tvos),
            "watchos" => Ok(Platform::Watchos),
            "visionos" | "xros" => Ok(Platform::Visionos),
            "macos" => Ok(Platform::Macos),
            _ => Err(PlatformParseError::UnknownPlatform(name.to_string())),
        }
    }

    /// Parse a platform from a JSON value, distinguishing "not a string"
    /// from "not a known platform".
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PlatformParseError> {
        match value.as_str() {
            Some(s) => Self::from_name(s),
            None => Err(PlatformParseError::NotAString(value.to_string())),
        }
    }

    /// Derive the platform from a CoreSimulator runtime identifier, e.g.
    /// `com.apple.CoreSimulator.SimRuntime.iOS-18-0`.
    ///
    /// Unrecognized runtimes default to iOS, which is what `simctl`
    /// inventories overwhelmingly contain.
    pub fn from_runtime_id(runtime: &str) -> Self {
        let lowered = runtime.to_ascii_lowercase();
        if lowered.contains("tvos") {
            Platform::Tvos
        } else if lowered.contains("watchos") {
            Platform::Watchos
        } else if lowered.contains("xros") || lowered.contains("visionos") {
            Platform::Visionos
        } else if lowered.contains("macos") {
            Platform::Macos
        } else {
            Platform::Ios
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulator lifecycle states as reported by `simctl`.
///
/// [`SimulatorState::Unknown`] absorbs any vocabulary this build does not
/// know about; it is never sent back to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulatorState {
    Booted,
    Booting,
    Shutdown,
    #[serde(rename = "Shutting Down")]
    ShuttingDown,
    Unknown,
}

impl SimulatorState {
    /// The exact string `simctl` uses for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulatorState::Booted => "Booted",
            SimulatorState::Booting => "Booting",
            SimulatorState::Shutdown => "Shutdown",
            SimulatorState::ShuttingDown => "Shutting Down",
            SimulatorState::Unknown => "Unknown",
        }
    }

    /// Parse a state string; anything outside the known vocabulary maps to
    /// [`SimulatorState::Unknown`] rather than failing, since inventory
    /// parsing must tolerate states introduced by newer toolchains.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Booted" => SimulatorState::Booted,
            "Booting" => SimulatorState::Booting,
            "Shutdown" => SimulatorState::Shutdown,
            "Shutting Down" => SimulatorState::ShuttingDown,
            _ => SimulatorState::Unknown,
        }
    }
}

impl fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of one simulator device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorInfo {
    /// The unique device identifier (UDID).
    pub udid: String,
    /// Human-readable device name, e.g. "iPhone 16 Pro".
    pub name: String,
    /// Lifecycle state at the moment the inventory was read.
    pub state: SimulatorState,
    /// Platform derived from the runtime identifier.
    pub platform: Platform,
    /// The raw CoreSimulator runtime identifier this device belongs to.
    pub runtime: String,
}
