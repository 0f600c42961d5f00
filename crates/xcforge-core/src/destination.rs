//! Build destination mapping.
//!
//! [`BuildDestination`] is the pure domain concept (platform, device
//! family, architecture scope) and nothing outside this module knows what
//! an `xcodebuild -destination` string looks like. The architecture scope
//! is a caller-visible distinction, not an implementation detail: simulator
//! builds default to the host architecture for speed, and the universal
//! variant changes both build duration and output composition.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::Platform;
use crate::ident::DeviceId;

/// Marker appended to universal destinations.
pub const UNIVERSAL_ARCHS: &str = "arm64,x86_64";

/// Whether the build targets a simulator or physical-device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    Simulator,
    Device,
}

/// Architecture scope for the produced binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchScope {
    /// Build only for the host's architecture (the fast default).
    CurrentArch,
    /// Build for all supported architectures.
    Universal,
}

/// Invalid destination combinations, rejected at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    /// macOS builds run natively; there is no macOS simulator.
    #[error("macOS has no simulator destination")]
    MacosSimulator,
}

/// An abstract build target: platform × family × architecture scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDestination {
    pub platform: Platform,
    pub family: DeviceFamily,
    pub arch: ArchScope,
}

/// The architecture this binary was compiled for, in Apple's spelling.
fn host_arch() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

impl BuildDestination {
    /// Construct a destination, rejecting impossible combinations.
    pub fn new(
        platform: Platform,
        family: DeviceFamily,
        arch: ArchScope,
    ) -> Result<Self, DestinationError> {
        if platform == Platform::Macos && family == DeviceFamily::Simulator {
            return Err(DestinationError::MacosSimulator);
        }
        Ok(Self {
            platform,
            family,
            arch,
        })
    }

    /// Simulator destination for `platform`, host architecture.
    pub fn simulator(platform: Platform) -> Result<Self, DestinationError> {
        Self::new(platform, DeviceFamily::Simulator, ArchScope::CurrentArch)
    }

    /// Simulator destination for `platform`, all architectures.
    pub fn simulator_universal(platform: Platform) -> Result<Self, DestinationError> {
        Self::new(platform, DeviceFamily::Simulator, ArchScope::Universal)
    }

    /// Physical-device destination for `platform`.
    pub fn device(platform: Platform) -> Result<Self, DestinationError> {
        Self::new(platform, DeviceFamily::Device, ArchScope::CurrentArch)
    }

    /// Map this destination (plus an optional concrete device) to the
    /// toolchain descriptor string passed to `xcodebuild -destination`.
    ///
    /// A device id pins the destination to that specific instance;
    /// otherwise the platform's generic/any-available descriptor is used.
    pub fn to_destination_string(&self, device: Option<&DeviceId>) -> String {
        let arch_suffix = match self.arch {
            ArchScope::CurrentArch => format!(",arch={}", host_arch()),
            ArchScope::Universal => format!(",arch={}", UNIVERSAL_ARCHS),
        };

        if self.platform == Platform::Macos {
            return format!("platform=macOS{arch_suffix}");
        }

        match self.family {
            DeviceFamily::Simulator => {
                let marker = self.platform.simulator_marker();
                match device {
                    Some(id) => format!("platform={marker},id={id}"),
                    None => format!(
                        "platform={marker},name=Any {marker} Device{arch_suffix}"
                    ),
                }
            }
            DeviceFamily::Device => match device {
                Some(id) => format!("platform={},id={id}", self.platform.as_str()),
                None => format!("generic/platform={}", self.platform.as_str()),
            },
        }
    }
}

impl fmt::Display for BuildDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.family {
            DeviceFamily::Simulator => "simulator",
            DeviceFamily::Device => "device",
        };
        let arch = match self.arch {
            ArchScope::CurrentArch => "current-arch",
            ArchScope::Universal => "universal",
        };
        write!(f, "{} {family} ({arch})", self.platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ios_simulator_current_arch_has_no_universal_marker() {
        let dest = BuildDestination::simulator(Platform::Ios).unwrap();
        let mapped = dest.to_destination_string(None);
        assert!(mapped.contains("iOS Simulator"));
        assert!(!mapped.contains(UNIVERSAL_ARCHS));
    }

    #[test]
    fn ios_simulator_universal_carries_marker() {
        let dest = BuildDestination::simulator_universal(Platform::Ios).unwrap();
        let mapped = dest.to_destination_string(None);
        assert!(mapped.contains("iOS Simulator"));
        assert!(mapped.contains(UNIVERSAL_ARCHS));
    }

    #[test]
    fn device_id_pins_the_destination() {
        let dest = BuildDestination::simulator(Platform::Ios).unwrap();
        let id = DeviceId::new("A1B2-C3D4").unwrap();
        assert_eq!(
            dest.to_destination_string(Some(&id)),
            "platform=iOS Simulator,id=A1B2-C3D4"
        );
    }

    #[test]
    fn generic_device_destination() {
        let dest = BuildDestination::device(Platform::Ios).unwrap();
        assert_eq!(dest.to_destination_string(None), "generic/platform=iOS");
    }

    #[test]
    fn macos_ignores_family_and_keeps_arch() {
        let dest = BuildDestination::device(Platform::Macos).unwrap();
        let mapped = dest.to_destination_string(None);
        assert!(mapped.starts_with("platform=macOS,arch="));
    }

    #[test]
    fn macos_simulator_is_rejected() {
        assert_eq!(
            BuildDestination::simulator(Platform::Macos),
            Err(DestinationError::MacosSimulator)
        );
    }

    #[test]
    fn tvos_simulator_marker() {
        let dest = BuildDestination::simulator(Platform::Tvos).unwrap();
        assert!(dest
            .to_destination_string(None)
            .contains("platform=tvOS Simulator"));
    }
}
