//! Toolchain presence preflight.
//!
//! The simulator-control binary and the build tool must exist before any
//! operation can run. Absence is its own diagnosis, distinct from a
//! command failure, so the caller can say "install Xcode" instead of
//! surfacing a cryptic shell error. The check lives at the dispatch
//! boundary, not inside the orchestrators.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::exec::{CommandExecutor, ExecError, ExecOptions};

/// Missing-dependency diagnoses.
#[derive(Error, Debug)]
pub enum DependencyError {
    /// `xcrun` is absent or cannot locate `simctl`.
    #[error("simctl is not available (is Xcode installed?): {0}")]
    MissingSimctl(String),

    /// `xcodebuild` is absent or not runnable.
    #[error("xcodebuild is not available (is Xcode installed?): {0}")]
    MissingXcodebuild(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Resolved toolchain facts, useful in startup logs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Filesystem path of the `simctl` binary.
    pub simctl_path: String,
    /// First line of `xcodebuild -version`, e.g. "Xcode 16.2".
    pub xcodebuild_version: String,
}

/// Probe for `simctl` and `xcodebuild`.
pub async fn check_toolchain(
    executor: &Arc<dyn CommandExecutor>,
) -> Result<Toolchain, DependencyError> {
    let options = ExecOptions::with_timeout_secs(30);

    let simctl = executor.run("xcrun --find simctl", &options).await?;
    if !simctl.success() {
        return Err(DependencyError::MissingSimctl(simctl.stderr));
    }

    let xcodebuild = executor.run("xcodebuild -version", &options).await?;
    if !xcodebuild.success() {
        return Err(DependencyError::MissingXcodebuild(xcodebuild.stderr));
    }

    let toolchain = Toolchain {
        simctl_path: simctl.stdout.trim().to_string(),
        xcodebuild_version: xcodebuild
            .stdout
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    debug!(simctl = %toolchain.simctl_path, xcodebuild = %toolchain.xcodebuild_version, "toolchain present");
    Ok(toolchain)
}
