//! Validated identifier and path value types.
//!
//! [`DeviceId`] and [`AppPath`] are smart-constructor value objects: the only
//! way to obtain one is through a constructor that checks every invariant up
//! front. Orchestrators accept these types rather than raw strings, so a
//! malformed identifier is rejected before any external command is built.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for identifiers and paths.
///
/// These are raised before any external call and rendered to the caller
/// verbatim; each variant names the offending input where it is safe to do so.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The device identifier was empty or whitespace-only.
    #[error("device identifier must not be empty")]
    EmptyDeviceId,

    /// The device identifier contained a null byte.
    #[error("device identifier contains a null byte")]
    DeviceIdNullByte,

    /// The app path was empty or whitespace-only.
    #[error("app path must not be empty")]
    EmptyAppPath,

    /// The app path did not end in a `.app` bundle suffix.
    #[error("app path must point to a .app bundle: {0}")]
    NotAppBundle(String),

    /// The app path contained a `..` traversal segment.
    #[error("app path contains a path traversal segment: {0}")]
    PathTraversal(String),

    /// The app path contained a null byte.
    #[error("app path contains a null byte")]
    AppPathNullByte,
}

/// A simulator or device identifier: either a UDID or a display name.
///
/// Stored trimmed; equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and normalize a raw identifier.
    ///
    /// Leading/trailing whitespace is trimmed; empty, whitespace-only and
    /// null-byte-containing input is rejected.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        if raw.contains('\0') {
            return Err(ValidationError::DeviceIdNullByte);
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier as passed to external tools, verbatim.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated filesystem path to a `.app` bundle.
///
/// The stored value is kept exactly as given (including a trailing
/// separator, if any); separators are stripped only when deriving the
/// display [`name`](AppPath::name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppPath(String);

/// True for both POSIX and Windows-style path separators.
fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

impl AppPath {
    /// Validate a raw path.
    ///
    /// Rejects empty input, null bytes, `..` traversal segments, and paths
    /// whose final component does not end in `.app`. A trailing separator
    /// is accepted and preserved in the stored value.
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        if raw.contains('\0') {
            return Err(ValidationError::AppPathNullByte);
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAppPath);
        }
        if trimmed.split(is_separator).any(|segment| segment == "..") {
            return Err(ValidationError::PathTraversal(trimmed.to_string()));
        }
        let without_trailing = trimmed.trim_end_matches(is_separator);
        if !without_trailing.ends_with(".app") {
            return Err(ValidationError::NotAppBundle(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The path as passed to external tools, verbatim.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing path component, across `/` and `\` separators.
    ///
    /// Used as the app's display name in logs and user-facing messages.
    pub fn name(&self) -> &str {
        let stripped = self.0.trim_end_matches(is_separator);
        stripped
            .rsplit(is_separator)
            .next()
            .unwrap_or(stripped)
    }
}

impl fmt::Display for AppPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_trims_whitespace() {
        let id = DeviceId::new("  ABCD-1234  ").unwrap();
        assert_eq!(id.as_str(), "ABCD-1234");
    }

    #[test]
    fn device_id_rejects_empty() {
        assert_eq!(DeviceId::new(""), Err(ValidationError::EmptyDeviceId));
        assert_eq!(DeviceId::new("   "), Err(ValidationError::EmptyDeviceId));
    }

    #[test]
    fn device_id_rejects_null_byte() {
        assert_eq!(
            DeviceId::new("abc\0def"),
            Err(ValidationError::DeviceIdNullByte)
        );
    }

    #[test]
    fn device_id_accepts_display_name() {
        let id = DeviceId::new("iPhone 16 Pro").unwrap();
        assert_eq!(id.as_str(), "iPhone 16 Pro");
    }

    #[test]
    fn app_path_accepts_plain_bundle() {
        let path = AppPath::new("/tmp/build/MyApp.app").unwrap();
        assert_eq!(path.as_str(), "/tmp/build/MyApp.app");
        assert_eq!(path.name(), "MyApp.app");
    }

    #[test]
    fn app_path_keeps_trailing_separator_in_value() {
        let path = AppPath::new("/tmp/build/MyApp.app/").unwrap();
        assert_eq!(path.as_str(), "/tmp/build/MyApp.app/");
        assert_eq!(path.name(), "MyApp.app");
    }

    #[test]
    fn app_path_derives_name_across_windows_separators() {
        let path = AppPath::new("C:\\builds\\MyApp.app").unwrap();
        assert_eq!(path.name(), "MyApp.app");
    }

    #[test]
    fn app_path_rejects_missing_suffix() {
        assert!(matches!(
            AppPath::new("/tmp/build/MyApp.ipa"),
            Err(ValidationError::NotAppBundle(_))
        ));
    }

    #[test]
    fn app_path_rejects_traversal() {
        assert!(matches!(
            AppPath::new("/tmp/../etc/MyApp.app"),
            Err(ValidationError::PathTraversal(_))
        ));
        assert!(matches!(
            AppPath::new("..\\MyApp.app"),
            Err(ValidationError::PathTraversal(_))
        ));
    }

    #[test]
    fn app_path_rejects_null_byte_and_empty() {
        assert_eq!(
            AppPath::new("/tmp/\0/MyApp.app"),
            Err(ValidationError::AppPathNullByte)
        );
        assert_eq!(AppPath::new("  "), Err(ValidationError::EmptyAppPath));
    }

    #[test]
    fn app_path_with_dots_inside_name_is_fine() {
        let path = AppPath::new("/tmp/My.Cool.App.app").unwrap();
        assert_eq!(path.name(), "My.Cool.App.app");
    }
}
