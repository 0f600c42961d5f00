//! `xcodebuild` invocation construction.
//!
//! [`BuildCommandBuilder`] and [`TestCommandBuilder`] are pure string
//! constructors over validated inputs: they never execute anything, which
//! keeps command shape independently testable without spawning a process.
//! Paths and schemes are double-quoted; the destination descriptor is
//! single-quoted because it routinely contains commas and spaces.

use crate::destination::BuildDestination;
use crate::ident::DeviceId;

/// Default beautifier the test pipeline is piped through.
pub const DEFAULT_BEAUTIFIER: &str = "xcbeautify";

/// Quote a value for POSIX shell double-quoting.
///
/// Identifiers are passed verbatim inside the quotes; only the characters
/// the shell would interpret inside double quotes are escaped.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// The project container an invocation operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// `-workspace <path>` (an `.xcworkspace`).
    Workspace(String),
    /// `-project <path>` (an `.xcodeproj`).
    Project(String),
}

impl ProjectRef {
    fn flag_and_path(&self) -> (&'static str, &str) {
        match self {
            ProjectRef::Workspace(path) => ("-workspace", path),
            ProjectRef::Project(path) => ("-project", path),
        }
    }

    /// The container path, independent of flavor.
    pub fn path(&self) -> &str {
        self.flag_and_path().1
    }
}

/// Builder for an `xcodebuild … build` invocation string.
#[derive(Debug, Clone)]
pub struct BuildCommandBuilder {
    project: ProjectRef,
    configuration: String,
    destination: BuildDestination,
    device: Option<DeviceId>,
    scheme: Option<String>,
    derived_data_path: Option<String>,
    settings: Vec<(String, String)>,
}

impl BuildCommandBuilder {
    pub fn new(
        project: ProjectRef,
        configuration: impl Into<String>,
        destination: BuildDestination,
    ) -> Self {
        Self {
            project,
            configuration: configuration.into(),
            destination,
            device: None,
            scheme: None,
            derived_data_path: None,
            settings: Vec::new(),
        }
    }

    /// Pin the destination to a specific device instance.
    pub fn device(mut self, device: Option<DeviceId>) -> Self {
        self.device = device;
        self
    }

    pub fn scheme(mut self, scheme: Option<String>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn derived_data_path(mut self, path: Option<String>) -> Self {
        self.derived_data_path = path;
        self
    }

    /// Append a `KEY=VALUE` build setting.
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    /// Everything up to (but excluding) the action word, shared with the
    /// test builder.
    fn common_prefix(&self) -> String {
        let (flag, path) = self.project.flag_and_path();
        let mut cmd = format!("xcodebuild {flag} {}", shell_quote(path));
        if let Some(scheme) = &self.scheme {
            cmd.push_str(&format!(" -scheme {}", shell_quote(scheme)));
        }
        cmd.push_str(&format!(
            " -configuration {}",
            shell_quote(&self.configuration)
        ));
        cmd.push_str(&format!(
            " -destination '{}'",
            self.destination.to_destination_string(self.device.as_ref())
        ));
        if let Some(path) = &self.derived_data_path {
            cmd.push_str(&format!(" -derivedDataPath {}", shell_quote(path)));
        }
        for (key, value) in &self.settings {
            cmd.push_str(&format!(" {key}={}", shell_quote(value)));
        }
        cmd
    }

    /// Produce the complete build invocation.
    pub fn build(&self) -> String {
        format!("{} build", self.common_prefix())
    }
}

/// Builder for an `xcodebuild … test` invocation string.
///
/// Output is piped through a beautifier under `set -o pipefail` so the
/// beautifier's exit status never masks the underlying test exit status.
#[derive(Debug, Clone)]
pub struct TestCommandBuilder {
    base: BuildCommandBuilder,
    result_bundle_path: String,
    only_testing: Vec<String>,
    beautifier: String,
}

impl TestCommandBuilder {
    pub fn new(base: BuildCommandBuilder, result_bundle_path: impl Into<String>) -> Self {
        Self {
            base,
            result_bundle_path: result_bundle_path.into(),
            only_testing: Vec::new(),
            beautifier: DEFAULT_BEAUTIFIER.to_string(),
        }
    }

    /// Restrict the run to a target, class, or single test.
    pub fn only_testing(mut self, filter: impl Into<String>) -> Self {
        self.only_testing.push(filter.into());
        self
    }

    /// Override the beautifier program (from config).
    pub fn beautifier(mut self, program: impl Into<String>) -> Self {
        self.beautifier = program.into();
        self
    }

    /// Produce the complete test invocation.
    pub fn build(&self) -> String {
        let mut cmd = self.base.common_prefix();
        cmd.push_str(&format!(
            " -resultBundlePath {}",
            shell_quote(&self.result_bundle_path)
        ));
        cmd.push_str(" -parallel-testing-enabled NO");
        for filter in &self.only_testing {
            cmd.push_str(&format!(" {}", shell_quote(&format!("-only-testing:{filter}"))));
        }
        cmd.push_str(" test");
        format!("set -o pipefail && {cmd} | {}", self.beautifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Platform;

    fn ios_sim() -> BuildDestination {
        BuildDestination::simulator(Platform::Ios).unwrap()
    }

    #[test]
    fn quote_escapes_shell_metacharacters() {
        assert_eq!(shell_quote("plain"), "\"plain\"");
        assert_eq!(shell_quote("has space"), "\"has space\"");
        assert_eq!(shell_quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(shell_quote("$HOME"), "\"\\$HOME\"");
    }

    #[test]
    fn workspace_build_command_shape() {
        let cmd = BuildCommandBuilder::new(
            ProjectRef::Workspace("/w/App.xcworkspace".into()),
            "Debug",
            ios_sim(),
        )
        .scheme(Some("App".into()))
        .build();

        assert!(cmd.starts_with("xcodebuild -workspace \"/w/App.xcworkspace\""));
        assert!(cmd.contains("-scheme \"App\""));
        assert!(cmd.contains("-configuration \"Debug\""));
        assert!(cmd.contains("-destination 'platform=iOS Simulator"));
        assert!(cmd.ends_with(" build"));
    }

    #[test]
    fn project_flag_and_optional_scheme() {
        let cmd = BuildCommandBuilder::new(
            ProjectRef::Project("/p/App.xcodeproj".into()),
            "Release",
            ios_sim(),
        )
        .build();

        assert!(cmd.contains("-project \"/p/App.xcodeproj\""));
        assert!(!cmd.contains("-scheme"));
    }

    #[test]
    fn derived_data_and_settings_are_appended() {
        let cmd = BuildCommandBuilder::new(
            ProjectRef::Project("/p/App.xcodeproj".into()),
            "Debug",
            ios_sim(),
        )
        .derived_data_path(Some("/tmp/dd".into()))
        .setting("CODE_SIGNING_ALLOWED", "NO")
        .build();

        assert!(cmd.contains("-derivedDataPath \"/tmp/dd\""));
        assert!(cmd.contains("CODE_SIGNING_ALLOWED=\"NO\""));
    }

    #[test]
    fn specific_device_lands_in_destination() {
        let cmd = BuildCommandBuilder::new(
            ProjectRef::Project("/p/App.xcodeproj".into()),
            "Debug",
            ios_sim(),
        )
        .device(Some(DeviceId::new("UDID-1").unwrap()))
        .build();

        assert!(cmd.contains("-destination 'platform=iOS Simulator,id=UDID-1'"));
    }

    #[test]
    fn test_command_pipes_through_beautifier_with_pipefail() {
        let base = BuildCommandBuilder::new(
            ProjectRef::Workspace("/w/App.xcworkspace".into()),
            "Debug",
            ios_sim(),
        )
        .scheme(Some("App".into()));
        let cmd = TestCommandBuilder::new(base, "/tmp/run.xcresult")
            .only_testing("AppTests/LoginTests")
            .build();

        assert!(cmd.starts_with("set -o pipefail && xcodebuild"));
        assert!(cmd.contains("-resultBundlePath \"/tmp/run.xcresult\""));
        assert!(cmd.contains("-parallel-testing-enabled NO"));
        assert!(cmd.contains("\"-only-testing:AppTests/LoginTests\""));
        assert!(cmd.contains(" test | xcbeautify"));
    }

    #[test]
    fn beautifier_override() {
        let base = BuildCommandBuilder::new(
            ProjectRef::Project("/p/App.xcodeproj".into()),
            "Debug",
            ios_sim(),
        );
        let cmd = TestCommandBuilder::new(base, "/tmp/run.xcresult")
            .beautifier("xcpretty")
            .build();
        assert!(cmd.ends_with("| xcpretty"));
    }
}
