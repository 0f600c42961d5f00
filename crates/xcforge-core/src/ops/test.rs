//! Test workflow: run the suite, then resolve results through the
//! strategy chain.
//!
//! The textual Swift Testing summary on the build stream is tried first;
//! when nothing recognizes it, the result bundle is interrogated with the
//! current `xcresulttool` tree command and finally the legacy JSON form.
//! Absence of parseable results is not an error by itself; the exit code
//! still decides the outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::command::{shell_quote, BuildCommandBuilder, ProjectRef, TestCommandBuilder};
use crate::destination::BuildDestination;
use crate::diagnostics::{parse_build_output, BuildIssue};
use crate::exec::{CommandExecutor, ExecOptions};
use crate::ident::DeviceId;
use crate::test_results::{TestResultParser, TestSummary};

/// Closed outcome set for a test request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
}

/// Closed error set for a test request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    #[error("test command failed: {stderr}")]
    TestCommandFailed { stderr: String },
}

/// A validated test request.
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub project: ProjectRef,
    pub scheme: Option<String>,
    pub configuration: String,
    pub destination: BuildDestination,
    pub device: Option<DeviceId>,
    pub derived_data_path: Option<String>,
    /// Where to write the result bundle; a temp path is generated when
    /// absent.
    pub result_bundle_path: Option<String>,
    /// `-only-testing:` filters (target, class, or single test).
    pub only_testing: Vec<String>,
    /// Beautifier program override (from config).
    pub beautifier: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TestRunResult {
    pub outcome: TestOutcome,
    /// Parsed counts when any strategy recognized the run's output.
    pub summary: Option<TestSummary>,
    /// Compile diagnostics that surfaced during the run.
    pub issues: Vec<BuildIssue>,
    /// The bundle the run wrote, for callers that want to re-inspect it.
    pub result_bundle_path: String,
    pub exit_code: Option<i32>,
    pub error: Option<TestError>,
}

impl TestRunResult {
    pub fn success(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }
}

/// Orchestrates one test request.
pub struct TestOp {
    executor: Arc<dyn CommandExecutor>,
    options: ExecOptions,
    parser: TestResultParser,
}

impl TestOp {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            options: ExecOptions::default(),
            parser: TestResultParser::new(),
        }
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self, request: &TestRequest) -> TestRunResult {
        let bundle_path = request
            .result_bundle_path
            .clone()
            .unwrap_or_else(|| format!("/tmp/xcforge-{}.xcresult", Uuid::new_v4()));

        let base = BuildCommandBuilder::new(
            request.project.clone(),
            request.configuration.clone(),
            request.destination,
        )
        .device(request.device.clone())
        .scheme(request.scheme.clone())
        .derived_data_path(request.derived_data_path.clone());

        let mut builder = TestCommandBuilder::new(base, bundle_path.clone());
        for filter in &request.only_testing {
            builder = builder.only_testing(filter.clone());
        }
        if let Some(beautifier) = &request.beautifier {
            builder = builder.beautifier(beautifier.clone());
        }
        let command = builder.build();

        debug!(scheme = ?request.scheme, bundle = %bundle_path, "starting test run");
        let output = match self.executor.run(&command, &self.options).await {
            Ok(output) => output,
            Err(e) => {
                return TestRunResult {
                    outcome: TestOutcome::Failed,
                    summary: None,
                    issues: Vec::new(),
                    result_bundle_path: bundle_path,
                    exit_code: None,
                    error: Some(TestError::TestCommandFailed {
                        stderr: e.to_string(),
                    }),
                };
            }
        };

        let mut combined = output.stdout.clone();
        combined.push('\n');
        combined.push_str(&output.stderr);
        let issues = parse_build_output(&combined);

        let summary = match self.parser.parse(&output.stdout) {
            Some(summary) => Some(summary),
            None => self.summary_from_bundle(&bundle_path).await,
        };

        // A parsed summary is authoritative; otherwise the exit status
        // decides (with pipefail the beautifier never masks it).
        let passed = summary
            .as_ref()
            .map(|s| s.success)
            .unwrap_or_else(|| output.success());

        let error = if passed {
            None
        } else if summary.is_some() {
            None
        } else {
            Some(TestError::TestCommandFailed {
                stderr: output.stderr,
            })
        };

        debug!(passed, parsed = summary.is_some(), "test run classified");
        TestRunResult {
            outcome: if passed {
                TestOutcome::Passed
            } else {
                TestOutcome::Failed
            },
            summary,
            issues,
            result_bundle_path: bundle_path,
            exit_code: output.exit_code,
            error,
        }
    }

    /// Interrogate the result bundle, current format first, then legacy.
    async fn summary_from_bundle(&self, bundle_path: &str) -> Option<TestSummary> {
        let quoted = shell_quote(bundle_path);
        let commands = [
            format!("xcrun xcresulttool get test-results tests --path {quoted}"),
            format!("xcrun xcresulttool get --legacy --format json --path {quoted}"),
        ];
        for command in &commands {
            let Ok(output) = self.executor.run(command, &self.options).await else {
                continue;
            };
            if !output.success() {
                continue;
            }
            if let Some(summary) = self.parser.parse(&output.stdout) {
                return Some(summary);
            }
        }
        None
    }
}
