//! Compiler diagnostic extraction from build output.
//!
//! `xcodebuild` (raw or piped through a beautifier) reports diagnostics on
//! the fixed line grammar `path:line:column: severity: message`. This
//! module extracts error and warning records from that stream; notes and
//! other severities are recognized but deliberately not extracted. Output
//! with zero matching lines yields an empty list, not an error: a clean
//! build simply has nothing to report.

use std::collections::HashSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic severity levels that become issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Invalid issue construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("issue message must not be empty")]
    EmptyMessage,

    /// Line and column numbers are 1-based.
    #[error("issue position must be positive")]
    NonPositivePosition,
}

/// One structured diagnostic record.
///
/// Equality (and thus the dedup key) covers every field: two diagnostics
/// that differ only in message are distinct issues at the same location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl BuildIssue {
    /// Validating constructor: rejects empty messages and zero positions.
    pub fn new(
        severity: IssueSeverity,
        message: impl Into<String>,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    ) -> Result<Self, IssueError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(IssueError::EmptyMessage);
        }
        if line == Some(0) || column == Some(0) {
            return Err(IssueError::NonPositivePosition);
        }
        Ok(Self {
            severity,
            message,
            file,
            line,
            column,
        })
    }
}

/// Strip beautifier decoration so the line grammar matches both raw and
/// beautified streams.
fn strip_decoration(line: &str) -> &str {
    line.trim_start()
        .trim_start_matches(['❌', '⚠', '\u{fe0f}'])
        .trim_start()
}

/// Extract deduplicated error/warning issues from build output.
///
/// The dedup key is severity + file + line + column + message; the first
/// occurrence wins and the order of first appearance is preserved.
pub fn parse_build_output(output: &str) -> Vec<BuildIssue> {
    // Fixed toolchain grammar: path:line:column: severity: message
    let pattern = Regex::new(r"^(.+?):(\d+):(\d+):\s*(error|warning|note):\s*(.+)$")
        .expect("diagnostic pattern is valid");

    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for raw_line in output.lines() {
        let line = strip_decoration(raw_line);
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let severity = match caps.get(4).map(|m| m.as_str()) {
            Some("error") => IssueSeverity::Error,
            Some("warning") => IssueSeverity::Warning,
            // Notes and other severities are not issues.
            _ => continue,
        };
        let line_no = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        let column = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
        let file = caps.get(1).map(|m| m.as_str().to_string());
        let message = caps.get(5).map(|m| m.as_str().trim()).unwrap_or_default();
        let Ok(issue) = BuildIssue::new(severity, message, file, line_no, column) else {
            continue;
        };
        if seen.insert(issue.clone()) {
            issues.push(issue);
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_errors_and_warnings() {
        let output = "\
Compiling Foo.swift
/app/Sources/Foo.swift:10:5: error: cannot find 'bar' in scope
/app/Sources/Foo.swift:22:9: warning: variable 'x' was never used
note: using cached build";
        let issues = parse_build_output(output);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].file.as_deref(), Some("/app/Sources/Foo.swift"));
        assert_eq!(issues[0].line, Some(10));
        assert_eq!(issues[0].column, Some(5));
        assert_eq!(issues[0].message, "cannot find 'bar' in scope");
        assert_eq!(issues[1].severity, IssueSeverity::Warning);
    }

    #[test]
    fn notes_are_ignored() {
        let output = "/app/Foo.swift:3:1: note: add 'import Foundation'";
        assert!(parse_build_output(output).is_empty());
    }

    #[test]
    fn duplicate_lines_collapse_to_one_issue() {
        let output = "\
/app/Foo.swift:10:5: error: msg
/app/Foo.swift:10:5: error: msg
/app/Bar.swift:1:1: error: other";
        let issues = parse_build_output(output);
        assert_eq!(issues.len(), 2);
        // First appearance order is preserved.
        assert_eq!(issues[0].file.as_deref(), Some("/app/Foo.swift"));
        assert_eq!(issues[1].file.as_deref(), Some("/app/Bar.swift"));
    }

    #[test]
    fn same_location_different_message_is_distinct() {
        let output = "\
/app/Foo.swift:10:5: error: first
/app/Foo.swift:10:5: error: second";
        assert_eq!(parse_build_output(output).len(), 2);
    }

    #[test]
    fn beautified_lines_match_too() {
        let output = "❌ /app/Foo.swift:7:3: error: missing return";
        let issues = parse_build_output(output);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(7));
    }

    #[test]
    fn clean_output_yields_empty_list() {
        assert!(parse_build_output("** BUILD SUCCEEDED **\n").is_empty());
        assert!(parse_build_output("").is_empty());
    }

    #[test]
    fn constructor_rejects_invalid_issues() {
        assert_eq!(
            BuildIssue::new(IssueSeverity::Error, "  ", None, None, None),
            Err(IssueError::EmptyMessage)
        );
        assert_eq!(
            BuildIssue::new(IssueSeverity::Error, "m", None, Some(0), None),
            Err(IssueError::NonPositivePosition)
        );
    }
}
