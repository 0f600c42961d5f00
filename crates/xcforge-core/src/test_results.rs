//! Test result parsing across heterogeneous report formats.
//!
//! A test run's outcome arrives in one of several shapes depending on the
//! installed toolchain: a Swift Testing textual summary on the build
//! stream, the current `xcresulttool get test-results` JSON tree, or the
//! legacy result-bundle JSON. [`TestResultParser`] holds an ordered list of
//! [`ParseStrategy`] candidates, each exposing a side-effect-free
//! `can_parse` probe, and dispatches to the first one that recognizes the
//! input, so trial-and-error selection is always safe.
//!
//! Every strategy reports the same [`TestSummary`] shape with the invariant
//! `success == (failed == 0)`.

use std::collections::HashSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pass/fail counts plus failing-test identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
    /// Always `failed == 0`; maintained by [`TestSummary::new`].
    pub success: bool,
    /// Deduplicated failing-test identifiers, order of first appearance.
    pub failing_tests: Vec<String>,
}

impl TestSummary {
    pub fn new(passed: u32, failed: u32, failing_tests: Vec<String>) -> Self {
        Self {
            passed,
            failed,
            success: failed == 0,
            failing_tests,
        }
    }
}

/// One candidate parser for raw test-run output.
///
/// `can_parse` must be a pure content sniff: no side effects, no state, so
/// the dispatcher can probe every strategy in order.
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_parse(&self, raw: &str) -> bool;
    /// Parse the input; `None` when the content turned out not to carry a
    /// usable summary after all (absence of results is not an error).
    fn parse(&self, raw: &str) -> Option<TestSummary>;
}

/// Priority-ordered strategy dispatcher.
///
/// The textual Swift Testing strategy is tried before the result-bundle
/// strategies: when a run produces both, the textual summary is cheaper
/// and already at hand.
pub struct TestResultParser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl TestResultParser {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(SwiftTestingSummary),
                Box::new(XcresultTree),
                Box::new(LegacyXcresult),
            ],
        }
    }

    /// First matching strategy wins; `None` when nothing recognizes the
    /// input.
    pub fn parse(&self, raw: &str) -> Option<TestSummary> {
        self.strategies
            .iter()
            .find(|s| s.can_parse(raw))
            .and_then(|s| s.parse(raw))
    }

    /// Strategy names in priority order (for diagnostics).
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for TestResultParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Swift Testing textual summaries
// ---------------------------------------------------------------------------

/// Parses Swift Testing's condensed run summaries.
///
/// Three summary shapes occur in the wild, all from the same framework:
///
/// - all passed: `✔ Test run with 8 tests passed after 0.01 seconds.`
/// - explicit counts: `… 5 tests passed, 2 tests failed …`
/// - fail-only total: `✘ Test run with 7 tests failed after 1.2 seconds
///   with 3 issues.` Only the total is given, so the passed count is
///   derived by counting the individual per-test pass markers.
pub struct SwiftTestingSummary;

/// Collect test names from per-test marker lines, deduplicated across the
/// quoted-name form (`✘ Test "name" …`) and the parenthesized-call form
/// (`✘ Test name() …`), preserving first-appearance order.
fn collect_marked_tests(raw: &str, marker: char, verbs: &str) -> Vec<String> {
    let quoted = Regex::new(&format!(r#"{marker} Test "([^"]+)" (?:{verbs})"#))
        .expect("quoted marker pattern is valid");
    let call = Regex::new(&format!(
        r"{marker} Test ([A-Za-z_][A-Za-z0-9_]*\([^)]*\)) (?:{verbs})"
    ))
    .expect("call marker pattern is valid");

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for line in raw.lines() {
        let captured = quoted
            .captures(line)
            .or_else(|| call.captures(line))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if let Some(name) = captured {
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

impl ParseStrategy for SwiftTestingSummary {
    fn name(&self) -> &'static str {
        "swift-testing-summary"
    }

    fn can_parse(&self, raw: &str) -> bool {
        raw.contains("Test run with") || raw.contains("tests passed") || raw.contains("tests failed")
    }

    fn parse(&self, raw: &str) -> Option<TestSummary> {
        let all_passed = Regex::new(r"Test run with (\d+) tests? passed")
            .expect("all-passed pattern is valid");
        let failed_total = Regex::new(r"Test run with (\d+) tests? failed")
            .expect("failed-total pattern is valid");
        let explicit = Regex::new(r"(\d+) tests? passed, (\d+) tests? failed")
            .expect("explicit-counts pattern is valid");

        let capture_count = |caps: &regex_lite::Captures<'_>, i: usize| -> Option<u32> {
            caps.get(i).and_then(|m| m.as_str().parse().ok())
        };

        let failing = collect_marked_tests(raw, '✘', "recorded an issue|failed");

        if let Some(caps) = explicit.captures(raw) {
            let passed = capture_count(&caps, 1)?;
            let failed = capture_count(&caps, 2)?;
            return Some(TestSummary::new(passed, failed, failing));
        }

        if let Some(caps) = all_passed.captures(raw) {
            let passed = capture_count(&caps, 1)?;
            return Some(TestSummary::new(passed, 0, Vec::new()));
        }

        if let Some(caps) = failed_total.captures(raw) {
            let total = capture_count(&caps, 1)?;
            // Only a total is reported; derive the passed count from the
            // individual pass markers.
            let passed = collect_marked_tests(raw, '✔', "passed").len() as u32;
            let passed = passed.min(total);
            return Some(TestSummary::new(passed, total - passed, failing));
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Current result-bundle tree (xcresulttool get test-results tests)
// ---------------------------------------------------------------------------

/// Parses the current `xcresulttool` test tree: nested suites with
/// `"testNodes"` at the root and `"children"` below.
pub struct XcresultTree;

fn walk_test_nodes(node: &Value, passed: &mut u32, failed: &mut u32, failing: &mut Vec<String>) {
    if node.get("nodeType").and_then(Value::as_str) == Some("Test Case") {
        let name = node
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed test>");
        // Only leaves with a terminal status are counted.
        match node.get("result").and_then(Value::as_str) {
            Some("Passed") | Some("Expected Failure") => *passed += 1,
            Some("Failed") => {
                *failed += 1;
                let reason = node
                    .get("children")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .find(|c| {
                        c.get("nodeType").and_then(Value::as_str) == Some("Failure Message")
                    })
                    .and_then(|c| c.get("name").and_then(Value::as_str));
                failing.push(match reason {
                    Some(reason) => format!("{name}: {reason}"),
                    None => name.to_string(),
                });
            }
            // Skipped or still-running nodes are not terminal outcomes.
            _ => {}
        }
        return;
    }
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            walk_test_nodes(child, passed, failed, failing);
        }
    }
}

impl ParseStrategy for XcresultTree {
    fn name(&self) -> &'static str {
        "xcresult-tree"
    }

    fn can_parse(&self, raw: &str) -> bool {
        serde_json::from_str::<Value>(raw)
            .map(|v| v.get("testNodes").is_some())
            .unwrap_or(false)
    }

    fn parse(&self, raw: &str) -> Option<TestSummary> {
        let root: Value = serde_json::from_str(raw).ok()?;
        let nodes = root.get("testNodes")?.as_array()?;
        let (mut passed, mut failed) = (0, 0);
        let mut failing = Vec::new();
        for node in nodes {
            walk_test_nodes(node, &mut passed, &mut failed, &mut failing);
        }
        Some(TestSummary::new(passed, failed, failing))
    }
}

// ---------------------------------------------------------------------------
// Legacy result-bundle JSON (xcresulttool get --legacy --format json)
// ---------------------------------------------------------------------------

/// Parses the legacy deeply-wrapped result-bundle JSON, where scalar values
/// hide inside `{"_value": …}` envelopes and suites nest through
/// `"subtests"` arrays.
pub struct LegacyXcresult;

fn legacy_str<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)?.get("_value")?.as_str()
}

fn walk_legacy(node: &Value, passed: &mut u32, failed: &mut u32, failing: &mut Vec<String>) {
    if let Some(status) = legacy_str(node, "testStatus") {
        let name = legacy_str(node, "identifier")
            .or_else(|| legacy_str(node, "name"))
            .unwrap_or("<unnamed test>");
        match status {
            "Success" | "Expected Failure" => *passed += 1,
            "Failure" => {
                *failed += 1;
                let reason = node
                    .get("failureSummaries")
                    .and_then(|s| s.get("_values"))
                    .and_then(Value::as_array)
                    .and_then(|v| v.first())
                    .and_then(|s| legacy_str(s, "message"));
                failing.push(match reason {
                    Some(reason) => format!("{name}: {reason}"),
                    None => name.to_string(),
                });
            }
            // "Skipped" and transient statuses are not terminal leaves.
            _ => {}
        }
        return;
    }

    // Not a leaf: descend generically, which copes with the arbitrary
    // nesting of the ActionsInvocationRecord envelope.
    match node {
        Value::Object(map) => {
            for value in map.values() {
                walk_legacy(value, passed, failed, failing);
            }
        }
        Value::Array(values) => {
            for value in values {
                walk_legacy(value, passed, failed, failing);
            }
        }
        _ => {}
    }
}

impl ParseStrategy for LegacyXcresult {
    fn name(&self) -> &'static str {
        "legacy-xcresult"
    }

    fn can_parse(&self, raw: &str) -> bool {
        serde_json::from_str::<Value>(raw)
            .map(|v| v.get("_type").is_some() || v.get("actions").is_some())
            .unwrap_or(false)
    }

    fn parse(&self, raw: &str) -> Option<TestSummary> {
        let root: Value = serde_json::from_str(raw).ok()?;
        let (mut passed, mut failed) = (0, 0);
        let mut failing = Vec::new();
        walk_legacy(&root, &mut passed, &mut failed, &mut failing);
        Some(TestSummary::new(passed, failed, failing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PASSED: &str = "\
✔ Test checkoutTotals() passed after 0.002 seconds.
✔ Test \"applies discount\" passed after 0.001 seconds.
✔ Test run with 8 tests passed after 0.120 seconds.";

    const FAIL_ONLY_TOTAL: &str = "\
✔ Test checkoutTotals() passed after 0.002 seconds.
✔ Test \"applies discount\" passed after 0.001 seconds.
✘ Test emptyCart() recorded an issue at CartTests.swift:44:9: Expectation failed
✘ Test emptyCart() failed after 0.005 seconds.
✘ Test \"rejects negative quantity\" recorded an issue at CartTests.swift:61:9
✘ Test \"rejects negative quantity\" failed after 0.003 seconds.
✘ Test run with 4 tests failed after 0.140 seconds with 2 issues.";

    const EXPLICIT_COUNTS: &str = "\
Test session results: 5 tests passed, 2 tests failed
✘ Test \"first bad\" recorded an issue at A.swift:1:1
✘ Test secondBad() recorded an issue at B.swift:2:2";

    #[test]
    fn all_passed_summary() {
        let summary = SwiftTestingSummary.parse(ALL_PASSED).unwrap();
        assert_eq!(summary.passed, 8);
        assert_eq!(summary.failed, 0);
        assert!(summary.success);
        assert!(summary.failing_tests.is_empty());
    }

    #[test]
    fn fail_only_total_derives_passed_from_markers() {
        let summary = SwiftTestingSummary.parse(FAIL_ONLY_TOTAL).unwrap();
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 2);
        assert!(!summary.success);
        assert_eq!(summary.passed + summary.failed, 4);
    }

    #[test]
    fn failing_tests_dedup_across_quoted_and_call_forms() {
        let summary = SwiftTestingSummary.parse(FAIL_ONLY_TOTAL).unwrap();
        // Each failing test appears twice in the stream (issue line and
        // failed line) but once in the result.
        assert_eq!(
            summary.failing_tests,
            vec![
                "emptyCart()".to_string(),
                "rejects negative quantity".to_string()
            ]
        );
    }

    #[test]
    fn explicit_counts_shape() {
        let summary = SwiftTestingSummary.parse(EXPLICIT_COUNTS).unwrap();
        assert_eq!(summary.passed, 5);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failing_tests.len(), 2);
    }

    #[test]
    fn success_invariant_holds() {
        for raw in [ALL_PASSED, FAIL_ONLY_TOTAL, EXPLICIT_COUNTS] {
            let summary = SwiftTestingSummary.parse(raw).unwrap();
            assert_eq!(summary.success, summary.failed == 0);
        }
    }

    const TREE_JSON: &str = r#"{
        "testNodes": [
            {
                "name": "AppTests",
                "nodeType": "Test Suite",
                "children": [
                    {
                        "name": "CartTests",
                        "nodeType": "Test Suite",
                        "children": [
                            {"name": "testAdd()", "nodeType": "Test Case", "result": "Passed"},
                            {
                                "name": "testRemove()",
                                "nodeType": "Test Case",
                                "result": "Failed",
                                "children": [
                                    {"name": "XCTAssertEqual failed: 2 != 3", "nodeType": "Failure Message"}
                                ]
                            },
                            {"name": "testSkipped()", "nodeType": "Test Case", "result": "Skipped"}
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn tree_counts_only_terminal_leaves() {
        let summary = XcresultTree.parse(TREE_JSON).unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        // Skipped leaf is neither passed nor failed.
        assert_eq!(summary.failing_tests.len(), 1);
        assert!(summary.failing_tests[0].starts_with("testRemove()"));
        assert!(summary.failing_tests[0].contains("XCTAssertEqual failed"));
    }

    const LEGACY_JSON: &str = r#"{
        "_type": {"_name": "ActionsInvocationRecord"},
        "actions": {
            "_values": [
                {
                    "summaries": {
                        "_values": [
                            {
                                "subtests": {
                                    "_values": [
                                        {
                                            "subtests": {
                                                "_values": [
                                                    {
                                                        "identifier": {"_value": "CartTests/testAdd()"},
                                                        "testStatus": {"_value": "Success"}
                                                    },
                                                    {
                                                        "identifier": {"_value": "CartTests/testRemove()"},
                                                        "testStatus": {"_value": "Failure"},
                                                        "failureSummaries": {
                                                            "_values": [
                                                                {"message": {"_value": "assertion failed"}}
                                                            ]
                                                        }
                                                    }
                                                ]
                                            }
                                        }
                                    ]
                                }
                            }
                        ]
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn legacy_flattens_nested_suites() {
        let summary = LegacyXcresult.parse(LEGACY_JSON).unwrap();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.failing_tests,
            vec!["CartTests/testRemove(): assertion failed".to_string()]
        );
    }

    #[test]
    fn dispatcher_prefers_textual_strategy() {
        let parser = TestResultParser::new();
        assert_eq!(
            parser.strategy_names(),
            vec!["swift-testing-summary", "xcresult-tree", "legacy-xcresult"]
        );

        let summary = parser.parse(ALL_PASSED).unwrap();
        assert_eq!(summary.passed, 8);
    }

    #[test]
    fn dispatcher_routes_json_to_tree_strategy() {
        let parser = TestResultParser::new();
        let summary = parser.parse(TREE_JSON).unwrap();
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn dispatcher_returns_none_for_unrecognized_input() {
        let parser = TestResultParser::new();
        assert!(parser.parse("** BUILD SUCCEEDED **").is_none());
        assert!(parser.parse("").is_none());
    }

    #[test]
    fn probes_are_side_effect_free_and_reorderable() {
        // Probing every strategy against every fixture, repeatedly, must
        // not change any outcome.
        let parser = TestResultParser::new();
        for _ in 0..3 {
            assert!(SwiftTestingSummary.can_parse(ALL_PASSED));
            assert!(!SwiftTestingSummary.can_parse(TREE_JSON));
            assert!(XcresultTree.can_parse(TREE_JSON));
            assert!(!XcresultTree.can_parse(LEGACY_JSON));
            assert!(LegacyXcresult.can_parse(LEGACY_JSON));
        }
        assert_eq!(parser.parse(TREE_JSON).unwrap().passed, 1);
    }
}
