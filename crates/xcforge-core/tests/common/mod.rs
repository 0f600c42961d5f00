//! Shared test helpers for xcforge-core integration tests.
//!
//! Provides [`MockExecutor`], a scripted [`CommandExecutor`] that matches
//! issued commands by substring and returns canned outputs, while
//! recording every invocation so tests can assert that idempotent paths
//! issue no mutating command at all.

use std::sync::Mutex;

use async_trait::async_trait;

use xcforge_core::exec::{CommandExecutor, CommandOutput, ExecError, ExecOptions};

// ---------------------------------------------------------------------------
// Canned outputs
// ---------------------------------------------------------------------------

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        timed_out: false,
    }
}

pub fn fail(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(exit_code),
        timed_out: false,
    }
}

/// Inventory JSON for one iOS runtime with the given (udid, name, state)
/// triples.
pub fn inventory(devices: &[(&str, &str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = devices
        .iter()
        .map(|(udid, name, state)| {
            serde_json::json!({
                "udid": udid,
                "name": name,
                "state": state,
                "isAvailable": true
            })
        })
        .collect();
    serde_json::json!({
        "devices": {
            "com.apple.CoreSimulator.SimRuntime.iOS-18-0": entries
        }
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// MockExecutor
// ---------------------------------------------------------------------------

/// Substring-scripted executor: the first rule whose needle occurs in the
/// issued command wins. Unmatched commands come back as exit 127, the
/// shell's own "command not found".
#[derive(Default)]
pub struct MockExecutor {
    rules: Vec<(String, CommandOutput)>,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, output: CommandOutput) -> Self {
        self.rules.push((needle.to_string(), output));
        self
    }

    /// Every command issued so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many issued commands contained `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn run(&self, command: &str, _options: &ExecOptions) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.to_string());
        for (needle, output) in &self.rules {
            if command.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(fail(127, &format!("mock: no rule for command: {command}")))
    }
}
