//! Persistent configuration for xcforge.
//!
//! Stores user settings in `~/.xcforge/config.json`: per-command timeout,
//! beautifier override, and a root directory for derived data. Everything
//! is optional; defaults apply when the file is absent or unparseable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::exec::ExecOptions;
use crate::ipc::xcforge_dir;

const CONFIG_FILENAME: &str = "config.json";

/// Persistent xcforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct XcforgeConfig {
    /// Wall-clock budget per external command, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,

    /// Beautifier program the test pipeline is piped through
    /// (default: `xcbeautify`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beautifier: Option<String>,

    /// Root under which per-project derived data directories are created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_data_root: Option<PathBuf>,
}

impl XcforgeConfig {
    /// Load config from `~/.xcforge/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = xcforge_dir().join(CONFIG_FILENAME);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.xcforge/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let path = xcforge_dir().join(CONFIG_FILENAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Executor options honoring the configured timeout.
    pub fn exec_options(&self) -> ExecOptions {
        match self.command_timeout_secs {
            Some(secs) => ExecOptions::with_timeout_secs(secs),
            None => ExecOptions::default(),
        }
    }
}
