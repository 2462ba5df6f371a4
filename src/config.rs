//! Shell configuration.
//!
//! Read from `capsh.toml` next to the executable (or an explicit `--config`
//! path). Every key is optional; missing keys take the defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// File name probed inside the base directory when no explicit config is given.
pub const CONFIG_FILE_NAME: &str = "capsh.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Subdirectories of the base directory searched for commands, in priority order.
    pub command_dirs: Vec<String>,

    /// Commands that run with the terminal inherited instead of captured.
    pub realtime_commands: Vec<String>,

    /// Token that forces realtime mode for one invocation. Removed before dispatch.
    pub realtime_flag: String,

    /// Commands whose parameters are passed through without wildcard expansion.
    pub glob_bypass: Vec<String>,

    /// Wall-clock budget for a captured command, in milliseconds.
    pub timeout_ms: u64,

    /// Upper bound of a single wait on the capture pipe, in milliseconds.
    pub poll_interval_ms: u64,

    pub history_capacity: usize,

    /// Longest line the editor accepts, in bytes.
    pub max_line_len: usize,

    /// Environment variable that exposes the base directory to child processes.
    pub base_env_var: String,

    /// Shell used to run lines that do not name a known command.
    pub fallback_shell: String,

    /// Re-run a failed captured command through `fallback_shell`.
    pub fallback_on_failure: bool,

    /// Clipboard readers, tried in order. Each entry is a program followed by its arguments.
    pub clipboard_commands: Vec<Vec<String>>,

    pub prompt: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command_dirs: strings(&["bin", "commands", "tools"]),
            realtime_commands: strings(&[
                "vi", "vim", "nano", "top", "htop", "less", "sh", "bash", "capsh", "watch",
            ]),
            realtime_flag: "--realtime".to_string(),
            glob_bypass: strings(&["find", "tree"]),
            timeout_ms: 5000,
            poll_interval_ms: 1000,
            history_capacity: 100,
            max_line_len: 4096,
            base_env_var: "CAPSH_HOME".to_string(),
            fallback_shell: "/bin/sh".to_string(),
            fallback_on_failure: false,
            clipboard_commands: vec![
                strings(&["wl-paste", "--no-newline"]),
                strings(&["xclip", "-selection", "clipboard", "-o"]),
                strings(&["xsel", "-b", "-o"]),
                strings(&["pbpaste"]),
            ],
            prompt: "capsh> ".to_string(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `capsh.toml` from `base_dir` if present, defaults otherwise.
    pub fn load_from_base(base_dir: &Path) -> Result<Self, ConfigError> {
        let path = base_dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::debug!("loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn is_realtime(&self, name: &str) -> bool {
        self.realtime_commands.iter().any(|c| c == name)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
