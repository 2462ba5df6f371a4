use std::collections::HashMap;
use std::env as stdenv;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::ShellConfig;
use crate::editor::history::HistoryRing;
use crate::editor::terminal::KeyReader;
use crate::resolver::CommandResolver;

/// Per-session state of the shell.
///
/// Everything a command needs to know about the running shell lives here,
/// so independent sessions can coexist (tests build their own).
#[derive(Debug)]
pub struct Environment {
    /// Variables exported to child processes, on top of the inherited environment.
    pub vars: HashMap<String, String>,
    /// Working directory for commands and wildcard expansion.
    pub current_dir: PathBuf,
    /// Install directory the command subdirectories live under.
    pub base_dir: PathBuf,
    pub config: ShellConfig,
    pub history: HistoryRing,
    /// Standard output is a terminal, so long output may be paged.
    pub interactive: bool,
    /// The session's one reader of the terminal. Keys typed ahead stay
    /// buffered here between the line editor and the pager.
    pub keys: Option<KeyReader<File>>,
    /// Set by `exit`; the session loop stops when it sees it.
    pub should_exit: bool,
    /// Status of the last command.
    pub last_status: i32,
}

impl Environment {
    /// Capture the current process state into a new session.
    ///
    /// The base directory is exported under `config.base_env_var`.
    pub fn new(base_dir: PathBuf, config: ShellConfig) -> Self {
        let mut vars = HashMap::new();
        vars.insert(
            config.base_env_var.clone(),
            base_dir.to_string_lossy().into_owned(),
        );
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let history = HistoryRing::new(config.history_capacity);
        Self {
            vars,
            current_dir,
            base_dir,
            config,
            history,
            interactive: false,
            keys: None,
            should_exit: false,
            last_status: 0,
        }
    }

    /// Get the value of a variable, falling back to the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn resolver(&self) -> CommandResolver {
        CommandResolver::new(&self.base_dir, &self.config.command_dirs)
    }
}

/// The directory the running executable was installed in, symlinks resolved.
pub fn install_dir() -> std::io::Result<PathBuf> {
    let exe = stdenv::current_exe()?.canonicalize()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}
