use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while starting or supervising a child process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create output pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to read command output: {0}")]
    Read(#[source] io::Error),

    #[error("failed to wait for child process: {0}")]
    Wait(#[source] io::Error),
}

/// Failures of the terminal session owned by the line editor or the pager.
///
/// Any of these ends the editing session: input is unreadable without raw mode.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to enter raw mode: {0}")]
    EnterRaw(#[source] io::Error),

    #[error("failed to read terminal input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write to terminal: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
