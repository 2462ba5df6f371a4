//! Ownership of the terminal: raw mode, key input and the system clipboard.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::process::{Command, Stdio};
use std::time::Duration;

use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use super::keys::{Key, KeyDecoder};
use crate::error::TerminalError;

/// How long a lone `ESC` waits for the rest of a sequence.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Raw mode held for the guard's lifetime.
///
/// Dropping the guard restores the original mode, so every exit path
/// (early return, error, panic unwind) hands back a cooked terminal.
pub struct RawModeGuard {
    bracketed_paste: bool,
}

impl RawModeGuard {
    pub fn enter(bracketed_paste: bool) -> Result<Self, TerminalError> {
        enable_raw_mode().map_err(TerminalError::EnterRaw)?;
        let guard = Self { bracketed_paste };
        if bracketed_paste {
            execute!(io::stdout(), EnableBracketedPaste)?;
        }
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.bracketed_paste {
            if let Err(e) = execute!(io::stdout(), DisableBracketedPaste) {
                log::error!("failed to disable bracketed paste: {e}");
            }
        }
        if let Err(e) = disable_raw_mode() {
            log::error!("failed to restore terminal mode: {e}");
        }
    }
}

/// Reads keys from an unbuffered descriptor.
///
/// Bytes are read straight from the descriptor, never through a buffered
/// reader, so readiness reported by `poll` matches what is left to decode.
pub struct KeyReader<R> {
    input: R,
    decoder: KeyDecoder,
    pending: VecDeque<u8>,
}

impl KeyReader<File> {
    /// Reader over a duplicate of the process's standard input.
    pub fn stdin() -> Result<Self, TerminalError> {
        let fd = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(TerminalError::Read)?;
        Ok(Self::new(File::from(fd)))
    }
}

impl<R: Read + AsFd> KeyReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            decoder: KeyDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Next key, or `None` once the input is closed.
    pub fn read_key(&mut self) -> Result<Option<Key>, TerminalError> {
        loop {
            while let Some(byte) = self.pending.pop_front() {
                if let Some(key) = self.decoder.feed(byte) {
                    return Ok(Some(key));
                }
            }
            if self.decoder.awaiting_sequence() && !self.wait_readable(ESCAPE_TIMEOUT)? {
                if let Some(key) = self.decoder.flush() {
                    return Ok(Some(key));
                }
                continue;
            }
            let mut chunk = [0u8; 256];
            let n = match self.input.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TerminalError::Read(e)),
            };
            if n == 0 {
                return Ok(self.decoder.flush());
            }
            self.pending.extend(&chunk[..n]);
        }
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool, TerminalError> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.input.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(TerminalError::Read(e.into())),
        }
    }
}

impl<R: AsRawFd> std::fmt::Debug for KeyReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyReader")
            .field("fd", &self.input.as_raw_fd())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Read text from the first clipboard utility that works.
pub fn read_clipboard(commands: &[Vec<String>]) -> Option<String> {
    for argv in commands {
        let Some((program, args)) = argv.split_first() else {
            continue;
        };
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                return Some(String::from_utf8_lossy(&out.stdout).into_owned());
            }
            Ok(_) => log::debug!("clipboard reader {program} failed"),
            Err(e) => log::debug!("clipboard reader {program} unavailable: {e}"),
        }
    }
    None
}

/// Make pasted text safe to insert into a single line: tabs become spaces,
/// other control characters are dropped.
pub fn sanitize_paste(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Ring the terminal bell.
pub fn bell(out: &mut impl Write) -> io::Result<()> {
    out.write_all(b"\x07")
}
