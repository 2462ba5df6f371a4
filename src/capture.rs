//! Collecting a captured child's output under a wall-clock budget.
//!
//! The pipe is polled with a bounded timeout so the loop wakes up at least
//! once per poll interval to check the budget and whether the child is gone.
//! Once the budget is spent the child is killed and reaped, and whatever it
//! wrote before dying is kept.

use std::borrow::Cow;
use std::io::{self, Read};
use std::ops::Range;
use std::os::fd::AsFd;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::error::LaunchError;

const READ_CHUNK: usize = 4096;
const INITIAL_CAPACITY: usize = 4096;
/// Sleep between exit checks once the pipe has closed.
const REAP_STEP: Duration = Duration::from_millis(10);

/// Growable byte buffer for captured output. Capacity doubles when full.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    data: Vec<u8>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let target = (self.data.capacity() * 2).max(needed).max(INITIAL_CAPACITY);
            self.data.reserve_exact(target - self.data.len());
        }
        self.data.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

/// Byte ranges of the lines in a buffer, terminators excluded.
///
/// Every line is kept, empty ones included. A final line without a
/// terminator still counts; a terminator at the very end does not open an
/// extra empty line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    ranges: Vec<Range<usize>>,
}

impl LineIndex {
    pub fn build(bytes: &[u8]) -> Self {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'\n' {
                ranges.push(start..i);
                start = i + 1;
            }
        }
        if start < bytes.len() {
            ranges.push(start..bytes.len());
        }
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Range<usize>> {
        self.ranges.get(i).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.ranges.iter().cloned()
    }
}

/// Output of one captured command.
#[derive(Debug)]
pub struct Capture {
    pub buffer: CaptureBuffer,
    pub lines: LineIndex,
    pub status: ExitStatus,
    /// The budget ran out and the child was killed.
    pub timed_out: bool,
}

impl Capture {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Raw bytes of line `i`.
    pub fn line_bytes(&self, i: usize) -> &[u8] {
        match self.lines.get(i) {
            Some(range) => &self.buffer.as_bytes()[range],
            None => &[],
        }
    }

    /// Line `i` as text, invalid UTF-8 replaced and a trailing `\r` dropped.
    pub fn line(&self, i: usize) -> Cow<'_, str> {
        let bytes = self.line_bytes(i);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes)
    }

    pub fn text_lines(&self) -> Vec<String> {
        (0..self.line_count())
            .map(|i| self.line(i).into_owned())
            .collect()
    }
}

/// Time limits for a captured command.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// Total wall-clock budget.
    pub budget: Duration,
    /// Longest single wait on the pipe.
    pub poll_interval: Duration,
}

/// Read `pipe` until it closes or the budget runs out, then reap `child`.
pub fn capture_output<P: Read + AsFd>(
    child: &mut Child,
    mut pipe: P,
    limits: CaptureLimits,
) -> Result<Capture, LaunchError> {
    let deadline = Instant::now() + limits.budget;
    let mut buffer = CaptureBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut timed_out = false;

    loop {
        let now = Instant::now();
        if now >= deadline {
            timed_out = true;
            break;
        }
        let wait = (deadline - now).min(limits.poll_interval);
        if wait_readable(&pipe, wait)? {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buffer.append(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(LaunchError::Read(e)),
            }
        } else if child.try_wait().map_err(LaunchError::Wait)?.is_some() {
            // Exited, and whoever still holds the pipe has gone quiet.
            break;
        }
    }

    let status = if timed_out {
        kill_and_reap(child, &mut pipe, &mut buffer, limits.poll_interval)?
    } else {
        match reap_until(child, deadline)? {
            Some(status) => status,
            None => {
                timed_out = true;
                kill_and_reap(child, &mut pipe, &mut buffer, limits.poll_interval)?
            }
        }
    };

    if timed_out {
        log::warn!(
            "child {} killed after {:?}, {} bytes kept",
            child.id(),
            limits.budget,
            buffer.len()
        );
    }
    log::debug!("captured {} bytes, status {status}", buffer.len());

    let lines = LineIndex::build(buffer.as_bytes());
    Ok(Capture {
        buffer,
        lines,
        status,
        timed_out,
    })
}

/// Wait for the child to exit without passing `deadline`.
fn reap_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>, LaunchError> {
    loop {
        if let Some(status) = child.try_wait().map_err(LaunchError::Wait)? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(REAP_STEP.min(deadline - now));
    }
}

fn kill_and_reap<P: Read + AsFd>(
    child: &mut Child,
    pipe: &mut P,
    buffer: &mut CaptureBuffer,
    drain_for: Duration,
) -> Result<ExitStatus, LaunchError> {
    if let Err(e) = child.kill() {
        // Already exited between the last check and now.
        log::debug!("kill failed: {e}");
    }
    let status = child.wait().map_err(LaunchError::Wait)?;
    drain(pipe, buffer, drain_for)?;
    Ok(status)
}

/// Take whatever is already sitting in the pipe, for at most `limit`.
fn drain<P: Read + AsFd>(
    pipe: &mut P,
    buffer: &mut CaptureBuffer,
    limit: Duration,
) -> Result<(), LaunchError> {
    let stop = Instant::now() + limit;
    let mut chunk = [0u8; READ_CHUNK];
    while Instant::now() < stop && wait_readable(&*pipe, Duration::ZERO)? {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buffer.append(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(LaunchError::Read(e)),
        }
    }
    Ok(())
}

fn wait_readable<P: AsFd>(pipe: &P, timeout: Duration) -> Result<bool, LaunchError> {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(pipe.as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(n) => Ok(n > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(LaunchError::Read(e.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::spawn_captured;
    use std::process::Command;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn limits(budget_ms: u64, poll_ms: u64) -> CaptureLimits {
        CaptureLimits {
            budget: Duration::from_millis(budget_ms),
            poll_interval: Duration::from_millis(poll_ms),
        }
    }

    #[test]
    fn line_index_keeps_every_line() {
        assert_eq!(LineIndex::build(b"").len(), 0);
        assert_eq!(LineIndex::build(b"a\n").len(), 1);
        assert_eq!(LineIndex::build(b"a\n\nb").len(), 3);
        let index = LineIndex::build(b"one\n\nthree\n\n");
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![0..3, 4..4, 5..10, 11..11]);
    }

    #[test]
    fn partial_last_line_counts() {
        let index = LineIndex::build(b"x\ny");
        assert_eq!(index.get(1), Some(2..3));
    }

    #[test]
    fn buffer_grows_geometrically() {
        let mut buffer = CaptureBuffer::new();
        let start = buffer.capacity();
        buffer.append(&vec![b'x'; start + 1]);
        assert!(buffer.capacity() >= start * 2);
        let grown = buffer.capacity();
        buffer.append(&vec![b'y'; grown - buffer.len()]);
        assert_eq!(buffer.capacity(), grown);
        assert_eq!(buffer.len(), grown);
    }

    #[test]
    fn stdout_and_stderr_share_one_stream() {
        let (mut child, pipe) = spawn_captured(sh("echo out; echo err >&2; echo out2")).unwrap();
        let capture = capture_output(&mut child, pipe, limits(5000, 100)).unwrap();
        assert!(!capture.timed_out);
        assert!(capture.status.success());
        assert_eq!(capture.text_lines(), vec!["out", "err", "out2"]);
    }

    #[test]
    fn unterminated_output_is_a_line() {
        let (mut child, pipe) = spawn_captured(sh("printf 'a\\n\\nb'")).unwrap();
        let capture = capture_output(&mut child, pipe, limits(5000, 100)).unwrap();
        assert_eq!(capture.text_lines(), vec!["a", "", "b"]);
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let (mut child, pipe) = spawn_captured(sh("echo nope; exit 3")).unwrap();
        let capture = capture_output(&mut child, pipe, limits(5000, 100)).unwrap();
        assert_eq!(capture.status.code(), Some(3));
        assert_eq!(capture.text_lines(), vec!["nope"]);
    }

    #[test]
    fn runaway_child_is_killed_and_output_kept() {
        let started = Instant::now();
        let (mut child, pipe) = spawn_captured(sh("echo before; exec sleep 30")).unwrap();
        let capture = capture_output(&mut child, pipe, limits(300, 100)).unwrap();
        let elapsed = started.elapsed();
        assert!(capture.timed_out);
        assert!(!capture.status.success());
        assert_eq!(capture.text_lines(), vec!["before"]);
        // Budget plus one poll interval, with slack for a loaded machine.
        assert!(elapsed < Duration::from_millis(300 + 100 + 500), "{elapsed:?}");
    }

    #[test]
    fn child_closing_stdout_early_is_still_timed() {
        let (mut child, pipe) =
            spawn_captured(sh("exec >/dev/null 2>&1; exec sleep 30")).unwrap();
        let capture = capture_output(&mut child, pipe, limits(200, 50)).unwrap();
        assert!(capture.timed_out);
        assert!(capture.buffer.is_empty());
    }
}
