use crate::capture::{CaptureLimits, capture_output};
use crate::command::{CommandFactory, ExecutableCommand, Outcome};
use crate::env::Environment;
use crate::error::LaunchError;
use crate::interpreter::Factory;
use crate::pager;
use crate::parser::ParsedCommand;
use anyhow::Result;
use nix::sys::signal::{self, SigHandler, Signal};
use std::io::{self, PipeReader, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// How a child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The child inherits the terminal and the shell blocks until it exits.
    Realtime,
    /// Standard output and standard error share one pipe the shell reads.
    Captured,
}

/// Command found in one of the install directory's command subdirectories.
#[derive(Debug)]
pub struct ExternalCommand {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    mode: Mode,
}

impl ExternalCommand {
    pub fn new(name: String, program: PathBuf, args: Vec<String>, mode: Mode) -> Self {
        Self {
            name,
            program,
            args,
            mode,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        command: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>> {
        let Some(program) = env.resolver().resolve(&command.name) else {
            log::debug!("{} not found under {}", command.name, env.base_dir.display());
            return None;
        };
        let mode = mode_for(env, command);
        log::debug!("{} -> {} ({mode:?})", command.name, program.display());
        Some(Box::new(ExternalCommand::new(
            command.name.clone(),
            program,
            command.args(),
            mode,
        )))
    }
}

/// Realtime when the line carried the override token or the name is listed
/// as realtime; captured otherwise.
pub fn mode_for(env: &Environment, command: &ParsedCommand) -> Mode {
    if command.realtime || env.config.is_realtime(&command.name) {
        Mode::Realtime
    } else {
        Mode::Captured
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<Outcome> {
        let cmd = prepare(&self.program, &self.args, env);
        if self.mode == Mode::Realtime {
            stdout.flush()?;
            let status = run_realtime(cmd)?;
            return Ok(Outcome::Finished(exit_code(status)));
        }

        let limits = CaptureLimits {
            budget: env.config.timeout(),
            poll_interval: env.config.poll_interval(),
        };
        let (mut child, pipe) = spawn_captured(cmd)?;
        let capture = capture_output(&mut child, pipe, limits)?;
        let code = exit_code(capture.status);

        if capture.timed_out {
            // Cut-off output is never paged either.
            pager::print_lines(&capture, stdout)?;
            eprintln!(
                "capsh: {}: timed out after {} ms",
                self.name, env.config.timeout_ms
            );
            return Ok(Outcome::Finished(code));
        }
        if code != 0 {
            // Partial output of a failed command is never paged.
            pager::print_lines(&capture, stdout)?;
            return Ok(Outcome::Fallback(code));
        }
        let keys = if env.interactive { env.keys.as_mut() } else { None };
        pager::present(&capture, stdout, keys)?;
        Ok(Outcome::Finished(code))
    }
}

/// The raw input line handed to the system shell, used when a name does not
/// resolve or a captured command fails and fallback is enabled.
#[derive(Debug)]
pub struct SystemCommand {
    shell: String,
    line: String,
}

impl SystemCommand {
    pub fn new(shell: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            line: line.into(),
        }
    }
}

impl ExecutableCommand for SystemCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<Outcome> {
        log::debug!("falling back to {} -c {:?}", self.shell, self.line);
        let args = ["-c".to_string(), self.line];
        let cmd = prepare(Path::new(&self.shell), &args, env);
        stdout.flush()?;
        let status = run_realtime(cmd)?;
        Ok(Outcome::Finished(exit_code(status)))
    }
}

/// Build the child command: argv, session variables, working directory, and
/// the interrupt disposition reset.
pub fn prepare(program: &Path, args: &[String], env: &Environment) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).envs(&env.vars).current_dir(&env.current_dir);
    // SAFETY: the hook only calls signal(2), which is async-signal-safe.
    unsafe {
        cmd.pre_exec(restore_default_interrupt);
    }
    cmd
}

/// Run with inherited standard streams and wait for the child.
pub fn run_realtime(mut cmd: Command) -> Result<ExitStatus, LaunchError> {
    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: program_name(&cmd),
        source,
    })?;
    child.wait().map_err(LaunchError::Wait)
}

/// Spawn with standard output and standard error joined into one pipe.
///
/// Standard input is closed so a captured child cannot steal keystrokes.
/// The parent's copies of the write end are gone once this returns, so the
/// reader sees end-of-file when the child (and anything it forked) exits.
pub fn spawn_captured(mut cmd: Command) -> Result<(Child, PipeReader), LaunchError> {
    let (reader, writer) = io::pipe().map_err(LaunchError::Pipe)?;
    let writer_err = writer.try_clone().map_err(LaunchError::Pipe)?;
    cmd.stdin(Stdio::null()).stdout(writer).stderr(writer_err);
    let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: program_name(&cmd),
        source,
    })?;
    drop(cmd);
    Ok((child, reader))
}

/// Shell-style exit code: the process's own code, or `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => terminated_by_signal(status),
    }
}

fn terminated_by_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        128 + signal
    } else if status.core_dumped() {
        255
    } else {
        -1
    }
}

/// Make the shell itself survive Ctrl-C.
pub fn ignore_interrupt() -> nix::Result<()> {
    // SAFETY: SIG_IGN installs no handler code.
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }.map(drop)
}

fn restore_default_interrupt() -> io::Result<()> {
    // SAFETY: runs in the child between fork and exec; no handler is installed.
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigDfl) }
        .map(drop)
        .map_err(io::Error::from)
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}
