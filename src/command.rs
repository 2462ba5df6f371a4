use crate::env::Environment;
use crate::parser::ParsedCommand;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Signal deaths are reported as `128 + signal`, the way POSIX shells do.
pub type ExitCode = i32;

/// How a command ended, as far as the session loop is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command ran and its output (if any) has been shown.
    Finished(ExitCode),
    /// A captured command failed. Its output was printed without paging and
    /// the caller may run the raw line through the system shell instead.
    Fallback(ExitCode),
}

impl Outcome {
    pub fn code(self) -> ExitCode {
        match self {
            Outcome::Finished(code) | Outcome::Fallback(code) => code,
        }
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command. Output that the shell itself prints (built-ins,
    /// captured output that fits on screen, notices) goes to `stdout`.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment)
    -> Result<Outcome>;
}

/// Factory that tries to create a command from a classified line.
///
/// Returns `None` when the factory doesn't recognize the command name.
pub trait CommandFactory {
    /// Attempt to create a command instance for the parsed line.
    fn try_create(
        &self,
        env: &Environment,
        command: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>>;

    /// Fixed name this factory answers to, offered by tab completion.
    fn fixed_name(&self) -> Option<&'static str> {
        None
    }
}
