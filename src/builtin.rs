use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Outcome};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::parser::ParsedCommand;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They are consulted before the
/// command directories, so an installed `cd` can never shadow the builtin.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command against the session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<Outcome> {
        match T::execute(*self, stdout, env) {
            Ok(x) => Ok(Outcome::Finished(x)),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(Outcome::Finished(1))
            }
        }
    }
}

/// Help text or a usage error produced by argh instead of a command.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<Outcome> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(Outcome::Finished(if self.is_error { 1 } else { 0 }))
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        command: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>> {
        if command.name != T::name() {
            return None;
        }
        let args = command.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(match T::from_args(&[T::name()], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }

    fn fixed_name(&self) -> Option<&'static str> {
        Some(T::name())
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("cd: not a directory: {}", canonical.display());
        }

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        log::debug!("cwd is now {}", canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional)]
    /// status to exit with; defaults to the status of the last command.
    pub code: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = self.code.unwrap_or(env.last_status);
        env.should_exit = true;
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Print the lines entered in this session, oldest first.
pub struct History {
    #[argh(option, short = 'n')]
    /// show only the most recent COUNT entries.
    pub count: Option<usize>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let total = env.history.len();
        let skip = total.saturating_sub(self.count.unwrap_or(total));
        for (i, line) in env.history.iter().enumerate().skip(skip) {
            writeln!(stdout, "{:>5}  {line}", i + 1)?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::parser::Flag;
    use std::env as stdenv;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::TempDir;

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn session() -> Environment {
        Environment::new(PathBuf::from("/opt/capsh"), ShellConfig::default())
    }

    fn line(name: &str, flags: Vec<Flag>, parameters: &[&str]) -> ParsedCommand {
        ParsedCommand {
            name: name.to_string(),
            flags,
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            realtime: false,
        }
    }

    fn run<T: BuiltinCommand + 'static>(command: &ParsedCommand, env: &mut Environment) -> (Outcome, String) {
        let cmd = Factory::<T>::default().try_create(env, command).unwrap();
        let mut out = Vec::new();
        let outcome = cmd.execute(&mut out, env).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let mut env = session();
        env.current_dir = PathBuf::from("/tmp/somewhere");

        let mut out = Vec::new();
        let res = Pwd {}.execute(&mut out, &mut env);

        assert!(res.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "/tmp/somewhere\n");
    }

    #[test]
    fn test_factory_matches_name_only() {
        let env = session();
        let factory = Factory::<Pwd>::default();
        assert!(factory.try_create(&env, &line("pwd", vec![], &[])).is_some());
        assert!(factory.try_create(&env, &line("pwdx", vec![], &[])).is_none());
        assert_eq!(factory.fixed_name(), Some("pwd"));
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = TempDir::new().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = session();
        let cmd = Cd {
            target: Some(canonical_temp.to_string_lossy().to_string()),
        };
        let res = cmd.execute(&mut Vec::new(), &mut env);
        let new_cwd = stdenv::current_dir().unwrap();
        stdenv::set_current_dir(orig).expect("failed to restore cwd");

        assert!(res.is_ok());
        assert_eq!(fs::canonicalize(new_cwd).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_relative_to_session_dir() {
        let _lock = lock_current_dir();
        let temp = TempDir::new().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("sub")).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = session();
        env.current_dir = canonical_temp.clone();
        let (outcome, _) = run::<Cd>(&line("cd", vec![], &["sub"]), &mut env);
        stdenv::set_current_dir(orig).expect("failed to restore cwd");

        assert_eq!(outcome, Outcome::Finished(0));
        assert_eq!(env.current_dir, canonical_temp.join("sub"));
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = TempDir::new().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = session();
        env.set_var("HOME", canonical_temp.to_string_lossy());
        let res = Cd { target: None }.execute(&mut Vec::new(), &mut env);
        stdenv::set_current_dir(orig).expect("failed to restore cwd");

        assert!(res.is_ok());
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_reports_and_fails() {
        let _lock = lock_current_dir();
        let mut env = session();
        let before = env.current_dir.clone();
        let (outcome, out) = run::<Cd>(&line("cd", vec![], &["/definitely/not/here"]), &mut env);
        assert_eq!(outcome, Outcome::Finished(1));
        assert!(out.contains("cd: can't canonicalize /definitely/not/here"));
        assert_eq!(env.current_dir, before);
    }

    #[test]
    fn test_exit_sets_flag_and_code() {
        let mut env = session();
        let (outcome, _) = run::<Exit>(&line("exit", vec![], &["3"]), &mut env);
        assert_eq!(outcome, Outcome::Finished(3));
        assert!(env.should_exit);
    }

    #[test]
    fn test_exit_defaults_to_last_status() {
        let mut env = session();
        env.last_status = 42;
        let (outcome, _) = run::<Exit>(&line("exit", vec![], &[]), &mut env);
        assert_eq!(outcome, Outcome::Finished(42));
    }

    #[test]
    fn test_exit_rejects_garbage() {
        let mut env = session();
        let (outcome, out) = run::<Exit>(&line("exit", vec![], &["soon"]), &mut env);
        assert_eq!(outcome, Outcome::Finished(1));
        assert!(!out.is_empty());
        assert!(!env.should_exit);
    }

    #[test]
    fn test_history_lists_entries() {
        let mut env = session();
        for entry in ["ls", "calc 1+1", "pwd"] {
            env.history.push(entry);
        }
        let (_, out) = run::<History>(&line("history", vec![], &[]), &mut env);
        assert_eq!(out, "    1  ls\n    2  calc 1+1\n    3  pwd\n");

        let (_, out) = run::<History>(&line("history", vec![Flag::new("-n", Some("1"))], &[]), &mut env);
        assert_eq!(out, "    3  pwd\n");
    }

    #[test]
    fn test_help_is_not_an_error() {
        let mut env = session();
        let (outcome, out) = run::<History>(&line("history", vec![Flag::new("--help", None)], &[]), &mut env);
        assert_eq!(outcome, Outcome::Finished(0));
        assert!(out.contains("Usage: history"));
    }
}
