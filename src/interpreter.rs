use crate::builtin::{Cd, Exit, History, Pwd};
use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Outcome};
use crate::editor::terminal::KeyReader;
use crate::editor::{EditorOptions, LineEditor, ReadOutcome};
use crate::env::Environment;
use crate::launcher::{ExternalCommand, SystemCommand};
use crate::lexer;
use crate::parser::{self, ClassifyRules, ParsedCommand};
use anyhow::{Context, Result};
use std::io::{self, Write};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Builtins first, then the install directory's commands.
fn default_factories() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<History>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

/// The interactive session: reads lines, classifies them and runs them.
///
/// Lines are matched against a list of [`CommandFactory`] objects in order.
/// A name no factory accepts is handed to the system shell verbatim.
///
/// Example
/// ```no_run
/// use capsh::{Environment, Interpreter, ShellConfig};
/// let env = Environment::new("/opt/capsh".into(), ShellConfig::default());
/// let mut sh = Interpreter::new(env);
/// let code = sh.run_line("pwd", &mut std::io::stdout()).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    editor: LineEditor,
}

impl Interpreter {
    /// Create an interpreter with the builtins and the install directory's commands.
    pub fn new(env: Environment) -> Self {
        Self::with_commands(env, default_factories())
    }

    /// Create a new interpreter with a custom set of command factories.
    pub fn with_commands(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        let mut command_names: Vec<String> = commands
            .iter()
            .filter_map(|f| f.fixed_name())
            .map(str::to_string)
            .collect();
        command_names.extend(env.resolver().command_names());
        command_names.sort();
        command_names.dedup();
        log::debug!("{} command names for completion", command_names.len());

        let editor = LineEditor::new(EditorOptions {
            max_line_len: env.config.max_line_len,
            clipboard_commands: env.config.clipboard_commands.clone(),
            command_names,
        });
        Self {
            env,
            commands,
            editor,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Run one input line and return its exit code.
    ///
    /// Builtin output and captured output go to `stdout`. A blank line does
    /// nothing and keeps the previous status.
    pub fn run_line(&mut self, line: &str, stdout: &mut dyn Write) -> Result<ExitCode> {
        let tokens = lexer::split_into_tokens(line);
        log::debug!("tokens: {tokens:?}");
        let rules = ClassifyRules {
            glob_bypass: &self.env.config.glob_bypass,
            realtime_flag: &self.env.config.realtime_flag,
            cwd: &self.env.current_dir,
        };
        let Some(parsed) = parser::classify(tokens, &rules) else {
            return Ok(self.env.last_status);
        };
        log::debug!("parsed: {parsed:?}");

        let Some(cmd) = self.create(&parsed) else {
            return self.run_system(line, stdout);
        };
        let outcome = cmd
            .execute(stdout, &mut self.env)
            .with_context(|| parsed.name.clone())?;
        let code = match outcome {
            Outcome::Fallback(code) if self.env.config.fallback_on_failure => {
                log::debug!("{} exited with {code}, retrying through the system shell", parsed.name);
                self.run_system(line, stdout)?
            }
            outcome => outcome.code(),
        };
        self.env.last_status = code;
        Ok(code)
    }

    fn create(&self, parsed: &ParsedCommand) -> Option<Box<dyn ExecutableCommand>> {
        self.commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, parsed))
    }

    fn run_system(&mut self, line: &str, stdout: &mut dyn Write) -> Result<ExitCode> {
        let cmd = Box::new(SystemCommand::new(
            self.env.config.fallback_shell.clone(),
            line,
        ));
        let code = cmd
            .execute(stdout, &mut self.env)
            .with_context(|| self.env.config.fallback_shell.clone())?
            .code();
        self.env.last_status = code;
        Ok(code)
    }

    /// Read-eval-print loop on the controlling terminal.
    ///
    /// Runs until end of input or `exit`, and returns the last status.
    /// Command failures are reported and the loop goes on; losing the
    /// terminal ends it.
    pub fn repl(&mut self) -> Result<ExitCode> {
        let mut stdout = io::stdout();
        if self.env.keys.is_none() {
            self.env.keys = Some(KeyReader::stdin().context("cannot read the terminal")?);
        }
        while !self.env.should_exit {
            let Some(keys) = self.env.keys.as_mut() else {
                break;
            };
            let read = self
                .editor
                .read_line(
                    &self.env.config.prompt,
                    &mut self.env.history,
                    &self.env.current_dir,
                    keys,
                )
                .context("line editor failed")?;
            let line = match read {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Eof => break,
            };
            if let Err(e) = self.run_line(&line, &mut stdout) {
                stdout.flush()?;
                eprintln!("capsh: {e:#}");
                self.env.last_status = 1;
            }
        }
        Ok(self.env.last_status)
    }
}
