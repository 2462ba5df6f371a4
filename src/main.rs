use anyhow::{Context, Result, bail};
use argh::FromArgs;
use capsh::editor::terminal::KeyReader;
use capsh::launcher::ignore_interrupt;
use capsh::{Environment, Interpreter, ShellConfig};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs)]
/// Interactive shell for the commands of one install directory.
struct Args {
    #[argh(option)]
    /// directory holding the command subdirectories; defaults to the directory of this executable.
    base_dir: Option<PathBuf>,

    #[argh(option)]
    /// configuration file; defaults to capsh.toml in the base directory when present.
    config: Option<PathBuf>,

    #[argh(option, short = 'c')]
    /// run one line, print its output and exit with its status.
    command: Option<String>,

    #[argh(option)]
    /// time budget for captured commands, in milliseconds.
    timeout_ms: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Args = argh::from_env();
    match run(args) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("capsh: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<i32> {
    let base_dir = match args.base_dir {
        Some(dir) => dir
            .canonicalize()
            .with_context(|| format!("base directory {}", dir.display()))?,
        None => capsh::env::install_dir().context("cannot locate the install directory")?,
    };
    let mut config = match &args.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::load_from_base(&base_dir)?,
    };
    if let Some(ms) = args.timeout_ms {
        config.timeout_ms = ms;
    }
    log::debug!("base directory {}", base_dir.display());

    ignore_interrupt().context("cannot ignore SIGINT")?;

    let mut env = Environment::new(base_dir, config);
    env.interactive = io::stdout().is_terminal();
    if io::stdin().is_terminal() {
        env.keys = Some(KeyReader::stdin()?);
    }
    let mut shell = Interpreter::new(env);

    match args.command {
        Some(line) => shell.run_line(&line, &mut io::stdout()),
        None => {
            if !io::stdin().is_terminal() {
                bail!("standard input is not a terminal; use -c to run a single line");
            }
            shell.repl()
        }
    }
}
