//! An interactive shell for a self-contained command installation.
//!
//! Commands live in subdirectories of an install directory and are resolved
//! only there. Their combined output is captured under a time budget and
//! shown directly or through a full-screen pager; interactive programs get
//! the terminal instead. Input is read with a small raw-mode line editor.
//!
//! The main entry point is [`Interpreter`], which runs lines against a set of
//! pluggable factories. The public modules [`command`] and [`env`] expose the
//! traits and session state for implementing your own commands.

mod builtin;
pub mod capture;
pub mod command;
pub mod config;
pub mod editor;
pub mod env;
pub mod error;
mod interpreter;
pub mod launcher;
pub mod lexer;
pub mod pager;
pub mod parser;
pub mod resolver;
pub mod wildcard;

pub use config::ShellConfig;
pub use env::Environment;
/// Just a convenient re-export of the session loop.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
