//! A tiny interactive shell.
//!
//! Each input line is split into words. Built-in commands (`help`/`?`, `exit`,
//! `pwd`, `cd`) run inside the shell process; anything else is looked up on the
//! search path, turned into an argument vector and started with `fork` + `execv`
//! while the shell waits for it to finish.
//!
//! The main entry point is [`Interpreter`]. The lower layers are public so they
//! can be used on their own: [`resolver`] finds executables, [`argv`] builds the
//! argument vector and [`launcher`] runs the child process.

pub mod argv;
mod builtin;
pub mod cli;
pub mod command;
pub mod env;
mod interpreter;
pub mod launcher;
pub mod logging;
pub mod resolver;
pub mod tokenizer;

#[cfg(test)]
mod testing;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{EXIT_NOT_FOUND, Interpreter};
