use crate::argv::Argv;
use crate::builtin::default_builtins;
use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::launcher::{ForkExecLauncher, ProcessLauncher};
use crate::resolver::find_command_path;
use crate::tokenizer;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{BufRead, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

/// Status reported for a command that could not be found.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-in commands defined in this crate.
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

/// A minimal shell that runs built-in commands in-process and external programs
/// in a child process.
///
/// Each line is split into words; the first word is matched against the built-in
/// factories in order, and anything else is resolved against the search path,
/// turned into an argument vector and handed to the [`ProcessLauncher`].
///
/// Example
/// ```
/// use tinysh::Interpreter;
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let code = sh.run_line_to("pwd", &mut out).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    launcher: Box<dyn ProcessLauncher>,
}

impl Interpreter {
    /// Create a new interpreter with a custom environment, set of built-in
    /// factories and launcher.
    pub fn new(
        env: Environment,
        commands: Vec<Box<dyn CommandFactory>>,
        launcher: Box<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            env,
            commands,
            launcher,
        }
    }

    /// Default built-ins and the fork/exec launcher over `env`.
    pub fn with_env(env: Environment) -> Self {
        Self::new(env, default_builtins(), Box::new(ForkExecLauncher))
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run one input line, writing output and diagnostics to standard output.
    pub fn run_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let mut stdout = std::io::stdout();
        let code = self.run_line_to(line, &mut stdout)?;
        stdout.flush()?;
        Ok(code)
    }

    /// Run one input line, writing built-in output and diagnostics to `out`.
    ///
    /// Returns the status of the command; a blank line is a no-op with status 0.
    /// Lookup and launch failures are reported to `out` and turned into a status.
    /// Only errors writing to `out` are returned as `Err`.
    pub fn run_line_to(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<ExitCode> {
        let tokens = tokenizer::tokenize(line);
        let Some(name) = tokens.first() else {
            return Ok(0);
        };

        let args: Vec<&str> = tokens[1..].iter().map(String::as_str).collect();
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, &args) {
                return cmd.execute(out, &mut self.env);
            }
        }

        self.run_external(&tokens, out)
    }

    fn run_external(&mut self, tokens: &[String], out: &mut dyn Write) -> anyhow::Result<ExitCode> {
        let name = &tokens[0];
        let Some(program) =
            find_command_path(self.env.search_path(), Path::new(name), self.env.direct_check)
        else {
            writeln!(out, "{}: command not found", name)?;
            return Ok(EXIT_NOT_FOUND);
        };

        let argv = match Argv::build(&program, tokens) {
            Ok(argv) => argv,
            Err(e) => {
                writeln!(out, "{}: {}", name, e)?;
                return Ok(1);
            }
        };

        out.flush()?;
        match self.launcher.launch(&program, &argv) {
            Ok(outcome) => Ok(outcome.code()),
            Err(e) => {
                writeln!(out, "{}: {}", name, e)?;
                Ok(1)
            }
        }
    }

    /// Read lines until end of input or `exit`, returning the shell's exit status.
    ///
    /// A terminal gets a line editor and a numbered `N: ` prompt; other input is
    /// read line by line without prompts.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        info!(interactive = self.env.interactive, "session started");
        if self.env.interactive {
            self.repl_interactive()?;
        } else {
            let stdin = std::io::stdin();
            self.repl_lines(stdin.lock())?;
        }
        Ok(self.env.exit_request.unwrap_or(0))
    }

    fn repl_interactive(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new().context("cannot initialize line editor")?;
        let mut line_num: u64 = 0;

        while !self.env.should_exit() {
            match rl.readline(&format!("{}: ", line_num)) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let code = self.run_line(&line)?;
                    debug!(code, "line finished");
                }
                Err(ReadlineError::Interrupted) => {}
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Io(err)) if err.kind() == ErrorKind::InvalidData => {
                    println!("cannot decode input line: {}", err);
                }
                Err(err) => return Err(err).context("cannot read input"),
            }
            line_num += 1;
        }
        Ok(())
    }

    /// Non-interactive loop over `input`.
    ///
    /// Lines are read as raw bytes; invalid UTF-8 is replaced rather than ending
    /// the loop.
    pub fn repl_lines(&mut self, input: impl BufRead) -> anyhow::Result<()> {
        self.repl_lines_to(input, &mut std::io::stdout())
    }

    fn repl_lines_to(&mut self, mut input: impl BufRead, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).context("cannot read input")? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let code = self.run_line_to(&line, out)?;
            out.flush()?;
            debug!(code, "line finished");
            if self.env.should_exit() {
                break;
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    /// An interpreter over the current process environment with the built-ins
    /// `help`/`?`, `exit`, `pwd` and `cd`.
    fn default() -> Self {
        Self::with_env(Environment::new())
    }
}
