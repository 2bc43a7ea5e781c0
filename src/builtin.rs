use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Other names the command answers to.
    fn aliases() -> &'static [&'static str] {
        &[]
    }

    /// One-line description shown by `help`.
    fn summary() -> &'static str;

    /// Executes the command using the provided output and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        if !self.output.ends_with('\n') {
            writeln!(stdout)?;
        }
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() || T::aliases().contains(&name) {
            debug!(builtin = T::name(), "dispatching built-in");
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// Factories for every built-in, in lookup order.
pub(crate) fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
    ]
}

fn help_entries() -> Vec<(&'static str, &'static str)> {
    fn entries<T: BuiltinCommand>(out: &mut Vec<(&'static str, &'static str)>) {
        for name in T::aliases().iter().copied().chain([T::name()]) {
            out.push((name, T::summary()));
        }
    }
    let mut out = Vec::new();
    entries::<Help>(&mut out);
    entries::<Exit>(&mut out);
    entries::<Pwd>(&mut out);
    entries::<Cd>(&mut out);
    out
}

#[derive(FromArgs)]
/// List the built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn aliases() -> &'static [&'static str] {
        &["?"]
    }

    fn summary() -> &'static str {
        "show this help menu"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        for (name, summary) in help_entries() {
            writeln!(stdout, "{} - {}", name, summary)?;
        }
        Ok(0)
    }
}

/// Exit the shell.
///
/// Parsed by hand: argh treats `-1` as an unknown option, and a status outside
/// `0..=255` is reduced modulo 256 the way the process exit status is.
pub struct Exit {
    pub status: Option<u8>,
}

impl FromArgs for Exit {
    fn from_args(command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let Some(&first) = args.first() else {
            return Ok(Self { status: None });
        };
        if matches!(first, "-h" | "--help" | "help") {
            return Err(EarlyExit {
                output: format!("Usage: {} [status]\n\nExit the shell.\n", command_name.join(" ")),
                status: Ok(()),
            });
        }
        let status = first
            .parse::<i64>()
            .map_err(|_| format!("exit: numeric argument required: {}", first))?;
        Ok(Self {
            status: Some(status.rem_euclid(256) as u8),
        })
    }
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn summary() -> &'static str {
        "exit the command shell"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let status = ExitCode::from(self.status.unwrap_or(0));
        env.exit_request = Some(status);
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn summary() -> &'static str {
        "print the current working directory"
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
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    /// Words after the first are ignored.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn summary() -> &'static str {
        "change the current working directory"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.args.first() {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => bail!("cd: no target and HOME not set"),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        if !new_dir.is_dir() {
            bail!("cd: no such directory: {}", new_dir.display());
        }

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        debug!(dir = %canonical.display(), "changed directory");
        env.current_dir = canonical;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_unique_temp_dir, serial};
    use std::env as stdenv;

    #[test]
    fn test_pwd_prints_current_dir() {
        let cur = PathBuf::from("/some/where");
        let mut env = Environment::isolated(cur.clone());

        let mut out = Vec::new();
        let res = Pwd { _args: vec![] }.execute(&mut out, &mut env);

        assert_eq!(res.unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "/some/where\n");
    }

    #[test]
    fn test_help_lists_every_builtin() {
        let mut env = Environment::isolated(PathBuf::from("/"));
        let mut out = Vec::new();
        Help {}.execute(&mut out, &mut env).unwrap();

        let s = String::from_utf8(out).unwrap();
        assert!(s.starts_with("? - show this help menu\nhelp - show this help menu\n"));
        for name in ["exit - ", "pwd - ", "cd - "] {
            assert!(s.contains(name), "missing {name:?} in {s:?}");
        }
    }

    #[test]
    fn test_exit_records_status() {
        let mut env = Environment::isolated(PathBuf::from("/"));
        let res = Exit { status: None }.execute(&mut Vec::new(), &mut env);
        assert_eq!(res.unwrap(), 0);
        assert_eq!(env.exit_request, Some(0));

        let mut env = Environment::isolated(PathBuf::from("/"));
        Exit { status: Some(4) }.execute(&mut Vec::new(), &mut env).unwrap();
        assert!(env.should_exit());
        assert_eq!(env.exit_request, Some(4));
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = serial();
        let temp = make_unique_temp_dir("cd_abs").expect("failed to create temp dir");

        // save original cwd to restore later
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(orig.clone());

        let args = vec![temp.to_string_lossy().to_string()];
        let res = Cd { args }.execute(&mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), temp);
        assert_eq!(env.current_dir, temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_relative_to_current_dir() {
        let _lock = serial();
        let temp = make_unique_temp_dir("cd_rel").expect("failed to create temp dir");
        fs::create_dir(temp.join("inner")).unwrap();

        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(temp.clone());

        let res = Cd { args: vec!["inner".to_string()] }.execute(&mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(env.current_dir, temp.join("inner"));

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = serial();
        let temp = make_unique_temp_dir("cd_home").expect("failed to create temp dir");

        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(orig.clone());
        env.set_var("HOME", temp.to_string_lossy().to_string());

        let res = Cd { args: vec![] }.execute(&mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(env.current_dir, temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = serial();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(orig.clone());

        let args = vec!["/no/such/dir".to_string()];
        let res = Cd { args }.execute(&mut Vec::new(), &mut env);

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, orig);
    }

    #[test]
    fn test_cd_to_regular_file_errors() {
        let _lock = serial();
        let temp = make_unique_temp_dir("cd_file").unwrap();
        let file = temp.join("plain");
        fs::write(&file, "x").unwrap();

        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(orig.clone());
        let res = Cd { args: vec![file.to_string_lossy().to_string()] }
            .execute(&mut Vec::new(), &mut env);

        let err = res.unwrap_err().to_string();
        assert!(err.contains("no such directory"), "{err}");
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_builtin_error_becomes_status_one() {
        let _lock = serial();
        let mut env = Environment::isolated(stdenv::current_dir().unwrap());
        let cmd: Box<dyn ExecutableCommand> = Box::new(Cd { args: vec!["/no/such/dir".into()] });

        let mut out = Vec::new();
        let code = cmd.execute(&mut out, &mut env).unwrap();

        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "cd: no such directory: /no/such/dir\n");
    }

    #[test]
    fn test_factory_reports_bad_arguments() {
        let factory = Factory::<Exit>::default();
        let env = Environment::isolated(PathBuf::from("/"));
        let cmd = factory.try_create(&env, "exit", &["abc"]).expect("exit is recognized");

        let mut env = env;
        let mut out = Vec::new();
        assert_eq!(cmd.execute(&mut out, &mut env).unwrap(), 1);
        assert!(!env.should_exit());
        assert!(!out.is_empty());
    }

    fn run_factory<T: BuiltinCommand + 'static>(name: &str, args: &[&str], env: &mut Environment) -> (ExitCode, String) {
        let cmd = Factory::<T>::default()
            .try_create(env, name, args)
            .expect("built-in is recognized");
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_exit_status_is_reduced_modulo_256() {
        for (arg, expected) in [("300", 44), ("-1", 255), ("256", 0), ("255", 255)] {
            let mut env = Environment::isolated(PathBuf::from("/"));
            let (code, out) = run_factory::<Exit>("exit", &[arg], &mut env);
            assert_eq!(code, expected, "exit {arg}");
            assert_eq!(env.exit_request, Some(expected), "exit {arg}");
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_exit_ignores_trailing_words() {
        let mut env = Environment::isolated(PathBuf::from("/"));
        let (code, _) = run_factory::<Exit>("exit", &["2", "extra"], &mut env);
        assert_eq!(code, 2);
        assert_eq!(env.exit_request, Some(2));
    }

    #[test]
    fn test_pwd_ignores_arguments() {
        let mut env = Environment::isolated(PathBuf::from("/some/where"));
        let (code, out) = run_factory::<Pwd>("pwd", &["x", "y"], &mut env);
        assert_eq!(code, 0);
        assert_eq!(out, "/some/where\n");
    }

    #[test]
    fn test_cd_uses_first_word_only() {
        let _lock = serial();
        let temp = make_unique_temp_dir("cd_extra").unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::isolated(orig.clone());

        let target = temp.to_string_lossy().to_string();
        let (code, out) = run_factory::<Cd>("cd", &[&target, "extra"], &mut env);
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(code, 0, "{out}");
        assert_eq!(env.current_dir, temp);
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_factory_matches_alias_only_exactly() {
        let factory = Factory::<Help>::default();
        let env = Environment::isolated(PathBuf::from("/"));
        assert!(factory.try_create(&env, "?", &[]).is_some());
        assert!(factory.try_create(&env, "help", &[]).is_some());
        assert!(factory.try_create(&env, "Help", &[]).is_none());
        assert!(factory.try_create(&env, "??", &[]).is_none());
    }
}
