use crate::command::ExitCode;
use crate::resolver::{DEFAULT_SEARCH_PATH, SearchPath};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Session state of one shell.
///
/// The environment contains:
/// - `vars`: variables captured from the process at startup.
/// - `current_dir`: the working directory, kept in sync with the process by `cd`.
/// - `interactive`: whether input comes from a terminal (prompts and line editing).
/// - `direct_check`: whether a bare command name is first looked up in the
///   current directory.
/// - `exit_request`: set by the `exit` built-in; the input loop stops when present.
///
/// The search path is derived from `PATH` on first use and cached until `PATH`
/// is overwritten through [`Environment::set_var`].
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory.
    pub current_dir: PathBuf,
    pub interactive: bool,
    pub direct_check: bool,
    /// Status requested by `exit`, if it ran.
    pub exit_request: Option<ExitCode>,
    search_path_override: Option<OsString>,
    /// Process `PATH` as captured, kept even when it is not UTF-8.
    raw_path: Option<OsString>,
    search_path: OnceCell<SearchPath>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars_os()` (skipping non UTF-8 ones)
    /// and initializes `current_dir` from `std::env::current_dir()`. `PATH` is
    /// also kept as raw bytes for command lookup.
    pub fn new() -> Self {
        let cwd = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_vars(cwd, stdenv::vars_os())
    }

    fn from_vars(current_dir: PathBuf, vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let mut env = Self::isolated(current_dir);
        for (k, v) in vars {
            if k == "PATH" {
                env.raw_path = Some(v.clone());
            }
            if let (Ok(k), Ok(v)) = (k.into_string(), v.into_string()) {
                env.vars.insert(k, v);
            }
        }
        env
    }

    /// An environment with no captured variables, rooted at `current_dir`.
    /// [`Environment::get_var`] still falls back to the process environment.
    pub fn isolated(current_dir: PathBuf) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir,
            interactive: false,
            direct_check: true,
            exit_request: None,
            search_path_override: None,
            raw_path: None,
            search_path: OnceCell::new(),
        }
    }

    /// Get the value of a variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        let key = key.into();
        if key == "PATH" {
            self.search_path.take();
        }
        self.vars.insert(key, val.into());
    }

    /// Use `value` instead of `PATH` for command lookup.
    pub fn override_search_path(&mut self, value: impl Into<OsString>) {
        self.search_path_override = Some(value.into());
        self.search_path.take();
    }

    pub fn should_exit(&self) -> bool {
        self.exit_request.is_some()
    }

    /// Directories searched for bare command names.
    ///
    /// Sources, first present wins: the override, `PATH` set in the session, the
    /// captured process `PATH` (any bytes), [`DEFAULT_SEARCH_PATH`].
    pub fn search_path(&self) -> &SearchPath {
        self.search_path.get_or_init(|| {
            if let Some(value) = &self.search_path_override {
                return SearchPath::parse(value);
            }
            let value = match self.vars.get("PATH") {
                Some(value) => Some(OsString::from(value)),
                None => self.raw_path.clone().or_else(|| stdenv::var_os("PATH")),
            };
            match value {
                Some(value) => SearchPath::parse(&value),
                None => SearchPath::parse(OsStr::new(DEFAULT_SEARCH_PATH)),
            }
        })
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::env as stdenv;
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    use std::path::PathBuf;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::isolated(stdenv::current_dir().unwrap());

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert!(!env.should_exit());
    }

    #[test]
    fn test_search_path_follows_path_updates() {
        let mut env = Environment::isolated(PathBuf::from("/"));
        env.set_var("PATH", "/a:/b");
        assert_eq!(env.search_path().dirs(), &[PathBuf::from("/a"), PathBuf::from("/b")]);

        env.set_var("PATH", "/c");
        assert_eq!(env.search_path().dirs(), &[PathBuf::from("/c")]);
    }

    #[test]
    fn test_override_wins_over_path() {
        let mut env = Environment::isolated(PathBuf::from("/"));
        env.set_var("PATH", "/a");
        env.override_search_path("/x:/y");
        assert_eq!(env.search_path().dirs(), &[PathBuf::from("/x"), PathBuf::from("/y")]);
    }

    #[test]
    fn test_non_utf8_path_is_still_searched() {
        let raw = OsString::from_vec(b"/opt/t\xffools:/bin".to_vec());
        let vars = [
            (OsString::from("PATH"), raw),
            (OsString::from("HOME"), OsString::from("/home/u")),
        ];
        let env = Environment::from_vars(PathBuf::from("/"), vars);

        assert_eq!(env.get_var("HOME"), Some("/home/u".to_string()));
        assert!(!env.vars.contains_key("PATH"));
        let dirs = env.search_path().dirs();
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], PathBuf::from(OsString::from_vec(b"/opt/t\xffools".to_vec())));
        assert_eq!(dirs[1], PathBuf::from("/bin"));
    }

    #[test]
    fn test_session_path_wins_over_captured_path() {
        let vars = [(OsString::from("PATH"), OsString::from_vec(b"/\xfe".to_vec()))];
        let mut env = Environment::from_vars(PathBuf::from("/"), vars);
        env.set_var("PATH", "/c");
        assert_eq!(env.search_path().dirs(), &[PathBuf::from("/c")]);
    }
}
