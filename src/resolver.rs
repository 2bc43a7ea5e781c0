use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Search path used when neither the session nor the process defines `PATH`.
///
/// Matches `confstr(_CS_PATH)` on glibc and musl.
pub const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin";

/// Ordered list of directories consulted when resolving a bare command name.
///
/// Entries keep the order of the `:`-separated source value. Empty entries (from a
/// leading, trailing or doubled `:`) are kept but never match.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn parse(value: &OsStr) -> Self {
        Self {
            dirs: std::env::split_paths(value).collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn find(&self, cmd: &OsStr) -> Option<PathBuf> {
        for dir in &self.dirs {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let path = dir.join(cmd);
            if is_regular_file(&path) {
                return Some(path);
            }
        }
        None
    }
}

/// Resolve a command the way the shell looks up programs.
///
/// Behavior:
/// - Name containing `/`: returned as-is if it names a regular file, otherwise
///   `None`. The search path is not consulted.
/// - Bare name with `direct_check`: returned as-is if it names a regular file in
///   the current directory.
/// - Otherwise each directory of `search_path` is tried in order and the first
///   `dir/name` that is a regular file wins.
/// - Empty name: `None`.
///
/// `None` means "command not found"; it is an expected outcome, not a failure.
pub fn find_command_path<'a>(
    search_path: &SearchPath,
    command: &'a Path,
    direct_check: bool,
) -> Option<Cow<'a, Path>> {
    let name = command.as_os_str();
    if name.is_empty() {
        return None;
    }

    if name.as_bytes().contains(&b'/') {
        return find_by_path(command).map(Cow::Borrowed);
    }

    if direct_check {
        if let Some(path) = find_by_path(command) {
            debug!(command = %command.display(), "resolved in current directory");
            return Some(Cow::Borrowed(path));
        }
    }

    let found = search_path.find(name);
    match &found {
        Some(path) => debug!(command = %command.display(), path = %path.display(), "resolved on search path"),
        None => debug!(command = %command.display(), dirs = search_path.dirs.len(), "not found on search path"),
    }
    found.map(Cow::Owned)
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_regular_file(path) { Some(path) } else { None }
}

/// `stat` semantics: symlinks are followed, only regular files qualify.
fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
