use std::ffi::{CStr, CString, c_char};
use std::ptr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgvError {
    #[error("empty executable path")]
    MalformedPath,
    #[error("no tokens to build arguments from")]
    EmptyTokens,
    #[error("argument {index} contains a NUL byte")]
    InteriorNul { index: usize },
}

/// Argument vector handed to `execv`.
///
/// Holds exactly one C string per input token. The terminating NULL pointer is
/// only added by [`Argv::exec_pointers`], so the child never sees extra entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv {
    args: Vec<CString>,
}

impl Argv {
    /// Build the argument vector for `resolved`.
    ///
    /// Element 0 is the part of `resolved` after its last `/`; the remaining
    /// elements are `tokens[1..]` unchanged. `tokens` must hold at least the
    /// command name.
    pub fn build<S: AsRef<str>>(resolved: &Path, tokens: &[S]) -> Result<Self, ArgvError> {
        let bytes = resolved.as_os_str().as_bytes();
        if bytes.is_empty() {
            return Err(ArgvError::MalformedPath);
        }
        if tokens.is_empty() {
            return Err(ArgvError::EmptyTokens);
        }
        let program = match bytes.iter().rposition(|&b| b == b'/') {
            Some(idx) => &bytes[idx + 1..],
            None => bytes,
        };

        let mut args = Vec::with_capacity(tokens.len());
        args.push(CString::new(program).map_err(|_| ArgvError::InteriorNul { index: 0 })?);
        for (index, token) in tokens.iter().enumerate().skip(1) {
            let arg = CString::new(token.as_ref()).map_err(|_| ArgvError::InteriorNul { index })?;
            args.push(arg);
        }
        Ok(Self { args })
    }

    pub fn program(&self) -> &CStr {
        &self.args[0]
    }

    pub fn as_slice(&self) -> &[CString] {
        &self.args
    }

    /// NULL-terminated pointer array in the layout `execv` expects.
    ///
    /// The pointers borrow from `self` and are only valid while it is alive.
    pub fn exec_pointers(&self) -> Vec<*const c_char> {
        self.args
            .iter()
            .map(|a| a.as_ptr())
            .chain([ptr::null()])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Lossy UTF-8 view, for logging and tests.
    pub fn to_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}
