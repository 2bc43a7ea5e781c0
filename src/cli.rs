use crate::env::Environment;
use argh::FromArgs;
use std::io::IsTerminal;

#[derive(FromArgs, Debug, Default)]
/// A tiny shell running built-ins in-process and other programs via fork and exec.
pub struct ShellArgs {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    pub command: Option<String>,

    #[argh(option)]
    /// colon-separated directories to search instead of $PATH.
    pub path: Option<String>,

    #[argh(switch)]
    /// do not run bare command names found in the current directory.
    pub no_cwd_lookup: bool,
}

impl ShellArgs {
    /// Session environment for these arguments over the current process state.
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        self.configure(&mut env);
        env.interactive = self.command.is_none() && std::io::stdin().is_terminal();
        env
    }

    fn configure(&self, env: &mut Environment) {
        if let Some(path) = &self.path {
            env.override_search_path(path);
        }
        env.direct_check = !self.no_cwd_lookup;
    }
}
