use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, in `RUST_LOG` syntax.
pub const LOG_ENV: &str = "TINYSH_LOG";

/// Initialize logging to standard error.
///
/// Standard output belongs to the shell's prompts and diagnostics, so log lines
/// never go there. The filter comes from [`LOG_ENV`] and defaults to `warn`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
}
