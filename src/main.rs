use tinysh::Interpreter;
use tinysh::cli::ShellArgs;
use tinysh::logging;

fn main() -> anyhow::Result<()> {
    let args: ShellArgs = argh::from_env();
    logging::init_tracing();

    let mut sh = Interpreter::with_env(args.environment());
    let code = match &args.command {
        Some(line) => sh.run_line(line)?,
        None => sh.repl()?,
    };
    std::process::exit(code)
}
