mod cli;
mod execute;

use std::path::Path;
use std::process::ExitCode;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use crate::cli::CLI;

/// Names under which holen runs its own command line. Anything else is a
/// link created by `holen link` and names the utility to run.
const SELF_NAMES: [&str; 2] = ["holen", "hln"];

fn main() -> ExitCode {
    let mut argv = std::env::args_os();
    let argv0 = argv.next().unwrap_or_default();
    let invoked_as = invoked_name(Path::new(&argv0));

    let result = if invoked_as.is_empty() || SELF_NAMES.contains(&invoked_as.as_str()) {
        let cli = CLI::parse();
        init_logging(cli.quiet, cli.verbose, cli.log_json);
        execute::execute(cli)
    } else {
        init_logging(false, false, false);
        execute::execute_run(&invoked_as, None, argv.collect())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_code(&err),
    }
}

fn invoked_name(argv0: &Path) -> String {
    let name = argv0
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// Logs go to stderr so a utility's stdout stays untouched. `RUST_LOG` wins
/// over the flags.
fn init_logging(quiet: bool, verbose: bool, json: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

/// A utility that ran and failed hands its own exit code back; it already
/// reported whatever it had to say.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(code) = err
        .downcast_ref::<holen::Error>()
        .and_then(holen::Error::child_exit_code)
    {
        return ExitCode::from(u8::try_from(code).unwrap_or(1));
    }
    eprintln!("{} {err:#}", "error:".red().bold());
    ExitCode::FAILURE
}
