//! CLI entrypoint for the mock server lifecycle tool.
//!
//! The binary delegates to [`mocklift_cli::run`], which loads configuration,
//! initialises telemetry and runs one lifecycle command.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    mocklift_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
