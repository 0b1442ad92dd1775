//! Command-line runtime for the mock server lifecycle tool.
//!
//! The module owns argument parsing, configuration bootstrapping and
//! telemetry set-up, then hands one lifecycle subcommand to the `mocklift`
//! library. The shipped binary has no compiled-in initializers; a project
//! that needs some builds its own binary around [`run_with_registry`].

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use mocklift::InitializerRegistry;
use mocklift::telemetry;

mod cli;
mod commands;
mod config;
mod errors;

use cli::Cli;
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `mocklift_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--local-repository",
    "--runtime-home",
    "--compile-roots",
    "--test-roots",
];

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_registry(args, InitializerRegistry::new(), stdout, stderr)
}

/// Runs the CLI with initializers resolvable through `registry`.
#[must_use]
pub fn run_with_registry<I, W, E>(
    args: I,
    registry: InitializerRegistry,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, registry, &OrthoConfigLoader, stdout, stderr)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    registry: InitializerRegistry,
    loader: &L,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli_arguments = prepare_cli_arguments(&args, &split);

    let result = Cli::try_parse_from(cli_arguments)
        .map_err(AppError::CliUsage)
        .and_then(|cli| loader.load(&split.config_arguments).map(|config| (cli, config)))
        .and_then(|(cli, config)| {
            telemetry::initialise(&config)?;
            commands::execute(&cli.command, &config, registry)
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Help and version output are requested, not failures.
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    cli_arguments.extend(args.iter().skip(split.command_start).cloned());
    cli_arguments
}
