//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

/// Command-line interface for managing mock server instances.
#[derive(Parser, Debug)]
#[command(name = "mocklift", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The lifecycle action to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Lifecycle subcommands.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Starts an embedded server and blocks until stopped.
    Run(RunArgs),
    /// Starts the server in a separate JVM and returns.
    RunForked(ForkArgs),
    /// Stops a forked server through its control plane.
    StopForked(ServerArgs),
    /// Stops the embedded server held by this process.
    ///
    /// A fresh `mocklift stop` process holds no server, so this only logs and
    /// succeeds. Use `stop-forked` to stop a server started elsewhere.
    Stop(ServerArgs),
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ServerArgs {
    /// Comma separated ports, for example `1080,1081`.
    #[arg(long, value_name = "PORTS")]
    pub(crate) server_port: Option<String>,
    /// Port unmatched requests are forwarded to; `-1` disables forwarding.
    #[arg(long, value_name = "PORT", allow_negative_numbers = true)]
    pub(crate) proxy_remote_port: Option<i32>,
    /// Host unmatched requests are forwarded to.
    #[arg(long, value_name = "HOST")]
    pub(crate) proxy_remote_host: Option<String>,
    /// Server log level (`TRACE` to `ERROR`, `OFF`, or a JUL name).
    #[arg(long, value_name = "LEVEL")]
    pub(crate) log_level: Option<String>,
    /// Logs and does nothing else.
    #[arg(long)]
    pub(crate) skip: bool,
    /// Passes a forked server's output through to this console.
    #[arg(long)]
    pub(crate) pipe_log_to_console: bool,
    /// Registered initializer type to run once the server is up.
    #[arg(long, value_name = "TYPE")]
    pub(crate) initialization_class: Option<String>,
    /// Expectation file to submit once the server is up.
    #[arg(long, value_name = "FILE")]
    pub(crate) initialization_json: Option<String>,
    /// Whitespace separated options for a forked JVM.
    #[arg(long, value_name = "OPTIONS", allow_hyphen_values = true)]
    pub(crate) jvm_options: Option<String>,
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) server: ServerArgs,
    /// Seconds to keep running; absent or zero waits for a signal.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
}

/// Arguments for `run-forked`.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ForkArgs {
    #[command(flatten)]
    pub(crate) server: ServerArgs,
    /// Extra `group:artifact:version[:type[:classifier]]` for the classpath.
    #[arg(long = "dependency", value_name = "COORDINATE")]
    pub(crate) dependencies: Vec<String>,
}

impl CliCommand {
    /// The shared settings of any subcommand.
    pub(crate) const fn server(&self) -> &ServerArgs {
        match self {
            Self::Run(args) => &args.server,
            Self::RunForked(args) => &args.server,
            Self::StopForked(server) | Self::Stop(server) => server,
        }
    }
}
