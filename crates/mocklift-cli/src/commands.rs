//! Execution of the lifecycle subcommands.

use std::time::Duration;

use tracing::info;

use mocklift::telemetry::LogLevelControl;
use mocklift::{
    ArtifactCoordinate, EmbeddedServerFactory, ForkedProcessLauncher, HttpControlClientFactory,
    InitializerLoader, InitializerRegistry, InitializerSource, InstanceManager, LaunchRequest,
    LocalRepositoryResolver, OutputMode, SearchPathSet, ShutdownSignal, StartRequest,
    SystemProcessFactory, TelemetryHandle, wait_while_running,
};
use mocklift_config::{Config, FORWARDING_DISABLED, ForwardingConfig, LogLevel, PortSet};

use crate::AppError;
use crate::cli::{CliCommand, ForkArgs, RunArgs, ServerArgs};

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Validated form of [`ServerArgs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerSettings {
    pub(crate) ports: PortSet,
    pub(crate) forwarding: ForwardingConfig,
    pub(crate) log_level: Option<LogLevel>,
    pub(crate) initializers: InitializerSource,
    pub(crate) jvm_options: Vec<String>,
    pub(crate) output: OutputMode,
}

impl TryFrom<&ServerArgs> for ServerSettings {
    type Error = AppError;

    fn try_from(args: &ServerArgs) -> Result<Self, Self::Error> {
        let ports = PortSet::parse_optional(args.server_port.as_deref())?;
        let forwarding = ForwardingConfig::new(
            args.proxy_remote_port.unwrap_or(FORWARDING_DISABLED),
            args.proxy_remote_host.clone().unwrap_or_default(),
        )?;
        let log_level = LogLevel::parse_optional(args.log_level.as_deref())?;
        let jvm_options = args
            .jvm_options
            .as_deref()
            .map(|options| options.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        let output = if args.pipe_log_to_console {
            OutputMode::Inherit
        } else {
            OutputMode::Discard
        };
        Ok(Self {
            ports,
            forwarding,
            log_level,
            initializers: InitializerSource::new(
                args.initialization_class.clone(),
                args.initialization_json.clone(),
            ),
            jvm_options,
            output,
        })
    }
}

/// Runs `command`, honouring `--skip` before any validation.
pub(crate) fn execute(
    command: &CliCommand,
    config: &Config,
    registry: InitializerRegistry,
) -> Result<(), AppError> {
    if command.server().skip {
        info!(target: COMMAND_TARGET, "Skipping plugin execution");
        return Ok(());
    }

    let mut manager = manager(config, registry);
    match command {
        CliCommand::Run(args) => run_embedded(&mut manager, args),
        CliCommand::RunForked(args) => run_forked(&mut manager, config, args),
        CliCommand::StopForked(args) => stop_forked(&mut manager, args),
        CliCommand::Stop(_) => {
            info!(target: COMMAND_TARGET, "Stopping the MockServer");
            manager.stop();
            Ok(())
        }
    }
}

fn manager(config: &Config, registry: InitializerRegistry) -> InstanceManager {
    let loader = InitializerLoader::new(registry, SearchPathSet::from_config(config));
    InstanceManager::new(
        Box::new(EmbeddedServerFactory),
        Box::new(HttpControlClientFactory),
        loader,
    )
}

fn run_embedded(manager: &mut InstanceManager, args: &RunArgs) -> Result<(), AppError> {
    let settings = ServerSettings::try_from(&args.server)?;
    info!(
        target: COMMAND_TARGET,
        ports = %settings.ports,
        "about to start embedded MockServer"
    );
    let report = manager.start(&StartRequest {
        ports: settings.ports,
        forwarding: settings.forwarding,
        log_level: settings.log_level,
        initializers: settings.initializers,
    })?;
    if report.ports.is_empty() {
        return Ok(());
    }

    let signal = shutdown_signal()?;
    let timeout = args
        .timeout
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs);
    let outcome = wait_while_running(manager, signal.as_ref(), timeout)?;
    info!(target: COMMAND_TARGET, ?outcome, ports = %report.ports, "embedded run finished");
    manager.stop();
    Ok(())
}

fn run_forked(manager: &mut InstanceManager, config: &Config, args: &ForkArgs) -> Result<(), AppError> {
    let settings = ServerSettings::try_from(&args.server)?;
    let dependencies = args
        .dependencies
        .iter()
        .map(|coordinate| coordinate.parse::<ArtifactCoordinate>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut launcher = ForkedProcessLauncher::new(
        Box::new(LocalRepositoryResolver::new(config.local_repository())),
        Box::new(SystemProcessFactory),
    )
    .with_runtime_home(config.runtime_home());
    let launch = launcher.launch(
        manager,
        &LaunchRequest {
            ports: settings.ports,
            forwarding: settings.forwarding,
            log_level: settings.log_level,
            jvm_options: settings.jvm_options,
            dependencies,
            output: settings.output,
            initializers: settings.initializers,
        },
    );
    info!(
        target: COMMAND_TARGET,
        spawned = launch.spawned,
        readiness = ?launch.readiness,
        pid = ?launcher.child_id(),
        "forked launch finished"
    );
    Ok(())
}

fn stop_forked(manager: &mut InstanceManager, args: &ServerArgs) -> Result<(), AppError> {
    let settings = ServerSettings::try_from(args)?;
    if let Some(level) = settings.log_level {
        TelemetryHandle.apply(level)?;
    }
    manager.stop_remote(&settings.ports, false)?;
    if !settings.ports.is_empty() {
        info!(
            target: COMMAND_TARGET,
            ports = %settings.ports,
            "Stopped MockServer running on port [{}]",
            settings.ports
        );
    }
    Ok(())
}

#[cfg(unix)]
fn shutdown_signal() -> Result<Box<dyn ShutdownSignal>, AppError> {
    Ok(Box::new(mocklift::SystemShutdownSignal::install()?))
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<Box<dyn ShutdownSignal>, AppError> {
    use std::sync::mpsc::Sender;

    use mocklift::{ChannelShutdownSignal, ShutdownError};

    // Without signal support only the timeout or a remote stop ends a run.
    struct Unsignalled {
        _sender: Sender<()>,
        signal: ChannelShutdownSignal,
    }

    impl ShutdownSignal for Unsignalled {
        fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError> {
            self.signal.wait_timeout(timeout)
        }
    }

    let (sender, signal) = ChannelShutdownSignal::new();
    Ok(Box::new(Unsignalled {
        _sender: sender,
        signal,
    }))
}
