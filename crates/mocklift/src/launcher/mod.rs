//! Launching the mock server in a separate JVM.
//!
//! [`ForkedProcessLauncher`] stops whatever already answers on the requested
//! ports, builds the `java` command line, spawns it and then waits a bounded
//! time for the child's control plane before running initializers. Nothing
//! here fails the caller: spawn errors and readiness timeouts are logged and
//! reported in the returned [`ForkedLaunch`].

mod command;
mod process;
mod runtime;

use std::fmt;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{error, info, warn};

use mocklift_config::{ForwardingConfig, LogLevel, PortSet};

use crate::initializer::{InitializationReport, InitializerSource};
use crate::instance::InstanceManager;
use crate::resolver::{ArtifactCoordinate, PathResolver};

pub use command::LaunchSpec;
pub use process::{ChildExit, ChildProcess, OutputMode, ProcessFactory, SystemProcessFactory};
pub use runtime::{
    ENTRY_POINT, FALLBACK_VERSION, PATH_SEPARATOR, artifact_version, classpath, java_executable,
    server_artifact,
};

pub(crate) const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launcher");

/// Pause after stopping a previous instance so its ports are released.
pub const DEFAULT_PORT_RELEASE_DELAY: Duration = Duration::from_secs(1);

/// Total time spent waiting for the child to answer.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Gap between readiness probes.
pub const DEFAULT_READINESS_INTERVAL: Duration = Duration::from_millis(500);

/// Parameters for [`ForkedProcessLauncher::launch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Ports the child serves on.
    pub ports: PortSet,
    /// Forwarding passed through to the child.
    pub forwarding: ForwardingConfig,
    /// Level passed to the child as `-logLevel`.
    pub log_level: Option<LogLevel>,
    /// Extra JVM options.
    pub jvm_options: Vec<String>,
    /// Artifacts appended to the classpath after the server jar.
    pub dependencies: Vec<ArtifactCoordinate>,
    /// Whether the child's output reaches the console.
    pub output: OutputMode,
    /// Initializers applied once the child answers. Only the registered
    /// initializer runs; a JSON file is ignored for forked servers.
    pub initializers: InitializerSource,
}

/// How the readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The child answered its status probe.
    Ready,
    /// The budget ran out first. Launching continues regardless.
    TimedOut,
    /// No ports were requested, so there was nothing to probe.
    NotChecked,
}

/// What a launch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkedLaunch {
    /// The command line that was run.
    pub spec: LaunchSpec,
    /// Whether the process was created.
    pub spawned: bool,
    /// Outcome of the readiness wait.
    pub readiness: Readiness,
    /// Initializer outcomes.
    pub initialization: InitializationReport,
}

/// Spawns mock servers as child processes.
pub struct ForkedProcessLauncher {
    resolver: Box<dyn PathResolver>,
    processes: Box<dyn ProcessFactory>,
    runtime_home: Option<Utf8PathBuf>,
    artifact_version: String,
    port_release_delay: Duration,
    readiness_timeout: Duration,
    readiness_interval: Duration,
    child: Option<Box<dyn ChildProcess>>,
}

impl fmt::Debug for ForkedProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkedProcessLauncher")
            .field("runtime_home", &self.runtime_home)
            .field("artifact_version", &self.artifact_version)
            .field("child", &self.child_id())
            .finish_non_exhaustive()
    }
}

impl ForkedProcessLauncher {
    /// Creates a launcher using the bundled server version and default
    /// timings.
    #[must_use]
    pub fn new(resolver: Box<dyn PathResolver>, processes: Box<dyn ProcessFactory>) -> Self {
        Self {
            resolver,
            processes,
            runtime_home: None,
            artifact_version: artifact_version(),
            port_release_delay: DEFAULT_PORT_RELEASE_DELAY,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            readiness_interval: DEFAULT_READINESS_INTERVAL,
            child: None,
        }
    }

    /// Looks for `bin/java` under `home`.
    #[must_use]
    pub fn with_runtime_home(mut self, home: Option<Utf8PathBuf>) -> Self {
        self.runtime_home = home;
        self
    }

    /// Launches a specific server version.
    #[must_use]
    pub fn with_artifact_version(mut self, version: impl Into<String>) -> Self {
        self.artifact_version = version.into();
        self
    }

    /// Overrides the pause after stopping a previous instance.
    #[must_use]
    pub const fn with_port_release_delay(mut self, delay: Duration) -> Self {
        self.port_release_delay = delay;
        self
    }

    /// Overrides the readiness budget and probe interval.
    #[must_use]
    pub const fn with_readiness(mut self, timeout: Duration, interval: Duration) -> Self {
        self.readiness_timeout = timeout;
        self.readiness_interval = interval;
        self
    }

    /// Process id of the most recently spawned child.
    #[must_use]
    pub fn child_id(&self) -> Option<u32> {
        self.child.as_ref().map(|child| child.id())
    }

    /// Builds the command line for `request` without running it.
    #[must_use]
    pub fn spec(&self, request: &LaunchRequest) -> LaunchSpec {
        let server = server_artifact(&self.artifact_version);
        LaunchSpec {
            executable: java_executable(self.runtime_home.as_deref()),
            jvm_options: request.jvm_options.clone(),
            classpath: classpath(self.resolver.as_ref(), &server, &request.dependencies),
            ports: request.ports.clone(),
            forwarding: request.forwarding.clone(),
            log_level: request.log_level,
        }
    }

    /// Replaces any server on `request.ports` with a freshly spawned child.
    ///
    /// Blocks for the port release delay and, when ports are set, for up to
    /// the readiness budget. Failures are logged and reflected in the report.
    pub fn launch(&mut self, manager: &mut InstanceManager, request: &LaunchRequest) -> ForkedLaunch {
        if let Err(error) = manager.stop_remote(&request.ports, true) {
            warn!(target: LAUNCH_TARGET, %error, "could not stop previous mock server");
        }
        thread::sleep(self.port_release_delay);

        let spec = self.spec(request);
        log_command_line(&spec.command_line());

        if !request.ports.is_empty() {
            manager.published_ports().publish(&request.ports);
        }
        let spawned = self.spawn(&spec, request.output);

        let Some(port) = request.ports.primary() else {
            return ForkedLaunch {
                spec,
                spawned,
                readiness: Readiness::NotChecked,
                initialization: InitializationReport::skipped(),
            };
        };

        let readiness = self.await_readiness(manager, port);
        let initialization = manager.initialize(port, &class_only(&request.initializers));
        manager.record_forked(request.ports.clone());
        ForkedLaunch {
            spec,
            spawned,
            readiness,
            initialization,
        }
    }

    fn spawn(&mut self, spec: &LaunchSpec, output: OutputMode) -> bool {
        match self.processes.spawn(&spec.arguments(), output) {
            Ok(child) => {
                info!(target: LAUNCH_TARGET, pid = child.id(), "mock server process spawned");
                self.child = Some(child);
                true
            }
            Err(error) => {
                error!(
                    target: LAUNCH_TARGET,
                    executable = %spec.executable,
                    %error,
                    "exception while starting mock server"
                );
                false
            }
        }
    }

    fn await_readiness(&mut self, manager: &InstanceManager, port: u16) -> Readiness {
        let client = manager.connect(port);
        if client.wait_until_running(self.readiness_timeout, self.readiness_interval) {
            info!(target: LAUNCH_TARGET, port, "mock server is running");
            return Readiness::Ready;
        }
        warn!(
            target: LAUNCH_TARGET,
            port,
            timeout_ms = self.readiness_timeout.as_millis(),
            "mock server did not report running in time"
        );
        self.log_child_exit();
        Readiness::TimedOut
    }

    fn log_child_exit(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let pid = child.id();
        match child.try_wait() {
            Ok(Some(exit)) => warn!(
                target: LAUNCH_TARGET,
                pid,
                code = ?exit.code,
                "mock server process has already exited"
            ),
            Ok(None) => {}
            Err(error) => warn!(target: LAUNCH_TARGET, pid, %error, "cannot query mock server process"),
        }
    }
}

fn class_only(source: &InitializerSource) -> InitializerSource {
    if let Some(path) = source.json_path() {
        warn!(
            target: LAUNCH_TARGET,
            path,
            "initialization JSON is not applied to forked servers"
        );
    }
    InitializerSource::new(source.class_name().map(str::to_owned), None)
}

fn log_command_line(command_line: &str) {
    let ruler = "-".repeat(command_line.chars().count());
    info!(target: LAUNCH_TARGET, "");
    info!(target: LAUNCH_TARGET, "{ruler}");
    info!(target: LAUNCH_TARGET, "{command_line}");
    info!(target: LAUNCH_TARGET, "{ruler}");
    info!(target: LAUNCH_TARGET, "");
}
