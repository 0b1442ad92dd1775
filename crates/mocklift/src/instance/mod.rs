//! Lifecycle management for a single mock server instance.
//!
//! [`InstanceManager`] owns at most one [`InstanceHandle`]. An embedded
//! instance is started and stopped directly, while a forked instance is only
//! ever contacted through its control plane. The two stop paths are kept
//! separate: [`InstanceManager::stop`] never touches a forked process and
//! [`InstanceManager::stop_remote`] never touches an embedded instance.

mod error;
mod published;

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use mocklift_config::{ForwardTarget, ForwardingConfig, LogLevel, PortSet};

use crate::control::{ControlClient, ControlClientFactory, LOOPBACK_HOST};
use crate::initializer::{InitializationReport, InitializerLoader, InitializerSource};
use crate::server::ServerError;
use crate::telemetry::{LogLevelControl, TelemetryHandle};

pub use error::InstanceError;
pub use published::{PublishedPorts, read_ports};

pub(crate) const INSTANCE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::instance");

/// Wait after an embedded stop so the server's worker threads have unwound
/// before control returns to the host.
pub const DEFAULT_STOP_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// A server started in this process.
pub trait RunningServer {
    /// Ports the server actually bound.
    fn local_ports(&self) -> PortSet;
    /// Returns `true` until the server stops, locally or remotely.
    fn is_running(&self) -> bool;
    /// Signals shutdown.
    fn stop(&mut self);
}

/// Builds servers for the manager.
pub trait ServerFactory {
    /// Starts a server on `ports`, forwarding to `forwarding` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server cannot start.
    fn create(
        &self,
        ports: &PortSet,
        forwarding: Option<ForwardTarget>,
    ) -> Result<Box<dyn RunningServer>, ServerError>;
}

/// The instance a manager is tracking.
pub enum InstanceHandle {
    /// A server running in this process.
    Embedded(Box<dyn RunningServer>),
    /// A server running in a child process, known only by its ports.
    Forked {
        /// Ports passed to the child.
        ports: PortSet,
    },
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded(server) => f
                .debug_struct("Embedded")
                .field("ports", &server.local_ports())
                .field("running", &server.is_running())
                .finish(),
            Self::Forked { ports } => f.debug_struct("Forked").field("ports", ports).finish(),
        }
    }
}

/// Lifecycle state of the embedded instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Parameters for [`InstanceManager::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    /// Ports to bind; empty means there is nothing to start.
    pub ports: PortSet,
    /// Optional forwarding target.
    pub forwarding: ForwardingConfig,
    /// Level applied to process-wide logging before the server starts.
    pub log_level: Option<LogLevel>,
    /// Initializers applied once the server is up.
    pub initializers: InitializerSource,
}

/// Result of a start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Ports bound, empty when the start was skipped.
    pub ports: PortSet,
    /// Initializer outcomes.
    pub initialization: InitializationReport,
}

impl StartReport {
    fn skipped() -> Self {
        Self {
            ports: PortSet::empty(),
            initialization: InitializationReport::skipped(),
        }
    }
}

/// Starts, stops and tracks one mock server.
pub struct InstanceManager {
    servers: Box<dyn ServerFactory>,
    clients: Box<dyn ControlClientFactory>,
    log_levels: Box<dyn LogLevelControl>,
    loader: InitializerLoader,
    published: PublishedPorts,
    handle: Option<InstanceHandle>,
    state: LifecycleState,
    stop_settle_delay: Duration,
}

impl fmt::Debug for InstanceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceManager")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("published", &self.published.get())
            .finish_non_exhaustive()
    }
}

impl InstanceManager {
    /// Creates a manager with no instance.
    ///
    /// Log levels are applied through the global [`TelemetryHandle`] unless
    /// replaced with [`InstanceManager::with_log_level_control`].
    #[must_use]
    pub fn new(
        servers: Box<dyn ServerFactory>,
        clients: Box<dyn ControlClientFactory>,
        loader: InitializerLoader,
    ) -> Self {
        Self {
            servers,
            clients,
            log_levels: Box::new(TelemetryHandle),
            loader,
            published: PublishedPorts::new(),
            handle: None,
            state: LifecycleState::Stopped,
            stop_settle_delay: DEFAULT_STOP_SETTLE_DELAY,
        }
    }

    /// Replaces how log levels are applied.
    #[must_use]
    pub fn with_log_level_control(mut self, control: Box<dyn LogLevelControl>) -> Self {
        self.log_levels = control;
        self
    }

    /// Publishes ports into `published` instead of a private slot.
    #[must_use]
    pub fn with_published_ports(mut self, published: PublishedPorts) -> Self {
        self.published = published;
        self
    }

    /// Overrides the wait that follows an embedded stop.
    #[must_use]
    pub const fn with_stop_settle_delay(mut self, delay: Duration) -> Self {
        self.stop_settle_delay = delay;
        self
    }

    /// The slot holding the most recently published ports.
    #[must_use]
    pub const fn published_ports(&self) -> &PublishedPorts {
        &self.published
    }

    /// The tracked instance, if any.
    #[must_use]
    pub const fn handle(&self) -> Option<&InstanceHandle> {
        self.handle.as_ref()
    }

    /// Current lifecycle state.
    ///
    /// An embedded instance stopped over its control plane reads as
    /// [`LifecycleState::Stopped`].
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        if self.state == LifecycleState::Running && !self.is_running() {
            LifecycleState::Stopped
        } else {
            self.state
        }
    }

    /// Returns `true` while an embedded instance reports running.
    ///
    /// Always `false` for a forked instance, whose state lives in the child.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(&self.handle, Some(InstanceHandle::Embedded(server)) if server.is_running())
    }

    /// Starts an embedded instance.
    ///
    /// The log level is applied first, even when `request.ports` is empty. An
    /// empty port set then ends the call without starting anything. Otherwise
    /// the bound ports are published and the initializers run before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::AlreadyRunning`] while an embedded instance is
    /// up, [`InstanceError::LogLevel`] when the level cannot be applied and
    /// [`InstanceError::Construct`] when the server fails to start.
    pub fn start(&mut self, request: &StartRequest) -> Result<StartReport, InstanceError> {
        if let Some(InstanceHandle::Embedded(server)) = &self.handle {
            if server.is_running() {
                return Err(InstanceError::AlreadyRunning {
                    ports: server.local_ports(),
                });
            }
        }

        if let Some(level) = request.log_level {
            self.log_levels
                .apply(level)
                .map_err(|source| InstanceError::LogLevel { level, source })?;
            debug!(target: INSTANCE_TARGET, %level, "log level applied");
        }

        if request.ports.is_empty() {
            info!(target: INSTANCE_TARGET, "no server ports configured; nothing to start");
            return Ok(StartReport::skipped());
        }

        self.discard_stopped_instance();
        self.state = LifecycleState::Starting;
        let forwarding = request.forwarding.target();
        info!(
            target: INSTANCE_TARGET,
            ports = %request.ports,
            forwarding = ?forwarding,
            "starting embedded mock server"
        );
        let server = match self.servers.create(&request.ports, forwarding) {
            Ok(server) => server,
            Err(source) => {
                self.state = LifecycleState::Stopped;
                return Err(InstanceError::Construct {
                    ports: request.ports.clone(),
                    source,
                });
            }
        };

        let ports = server.local_ports();
        self.published.publish(&ports);
        self.handle = Some(InstanceHandle::Embedded(server));
        self.state = LifecycleState::Running;

        let initialization = match ports.primary() {
            Some(port) => self.initialize(port, &request.initializers),
            None => InitializationReport::skipped(),
        };
        Ok(StartReport {
            ports,
            initialization,
        })
    }

    /// Stops the embedded instance and waits for it to settle.
    ///
    /// Does nothing, and returns at once, when there is no embedded instance
    /// or it is not running. Otherwise the calling thread blocks for the full
    /// settle delay after the shutdown signal. The wait cannot be cancelled.
    pub fn stop(&mut self) {
        let Some(InstanceHandle::Embedded(server)) = self.handle.as_mut() else {
            return;
        };
        if !server.is_running() {
            return;
        }

        self.state = LifecycleState::Stopping;
        let ports = server.local_ports();
        server.stop();
        info!(
            target: INSTANCE_TARGET,
            ports = %ports,
            settle_ms = self.stop_settle_delay.as_millis(),
            "embedded mock server stopping"
        );
        thread::sleep(self.stop_settle_delay);
        self.handle = None;
        self.state = LifecycleState::Stopped;
    }

    /// Asks the server on the primary port of `ports` to stop.
    ///
    /// An empty port set is a no-op. On success a forked handle on the same
    /// primary port is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::RemoteStop`] when the request fails and
    /// `ignore_failure` is `false`. With `ignore_failure` set the failure is
    /// logged and swallowed.
    pub fn stop_remote(&mut self, ports: &PortSet, ignore_failure: bool) -> Result<(), InstanceError> {
        let Some(port) = ports.primary() else {
            return Ok(());
        };

        match self.connect(port).stop() {
            Ok(()) => {
                info!(target: INSTANCE_TARGET, port, "remote mock server stopped");
                if matches!(
                    &self.handle,
                    Some(InstanceHandle::Forked { ports: tracked }) if tracked.primary() == Some(port)
                ) {
                    self.handle = None;
                }
                Ok(())
            }
            Err(source) if ignore_failure => {
                debug!(
                    target: INSTANCE_TARGET,
                    port,
                    error = %source,
                    "ignoring failure to stop remote mock server"
                );
                Ok(())
            }
            Err(source) => Err(InstanceError::RemoteStop { port, source }),
        }
    }

    /// Records a forked instance launched on `ports`.
    ///
    /// An embedded instance that is still running is left in place.
    pub fn record_forked(&mut self, ports: PortSet) {
        if self.is_running() {
            warn!(
                target: INSTANCE_TARGET,
                ports = %ports,
                "embedded mock server still running; forked instance not tracked"
            );
            return;
        }
        self.discard_stopped_instance();
        self.handle = Some(InstanceHandle::Forked { ports });
    }

    /// Runs the configured initializers against the server on `port`.
    pub fn initialize(&self, port: u16, source: &InitializerSource) -> InitializationReport {
        self.loader
            .apply(LOOPBACK_HOST, port, self.clients.as_ref(), source)
    }

    /// A control client for the server on the loopback `port`.
    #[must_use]
    pub fn connect(&self, port: u16) -> Box<dyn ControlClient> {
        self.clients.connect(LOOPBACK_HOST, port)
    }

    fn discard_stopped_instance(&mut self) {
        if let Some(InstanceHandle::Embedded(server)) = self.handle.as_mut() {
            // Already stopped remotely; release its resources.
            server.stop();
            self.handle = None;
            self.state = LifecycleState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests;
