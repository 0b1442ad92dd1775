//! Lifecycle management for MockServer instances.
//!
//! A server either runs embedded in this process or forked into its own JVM.
//! [`InstanceManager`] owns the embedded case and remembers a forked one by its
//! ports; [`ForkedProcessLauncher`] builds and spawns the child command line.
//! Both talk to a running server only through a [`ControlClient`], and both
//! apply the configured initializers through an [`InitializerLoader`] once the
//! server answers.
//!
//! Start-up is fault tolerant. Apart from configuration and construction
//! errors on the embedded path, failures are logged and reported in the
//! returned report types rather than propagated.

pub mod control;
pub mod expectation;
pub mod initializer;
pub mod instance;
pub mod launcher;
pub mod resolver;
pub mod server;
pub mod telemetry;
pub mod wait;

#[cfg(test)]
mod test_support;

pub use control::{ControlClient, ControlClientFactory, ControlError, HttpControlClientFactory};
pub use expectation::{Expectation, ExpectationError};
pub use initializer::{
    InitializationReport, Initializer, InitializerError, InitializerLoader, InitializerOutcome,
    InitializerRegistry, InitializerScope, InitializerSource, SearchPathSet,
};
pub use instance::{
    InstanceError, InstanceHandle, InstanceManager, LifecycleState, PublishedPorts, StartReport,
    StartRequest,
};
pub use launcher::{
    ForkedLaunch, ForkedProcessLauncher, LaunchRequest, LaunchSpec, OutputMode, Readiness,
    SystemProcessFactory,
};
pub use resolver::{ArtifactCoordinate, LocalRepositoryResolver, PathResolver, ResolveError};
pub use server::{EmbeddedMockServer, EmbeddedServerFactory, ServerError};
pub use telemetry::{LogLevelControl, TelemetryError, TelemetryHandle};
pub use wait::{ChannelShutdownSignal, ShutdownError, ShutdownSignal, WaitOutcome, wait_while_running};

#[cfg(unix)]
pub use wait::SystemShutdownSignal;
