//! Error types for the CLI runtime.

use std::sync::Arc;

use thiserror::Error;

use mocklift::resolver::CoordinateError;
use mocklift::{InstanceError, ShutdownError, TelemetryError};
use mocklift_config::{ForwardingError, LogLevelError, PortSetError};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("invalid server ports: {0}")]
    Ports(#[from] PortSetError),
    #[error("invalid forwarding: {0}")]
    Forwarding(#[from] ForwardingError),
    #[error("{0}")]
    LogLevel(#[from] LogLevelError),
    #[error("invalid dependency: {0}")]
    Dependency(#[from] CoordinateError),
    #[error("{0}")]
    Instance(#[from] InstanceError),
    #[error("failed while waiting for shutdown: {0}")]
    Shutdown(#[from] ShutdownError),
}
