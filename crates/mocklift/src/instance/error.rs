//! Error types for instance lifecycle operations.

use thiserror::Error;

use mocklift_config::{LogLevel, PortSet};

use crate::control::ControlError;
use crate::server::ServerError;
use crate::telemetry::TelemetryError;

/// Errors raised while starting or stopping an instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("mock server is already running on ports {ports}; stop it before starting again")]
    AlreadyRunning { ports: PortSet },
    #[error("failed to apply log level {level}: {source}")]
    LogLevel {
        level: LogLevel,
        #[source]
        source: TelemetryError,
    },
    #[error("failed to start mock server on ports {ports}: {source}")]
    Construct {
        ports: PortSet,
        #[source]
        source: ServerError,
    },
    #[error("failed to stop mock server on port {port}: {source}")]
    RemoteStop {
        port: u16,
        #[source]
        source: ControlError,
    },
}
