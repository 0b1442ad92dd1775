//! Structured telemetry initialisation.
//!
//! The subscriber's filter sits behind a reload layer so that the log level
//! requested for a mock server can be applied to the whole process after
//! start-up.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use mocklift_config::{Config, LogFormat, LogLevel};

type FilterLayer = reload::Layer<EnvFilter, Registry>;
type FilterHandle = reload::Handle<EnvFilter, Registry>;
type FilteredRegistry = Layered<FilterLayer, Registry>;

static TELEMETRY: OnceCell<FilterHandle> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] TryInitError),
    /// Failed to swap the active filter.
    #[error("failed to apply log level {level}: {source}")]
    Reload {
        /// Level that could not be applied.
        level: LogLevel,
        /// Reload failure.
        #[source]
        source: reload::Error,
    },
}

/// Applies a log level to the process-wide logging configuration.
pub trait LogLevelControl {
    /// Replaces the active filter with `level`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] when the filter cannot be swapped.
    fn apply(&self, level: LogLevel) -> Result<(), TelemetryError>;
}

impl LogLevelControl for TelemetryHandle {
    fn apply(&self, level: LogLevel) -> Result<(), TelemetryError> {
        // Nothing to adjust until a subscriber has been installed.
        let Some(handle) = TELEMETRY.get() else {
            return Ok(());
        };
        let filter = EnvFilter::try_new(level.filter_directive())
            .map_err(|error| TelemetryError::Filter(error.to_string()))?;
        handle
            .reload(filter)
            .map_err(|source| TelemetryError::Reload { level, source })
    }
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: only the first invocation installs the
/// subscriber and later calls return a fresh [`TelemetryHandle`].
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter expression is invalid or another
/// global subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<FilterHandle, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let (filter_layer, handle) = reload::Layer::new(filter);

    let base = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        // Colour only on interactive terminals.
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let output: Box<dyn Layer<FilteredRegistry> + Send + Sync> = match config.log_format() {
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(output)
        .try_init()
        .map_err(TelemetryError::Subscriber)?;
    Ok(handle)
}
