//! Shared configuration for the mocklift library and binary.
//!
//! Ambient settings (log filter and format, the local artefact repository,
//! search roots for initializers and the JVM installation) are loaded with
//! `ortho_config`, layering built-in defaults, a `mocklift.toml` file,
//! `MOCKLIFT_*` environment variables and command-line flags. The module also
//! hosts the value types every lifecycle operation shares: [`PortSet`],
//! [`ForwardingConfig`] and [`LogLevel`].

mod defaults;
mod forwarding;
mod logging;
mod ports;

use std::env;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_REMOTE_HOST, FORWARDING_DISABLED, RUNTIME_HOME_ENV,
    default_local_repository, default_log_filter, default_log_format,
};
pub use forwarding::{ForwardTarget, ForwardingConfig, ForwardingError};
pub use logging::{LogFormat, LogFormatParseError, LogLevel, LogLevelError};
pub use ports::{PortSet, PortSetError};

use defaults::default_log_filter_string;

/// Layered configuration shared by every mocklift entry point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MOCKLIFT")]
pub struct Config {
    /// `tracing` filter directive for the orchestrator's own logs.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for the orchestrator's own logs.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Root of the local artefact repository used to resolve the classpath.
    #[serde(default)]
    pub local_repository: Option<Utf8PathBuf>,
    /// JVM installation directory used for forked launches.
    #[serde(default)]
    pub runtime_home: Option<Utf8PathBuf>,
    /// Roots holding compiled sources, searched first for initializers.
    #[serde(default)]
    pub compile_roots: Vec<Utf8PathBuf>,
    /// Roots holding compiled tests, searched after the source roots.
    #[serde(default)]
    pub test_roots: Vec<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            local_repository: None,
            runtime_home: None,
            compile_roots: Vec::new(),
            test_roots: Vec::new(),
        }
    }
}

impl Config {
    /// The configured `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// The configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The local repository root, defaulting to `~/.m2/repository`.
    #[must_use]
    pub fn local_repository(&self) -> Utf8PathBuf {
        self.local_repository
            .clone()
            .unwrap_or_else(default_local_repository)
    }

    /// The JVM installation directory.
    ///
    /// Falls back to the `JAVA_HOME` environment variable when the setting is
    /// absent. Returns `None` when neither is set.
    #[must_use]
    pub fn runtime_home(&self) -> Option<Utf8PathBuf> {
        self.runtime_home.clone().or_else(|| {
            env::var(RUNTIME_HOME_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(Utf8PathBuf::from)
        })
    }

    /// Roots holding compiled sources.
    #[must_use]
    pub fn compile_roots(&self) -> &[Utf8PathBuf] {
        &self.compile_roots
    }

    /// Roots holding compiled tests.
    #[must_use]
    pub fn test_roots(&self) -> &[Utf8PathBuf] {
        &self.test_roots
    }
}
