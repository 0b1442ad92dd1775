//! Remote forwarding target for the managed server.

use std::fmt;

use thiserror::Error;

use crate::defaults::{DEFAULT_REMOTE_HOST, FORWARDING_DISABLED};

/// Optional forwarding of unmatched requests to a remote host.
///
/// A remote port of `-1` disables forwarding whatever the host says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingConfig {
    remote_port: i32,
    remote_host: String,
}

impl ForwardingConfig {
    /// Validates and stores a forwarding pair.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardingError::InvalidRemotePort`] when the port is neither
    /// `-1` nor in `1..=65535`.
    pub fn new(remote_port: i32, remote_host: impl Into<String>) -> Result<Self, ForwardingError> {
        let in_range = matches!(u16::try_from(remote_port), Ok(port) if port != 0);
        if remote_port != FORWARDING_DISABLED && !in_range {
            return Err(ForwardingError::InvalidRemotePort { port: remote_port });
        }
        Ok(Self {
            remote_port,
            remote_host: remote_host.into(),
        })
    }

    /// Forwarding switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            remote_port: FORWARDING_DISABLED,
            remote_host: String::new(),
        }
    }

    /// Returns `true` unless the remote port is `-1`.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.remote_port != FORWARDING_DISABLED
    }

    /// The configured port, `-1` when disabled.
    #[must_use]
    pub const fn raw_remote_port(&self) -> i32 {
        self.remote_port
    }

    /// The host exactly as configured, possibly blank.
    #[must_use]
    pub fn raw_remote_host(&self) -> &str {
        &self.remote_host
    }

    /// The effective target, or `None` when forwarding is disabled.
    ///
    /// A blank host resolves to `localhost`.
    #[must_use]
    pub fn target(&self) -> Option<ForwardTarget> {
        if !self.is_enabled() {
            return None;
        }
        let port = u16::try_from(self.remote_port).ok()?;
        let host = match self.remote_host.trim() {
            "" => DEFAULT_REMOTE_HOST.to_owned(),
            host => host.to_owned(),
        };
        Some(ForwardTarget { host, port })
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Host and port that unmatched requests are forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    /// Remote host name.
    pub host: String,
    /// Remote TCP port.
    pub port: u16,
}

impl fmt::Display for ForwardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Errors raised while validating a [`ForwardingConfig`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ForwardingError {
    /// The port is outside `1..=65535` and is not the disabled marker.
    #[error("proxy remote port {port} is invalid; use -1 to disable forwarding or a port in 1..=65535")]
    InvalidRemotePort {
        /// The rejected port.
        port: i32,
    },
}
