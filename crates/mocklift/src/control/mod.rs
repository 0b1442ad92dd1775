//! Control-plane access to a running mock server.
//!
//! A [`ControlClient`] is the only channel the orchestrator uses to talk to a
//! server once it is up, whether the server is embedded or forked. The trait
//! keeps the lifecycle code independent of the wire protocol, which lives in
//! [`http`].

mod http;

use std::fmt;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::expectation::Expectation;

pub use http::{HttpControlClient, HttpControlClientFactory};

/// Host used to reach servers started by this process.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Host and port of a server's control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlEndpoint {
    host: String,
    port: u16,
}

impl ControlEndpoint {
    /// Creates an endpoint for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint on the loopback interface.
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        Self::new(LOOPBACK_HOST, port)
    }

    /// The host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Operations the orchestrator performs against a running server.
pub trait ControlClient {
    /// Returns `true` when the server answers its status probe.
    fn is_running(&self) -> bool;

    /// Polls [`ControlClient::is_running`] until it succeeds or `timeout`
    /// elapses, sleeping `interval` between probes.
    fn wait_until_running(&self, timeout: Duration, interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_running() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(interval.min(deadline - now));
        }
    }

    /// Requests shutdown and waits for the server to stop answering.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError`] when the request cannot be delivered or the
    /// server keeps answering afterwards.
    fn stop(&self) -> Result<(), ControlError>;

    /// Submits expectations to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError`] when the server is unreachable or rejects the
    /// payload.
    fn send_expectations(&self, expectations: &[Expectation]) -> Result<(), ControlError>;

    /// Lists the expectations the server currently holds.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError`] when the server is unreachable or answers with
    /// something other than a list of expectations.
    fn retrieve_active_expectations(&self) -> Result<Vec<Expectation>, ControlError>;

    /// Clears every expectation held by the server.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError`] when the server is unreachable or refuses.
    fn reset(&self) -> Result<(), ControlError>;
}

/// Creates control clients bound to a host and port.
pub trait ControlClientFactory {
    /// Builds a client for `host:port`. Connecting is lazy.
    fn connect(&self, host: &str, port: u16) -> Box<dyn ControlClient>;
}

/// Errors raised while talking to a server's control plane.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Nothing answered at the endpoint.
    #[error("mock server at {endpoint} is unreachable: {source}")]
    Unreachable {
        /// Endpoint that was contacted.
        endpoint: ControlEndpoint,
        /// Transport failure.
        #[source]
        source: io::Error,
    },
    /// The server answered with a failure status.
    #[error("mock server at {endpoint} answered {path} with status {status}: {body}")]
    Status {
        /// Endpoint that was contacted.
        endpoint: ControlEndpoint,
        /// Request path.
        path: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode response from mock server at {endpoint}: {source}")]
    Decode {
        /// Endpoint that was contacted.
        endpoint: ControlEndpoint,
        /// Decoding failure.
        #[source]
        source: io::Error,
    },
    /// The server kept answering after a stop request.
    #[error("mock server at {endpoint} is still running after the stop request")]
    StillRunning {
        /// Endpoint that was contacted.
        endpoint: ControlEndpoint,
    },
}

impl ControlError {
    /// Returns `true` when the failure means nothing was listening.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
