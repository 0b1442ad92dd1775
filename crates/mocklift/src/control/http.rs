//! HTTP implementation of the MockServer control plane.
//!
//! Every control request is a `PUT` under `/mockserver`. A status probe that
//! fails for any reason counts as "not running".

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;
use ureq::{Agent, AgentBuilder};

use super::{ControlClient, ControlClientFactory, ControlEndpoint, ControlError};
use crate::expectation::Expectation;

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");

const STATUS_PATH: &str = "/mockserver/status";
const EXPECTATION_PATH: &str = "/mockserver/expectation";
const RETRIEVE_PATH: &str = "/mockserver/retrieve";
const RESET_PATH: &str = "/mockserver/reset";
const STOP_PATH: &str = "/mockserver/stop";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocking control client backed by `ureq`.
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    endpoint: ControlEndpoint,
    base_url: String,
    agent: Agent,
}

impl HttpControlClient {
    /// Creates a client for `http://host:port`.
    #[must_use]
    pub fn new(endpoint: ControlEndpoint) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build();
        let base_url = format!("http://{}:{}", endpoint.host(), endpoint.port());
        Self {
            endpoint,
            base_url,
            agent,
        }
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &ControlEndpoint {
        &self.endpoint
    }

    fn put(&self, path: &'static str) -> ureq::Request {
        debug!(target: CONTROL_TARGET, endpoint = %self.endpoint, path, "control request");
        self.agent
            .put(&format!("{}{path}", self.base_url))
            .set("Content-Type", "application/json")
    }

    fn classify(&self, path: &'static str, error: ureq::Error) -> ControlError {
        match error {
            ureq::Error::Status(status, response) => ControlError::Status {
                endpoint: self.endpoint.clone(),
                path,
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => ControlError::Unreachable {
                endpoint: self.endpoint.clone(),
                source: io::Error::other(transport.to_string()),
            },
        }
    }
}

impl ControlClient for HttpControlClient {
    fn is_running(&self) -> bool {
        match self.put(STATUS_PATH).call() {
            Ok(response) => response.status() == 200,
            Err(error) => {
                debug!(
                    target: CONTROL_TARGET,
                    endpoint = %self.endpoint,
                    error = %error,
                    "status probe failed"
                );
                false
            }
        }
    }

    fn stop(&self) -> Result<(), ControlError> {
        self.put(STOP_PATH)
            .call()
            .map_err(|error| self.classify(STOP_PATH, error))?;

        let deadline = Instant::now() + STOP_TIMEOUT;
        while Instant::now() < deadline {
            if !self.is_running() {
                return Ok(());
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        Err(ControlError::StillRunning {
            endpoint: self.endpoint.clone(),
        })
    }

    fn send_expectations(&self, expectations: &[Expectation]) -> Result<(), ControlError> {
        let payload = Value::Array(expectations.iter().cloned().map(Value::from).collect());
        self.put(EXPECTATION_PATH)
            .send_json(payload)
            .map(drop)
            .map_err(|error| self.classify(EXPECTATION_PATH, error))
    }

    fn retrieve_active_expectations(&self) -> Result<Vec<Expectation>, ControlError> {
        let response = self
            .put(RETRIEVE_PATH)
            .query("type", "active_expectations")
            .query("format", "json")
            .call()
            .map_err(|error| self.classify(RETRIEVE_PATH, error))?;
        response
            .into_json::<Vec<Expectation>>()
            .map_err(|source| ControlError::Decode {
                endpoint: self.endpoint.clone(),
                source,
            })
    }

    fn reset(&self) -> Result<(), ControlError> {
        self.put(RESET_PATH)
            .call()
            .map(drop)
            .map_err(|error| self.classify(RESET_PATH, error))
    }
}

/// Builds [`HttpControlClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpControlClientFactory;

impl ControlClientFactory for HttpControlClientFactory {
    fn connect(&self, host: &str, port: u16) -> Box<dyn ControlClient> {
        Box::new(HttpControlClient::new(ControlEndpoint::new(host, port)))
    }
}
