//! Test doubles shared by the unit tests.

use std::time::Duration;

use mockall::mock;

use crate::control::{ControlClient, ControlClientFactory, ControlEndpoint, ControlError};
use crate::expectation::Expectation;
use crate::initializer::{Initializer, InitializerError};
use crate::instance::{RunningServer, ServerFactory};
use crate::launcher::{ChildExit, ChildProcess, OutputMode, ProcessFactory};
use crate::resolver::{ArtifactCoordinate, PathResolver, ResolveError};
use crate::server::ServerError;
use crate::telemetry::{LogLevelControl, TelemetryError};
use camino::Utf8PathBuf;
use mocklift_config::{ForwardTarget, LogLevel, PortSet};

mock! {
    pub Client {}
    impl ControlClient for Client {
        fn is_running(&self) -> bool;
        fn stop(&self) -> Result<(), ControlError>;
        fn send_expectations(
            &self,
            expectations: &[crate::expectation::Expectation],
        ) -> Result<(), ControlError>;
        fn retrieve_active_expectations(
            &self,
        ) -> Result<Vec<crate::expectation::Expectation>, ControlError>;
        fn reset(&self) -> Result<(), ControlError>;
    }
}

mock! {
    pub Clients {}
    impl ControlClientFactory for Clients {
        fn connect(&self, host: &str, port: u16) -> Box<dyn ControlClient>;
    }
}

mock! {
    pub Server {}
    impl RunningServer for Server {
        fn local_ports(&self) -> PortSet;
        fn is_running(&self) -> bool;
        fn stop(&mut self);
    }
}

mock! {
    pub Servers {}
    impl ServerFactory for Servers {
        fn create(
            &self,
            ports: &PortSet,
            forwarding: Option<ForwardTarget>,
        ) -> Result<Box<dyn RunningServer>, ServerError>;
    }
}

mock! {
    pub Levels {}
    impl LogLevelControl for Levels {
        fn apply(&self, level: LogLevel) -> Result<(), TelemetryError>;
    }
}

mock! {
    pub Resolver {}
    impl PathResolver for Resolver {
        fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<Utf8PathBuf, ResolveError>;
    }
}

mock! {
    pub Processes {}
    impl ProcessFactory for Processes {
        fn spawn(
            &self,
            arguments: &[String],
            output: OutputMode,
        ) -> std::io::Result<Box<dyn ChildProcess>>;
    }
}

mock! {
    pub Child {}
    impl ChildProcess for Child {
        fn id(&self) -> u32;
        fn try_wait(&mut self) -> std::io::Result<Option<ChildExit>>;
    }
}

/// Error matching what an HTTP client reports when nothing listens.
pub(crate) fn unreachable(port: u16) -> ControlError {
    ControlError::Unreachable {
        endpoint: ControlEndpoint::loopback(port),
        source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
    }
}

/// Client that accepts any request and reports running.
pub(crate) fn permissive_client() -> MockClient {
    let mut client = MockClient::new();
    client.expect_is_running().return_const(true);
    client.expect_stop().returning(|| Ok(()));
    client.expect_send_expectations().returning(|_| Ok(()));
    client
        .expect_retrieve_active_expectations()
        .returning(|| Ok(Vec::new()));
    client.expect_reset().returning(|| Ok(()));
    client
}

/// Initializer that submits a single `/health` expectation.
#[derive(Debug, Default)]
pub(crate) struct SeedHealthCheck;

impl Initializer for SeedHealthCheck {
    fn initialize(&self, client: &dyn ControlClient) -> Result<(), InitializerError> {
        let expectations = Expectation::parse_many(r#"{"httpRequest":{"path":"/health"}}"#)?;
        client.send_expectations(&expectations)?;
        Ok(())
    }
}

/// Initializer that always fails without touching the server.
#[derive(Debug, Default)]
pub(crate) struct Broken;

impl Initializer for Broken {
    fn initialize(&self, _client: &dyn ControlClient) -> Result<(), InitializerError> {
        Err("seed data is inconsistent".into())
    }
}

pub(crate) const SHORT: Duration = Duration::from_millis(10);
