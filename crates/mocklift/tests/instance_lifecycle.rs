//! Behaviour tests for the embedded instance lifecycle against a real server.

use std::cell::RefCell;
use std::net::TcpListener;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use mocklift::control::{ControlClient, ControlClientFactory, HttpControlClientFactory, LOOPBACK_HOST};
use mocklift::{
    EmbeddedServerFactory, Expectation, InitializationReport, Initializer, InitializerError,
    InitializerLoader, InitializerOutcome, InitializerRegistry, InitializerScope, InitializerSource,
    InstanceError, InstanceManager, SearchPathSet, StartReport, StartRequest,
};
use mocklift_config::{LogLevel, PortSet};

const SEED: &str = "com.example.SeedHealthCheck";
const SETTLE: Duration = Duration::from_millis(50);

#[derive(Default)]
struct SeedHealthCheck;

impl Initializer for SeedHealthCheck {
    fn initialize(&self, client: &dyn ControlClient) -> Result<(), InitializerError> {
        let expectations = Expectation::parse_many(r#"{"httpRequest":{"path":"/health"}}"#)?;
        client.send_expectations(&expectations)?;
        Ok(())
    }
}

struct Harness {
    manager: RefCell<Option<InstanceManager>>,
    request: RefCell<StartRequest>,
    report: RefCell<Option<StartReport>>,
    second: RefCell<Option<Result<StartReport, InstanceError>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            manager: RefCell::new(None),
            request: RefCell::new(StartRequest::default()),
            report: RefCell::new(None),
            second: RefCell::new(None),
        }
    }

    fn with_manager<T>(&self, action: impl FnOnce(&mut InstanceManager) -> T) -> T {
        let mut slot = self.manager.borrow_mut();
        match slot.as_mut() {
            Some(manager) => action(manager),
            None => panic!("manager was not created"),
        }
    }

    fn bound_ports(&self) -> PortSet {
        match self.report.borrow().as_ref() {
            Some(report) => report.ports.clone(),
            None => panic!("server was not started"),
        }
    }

    fn initialization(&self) -> InitializationReport {
        match self.report.borrow().as_ref() {
            Some(report) => report.initialization.clone(),
            None => panic!("server was not started"),
        }
    }

    fn client(&self) -> Box<dyn ControlClient> {
        let port = self
            .bound_ports()
            .primary()
            .unwrap_or_else(|| panic!("no port was bound"));
        HttpControlClientFactory.connect(LOOPBACK_HOST, port)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.get_mut().as_mut() {
            manager.stop();
        }
    }
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    listener.local_addr().expect("probe address").port()
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a manager with the seeding initializer registered")]
fn given_manager(harness: &Harness) {
    let mut registry = InitializerRegistry::new();
    registry
        .register_default::<SeedHealthCheck>(SEED, InitializerScope::Sources)
        .expect("registration succeeds");
    let loader = InitializerLoader::new(registry, SearchPathSet::default());
    let manager = InstanceManager::new(
        Box::new(EmbeddedServerFactory),
        Box::new(HttpControlClientFactory),
        loader,
    )
    .with_stop_settle_delay(SETTLE);
    *harness.manager.borrow_mut() = Some(manager);
}

#[when("an embedded server starts on two ports at level \"{level}\" with initializer \"{name}\"")]
fn when_started(harness: &Harness, level: String, name: String) {
    let request = StartRequest {
        ports: PortSet::new(vec![0, 0]),
        log_level: Some(LogLevel::parse(&level).expect("legal level")),
        initializers: InitializerSource::new(Some(name), None),
        ..StartRequest::default()
    };
    let report = harness
        .with_manager(|manager| manager.start(&request))
        .expect("embedded start succeeds");
    *harness.request.borrow_mut() = request;
    *harness.report.borrow_mut() = Some(report);
}

#[when("the embedded server is started again")]
fn when_started_again(harness: &Harness) {
    let request = harness.request.borrow().clone();
    let result = harness.with_manager(|manager| manager.start(&request));
    *harness.second.borrow_mut() = Some(result);
}

#[when("the server is stopped through its control plane")]
fn when_stopped_remotely(harness: &Harness) {
    let ports = harness.bound_ports();
    harness
        .with_manager(|manager| manager.stop_remote(&ports, false))
        .expect("remote stop succeeds");
}

#[then("the manager reports the server running")]
fn then_running(harness: &Harness) {
    assert!(harness.with_manager(|manager| manager.is_running()));
    assert!(harness.client().is_running());
}

#[then("the manager reports the server stopped")]
fn then_stopped(harness: &Harness) {
    assert!(!harness.with_manager(|manager| manager.is_running()));
}

#[then("the published ports match the bound ports")]
fn then_published(harness: &Harness) {
    let bound = harness.bound_ports();
    assert_eq!(bound.len(), 2);
    assert!(bound.iter().all(|port| port != 0));
    let published = harness.with_manager(|manager| manager.published_ports().get());
    assert_eq!(published, Some(bound.to_string()));
}

#[then("the active expectation count is {count}")]
fn then_active_expectations(harness: &Harness, count: usize) {
    let active = harness
        .client()
        .retrieve_active_expectations()
        .expect("retrieve active expectations");
    assert_eq!(active.len(), count);
}

#[then("the class initializer was not found")]
fn then_not_found(harness: &Harness) {
    assert!(matches!(
        harness.initialization().class,
        InitializerOutcome::NotFound { .. }
    ));
}

#[then("the second start fails because a server is already running")]
fn then_already_running(harness: &Harness) {
    match harness.second.borrow().as_ref() {
        Some(Err(InstanceError::AlreadyRunning { ports })) => {
            assert_eq!(*ports, harness.bound_ports());
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}

#[then("stopping the manager again returns at once")]
fn then_stop_is_immediate(harness: &Harness) {
    let started = Instant::now();
    harness.with_manager(InstanceManager::stop);
    assert!(started.elapsed() < SETTLE);
}

#[then("stopping an unreachable server succeeds when failures are ignored")]
fn then_ignored_failure(harness: &Harness) {
    let ports = PortSet::new(vec![unused_port()]);
    harness
        .with_manager(|manager| manager.stop_remote(&ports, true))
        .expect("ignored failure is swallowed");
}

#[then("stopping an unreachable server fails when failures are not ignored")]
fn then_fatal_failure(harness: &Harness) {
    let ports = PortSet::new(vec![unused_port()]);
    let result = harness.with_manager(|manager| manager.stop_remote(&ports, false));
    assert!(matches!(result, Err(InstanceError::RemoteStop { .. })));
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "A started server is seeded by its initializer"
)]
fn seeded_start(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "Starting twice is rejected"
)]
fn double_start(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "An unknown initializer leaves the server uninitialised"
)]
fn unknown_initializer(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "A remote stop request ends the embedded server"
)]
fn remote_stop(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "Stopping an unreachable remote server"
)]
fn unreachable_remote(#[from(harness)] harness: Harness) {
    let _ = harness;
}
