//! Unit tests for the instance manager.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use mockall::Sequence;
use rstest::rstest;

use super::*;
use crate::initializer::{InitializerOutcome, InitializerRegistry, InitializerScope, SearchPathSet};
use crate::test_support::{
    MockClient, MockClients, MockLevels, MockServer, MockServers, SHORT, SeedHealthCheck,
    permissive_client, unreachable,
};

const SEED: &str = "com.example.SeedHealthCheck";

/// Server double whose running flag is flipped by `stop`.
fn running_server(ports: Vec<u16>, running: &Arc<AtomicBool>, stops: &Arc<AtomicUsize>) -> MockServer {
    let mut server = MockServer::new();
    let ports = PortSet::new(ports);
    server.expect_local_ports().returning(move || ports.clone());
    let flag = Arc::clone(running);
    server
        .expect_is_running()
        .returning(move || flag.load(Ordering::SeqCst));
    let flag = Arc::clone(running);
    let counter = Arc::clone(stops);
    server.expect_stop().returning(move || {
        flag.store(false, Ordering::SeqCst);
        counter.fetch_add(1, Ordering::SeqCst);
    });
    server
}

struct Harness {
    running: Arc<AtomicBool>,
    stops: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn servers(&self, bound: Vec<u16>) -> MockServers {
        let running = Arc::clone(&self.running);
        let stops = Arc::clone(&self.stops);
        let mut servers = MockServers::new();
        servers.expect_create().returning(move |_, _| {
            running.store(true, Ordering::SeqCst);
            Ok(Box::new(running_server(bound.clone(), &running, &stops)))
        });
        servers
    }

    fn manager(&self, servers: MockServers, clients: MockClients) -> InstanceManager {
        InstanceManager::new(Box::new(servers), Box::new(clients), InitializerLoader::default())
            .with_log_level_control(Box::new(quiet_levels()))
            .with_stop_settle_delay(SHORT)
    }
}

fn quiet_levels() -> MockLevels {
    let mut levels = MockLevels::new();
    levels.expect_apply().returning(|_| Ok(()));
    levels
}

fn request(ports: &[u16]) -> StartRequest {
    StartRequest {
        ports: PortSet::new(ports.to_vec()),
        ..StartRequest::default()
    }
}

#[test]
fn second_start_fails_with_already_running() {
    let harness = Harness::new();
    let mut manager = harness.manager(harness.servers(vec![1, 2]), MockClients::new());

    manager.start(&request(&[1, 2])).expect("first start succeeds");
    match manager.start(&request(&[1, 2])) {
        Err(InstanceError::AlreadyRunning { ports }) => assert_eq!(ports.to_string(), "1,2"),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert!(manager.is_running());
}

#[test]
fn start_after_stop_succeeds() {
    let harness = Harness::new();
    let mut manager = harness.manager(harness.servers(vec![1080]), MockClients::new());

    manager.start(&request(&[1080])).expect("first start succeeds");
    manager.stop();
    manager.start(&request(&[1080])).expect("restart succeeds");
    assert_eq!(manager.state(), LifecycleState::Running);
}

#[test]
fn empty_ports_start_nothing_but_apply_the_log_level() {
    let mut servers = MockServers::new();
    servers.expect_create().never();
    let mut levels = MockLevels::new();
    levels
        .expect_apply()
        .withf(|level| *level == LogLevel::Warn)
        .times(1)
        .returning(|_| Ok(()));
    let mut manager = InstanceManager::new(
        Box::new(servers),
        Box::new(MockClients::new()),
        InitializerLoader::default(),
    )
    .with_log_level_control(Box::new(levels));

    let report = manager
        .start(&StartRequest {
            log_level: Some(LogLevel::Warn),
            initializers: InitializerSource::new(Some(SEED.to_owned()), None),
            ..StartRequest::default()
        })
        .expect("skipped start succeeds");

    assert!(report.ports.is_empty());
    assert_eq!(report.initialization, InitializationReport::skipped());
    assert!(!manager.is_running());
    assert_eq!(manager.published_ports().get(), None);
}

#[test]
fn log_level_is_applied_before_construction() {
    let harness = Harness::new();
    let mut sequence = Sequence::new();
    let mut levels = MockLevels::new();
    levels
        .expect_apply()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));
    let running = Arc::clone(&harness.running);
    let stops = Arc::clone(&harness.stops);
    let mut servers = MockServers::new();
    servers
        .expect_create()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(move |_, _| Ok(Box::new(running_server(vec![1080], &running, &stops))));
    let mut manager = InstanceManager::new(
        Box::new(servers),
        Box::new(MockClients::new()),
        InitializerLoader::default(),
    )
    .with_log_level_control(Box::new(levels));

    manager
        .start(&StartRequest {
            log_level: Some(LogLevel::Debug),
            ..request(&[1080])
        })
        .expect("start succeeds");
}

#[test]
fn failing_log_level_aborts_the_start() {
    let mut servers = MockServers::new();
    servers.expect_create().never();
    let mut levels = MockLevels::new();
    levels.expect_apply().returning(|_| {
        Err(crate::telemetry::TelemetryError::Filter(
            "bad directive".to_owned(),
        ))
    });
    let mut manager = InstanceManager::new(
        Box::new(servers),
        Box::new(MockClients::new()),
        InitializerLoader::default(),
    )
    .with_log_level_control(Box::new(levels));

    let result = manager.start(&StartRequest {
        log_level: Some(LogLevel::Error),
        ..request(&[1080])
    });
    assert!(matches!(result, Err(InstanceError::LogLevel { level: LogLevel::Error, .. })));
}

#[rstest]
#[case(ForwardingConfig::disabled(), None)]
#[case(
    ForwardingConfig::new(-1, "remoteHost").expect("valid forwarding"),
    None
)]
#[case(
    ForwardingConfig::new(3000, "").expect("valid forwarding"),
    Some(ForwardTarget { host: "localhost".to_owned(), port: 3000 })
)]
#[case(
    ForwardingConfig::new(3, "remoteHost").expect("valid forwarding"),
    Some(ForwardTarget { host: "remoteHost".to_owned(), port: 3 })
)]
fn forwarding_selects_the_construction_path(
    #[case] forwarding: ForwardingConfig,
    #[case] expected: Option<ForwardTarget>,
) {
    let harness = Harness::new();
    let running = Arc::clone(&harness.running);
    let stops = Arc::clone(&harness.stops);
    let mut servers = MockServers::new();
    servers
        .expect_create()
        .withf(move |_, target| *target == expected)
        .times(1)
        .returning(move |_, _| Ok(Box::new(running_server(vec![1080], &running, &stops))));
    let mut manager = harness.manager(servers, MockClients::new());

    manager
        .start(&StartRequest {
            forwarding,
            ..request(&[1080])
        })
        .expect("start succeeds");
}

#[test]
fn construction_failure_returns_to_stopped() {
    let mut servers = MockServers::new();
    servers.expect_create().returning(|_, _| {
        Err(ServerError::Bind {
            port: 1080,
            source: io::Error::from(io::ErrorKind::AddrInUse),
        })
    });
    let harness = Harness::new();
    let mut manager = harness.manager(servers, MockClients::new());

    assert!(matches!(
        manager.start(&request(&[1080])),
        Err(InstanceError::Construct { .. })
    ));
    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert!(manager.handle().is_none());
}

#[test]
fn start_publishes_ports_and_runs_initializers_once() {
    let harness = Harness::new();
    let mut registry = InitializerRegistry::new();
    registry
        .register_default::<SeedHealthCheck>(SEED, InitializerScope::Tests)
        .expect("registration succeeds");

    let mut clients = MockClients::new();
    clients
        .expect_connect()
        .withf(|host, port| host == "127.0.0.1" && *port == 1)
        .times(1)
        .returning(|_, _| {
            let mut client = MockClient::new();
            client
                .expect_send_expectations()
                .times(1)
                .returning(|_| Ok(()));
            Box::new(client)
        });

    let published = PublishedPorts::new();
    let mut manager = InstanceManager::new(
        Box::new(harness.servers(vec![1, 2])),
        Box::new(clients),
        InitializerLoader::new(registry, SearchPathSet::default()),
    )
    .with_log_level_control(Box::new(quiet_levels()))
    .with_published_ports(published.clone());

    let report = manager
        .start(&StartRequest {
            log_level: Some(LogLevel::Warn),
            initializers: InitializerSource::new(Some(SEED.to_owned()), None),
            ..request(&[1, 2])
        })
        .expect("start succeeds");

    assert!(manager.is_running());
    assert_eq!(published.get().as_deref(), Some("1,2"));
    assert_eq!(report.ports, PortSet::new(vec![1, 2]));
    assert_eq!(
        report.initialization.class,
        InitializerOutcome::Applied {
            subject: SEED.to_owned()
        }
    );
    assert_eq!(report.initialization.json, InitializerOutcome::Skipped);
}

#[test]
fn stop_without_instance_returns_immediately() {
    let harness = Harness::new();
    let mut manager = harness
        .manager(MockServers::new(), MockClients::new())
        .with_stop_settle_delay(Duration::from_secs(5));

    let started = Instant::now();
    manager.stop();
    manager.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[test]
fn stop_waits_for_the_settle_delay() {
    let harness = Harness::new();
    let delay = Duration::from_millis(120);
    let mut manager = harness
        .manager(harness.servers(vec![1080]), MockClients::new())
        .with_stop_settle_delay(delay);
    manager.start(&request(&[1080])).expect("start succeeds");

    let started = Instant::now();
    manager.stop();
    assert!(started.elapsed() >= delay);
    assert_eq!(harness.stops.load(Ordering::SeqCst), 1);
    assert!(!manager.is_running());
    assert!(manager.handle().is_none());
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[test]
fn stop_skips_an_instance_stopped_elsewhere() {
    let harness = Harness::new();
    let mut manager = harness
        .manager(harness.servers(vec![1080]), MockClients::new())
        .with_stop_settle_delay(Duration::from_secs(5));
    manager.start(&request(&[1080])).expect("start succeeds");
    harness.running.store(false, Ordering::SeqCst);

    let started = Instant::now();
    manager.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.stops.load(Ordering::SeqCst), 0);
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

fn unreachable_clients() -> MockClients {
    let mut clients = MockClients::new();
    clients.expect_connect().returning(|_, port| {
        let mut client = MockClient::new();
        client.expect_stop().returning(move || Err(unreachable(port)));
        Box::new(client)
    });
    clients
}

#[test]
fn stop_remote_ignoring_failure_never_errors() {
    let harness = Harness::new();
    let mut manager = harness.manager(MockServers::new(), unreachable_clients());
    assert!(manager.stop_remote(&PortSet::new(vec![1080]), true).is_ok());
}

#[test]
fn stop_remote_surfaces_failure_when_asked() {
    let harness = Harness::new();
    let mut manager = harness.manager(MockServers::new(), unreachable_clients());
    match manager.stop_remote(&PortSet::new(vec![1080, 1081]), false) {
        Err(InstanceError::RemoteStop { port, source }) => {
            assert_eq!(port, 1080);
            assert!(source.is_unreachable());
        }
        other => panic!("expected RemoteStop, got {other:?}"),
    }
}

#[test]
fn stop_remote_with_no_ports_contacts_nobody() {
    let mut clients = MockClients::new();
    clients.expect_connect().never();
    let harness = Harness::new();
    let mut manager = harness.manager(MockServers::new(), clients);
    assert!(manager.stop_remote(&PortSet::empty(), false).is_ok());
}

#[test]
fn stop_remote_clears_a_matching_forked_handle() {
    let mut clients = MockClients::new();
    clients
        .expect_connect()
        .returning(|_, _| Box::new(permissive_client()));
    let harness = Harness::new();
    let mut manager = harness.manager(MockServers::new(), clients);
    manager.record_forked(PortSet::new(vec![1080]));
    assert!(!manager.is_running());

    manager
        .stop_remote(&PortSet::new(vec![1080]), false)
        .expect("remote stop succeeds");
    assert!(manager.handle().is_none());
}

#[test]
fn stop_remote_leaves_the_embedded_instance_alone() {
    let mut clients = MockClients::new();
    clients
        .expect_connect()
        .returning(|_, _| Box::new(permissive_client()));
    let harness = Harness::new();
    let mut manager = harness.manager(harness.servers(vec![1080]), clients);
    manager.start(&request(&[1080])).expect("start succeeds");

    manager
        .stop_remote(&PortSet::new(vec![1080]), false)
        .expect("remote stop succeeds");
    assert!(manager.is_running());
    assert_eq!(harness.stops.load(Ordering::SeqCst), 0);
}
