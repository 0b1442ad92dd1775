//! In-process mock server.
//!
//! The embedded instance answers the same control plane as a forked MockServer
//! so a single [`ControlClient`](crate::control::ControlClient) works against
//! both. It keeps submitted expectations and reports its ports and forwarding
//! target, but it does not match or proxy requests.
//!
//! Each instance owns a small tokio runtime. Listeners are bound synchronously
//! so bind failures surface from [`EmbeddedMockServer::start`] rather than from
//! a background task.

mod routes;

use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tracing::{info, warn};

use mocklift_config::{ForwardTarget, PortSet};

use crate::instance::{RunningServer, ServerFactory};
use routes::ServerState;

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

const WORKER_THREADS: usize = 2;
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised while starting an embedded instance.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A port could not be bound.
    #[error("failed to bind mock server port {port}: {source}")]
    Bind {
        /// The requested port.
        port: u16,
        /// Underlying bind failure.
        #[source]
        source: io::Error,
    },
    /// The async runtime could not be built.
    #[error("failed to start mock server runtime: {0}")]
    Runtime(#[source] io::Error),
    /// A bound listener could not be handed to the runtime.
    #[error("failed to register listener on port {port}: {source}")]
    Listener {
        /// The bound port.
        port: u16,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

/// A running in-process mock server.
#[derive(Debug)]
pub struct EmbeddedMockServer {
    ports: PortSet,
    state: Arc<ServerState>,
    runtime: Option<Runtime>,
}

impl EmbeddedMockServer {
    /// Binds every port in `ports` on the loopback interface and starts
    /// serving. Port `0` selects a free port.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when a port cannot be bound or the runtime
    /// cannot start. Nothing keeps running in that case.
    pub fn start(ports: &PortSet, forwarding: Option<&ForwardTarget>) -> Result<Self, ServerError> {
        let listeners = ports
            .iter()
            .map(|port| bind(port).map(|listener| (port, listener)))
            .collect::<Result<Vec<_>, _>>()?;
        let bound = listeners
            .iter()
            .map(|(port, listener)| {
                listener
                    .local_addr()
                    .map(|address| address.port())
                    .map_err(|source| ServerError::Bind {
                        port: *port,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("mocklift-server")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        let (shutdown, _) = watch::channel(false);
        let state = Arc::new(ServerState::new(bound.clone(), forwarding.cloned(), shutdown));
        let app = routes::router(Arc::clone(&state));

        for ((_, listener), port) in listeners.into_iter().zip(bound.iter().copied()) {
            let listener = {
                let _entered = runtime.enter();
                tokio::net::TcpListener::from_std(listener)
                    .map_err(|source| ServerError::Listener { port, source })?
            };
            let app = app.clone();
            let stopped = state.subscribe();
            runtime.spawn(async move {
                let served = axum::serve(listener, app)
                    .with_graceful_shutdown(wait_for_shutdown(stopped))
                    .await;
                if let Err(error) = served {
                    warn!(target: SERVER_TARGET, port, error = %error, "listener failed");
                }
            });
        }

        let ports = PortSet::new(bound);
        info!(
            target: SERVER_TARGET,
            ports = %ports,
            forwarding = ?forwarding,
            "embedded mock server started"
        );
        Ok(Self {
            ports,
            state,
            runtime: Some(runtime),
        })
    }

    /// Ports actually bound, in request order.
    #[must_use]
    pub const fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Returns `true` until a local or remote stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Signals every listener to drain and tears down the runtime.
    pub fn stop(&mut self) {
        self.state.request_shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
            info!(target: SERVER_TARGET, ports = %self.ports, "embedded mock server stopped");
        }
    }
}

impl Drop for EmbeddedMockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .map_err(|source| ServerError::Bind { port, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { port, source })?;
    Ok(listener)
}

async fn wait_for_shutdown(mut stopped: watch::Receiver<bool>) {
    // A dropped sender also ends the listener.
    let _signal = stopped.wait_for(|stop| *stop).await;
}

/// Starts [`EmbeddedMockServer`]s for the instance manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedServerFactory;

impl ServerFactory for EmbeddedServerFactory {
    fn create(
        &self,
        ports: &PortSet,
        forwarding: Option<ForwardTarget>,
    ) -> Result<Box<dyn RunningServer>, ServerError> {
        EmbeddedMockServer::start(ports, forwarding.as_ref())
            .map(|server| Box::new(server) as Box<dyn RunningServer>)
    }
}

impl RunningServer for EmbeddedMockServer {
    fn local_ports(&self) -> PortSet {
        self.ports.clone()
    }

    fn is_running(&self) -> bool {
        Self::is_running(self)
    }

    fn stop(&mut self) {
        Self::stop(self);
    }
}
