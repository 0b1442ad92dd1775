//! Control-plane routes served by the embedded instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, info};

use mocklift_config::ForwardTarget;

use super::SERVER_TARGET;
use crate::expectation::Expectation;

/// State shared by every listener of one embedded instance.
#[derive(Debug)]
pub(super) struct ServerState {
    ports: Vec<u16>,
    forwarding: Option<ForwardTarget>,
    expectations: Mutex<Vec<Expectation>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ServerState {
    pub(super) fn new(
        ports: Vec<u16>,
        forwarding: Option<ForwardTarget>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            ports,
            forwarding,
            expectations: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
            shutdown,
        }
    }

    pub(super) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Marks the instance stopped and tells every listener to drain.
    pub(super) fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }

    fn expectations(&self) -> MutexGuard<'_, Vec<Expectation>> {
        self.expectations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub(super) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/mockserver/status", put(status))
        .route("/mockserver/expectation", put(create_expectations))
        .route("/mockserver/retrieve", put(retrieve))
        .route("/mockserver/reset", put(reset))
        .route("/mockserver/stop", put(stop))
        .with_state(state)
}

async fn status(State(state): State<Arc<ServerState>>) -> Response {
    // Listeners may still be draining after a stop.
    if !state.is_running() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let forwarding = state.forwarding.as_ref().map(|target| {
        json!({ "remoteHost": target.host, "remotePort": target.port })
    });
    Json(json!({ "ports": state.ports, "forwarding": forwarding })).into_response()
}

async fn create_expectations(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<Value>,
) -> Response {
    match Expectation::from_value(payload) {
        Ok(expectations) => {
            debug!(
                target: SERVER_TARGET,
                count = expectations.len(),
                "expectations registered"
            );
            state.expectations().extend(expectations.iter().cloned());
            (StatusCode::CREATED, Json(expectations)).into_response()
        }
        Err(error) => (StatusCode::BAD_REQUEST, error.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveQuery {
    #[serde(rename = "type", default = "default_retrieve_type")]
    kind: String,
}

fn default_retrieve_type() -> String {
    "active_expectations".to_owned()
}

async fn retrieve(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RetrieveQuery>,
) -> Response {
    if !query.kind.eq_ignore_ascii_case("active_expectations") {
        return (
            StatusCode::BAD_REQUEST,
            format!("retrieve type '{}' is not supported", query.kind),
        )
            .into_response();
    }
    let expectations = state.expectations().clone();
    Json(expectations).into_response()
}

async fn reset(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.expectations().clear();
    info!(target: SERVER_TARGET, "expectations reset");
    StatusCode::OK
}

async fn stop(State(state): State<Arc<ServerState>>) -> StatusCode {
    info!(target: SERVER_TARGET, "stop requested over the control plane");
    state.request_shutdown();
    StatusCode::OK
}
