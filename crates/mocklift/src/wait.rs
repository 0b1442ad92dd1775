//! Blocking until an embedded server should shut down.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::instance::InstanceManager;

const WAIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::wait");

/// Longest single sleep between checks that the server is still running.
pub const POLL_SLICE: Duration = Duration::from_millis(250);

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal {
    /// Blocks for up to `timeout`, returning `true` once shutdown is
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Closed`] when no request can ever arrive.
    fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Every sender was dropped.
    #[error("shutdown channel closed")]
    Closed,
}

/// Shutdown requested by sending on a channel.
#[derive(Debug)]
pub struct ChannelShutdownSignal {
    receiver: Receiver<()>,
}

impl ChannelShutdownSignal {
    /// Creates the signal and the sender that triggers it.
    #[must_use]
    pub fn new() -> (Sender<()>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }
}

impl ShutdownSignal for ChannelShutdownSignal {
    fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(ShutdownError::Closed),
        }
    }
}

/// Shutdown listener that waits for termination signals.
#[cfg(unix)]
#[derive(Debug)]
pub struct SystemShutdownSignal {
    inner: ChannelShutdownSignal,
    handle: signal_hook::iterator::Handle,
}

#[cfg(unix)]
impl SystemShutdownSignal {
    /// Installs handlers for `SIGINT`, `SIGTERM`, `SIGQUIT` and `SIGHUP`.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when the handlers cannot be
    /// registered.
    pub fn install() -> Result<Self, ShutdownError> {
        use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
        use signal_hook::iterator::Signals;
        use std::thread;

        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let (sender, inner) = ChannelShutdownSignal::new();
        thread::Builder::new()
            .name("mocklift-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(target: WAIT_TARGET, signal, "shutdown signal received");
                    if sender.send(()).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(Self { inner, handle })
    }
}

#[cfg(unix)]
impl ShutdownSignal for SystemShutdownSignal {
    fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError> {
        self.inner.wait_timeout(timeout)
    }
}

#[cfg(unix)]
impl Drop for SystemShutdownSignal {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Why [`wait_while_running`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Shutdown was requested.
    Signalled,
    /// The timeout elapsed.
    TimedOut,
    /// The server stopped on its own, usually through its control plane.
    ServerStopped,
}

/// Blocks while the manager's embedded server runs.
///
/// Returns when `signal` fires, when `timeout` elapses or when the server is
/// no longer running. `None` waits without a deadline.
///
/// # Errors
///
/// Propagates [`ShutdownError`] from the signal.
pub fn wait_while_running(
    manager: &InstanceManager,
    signal: &dyn ShutdownSignal,
    timeout: Option<Duration>,
) -> Result<WaitOutcome, ShutdownError> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    loop {
        if !manager.is_running() {
            return Ok(WaitOutcome::ServerStopped);
        }
        let slice = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    info!(target: WAIT_TARGET, "run timeout elapsed");
                    return Ok(WaitOutcome::TimedOut);
                }
                remaining.min(POLL_SLICE)
            }
            None => POLL_SLICE,
        };
        if signal.wait_timeout(slice)? {
            return Ok(WaitOutcome::Signalled);
        }
    }
}
