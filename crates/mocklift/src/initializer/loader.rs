//! Applies the configured initializers against a running server.

use std::fs;
use std::io;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::{debug, info, warn};

use super::{
    INITIALIZER_TARGET, InitializationReport, InitializerError, InitializerOutcome,
    InitializerRegistry, InitializerSource, Lookup, SearchPathSet,
};
use crate::control::{ControlClient, ControlClientFactory, ControlError};
use crate::expectation::Expectation;

/// Resolves and runs initializers.
#[derive(Debug, Default)]
pub struct InitializerLoader {
    registry: InitializerRegistry,
    search_paths: SearchPathSet,
}

impl InitializerLoader {
    /// Creates a loader over `registry`, scoped by `search_paths`.
    #[must_use]
    pub const fn new(registry: InitializerRegistry, search_paths: SearchPathSet) -> Self {
        Self {
            registry,
            search_paths,
        }
    }

    /// The roots used for scoping and JSON lookups.
    #[must_use]
    pub const fn search_paths(&self) -> &SearchPathSet {
        &self.search_paths
    }

    /// Applies both mechanisms against the server at `host:port`.
    ///
    /// Each mechanism gets its own freshly connected client.
    pub fn apply(
        &self,
        host: &str,
        port: u16,
        clients: &dyn ControlClientFactory,
        source: &InitializerSource,
    ) -> InitializationReport {
        let class = source.class_name().map_or(InitializerOutcome::Skipped, |name| {
            let client = clients.connect(host, port);
            self.apply_class(name, client.as_ref())
        });
        let json = source.json_path().map_or(InitializerOutcome::Skipped, |path| {
            let client = clients.connect(host, port);
            self.apply_json(path, client.as_ref())
        });
        InitializationReport { class, json }
    }

    /// Looks up the initializer registered as `name` and runs it.
    pub fn apply_class(&self, name: &str, client: &dyn ControlClient) -> InitializerOutcome {
        let initializer = match self.registry.lookup(name, &self.search_paths) {
            Lookup::Found(initializer) => initializer,
            Lookup::NotFound => {
                warn!(
                    target: INITIALIZER_TARGET,
                    initializer = name,
                    "initializer is not registered for the configured search path"
                );
                return InitializerOutcome::NotFound {
                    subject: name.to_owned(),
                };
            }
            Lookup::InvalidShape(reason) => {
                warn!(
                    target: INITIALIZER_TARGET,
                    initializer = name,
                    reason = %reason,
                    "initializer name is not a type path"
                );
                return InitializerOutcome::InvalidShape {
                    subject: name.to_owned(),
                    reason,
                };
            }
        };

        match initializer.initialize(client) {
            Ok(()) => {
                info!(target: INITIALIZER_TARGET, initializer = name, "initializer applied");
                InitializerOutcome::Applied {
                    subject: name.to_owned(),
                }
            }
            Err(error) => failure_outcome(name, &error),
        }
    }

    /// Reads expectations from `path` and submits them.
    ///
    /// A relative path is tried under every source root, then every test root.
    /// With no roots configured the path is read as given.
    pub fn apply_json(&self, path: &str, client: &dyn ControlClient) -> InitializerOutcome {
        let contents = match self.read_json(Utf8Path::new(path)) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!(
                    target: INITIALIZER_TARGET,
                    file = path,
                    "initialization JSON not found under the configured search path"
                );
                return InitializerOutcome::NotFound {
                    subject: path.to_owned(),
                };
            }
            Err(error) => {
                warn!(
                    target: INITIALIZER_TARGET,
                    file = path,
                    error = %error,
                    "failed to read initialization JSON"
                );
                return InitializerOutcome::Failed {
                    subject: path.to_owned(),
                    message: error.to_string(),
                };
            }
        };

        let expectations = match Expectation::parse_many(&contents) {
            Ok(expectations) => expectations,
            Err(error) => {
                warn!(
                    target: INITIALIZER_TARGET,
                    file = path,
                    error = %error,
                    "initialization JSON is not an expectation payload"
                );
                return InitializerOutcome::InvalidShape {
                    subject: path.to_owned(),
                    reason: error.to_string(),
                };
            }
        };

        match client.send_expectations(&expectations) {
            Ok(()) => {
                info!(
                    target: INITIALIZER_TARGET,
                    file = path,
                    count = expectations.len(),
                    "initialization JSON applied"
                );
                InitializerOutcome::Applied {
                    subject: path.to_owned(),
                }
            }
            Err(error) => failure_outcome(path, &InitializerError::from(error)),
        }
    }

    fn read_json(&self, path: &Utf8Path) -> io::Result<String> {
        if path.is_absolute() || self.search_paths.is_empty() {
            return fs::read_to_string(path);
        }

        let mut last_error: Option<io::Error> = None;
        for root in self.search_paths.roots() {
            match read_under(root, path) {
                Ok(contents) => {
                    debug!(target: INITIALIZER_TARGET, root = %root, file = %path, "initialization JSON found");
                    return Ok(contents);
                }
                Err(error) => {
                    debug!(
                        target: INITIALIZER_TARGET,
                        root = %root,
                        file = %path,
                        error = %error,
                        "initialization JSON not readable under root"
                    );
                    // Keep the most informative failure for the caller.
                    if last_error
                        .as_ref()
                        .is_none_or(|previous| previous.kind() == io::ErrorKind::NotFound)
                    {
                        last_error = Some(error);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
    }
}

fn read_under(root: &Utf8Path, path: &Utf8Path) -> io::Result<String> {
    let dir = Dir::open_ambient_dir(root, ambient_authority())?;
    dir.read_to_string(path)
}

fn failure_outcome(subject: &str, error: &InitializerError) -> InitializerOutcome {
    let unreachable = error
        .downcast_ref::<ControlError>()
        .is_some_and(ControlError::is_unreachable);
    warn!(
        target: INITIALIZER_TARGET,
        subject,
        error = %error,
        unreachable,
        "initializer failed"
    );
    if unreachable {
        InitializerOutcome::Unreachable {
            subject: subject.to_owned(),
            message: error.to_string(),
        }
    } else {
        InitializerOutcome::Failed {
            subject: subject.to_owned(),
            message: error.to_string(),
        }
    }
}
