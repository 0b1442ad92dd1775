//! Initializers applied to a server right after it starts.
//!
//! Two mechanisms exist and both are optional. A named [`Initializer`] is
//! looked up in a compiled-in [`InitializerRegistry`] and run against a control
//! client. A JSON file of expectations is read from the search roots and
//! submitted. The class-based initializer always runs first. Failures never
//! abort a start: each one is logged and reported as an
//! [`InitializerOutcome`].

mod loader;
mod registry;

use std::error::Error;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use mocklift_config::Config;

use crate::control::ControlClient;

pub use loader::InitializerLoader;
pub use registry::{InitializerRegistry, Lookup, RegistryError, validate_type_name};

pub(crate) const INITIALIZER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::initializer");

/// Error type returned by user initializers.
pub type InitializerError = Box<dyn Error + Send + Sync>;

/// User code that pre-populates a running server.
///
/// # Example
///
/// ```ignore
/// struct HealthCheck;
///
/// impl Initializer for HealthCheck {
///     fn initialize(&self, client: &dyn ControlClient) -> Result<(), InitializerError> {
///         let expectations = Expectation::parse_many(r#"{"httpRequest":{"path":"/health"}}"#)?;
///         client.send_expectations(&expectations)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Initializer {
    /// Applies the initialisation through `client`.
    ///
    /// # Errors
    ///
    /// Any error is logged by the loader and reported as a failed outcome.
    fn initialize(&self, client: &dyn ControlClient) -> Result<(), InitializerError>;
}

/// Search-path group an initializer was compiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitializerScope {
    /// Compiled from the main sources.
    Sources,
    /// Compiled from the test sources.
    Tests,
}

impl fmt::Display for InitializerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sources => f.write_str("sources"),
            Self::Tests => f.write_str("tests"),
        }
    }
}

/// Ordered roots for compiled sources and compiled tests.
///
/// The roots scope which registered initializers are visible and serve as
/// the base for relative JSON paths, sources first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPathSet {
    sources: Vec<Utf8PathBuf>,
    tests: Vec<Utf8PathBuf>,
}

impl SearchPathSet {
    /// Builds a set from the two groups of roots.
    #[must_use]
    pub const fn new(sources: Vec<Utf8PathBuf>, tests: Vec<Utf8PathBuf>) -> Self {
        Self { sources, tests }
    }

    /// Uses the roots configured in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.compile_roots().to_vec(), config.test_roots().to_vec())
    }

    /// Returns `true` when neither group has a root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.tests.is_empty()
    }

    /// Roots for compiled sources.
    #[must_use]
    pub fn sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    /// Roots for compiled tests.
    #[must_use]
    pub fn tests(&self) -> &[Utf8PathBuf] {
        &self.tests
    }

    /// Returns `true` when the group for `scope` has at least one root.
    #[must_use]
    pub fn includes(&self, scope: InitializerScope) -> bool {
        match scope {
            InitializerScope::Sources => !self.sources.is_empty(),
            InitializerScope::Tests => !self.tests.is_empty(),
        }
    }

    /// All roots in lookup order.
    pub fn roots(&self) -> impl Iterator<Item = &Utf8Path> {
        self.sources
            .iter()
            .chain(self.tests.iter())
            .map(Utf8PathBuf::as_path)
    }
}

/// Which initializers to apply after a start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializerSource {
    class_name: Option<String>,
    json_path: Option<String>,
}

impl InitializerSource {
    /// Builds a source, treating blank names as absent.
    #[must_use]
    pub fn new(class_name: Option<String>, json_path: Option<String>) -> Self {
        Self {
            class_name: non_blank(class_name),
            json_path: non_blank(json_path),
        }
    }

    /// No initializers.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            class_name: None,
            json_path: None,
        }
    }

    /// Name of the registered initializer, if any.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Path of the JSON expectations file, if any.
    #[must_use]
    pub fn json_path(&self) -> Option<&str> {
        self.json_path.as_deref()
    }

    /// Returns `true` when neither mechanism is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.class_name.is_none() && self.json_path.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Result of applying one initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitializerOutcome {
    /// The initializer ran to completion.
    Applied {
        /// Initializer name or JSON path.
        subject: String,
    },
    /// Nothing was configured, or no port was available.
    Skipped,
    /// The name is not registered or visible, or the file does not exist.
    NotFound {
        /// Initializer name or JSON path.
        subject: String,
    },
    /// The name is malformed, or the file is not an expectation payload.
    InvalidShape {
        /// Initializer name or JSON path.
        subject: String,
        /// Why the shape was rejected.
        reason: String,
    },
    /// The server did not answer.
    Unreachable {
        /// Initializer name or JSON path.
        subject: String,
        /// Transport failure.
        message: String,
    },
    /// The initializer or the server reported an error.
    Failed {
        /// Initializer name or JSON path.
        subject: String,
        /// Failure description.
        message: String,
    },
}

impl InitializerOutcome {
    /// Returns `true` for [`InitializerOutcome::Applied`].
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Outcomes of both mechanisms for one start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationReport {
    /// Outcome of the registered initializer.
    pub class: InitializerOutcome,
    /// Outcome of the JSON file.
    pub json: InitializerOutcome,
}

impl InitializationReport {
    /// Report for a start where initialisation did not run.
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            class: InitializerOutcome::Skipped,
            json: InitializerOutcome::Skipped,
        }
    }
}
