//! Artefact resolution for the forked server's classpath.
//!
//! Resolution is a black box behind [`PathResolver`]. The shipped
//! [`LocalRepositoryResolver`] only looks inside a Maven-layout local
//! repository and never downloads anything.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

const DEFAULT_TYPE: &str = "jar";

/// `group:artifact:version[:type[:classifier]]` coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinate {
    group: String,
    artifact: String,
    version: String,
    kind: String,
    classifier: Option<String>,
}

impl ArtifactCoordinate {
    /// A `jar` coordinate without classifier.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            kind: DEFAULT_TYPE.to_owned(),
            classifier: None,
        }
    }

    /// Replaces the packaging type.
    #[must_use]
    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Group identifier.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Artifact identifier.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Packaging type, `jar` unless overridden.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Optional classifier.
    #[must_use]
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// Path of the artefact relative to a repository root.
    #[must_use]
    pub fn repository_path(&self) -> Utf8PathBuf {
        let mut path: Utf8PathBuf = self.group.split('.').collect();
        path.push(&self.artifact);
        path.push(&self.version);
        let file_name = match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{classifier}.{}",
                self.artifact, self.version, self.kind
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.kind),
        };
        path.push(file_name);
        path
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group, self.artifact, self.version, self.kind
        )?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = CoordinateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(CoordinateError::Malformed {
                input: input.to_owned(),
            });
        }
        match parts.as_slice() {
            [group, artifact, version] => Ok(Self::new(*group, *artifact, *version)),
            [group, artifact, version, kind] => {
                Ok(Self::new(*group, *artifact, *version).with_type(*kind))
            }
            [group, artifact, version, kind, classifier] => Ok(Self::new(
                *group, *artifact, *version,
            )
            .with_type(*kind)
            .with_classifier(*classifier)),
            _ => Err(CoordinateError::Malformed {
                input: input.to_owned(),
            }),
        }
    }
}

/// Errors raised while parsing an [`ArtifactCoordinate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinateError {
    /// Wrong number of segments or an empty segment.
    #[error("artifact coordinate '{input}' must look like group:artifact:version[:type[:classifier]]")]
    Malformed {
        /// The rejected text.
        input: String,
    },
}

/// Maps artefact coordinates onto files.
pub trait PathResolver {
    /// Resolves `coordinate` to an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the artefact is unavailable.
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<Utf8PathBuf, ResolveError>;
}

/// Errors raised while resolving an artefact.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No file exists at the expected location.
    #[error("artifact {coordinate} is not present at {path}")]
    Missing {
        /// The requested coordinate.
        coordinate: ArtifactCoordinate,
        /// Where the file was expected.
        path: Utf8PathBuf,
    },
}

/// Resolver over a local Maven-layout repository.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    root: Utf8PathBuf,
}

impl LocalRepositoryResolver {
    /// Resolves artefacts beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl PathResolver for LocalRepositoryResolver {
    fn resolve(&self, coordinate: &ArtifactCoordinate) -> Result<Utf8PathBuf, ResolveError> {
        let path = self.root.join(coordinate.repository_path());
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolveError::Missing {
                coordinate: coordinate.clone(),
                path,
            })
        }
    }
}
