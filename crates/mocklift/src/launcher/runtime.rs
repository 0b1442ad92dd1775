//! JVM and classpath discovery for forked launches.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use super::LAUNCH_TARGET;
use crate::resolver::{ArtifactCoordinate, PathResolver};

/// Main class of the MockServer distribution.
pub const ENTRY_POINT: &str = "org.mockserver.cli.Main";

/// Distribution version used when the bundled metadata has none.
pub const FALLBACK_VERSION: &str = "5.15.0";

/// Separator between classpath entries on this platform.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

const SERVER_GROUP: &str = "org.mock-server";
const SERVER_ARTIFACT: &str = "mockserver-netty";
const SERVER_CLASSIFIER: &str = "jar-with-dependencies";
const JAVA_BINARIES: [&str; 2] = ["java", "java.exe"];
const BARE_JAVA: &str = "java";

const METADATA: &str = include_str!("../../resources/mockserver.properties");

/// Version of the MockServer distribution to launch.
///
/// Read from the bundled properties metadata, falling back to
/// [`FALLBACK_VERSION`].
#[must_use]
pub fn artifact_version() -> String {
    let version = version_from_properties(METADATA).unwrap_or_else(|| FALLBACK_VERSION.to_owned());
    info!(
        target: LAUNCH_TARGET,
        "using {SERVER_GROUP}:{SERVER_ARTIFACT}:{version}:{SERVER_CLASSIFIER}"
    );
    version
}

pub(crate) fn version_from_properties(properties: &str) -> Option<String> {
    properties
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once(['=', ':']))
        .find(|(key, _)| key.trim() == "version")
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Coordinate of the self-contained MockServer jar.
#[must_use]
pub fn server_artifact(version: &str) -> ArtifactCoordinate {
    ArtifactCoordinate::new(SERVER_GROUP, SERVER_ARTIFACT, version)
        .with_classifier(SERVER_CLASSIFIER)
}

/// Locates the `java` binary under `runtime_home/bin`.
///
/// Falls back to a bare `java` resolved through `PATH`.
#[must_use]
pub fn java_executable(runtime_home: Option<&Utf8Path>) -> String {
    runtime_home
        .and_then(|home| {
            JAVA_BINARIES
                .iter()
                .map(|name| home.join("bin").join(name))
                .find(|candidate| candidate.is_file())
        })
        .map_or_else(|| BARE_JAVA.to_owned(), Utf8PathBuf::into_string)
}

/// Resolves the server jar and every extra dependency into a classpath.
///
/// Entries that cannot be resolved are logged and left out.
pub fn classpath(
    resolver: &dyn PathResolver,
    server: &ArtifactCoordinate,
    dependencies: &[ArtifactCoordinate],
) -> String {
    let mut entries: Vec<String> = Vec::with_capacity(dependencies.len() + 1);
    for coordinate in std::iter::once(server).chain(dependencies) {
        match resolver.resolve(coordinate) {
            Ok(path) => entries.push(path.into_string()),
            Err(error) => warn!(
                target: LAUNCH_TARGET,
                artifact = %coordinate,
                error = %error,
                "artifact not resolved; omitting it from the classpath"
            ),
        }
    }
    entries.join(&PATH_SEPARATOR.to_string())
}
