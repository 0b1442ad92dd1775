use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Host used when forwarding is enabled but no host was given.
pub const DEFAULT_REMOTE_HOST: &str = "localhost";

/// Remote port value that switches forwarding off.
pub const FORWARDING_DISABLED: i32 = -1;

/// Environment variable naming the JVM installation used for forked launches.
pub const RUNTIME_HOME_ENV: &str = "JAVA_HOME";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default local artefact repository, `~/.m2/repository`.
///
/// Falls back to a path relative to the working directory when the home
/// directory cannot be determined or is not UTF-8.
#[must_use]
pub fn default_local_repository() -> Utf8PathBuf {
    let base = dirs::home_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_default();
    base.join(".m2").join("repository")
}
