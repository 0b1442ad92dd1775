//! Argument assembly for the forked server.

use mocklift_config::{FORWARDING_DISABLED, ForwardingConfig, LogLevel, PortSet};

use super::runtime::ENTRY_POINT;

const ENCODING_OPTION: &str = "-Dfile.encoding=UTF-8";

/// Everything needed to build the child's command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Path to, or bare name of, the `java` binary.
    pub executable: String,
    /// Extra JVM options, inserted before the classpath.
    pub jvm_options: Vec<String>,
    /// Joined classpath.
    pub classpath: String,
    /// Ports the child serves on.
    pub ports: PortSet,
    /// Forwarding settings passed through to the child.
    pub forwarding: ForwardingConfig,
    /// Level passed as `-logLevel`.
    pub log_level: Option<LogLevel>,
}

impl LaunchSpec {
    /// Full argument list, executable first.
    ///
    /// Each server flag pair is present only when its value is set.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![self.executable.clone(), ENCODING_OPTION.to_owned()];
        arguments.extend(self.jvm_options.iter().cloned());
        arguments.extend([
            "-cp".to_owned(),
            self.classpath.clone(),
            ENTRY_POINT.to_owned(),
        ]);

        if !self.ports.is_empty() {
            arguments.extend(["-serverPort".to_owned(), self.ports.to_string()]);
        }
        let remote_port = self.forwarding.raw_remote_port();
        if remote_port != FORWARDING_DISABLED {
            arguments.extend(["-proxyRemotePort".to_owned(), remote_port.to_string()]);
        }
        let remote_host = self.forwarding.raw_remote_host().trim();
        if !remote_host.is_empty() {
            arguments.extend(["-proxyRemoteHost".to_owned(), remote_host.to_owned()]);
        }
        if let Some(level) = self.log_level {
            arguments.extend(["-logLevel".to_owned(), level.to_string()]);
        }
        arguments
    }

    /// Arguments joined with single spaces, for logging.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.arguments().join(" ")
    }
}
