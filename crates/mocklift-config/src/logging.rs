use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Verbosity applied to the managed server and to the orchestrator's own logs.
///
/// Names follow the SLF4J spelling. The `java.util.logging` names `FINEST`,
/// `FINE`, `WARNING` and `SEVERE` are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum LogLevel {
    #[strum(to_string = "TRACE", serialize = "FINEST")]
    Trace,
    #[strum(to_string = "DEBUG", serialize = "FINE")]
    Debug,
    #[strum(to_string = "INFO")]
    Info,
    #[strum(to_string = "WARN", serialize = "WARNING")]
    Warn,
    #[strum(to_string = "ERROR", serialize = "SEVERE")]
    Error,
    #[strum(to_string = "OFF")]
    Off,
}

impl LogLevel {
    /// Parses a level name, ignoring surrounding whitespace and case.
    ///
    /// # Errors
    ///
    /// Returns [`LogLevelError`] when the name is not a recognised level.
    pub fn parse(input: &str) -> Result<Self, LogLevelError> {
        input
            .trim()
            .parse::<Self>()
            .map_err(|_| LogLevelError::new(input))
    }

    /// Parses an optional level where blank text means "not configured".
    ///
    /// # Errors
    ///
    /// Returns [`LogLevelError`] when non-blank text is not a recognised level.
    pub fn parse_optional(input: Option<&str>) -> Result<Option<Self>, LogLevelError> {
        match input.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => Self::parse(value).map(Some),
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

/// Raised when a log level name is not one of the legal values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "log level \"{level}\" is not legal it must be one of \"TRACE\", \"DEBUG\", \"INFO\", \
     \"WARN\", \"ERROR\", \"OFF\", \"FINEST\", \"FINE\", \"WARNING\", \"SEVERE\""
)]
pub struct LogLevelError {
    level: String,
}

impl LogLevelError {
    fn new(level: &str) -> Self {
        Self {
            level: level.to_owned(),
        }
    }

    /// The rejected input.
    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TRACE", LogLevel::Trace)]
    #[case("debug", LogLevel::Debug)]
    #[case(" Info ", LogLevel::Info)]
    #[case("WARN", LogLevel::Warn)]
    #[case("error", LogLevel::Error)]
    #[case("OFF", LogLevel::Off)]
    #[case("FINEST", LogLevel::Trace)]
    #[case("fine", LogLevel::Debug)]
    #[case("WARNING", LogLevel::Warn)]
    #[case("SEVERE", LogLevel::Error)]
    fn parses_slf4j_and_jul_names(#[case] input: &str, #[case] expected: LogLevel) {
        assert_eq!(LogLevel::parse(input), Ok(expected));
    }

    #[test]
    fn rejects_unknown_level_with_legal_values() {
        let error = LogLevel::parse("WRONG").expect_err("WRONG is not a level");
        assert_eq!(error.level(), "WRONG");
        let message = error.to_string();
        assert!(message.starts_with("log level \"WRONG\" is not legal it must be one of"));
        assert!(message.contains("\"SEVERE\""));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn blank_optional_level_is_unset(#[case] input: Option<&str>) {
        assert_eq!(LogLevel::parse_optional(input), Ok(None));
    }

    #[test]
    fn displays_canonical_names() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::Trace.filter_directive(), "trace");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("COMPACT".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }
}
