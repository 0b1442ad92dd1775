//! Comma-separated port lists.
//!
//! A [`PortSet`] names every port the managed server listens on. Parsed
//! entries are positive TCP ports and the first is the primary port used for
//! control requests. A blank list means there is no server to manage, which
//! lifecycle operations treat as a skip.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Ordered list of TCP ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    /// Builds a port set from already validated ports.
    ///
    /// No check is made here. An embedded server given port `0` binds a free
    /// port; a forked child cannot, so parsed lists never contain it.
    #[must_use]
    pub const fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }

    /// A set with no ports.
    #[must_use]
    pub const fn empty() -> Self {
        Self { ports: Vec::new() }
    }

    /// Parses a comma-separated list such as `"1080,1081"`.
    ///
    /// Whitespace around each entry is ignored and blank input yields an
    /// empty set.
    ///
    /// # Errors
    ///
    /// Returns [`PortSetError`] naming the first entry that is empty or not a
    /// valid TCP port.
    pub fn parse(input: &str) -> Result<Self, PortSetError> {
        if input.trim().is_empty() {
            return Ok(Self::empty());
        }

        let ports = input
            .split(',')
            .map(|token| parse_port(input, token.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ports })
    }

    /// Parses an optional list, treating `None` like blank input.
    ///
    /// # Errors
    ///
    /// See [`PortSet::parse`].
    pub fn parse_optional(input: Option<&str>) -> Result<Self, PortSetError> {
        input.map_or_else(|| Ok(Self::empty()), Self::parse)
    }

    /// Returns `true` when no ports are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Number of ports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// The port used for control requests.
    #[must_use]
    pub fn primary(&self) -> Option<u16> {
        self.ports.first().copied()
    }

    /// The ports in configuration order.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }

    /// Iterates over the ports in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }
}

fn parse_port(input: &str, token: &str) -> Result<u16, PortSetError> {
    if token.is_empty() {
        return Err(PortSetError::EmptyEntry {
            input: input.to_owned(),
        });
    }
    let port = token
        .parse::<u16>()
        .map_err(|source| PortSetError::InvalidPort {
            input: input.to_owned(),
            token: token.to_owned(),
            source,
        })?;
    if port == 0 {
        return Err(PortSetError::ZeroPort {
            input: input.to_owned(),
        });
    }
    Ok(port)
}

impl From<Vec<u16>> for PortSet {
    fn from(ports: Vec<u16>) -> Self {
        Self::new(ports)
    }
}

impl FromStr for PortSet {
    type Err = PortSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for port in &self.ports {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{port}")?;
            first = false;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PortSet {
    type Item = &'a u16;
    type IntoIter = std::slice::Iter<'a, u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.iter()
    }
}

/// Errors raised while parsing a [`PortSet`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortSetError {
    /// Two separators appear with nothing between them.
    #[error("port list '{input}' contains an empty entry")]
    EmptyEntry {
        /// The full list being parsed.
        input: String,
    },
    /// An entry is `0`, which no client could reach.
    #[error("port list '{input}' contains port 0; ports must be in 1..=65535")]
    ZeroPort {
        /// The full list being parsed.
        input: String,
    },
    /// An entry is not an integer in `0..=65535`.
    #[error("'{token}' in port list '{input}' is not a valid TCP port")]
    InvalidPort {
        /// The full list being parsed.
        input: String,
        /// The offending entry.
        token: String,
        /// Underlying integer parse failure.
        #[source]
        source: ParseIntError,
    },
}
