//! Process-wide record of the ports a server was started on.
//!
//! Code that runs later in the same process, such as test fixtures, reads the
//! slot to discover ports chosen at start-up.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use mocklift_config::PortSet;

use super::INSTANCE_TARGET;

/// Shared slot holding the bound ports as a comma-joined string.
#[derive(Debug, Clone, Default)]
pub struct PublishedPorts {
    slot: Arc<RwLock<Option<String>>>,
}

impl PublishedPorts {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `ports`, replacing any earlier value.
    pub fn publish(&self, ports: &PortSet) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(ports.to_string());
    }

    /// The published string, if any.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The published ports, skipping entries that are not valid ports.
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        self.get().as_deref().map(read_ports).unwrap_or_default()
    }
}

/// Leniently parses a comma-joined port string.
///
/// Entries that do not parse are logged and skipped.
#[must_use]
pub fn read_ports(value: &str) -> Vec<u16> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<u16>() {
            Ok(port) => Some(port),
            Err(error) => {
                warn!(
                    target: INSTANCE_TARGET,
                    entry,
                    value,
                    error = %error,
                    "ignoring invalid published port"
                );
                None
            }
        })
        .collect()
}
