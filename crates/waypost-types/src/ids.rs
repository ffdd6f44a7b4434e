//! Connection identifiers.
//!
//! The hub addresses live connections through a small integer handle
//! instead of holding socket objects in shared state. Identifiers are
//! allocated by the dispatcher from a monotonically increasing counter,
//! so ordering by id is ordering by registration.

use serde::{Deserialize, Serialize};

/// Opaque identifier for one live connection.
///
/// Unique for the lifetime of the process. A reconnecting client always
/// receives a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Return the raw numeric value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_allocation() {
        let first = ConnectionId(1);
        let second = ConnectionId(2);
        assert!(first < second);
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(ConnectionId(42).to_string(), "conn-42");
    }
}
