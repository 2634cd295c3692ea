//! Placements of federated values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the copies of a federated value live.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Placement {
    Server,
    Clients,
}

impl Placement {
    /// Every placement, in a stable order.
    pub const ALL: [Placement; 2] = [Placement::Server, Placement::Clients];

    /// Whether values at this placement are all-equal unless stated otherwise.
    ///
    /// There is a single server, so server values are trivially all-equal;
    /// client values may differ per participant.
    pub const fn default_all_equal(self) -> bool {
        matches!(self, Placement::Server)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Placement::Server => "SERVER",
            Placement::Clients => "CLIENTS",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
