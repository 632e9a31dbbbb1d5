//! Static capability descriptor.

use serde::Serialize;

/// What a caching façade can rely on from this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Expired entries are only removed by caller-driven `clean` passes.
    pub automatic_cleaning: bool,
    /// Entries can be tagged and cleaned by tag.
    pub tags: bool,
    /// Stale entries can be read with `bypass_validity`.
    pub expired_read: bool,
    /// Write-priority hints are honored.
    pub priority: bool,
    /// Entries may never expire.
    pub infinite_lifetime: bool,
    /// Ids and tags can be enumerated.
    pub get_list: bool,
}

pub const CAPABILITIES: Capabilities = Capabilities {
    automatic_cleaning: true,
    tags: true,
    expired_read: true,
    priority: false,
    infinite_lifetime: true,
    get_list: true,
};
