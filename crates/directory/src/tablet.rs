//! Tablet record format.

use serde::{Deserialize, Serialize};
use std::fmt;
use tablets_common::{KeyHash, LogPosition, ServerId, TableId};

/// Key of a tablet in the directory: `(table_id, start_key_hash, end_key_hash)`.
pub type TabletKey = (TableId, KeyHash, KeyHash);

/// Ownership state of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TabletStatus {
    /// Serving reads and writes.
    Normal,
    /// Ownership is being reassigned after a failure.
    Recovering,
}

impl fmt::Display for TabletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabletStatus::Normal => f.write_str("NORMAL"),
            TabletStatus::Recovering => f.write_str("RECOVERING"),
        }
    }
}

/// A contiguous, inclusive range `[start_key_hash, end_key_hash]` of one
/// table's key-hash space and the server that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tablet {
    pub table_id: TableId,
    pub start_key_hash: KeyHash,
    pub end_key_hash: KeyHash,
    pub server_id: ServerId,
    pub status: TabletStatus,
    /// Log position at which the current owner took over the range.
    pub ctime: LogPosition,
}

impl Tablet {
    pub fn new(
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
        server_id: ServerId,
        status: TabletStatus,
        ctime: LogPosition,
    ) -> Self {
        Self {
            table_id,
            start_key_hash,
            end_key_hash,
            server_id,
            status,
            ctime,
        }
    }

    /// The exact-match key used for lookups.
    pub fn key(&self) -> TabletKey {
        (self.table_id, self.start_key_hash, self.end_key_hash)
    }

    /// Whether `key_hash` falls inside this tablet's range.
    pub fn contains(&self, key_hash: KeyHash) -> bool {
        self.start_key_hash <= key_hash && key_hash <= self.end_key_hash
    }
}

impl fmt::Display for Tablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tablet {{ tableId: {} startKeyHash: {} endKeyHash: {} serverId: {} status: {} ctime: {} }}",
            self.table_id,
            self.start_key_hash,
            self.end_key_hash,
            self.server_id,
            self.status,
            self.ctime
        )
    }
}
