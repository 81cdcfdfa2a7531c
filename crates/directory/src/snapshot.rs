//! Wire snapshot of the directory.
//!
//! One entry per tablet, in directory order. Field order is part of the
//! format: recovery agents and clients parse it positionally, so fields of
//! [`SnapshotEntry`] must not be reordered.

use crate::tablet::{Tablet, TabletStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tablets_common::{KeyHash, LogPosition, ServerId, TableId};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single tablet as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub table_id: TableId,
    pub start_key_hash: KeyHash,
    pub end_key_hash: KeyHash,
    pub state: TabletStatus,
    /// Packed server id, see [`ServerId::id`].
    pub server_id: u64,
    pub service_locator: String,
    pub ctime_log_head_id: u64,
    pub ctime_log_head_offset: u32,
}

impl SnapshotEntry {
    pub fn new(tablet: &Tablet, service_locator: String) -> Self {
        Self {
            table_id: tablet.table_id,
            start_key_hash: tablet.start_key_hash,
            end_key_hash: tablet.end_key_hash,
            state: tablet.status,
            server_id: tablet.server_id.id(),
            service_locator,
            ctime_log_head_id: tablet.ctime.log_id,
            ctime_log_head_offset: tablet.ctime.offset,
        }
    }

    /// Rebuild the directory record this entry describes. The locator has no
    /// place in a `Tablet` and is dropped.
    pub fn to_tablet(&self) -> Tablet {
        Tablet::new(
            self.table_id,
            self.start_key_hash,
            self.end_key_hash,
            ServerId::from_u64(self.server_id),
            self.state,
            LogPosition::new(self.ctime_log_head_id, self.ctime_log_head_offset),
        )
    }
}

/// Ordered list of tablets produced by [`crate::TabletDirectory::serialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tablets: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.tablets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tablets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry> {
        self.tablets.iter()
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// One-line text rendering, used in log lines.
    pub fn short_debug_string(&self) -> String {
        let mut out = String::new();
        for (i, e) in self.tablets.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            // Writing to a String cannot fail.
            let _ = write!(
                out,
                "tablet {{ table_id: {} start_key_hash: {} end_key_hash: {} state: {} \
                 server_id: {} service_locator: {:?} ctime_log_head_id: {} \
                 ctime_log_head_offset: {} }}",
                e.table_id,
                e.start_key_hash,
                e.end_key_hash,
                e.state,
                e.server_id,
                e.service_locator,
                e.ctime_log_head_id,
                e.ctime_log_head_offset
            );
        }
        out
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.tablets.iter()
    }
}
