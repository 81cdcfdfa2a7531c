//! tablets-common: shared types for the tablet directory workspace.
//!
//! Provides the identifiers every other crate speaks in: table ids, key
//! hashes, the `(index, generation)` `ServerId`, and the `LogPosition`
//! watermark recorded when a tablet's ownership was established.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric identifier of a table.
pub type TableId = u64;

/// A point in the 64-bit key-hash space.
pub type KeyHash = u64;

/// The last key hash in the space. A tablet covering a whole table spans
/// `[0, MAX_KEY_HASH]`.
pub const MAX_KEY_HASH: KeyHash = u64::MAX;

// ---------------------------------------------------------------------------
// ServerId
// ---------------------------------------------------------------------------

/// Identifies one incarnation of a storage server.
///
/// The `index` slot may be reused after a server fails; the `generation`
/// distinguishes the replacement from its predecessor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ServerId {
    index: u32,
    generation: u32,
}

impl ServerId {
    /// An id that never names a live server.
    pub const INVALID: Self = Self {
        index: 0,
        generation: u32::MAX,
    };

    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Unpack a wire id produced by [`ServerId::id`].
    pub const fn from_u64(id: u64) -> Self {
        Self {
            index: id as u32,
            generation: (id >> 32) as u32,
        }
    }

    /// The packed 64-bit form: generation in the high word, index in the low.
    pub const fn id(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({})", self)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server id {0:?}: expected \"<index>.<generation>\"")]
pub struct ParseServerIdError(String);

impl FromStr for ServerId {
    type Err = ParseServerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseServerIdError(s.to_string());
        let (index, generation) = s.trim().split_once('.').ok_or_else(err)?;
        let index = index.parse::<u32>().map_err(|_| err())?;
        let generation = generation.parse::<u32>().map_err(|_| err())?;
        Ok(Self::new(index, generation))
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ServerId {
    type Error = ParseServerIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// LogPosition
// ---------------------------------------------------------------------------

/// A position in a master's log: the head segment id and an offset into it.
///
/// Ordered by `(log_id, offset)`, so a later position compares greater.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LogPosition {
    pub log_id: u64,
    pub offset: u32,
}

impl LogPosition {
    pub const fn new(log_id: u64, offset: u32) -> Self {
        Self { log_id, offset }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.log_id, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
