//! The tablet directory.
//!
//! Tablets are kept in insertion order in a `Vec`, with a hash index from the
//! exact `(table_id, start_key_hash, end_key_hash)` triple to the tablet's
//! slot. Lookups never use containment: a range that overlaps a tablet but
//! does not equal it is a miss.
//!
//! Every operation takes the directory lock for its whole duration, so no
//! caller observes a half-applied mutation.

use crate::registry::{RegistryError, ServerRegistry};
use crate::snapshot::{Snapshot, SnapshotEntry};
use crate::tablet::{Tablet, TabletKey, TabletStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use tablets_common::{KeyHash, LogPosition, ServerId, TableId};
use tablets_metrics::{metrics, start_op_timer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("no tablet for table {table_id} with range [{start_key_hash}, {end_key_hash}]")]
    NoSuchTablet {
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
    },

    #[error(
        "bad split point {split_key_hash} for range [{start_key_hash}, {end_key_hash}]: \
         need start < split <= end"
    )]
    BadSplit {
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
        split_key_hash: KeyHash,
    },
}

/// State guarded by the directory lock.
#[derive(Debug, Default)]
struct Inner {
    /// Tablets in insertion order; splits append.
    tablets: Vec<Tablet>,
    /// Key triple -> slot in `tablets`. With duplicate triples (a caller bug)
    /// the lowest slot wins.
    index: HashMap<TabletKey, usize>,
    /// Set once a duplicate triple has been added; incremental index updates
    /// are then unsafe and mutations rebuild instead.
    shadowed: bool,
}

impl Inner {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            tablets: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            shadowed: false,
        }
    }

    /// Exact-match slot lookup.
    fn position(
        &self,
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
    ) -> Result<usize, DirectoryError> {
        match self.index.get(&(table_id, start_key_hash, end_key_hash)) {
            Some(&slot) => Ok(slot),
            None => {
                metrics().lookup_misses.inc();
                Err(DirectoryError::NoSuchTablet {
                    table_id,
                    start_key_hash,
                    end_key_hash,
                })
            }
        }
    }

    /// Record `slot` for `key`, keeping the lowest slot on collision.
    /// Returns `false` if another tablet already held the key.
    fn index_insert(&mut self, key: TabletKey, slot: usize) -> bool {
        let entry = self.index.entry(key).or_insert(slot);
        if *entry == slot {
            return true;
        }
        *entry = (*entry).min(slot);
        false
    }

    fn push(&mut self, tablet: Tablet) {
        let key = tablet.key();
        let slot = self.tablets.len();
        self.tablets.push(tablet);
        if !self.index_insert(key, slot) {
            self.shadowed = true;
            tracing::warn!(
                "duplicate tablet added for table {} range [{}, {}]; lookups resolve to the first",
                key.0,
                key.1,
                key.2
            );
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.shadowed = false;
        for slot in 0..self.tablets.len() {
            let key = self.tablets[slot].key();
            if !self.index_insert(key, slot) {
                self.shadowed = true;
            }
        }
    }
}

/// The authoritative map from table key-hash ranges to owning servers.
///
/// Construct one per coordinator and share it behind an `Arc`; all methods
/// take `&self`.
#[derive(Debug, Default)]
pub struct TabletDirectory {
    inner: Mutex<Inner>,
}

impl TabletDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with room for `capacity` tablets before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::with_capacity(capacity)),
        }
    }

    /// Append a tablet. No overlap or duplicate checks are made; callers must
    /// not add a second tablet with the same table and range.
    pub fn add(&self, tablet: Tablet) {
        let _timer = start_op_timer("add");
        tracing::debug!("adding {}", tablet);
        self.inner.lock().push(tablet);
        metrics().tablets_added.inc();
    }

    /// Return the tablet whose table and both bounds equal the arguments.
    pub fn lookup(
        &self,
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
    ) -> Result<Tablet, DirectoryError> {
        let _timer = start_op_timer("lookup");
        let inner = self.inner.lock();
        let slot = inner.position(table_id, start_key_hash, end_key_hash)?;
        Ok(inner.tablets[slot].clone())
    }

    /// All tablets of `table_id`, in insertion order. Empty if there are none.
    pub fn list_for_table(&self, table_id: TableId) -> Vec<Tablet> {
        let _timer = start_op_timer("list_for_table");
        self.inner
            .lock()
            .tablets
            .iter()
            .filter(|t| t.table_id == table_id)
            .cloned()
            .collect()
    }

    /// Overwrite the owner, status and ctime of an existing tablet. The range
    /// itself never changes here.
    pub fn modify(
        &self,
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
        server_id: ServerId,
        status: TabletStatus,
        ctime: LogPosition,
    ) -> Result<(), DirectoryError> {
        let _timer = start_op_timer("modify");
        let mut inner = self.inner.lock();
        let slot = inner.position(table_id, start_key_hash, end_key_hash)?;
        let tablet = &mut inner.tablets[slot];
        tablet.server_id = server_id;
        tablet.status = status;
        tablet.ctime = ctime;
        tracing::debug!("modified {}", tablet);
        Ok(())
    }

    /// Remove every tablet of `table_id` and return them in their original
    /// order.
    pub fn remove_for_table(&self, table_id: TableId) -> Vec<Tablet> {
        let _timer = start_op_timer("remove_for_table");
        let mut inner = self.inner.lock();
        let (removed, kept): (Vec<Tablet>, Vec<Tablet>) = std::mem::take(&mut inner.tablets)
            .into_iter()
            .partition(|t| t.table_id == table_id);
        inner.tablets = kept;
        if !removed.is_empty() {
            inner.rebuild_index();
            tracing::debug!("removed {} tablet(s) of table {}", removed.len(), table_id);
            metrics().tablets_removed.inc_by(removed.len() as u64);
        }
        removed
    }

    /// Set the status of every tablet owned by `server_id` and return the
    /// updated tablets in directory order.
    pub fn set_status_for_server(&self, server_id: ServerId, status: TabletStatus) -> Vec<Tablet> {
        let _timer = start_op_timer("set_status_for_server");
        let mut inner = self.inner.lock();
        let mut updated = Vec::new();
        for tablet in inner.tablets.iter_mut().filter(|t| t.server_id == server_id) {
            tablet.status = status;
            updated.push(tablet.clone());
        }
        if !updated.is_empty() {
            tracing::debug!(
                "set {} tablet(s) of server {} to {}",
                updated.len(),
                server_id,
                status
            );
            metrics().status_updates.inc_by(updated.len() as u64);
        }
        updated
    }

    /// Split the tablet `[start_key_hash, end_key_hash]` at `split_key_hash`.
    ///
    /// The existing tablet shrinks to `[start_key_hash, split_key_hash - 1]`
    /// and a new tablet `[split_key_hash, end_key_hash]` with the same owner,
    /// status and ctime is appended at the end of the directory.
    ///
    /// The split point is validated against the given bounds before the
    /// tablet is looked up, so `BadSplit` wins over `NoSuchTablet`.
    pub fn split(
        &self,
        table_id: TableId,
        start_key_hash: KeyHash,
        end_key_hash: KeyHash,
        split_key_hash: KeyHash,
    ) -> Result<(), DirectoryError> {
        let _timer = start_op_timer("split");
        if !(start_key_hash < split_key_hash && split_key_hash <= end_key_hash) {
            metrics().split_rejections.inc();
            return Err(DirectoryError::BadSplit {
                start_key_hash,
                end_key_hash,
                split_key_hash,
            });
        }

        let mut inner = self.inner.lock();
        let slot = inner.position(table_id, start_key_hash, end_key_hash)?;

        let left = &mut inner.tablets[slot];
        let mut right = left.clone();
        // start < split, so this cannot underflow.
        left.end_key_hash = split_key_hash - 1;
        right.start_key_hash = split_key_hash;
        let left_key = left.key();

        if inner.shadowed {
            inner.tablets.push(right);
            inner.rebuild_index();
        } else {
            inner.index.remove(&(table_id, start_key_hash, end_key_hash));
            if !inner.index_insert(left_key, slot) {
                inner.shadowed = true;
            }
            inner.push(right);
        }

        tracing::debug!(
            "split table {} range [{}, {}] at {}",
            table_id,
            start_key_hash,
            end_key_hash,
            split_key_hash
        );
        metrics().splits.inc();
        metrics().tablets_added.inc();
        Ok(())
    }

    /// Build a wire snapshot, resolving each owner's locator through
    /// `registry`. Tablets are copied under the lock; the registry is
    /// consulted after it is released.
    pub fn serialize<R>(&self, registry: &R) -> Result<Snapshot, RegistryError>
    where
        R: ServerRegistry + ?Sized,
    {
        let _timer = start_op_timer("serialize");
        let tablets = self.tablets();
        let entries = tablets
            .iter()
            .map(|t| Ok(SnapshotEntry::new(t, registry.locator(t.server_id)?)))
            .collect::<Result<Vec<_>, RegistryError>>()?;
        Ok(Snapshot { tablets: entries })
    }

    /// A copy of every tablet in directory order.
    pub fn tablets(&self) -> Vec<Tablet> {
        self.inner.lock().tablets.clone()
    }

    /// Number of tablets currently stored.
    pub fn size(&self) -> usize {
        self.inner.lock().tablets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().tablets.is_empty()
    }

    /// Every tablet's `Display` form in directory order, space separated.
    pub fn debug_string(&self) -> String {
        self.inner
            .lock()
            .tablets
            .iter()
            .map(Tablet::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
