//! Stash replication - the networked subset of entity state
//!
//! The authoritative tick loop publishes one coalesced record per entity
//! per tick into an append-only log; observers mirror the records read-only
//! and reconcile by version. Payloads carry the full stash contents, so
//! duplicate or out-of-order delivery converges without diff tracking.

use std::collections::VecDeque;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, StashVersion, Tick};
use crate::simulation::store::Stash;

/// One replicated snapshot of an entity's stash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashRecord {
    pub entity: EntityId,
    /// Monotonically increasing; never reused, never decreased
    pub version: StashVersion,
    pub payload: Stash,
    /// Tick the record was committed on (diagnostics only; reconciliation
    /// uses the version)
    pub tick: Tick,
}

/// Consumer position in the delta log
///
/// Absolute index from the start of the stream; survives log truncation
/// detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor(pub u64);

/// A consumer fell behind the retention window and must resync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncNeeded;

/// Authoritative, append-only replication log
///
/// Single producer (the tick commit phase); any number of consumers, each
/// advancing its own cursor. Bounded retention: readers that fall behind
/// the truncation point are told to resync from a full snapshot.
pub struct DeltaLog {
    versions: AHashMap<EntityId, StashVersion>,
    latest: AHashMap<EntityId, StashRecord>,
    log: VecDeque<StashRecord>,
    /// Records dropped from the front of `log`
    truncated: u64,
    retention: usize,
}

impl DeltaLog {
    pub fn new(retention: usize) -> Self {
        Self {
            versions: AHashMap::new(),
            latest: AHashMap::new(),
            log: VecDeque::new(),
            truncated: 0,
            retention,
        }
    }

    /// Publish the committed stash of one entity, bumping its version
    ///
    /// Called at most once per entity per tick: multiple jobs touching the
    /// same stash within a tick are coalesced before publication.
    pub fn publish(&mut self, entity: EntityId, payload: Stash, tick: Tick) -> StashVersion {
        let version = self.versions.entry(entity).or_insert(0);
        *version += 1;
        let record = StashRecord { entity, version: *version, payload, tick };

        self.latest.insert(entity, record.clone());
        self.log.push_back(record);
        while self.log.len() > self.retention {
            self.log.pop_front();
            self.truncated += 1;
        }
        *version
    }

    /// Current authoritative version for an entity
    pub fn version_of(&self, entity: EntityId) -> Option<StashVersion> {
        self.versions.get(&entity).copied()
    }

    /// Full-state record for resync
    pub fn snapshot_for(&self, entity: EntityId) -> Option<StashRecord> {
        self.latest.get(&entity).cloned()
    }

    /// Records published since the cursor, advancing it
    ///
    /// Fails with `ResyncNeeded` when the cursor points before the
    /// retention window; the consumer then reapplies `snapshot_for` on the
    /// entities it tracks and restarts from `end_cursor`.
    pub fn poll(&self, cursor: &mut LogCursor) -> Result<Vec<StashRecord>, ResyncNeeded> {
        if cursor.0 < self.truncated {
            return Err(ResyncNeeded);
        }
        let skip = (cursor.0 - self.truncated) as usize;
        let records: Vec<StashRecord> = self.log.iter().skip(skip).cloned().collect();
        cursor.0 += records.len() as u64;
        Ok(records)
    }

    /// Cursor positioned after everything published so far
    pub fn end_cursor(&self) -> LogCursor {
        LogCursor(self.truncated + self.log.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

/// Read-only mirror held by a non-authoritative observer
///
/// Local writes are impossible by construction: the replica only exposes
/// shared references into its records.
#[derive(Debug, Default)]
pub struct Replica {
    records: AHashMap<EntityId, StashRecord>,
    /// Stale or duplicate records discarded so far
    discarded: u64,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a replicated record
    ///
    /// Accepted only when the record's version is strictly newer than the
    /// local one; anything else is a duplicate or out-of-order delivery and
    /// is discarded. Returns whether the record was applied.
    pub fn apply(&mut self, record: StashRecord) -> bool {
        match self.records.get(&record.entity) {
            Some(local) if record.version <= local.version => {
                self.discarded += 1;
                tracing::debug!(
                    entity = %record.entity,
                    incoming = record.version,
                    local = local.version,
                    "stale replication record discarded"
                );
                false
            }
            _ => {
                self.records.insert(record.entity, record);
                true
            }
        }
    }

    pub fn stash(&self, entity: EntityId) -> Option<&Stash> {
        self.records.get(&entity).map(|r| &r.payload)
    }

    pub fn version_of(&self, entity: EntityId) -> Option<StashVersion> {
        self.records.get(&entity).map(|r| r.version)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn tracked_entities(&self) -> impl Iterator<Item = &EntityId> {
        self.records.keys()
    }
}
