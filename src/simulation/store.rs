//! Entity store - entities and their attached fragments
//!
//! Entities are created and destroyed only through explicit store
//! operations; fragments are mutated only by the tick commit phase applying
//! job-produced mutations. Nothing outside the tick loop holds a mutable
//! reference into the store.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{EntityId, JobId, ResourceKind, Vec2};

/// Stash contents: resource kind → count
pub type Stash = AHashMap<ResourceKind, u32>;

/// Which parts of an entity's state are mirrored to observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationFlags {
    pub stash: bool,
}

/// The typed data blocks attached to an entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fragments {
    pub position: Option<Vec2>,
    pub stash: Option<Stash>,
    /// The job currently executing against this entity, if any
    pub assignment: Option<JobId>,
    pub replication: ReplicationFlags,
}

/// A single committed change to one fragment
///
/// Produced by capability providers from committed state; applied serially
/// in job execution order by the tick commit phase.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentMutation {
    SetPosition {
        entity: EntityId,
        position: Vec2,
    },
    StashAdd {
        entity: EntityId,
        resource: ResourceKind,
        amount: u32,
    },
    /// Saturating removal; providers clamp to snapshot availability, the
    /// store clamps again at commit
    StashRemove {
        entity: EntityId,
        resource: ResourceKind,
        amount: u32,
    },
}

impl FragmentMutation {
    pub fn entity(&self) -> EntityId {
        match self {
            FragmentMutation::SetPosition { entity, .. }
            | FragmentMutation::StashAdd { entity, .. }
            | FragmentMutation::StashRemove { entity, .. } => *entity,
        }
    }
}

/// All entities and their fragments
pub struct EntityStore {
    entities: AHashMap<EntityId, Fragments>,
    /// Entities whose stash changed during the current tick, in first-write
    /// order (drives coalesced delta emission)
    dirty_stash: Vec<EntityId>,
    dirty_set: AHashSet<EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: AHashMap::new(),
            dirty_stash: Vec::new(),
            dirty_set: AHashSet::new(),
        }
    }

    /// Create a mobile unit with an empty, replicated stash
    pub fn spawn_unit(&mut self, position: Vec2) -> EntityId {
        let id = EntityId::new();
        self.entities.insert(
            id,
            Fragments {
                position: Some(position),
                stash: Some(Stash::default()),
                assignment: None,
                replication: ReplicationFlags { stash: true },
            },
        );
        id
    }

    /// Create a stationary resource node holding goods to be extracted
    ///
    /// Nodes are not replicated; observers learn about their contents
    /// through the units that harvest them.
    pub fn spawn_node(&mut self, position: Vec2, contents: Stash) -> EntityId {
        let id = EntityId::new();
        self.entities.insert(
            id,
            Fragments {
                position: Some(position),
                stash: Some(contents),
                assignment: None,
                replication: ReplicationFlags::default(),
            },
        );
        id
    }

    /// Create a depot: a stationary, replicated stash
    pub fn spawn_depot(&mut self, position: Vec2) -> EntityId {
        let id = EntityId::new();
        self.entities.insert(
            id,
            Fragments {
                position: Some(position),
                stash: Some(Stash::default()),
                assignment: None,
                replication: ReplicationFlags { stash: true },
            },
        );
        id
    }

    /// Remove an entity, returning its final fragments
    ///
    /// The caller (World) is responsible for cancelling jobs that
    /// reference the entity.
    pub fn destroy(&mut self, id: EntityId) -> Result<Fragments> {
        self.entities
            .remove(&id)
            .ok_or(SimError::EntityNotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Fragments> {
        self.entities.get(&id)
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.entities.get(&id).and_then(|f| f.position)
    }

    pub fn stash(&self, id: EntityId) -> Option<&Stash> {
        self.entities.get(&id).and_then(|f| f.stash.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Fragments)> {
        self.entities.iter()
    }

    /// Set or clear the job-assignment fragment (tick loop only)
    pub fn set_assignment(&mut self, id: EntityId, job: Option<JobId>) {
        if let Some(fragments) = self.entities.get_mut(&id) {
            fragments.assignment = job;
        }
    }

    /// Clear the assignment only if this job still holds it
    pub fn clear_assignment_if(&mut self, id: EntityId, job: JobId) {
        if let Some(fragments) = self.entities.get_mut(&id) {
            if fragments.assignment == Some(job) {
                fragments.assignment = None;
            }
        }
    }

    /// Apply one committed mutation
    ///
    /// A mutation referencing a missing entity or fragment indicates a
    /// corrupted store: providers validated against the same committed
    /// state this tick, and nothing may destroy entities mid-tick.
    pub fn apply(&mut self, mutation: &FragmentMutation) -> Result<()> {
        let entity = mutation.entity();
        let fragments = self
            .entities
            .get_mut(&entity)
            .ok_or_else(|| SimError::StoreCorrupted(format!("mutation for missing {entity}")))?;

        match mutation {
            FragmentMutation::SetPosition { position, .. } => {
                if fragments.position.is_none() {
                    return Err(SimError::StoreCorrupted(format!(
                        "position mutation for {entity} without position fragment"
                    )));
                }
                fragments.position = Some(*position);
            }
            FragmentMutation::StashAdd { resource, amount, .. } => {
                let stash = fragments.stash.as_mut().ok_or_else(|| {
                    SimError::StoreCorrupted(format!(
                        "stash mutation for {entity} without stash fragment"
                    ))
                })?;
                *stash.entry(*resource).or_insert(0) += amount;
                self.mark_stash_dirty(entity);
            }
            FragmentMutation::StashRemove { resource, amount, .. } => {
                let stash = fragments.stash.as_mut().ok_or_else(|| {
                    SimError::StoreCorrupted(format!(
                        "stash mutation for {entity} without stash fragment"
                    ))
                })?;
                if let Some(count) = stash.get_mut(resource) {
                    *count = count.saturating_sub(*amount);
                    if *count == 0 {
                        stash.remove(resource);
                    }
                }
                self.mark_stash_dirty(entity);
            }
        }
        Ok(())
    }

    fn mark_stash_dirty(&mut self, entity: EntityId) {
        if self.dirty_set.insert(entity) {
            self.dirty_stash.push(entity);
        }
    }

    /// Entities whose stash changed this tick, in first-write order;
    /// clears the dirty tracking for the next tick
    pub fn take_dirty_stash(&mut self) -> Vec<EntityId> {
        self.dirty_set.clear();
        std::mem::take(&mut self.dirty_stash)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
