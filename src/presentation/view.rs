//! Presentation layer - read-only projection of committed simulation state
//!
//! Double-buffered: the front buffer holds the snapshot captured at the end
//! of the previous tick, so consumers never observe values written by jobs
//! still in flight. View models are plain data; no references into the
//! store escape the capture.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, JobId, ResourceKind, Tick, Vec2};
use crate::simulation::board::JobBoard;
use crate::simulation::job::JobKind;
use crate::simulation::store::EntityStore;

/// Display-ready projection of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub entity: EntityId,
    /// Tick whose committed state this view reflects
    pub as_of_tick: Tick,
    pub position: Option<Vec2>,
    /// Stash contents in resource order (stable for display)
    pub stash: Vec<(ResourceKind, u32)>,
    pub active_job: Option<(JobId, JobKind)>,
}

/// One-tick-delayed view of the simulation
pub struct Presenter {
    front: AHashMap<EntityId, ViewModel>,
    staging: AHashMap<EntityId, ViewModel>,
    front_tick: Option<Tick>,
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            front: AHashMap::new(),
            staging: AHashMap::new(),
            front_tick: None,
        }
    }

    /// Capture committed state at the end of a tick
    ///
    /// The previously staged snapshot becomes visible; the new capture
    /// stays staged until the next refresh. Consumers therefore always read
    /// state one full tick behind the simulation.
    pub fn refresh(&mut self, store: &EntityStore, board: &JobBoard, tick: Tick) {
        let mut capture = AHashMap::with_capacity(store.len());
        for (&entity, fragments) in store.iter() {
            let mut stash: Vec<(ResourceKind, u32)> = fragments
                .stash
                .as_ref()
                .map(|s| s.iter().map(|(k, v)| (*k, *v)).collect())
                .unwrap_or_default();
            stash.sort_by_key(|(kind, _)| *kind);

            let active_job = fragments
                .assignment
                .and_then(|id| board.get(id).map(|job| (id, job.kind)));

            capture.insert(
                entity,
                ViewModel {
                    entity,
                    as_of_tick: tick,
                    position: fragments.position,
                    stash,
                    active_job,
                },
            );
        }

        self.front = std::mem::take(&mut self.staging);
        self.front_tick = self.front.values().next().map(|v| v.as_of_tick);
        self.staging = capture;
    }

    /// Project an entity into its display-ready form
    ///
    /// Returns nothing until a full tick has been staged and promoted, and
    /// nothing for entities that did not exist in the promoted snapshot.
    pub fn project(&self, entity: EntityId) -> Option<&ViewModel> {
        self.front.get(&entity)
    }

    /// All visible view models (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &ViewModel> {
        self.front.values()
    }

    /// Tick of the visible snapshot, if one has been promoted
    pub fn visible_tick(&self) -> Option<Tick> {
        self.front_tick
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}
