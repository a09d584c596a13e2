//! The simulation world - owns all pipeline state
//!
//! Everything the tick loop mutates lives here: the entity store, the job
//! board, the intent ingress and history, the id allocator and the
//! replication log. The service registry is shared read-only; it must be
//! frozen before the world starts ticking.

use std::sync::Arc;

use crate::core::config::SimConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{EntityId, IntentId, JobIdGen, Tick, Vec2};
use crate::intent::catalog::{IntentKind, IntentState, Params};
use crate::intent::ingress::{IntentHistory, IntentIngress};
use crate::presentation::view::Presenter;
use crate::replication::stash::DeltaLog;
use crate::service::registry::ServiceRegistry;
use crate::simulation::board::JobBoard;
use crate::simulation::store::{EntityStore, Stash};

/// All simulation-owned state
pub struct World {
    pub current_tick: Tick,
    pub config: SimConfig,
    pub store: EntityStore,
    pub board: JobBoard,
    pub job_ids: JobIdGen,
    pub ingress: Arc<IntentIngress>,
    pub history: IntentHistory,
    pub registry: Arc<ServiceRegistry>,
    pub master: DeltaLog,
    pub presenter: Presenter,
}

impl World {
    /// Build a world over a frozen registry
    ///
    /// Rejects an unfrozen registry: provider swaps mid-run would race
    /// against in-flight jobs.
    pub fn new(config: SimConfig, registry: Arc<ServiceRegistry>) -> Result<Self> {
        config.validate()?;
        if !registry.is_frozen() {
            return Err(SimError::Config(
                "service registry must be frozen before the simulation starts".into(),
            ));
        }

        let master = DeltaLog::new(config.delta_log_retention);
        let history = IntentHistory::new(config.intent_history_limit);
        Ok(Self {
            current_tick: 0,
            config,
            store: EntityStore::new(),
            board: JobBoard::new(),
            job_ids: JobIdGen::new(),
            ingress: Arc::new(IntentIngress::new()),
            history,
            registry,
            master,
            presenter: Presenter::new(),
        })
    }

    /// Handle for concurrent intent submission (safe to clone across threads)
    pub fn ingress_handle(&self) -> Arc<IntentIngress> {
        Arc::clone(&self.ingress)
    }

    /// Submit an intent from the authoritative thread
    pub fn submit_intent(
        &self,
        subject: EntityId,
        kind: IntentKind,
        params: Params,
        priority: i32,
    ) -> Result<IntentId> {
        self.ingress.submit(subject, kind, params, priority)
    }

    /// Cancel an intent wherever it currently is in the pipeline
    ///
    /// Buffered: drained as Cancelled, zero jobs. Translated: all derived
    /// jobs not yet Running are cancelled; in-flight executions complete
    /// but their dependents are discarded.
    pub fn cancel_intent(&mut self, id: IntentId) {
        if self.ingress.cancel_buffered(id) {
            tracing::debug!(intent = %id, "cancelled before drain");
            return;
        }
        self.history.mark(id, IntentState::Cancelled);
        let cancelled = self.board.cancel_for_intent(id, self.current_tick);
        tracing::debug!(intent = %id, jobs = cancelled, "cancelled after translation");
    }

    pub fn spawn_unit(&mut self, position: Vec2) -> EntityId {
        self.store.spawn_unit(position)
    }

    pub fn spawn_node(&mut self, position: Vec2, contents: Stash) -> EntityId {
        self.store.spawn_node(position, contents)
    }

    pub fn spawn_depot(&mut self, position: Vec2) -> EntityId {
        self.store.spawn_depot(position)
    }

    /// Destroy an entity and cancel every job referencing it
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<()> {
        self.store.destroy(id)?;
        let cancelled = self.board.cancel_referencing(id, self.current_tick);
        tracing::debug!(entity = %id, jobs = cancelled, "entity destroyed");
        Ok(())
    }

    /// Advance the tick counter
    pub fn tick(&mut self) {
        self.current_tick += 1;
    }
}
