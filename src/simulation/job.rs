//! Job records and the job state machine

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, IntentId, JobId, Tick};
use crate::intent::catalog::Params;
use crate::service::registry::Capability;

/// Concrete unit of simulation work derived from an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Place the subject at a destination
    Travel,
    /// Pull resources out of a node entity into the subject's stash
    Extract,
    /// Unload the subject's stash into a depot entity
    Deposit,
    /// Hand goods from the subject's stash to another entity
    Transfer,
    /// Seize goods from another entity's stash
    Plunder,
}

/// Job lifecycle states
///
/// Pending → Ready → Running → {Done, Failed, Cancelled}. All transitions
/// happen inside the tick loop; Running is only ever observed by the tick
/// that claimed the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Ready,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }
}

/// A schedulable unit of work owned by the simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub origin_intent: IntentId,
    pub subject: EntityId,
    pub kind: JobKind,
    pub params: Params,
    pub priority: i32,
    /// Submission sequence of the originating intent (scheduling tie-breaker)
    pub timestamp: u64,
    /// Jobs that must be Done before this one may become Ready
    pub dependencies: Vec<JobId>,
    pub required_capability: Capability,
    pub state: JobState,
    /// Execution attempts so far (recoverable-error retries)
    pub attempts: u32,
    /// Tick at which the job entered Ready (diagnostics)
    pub ready_since: Option<Tick>,
    /// Consecutive ticks the job sat Ready with no resolvable provider
    pub unresolved_ticks: u64,
    /// Tick at which the job reached a terminal state (for retention)
    pub finished_tick: Option<Tick>,
    /// Terminal failure reason, queryable by diagnostics
    pub failure: Option<String>,
    /// Set when the originating intent was cancelled mid-flight; the
    /// execution commits but dependents are cancelled
    pub cancel_requested: bool,
}

impl Job {
    /// Scheduling order: priority descending, submission timestamp
    /// ascending, then job id as the deterministic final tie-breaker
    pub fn schedule_order(a: &Job, b: &Job) -> std::cmp::Ordering {
        b.priority
            .cmp(&a.priority)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.id.cmp(&b.id))
    }

    /// The other entity this job reads or writes, if its kind has one
    pub fn target(&self) -> Option<EntityId> {
        use crate::intent::catalog::{ParamKey, ParamValue};
        match self.params.get(&ParamKey::Target) {
            Some(ParamValue::Entity(id)) => Some(*id),
            _ => None,
        }
    }
}
