//! Read-only summaries for the external tooling bridge
//!
//! A passive observer surface: inspection tools get JSON snapshots of
//! intent, job and entity state with no write authority over the
//! simulation. Failed jobs stay visible here until their retention window
//! lapses.

use serde::Serialize;

use crate::core::error::Result;
use crate::core::types::{EntityId, IntentId, JobId, Tick, Vec2};
use crate::intent::catalog::{IntentKind, IntentState};
use crate::simulation::job::{JobKind, JobState};
use crate::simulation::world::World;

#[derive(Debug, Clone, Serialize)]
pub struct IntentSummary {
    pub id: IntentId,
    pub subject: EntityId,
    pub kind: IntentKind,
    pub state: IntentState,
    pub priority: i32,
    pub drained_tick: Option<Tick>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub origin_intent: IntentId,
    pub subject: EntityId,
    pub kind: JobKind,
    pub state: JobState,
    pub attempts: u32,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub position: Option<Vec2>,
    /// Total goods across all resource kinds
    pub stash_total: u32,
    pub replicated: bool,
    pub active_job: Option<JobId>,
}

/// Job counts by state, for at-a-glance health
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub ready: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub tick: Tick,
    pub entities: Vec<EntitySummary>,
    pub intents: Vec<IntentSummary>,
    pub jobs: Vec<JobSummary>,
    pub job_counts: JobCounts,
    pub replication_log_len: usize,
}

/// Capture a read-only snapshot of the whole pipeline
pub fn snapshot(world: &World) -> PipelineSummary {
    let mut entities: Vec<EntitySummary> = world
        .store
        .iter()
        .map(|(&id, fragments)| EntitySummary {
            id,
            position: fragments.position,
            stash_total: fragments
                .stash
                .as_ref()
                .map(|s| s.values().sum())
                .unwrap_or(0),
            replicated: fragments.replication.stash,
            active_job: fragments.assignment,
        })
        .collect();
    entities.sort_by_key(|e| e.id.0);

    let intents: Vec<IntentSummary> = world
        .history
        .iter()
        .map(|intent| IntentSummary {
            id: intent.id,
            subject: intent.subject,
            kind: intent.kind,
            state: intent.state,
            priority: intent.priority,
            drained_tick: intent.drained_tick,
        })
        .collect();

    let mut jobs: Vec<JobSummary> = world
        .board
        .iter()
        .map(|job| JobSummary {
            id: job.id,
            origin_intent: job.origin_intent,
            subject: job.subject,
            kind: job.kind,
            state: job.state,
            attempts: job.attempts,
            failure: job.failure.clone(),
        })
        .collect();
    jobs.sort_by_key(|j| j.id);

    let mut job_counts = JobCounts::default();
    for job in &jobs {
        match job.state {
            JobState::Pending => job_counts.pending += 1,
            JobState::Ready | JobState::Running => job_counts.ready += 1,
            JobState::Done => job_counts.done += 1,
            JobState::Failed => job_counts.failed += 1,
            JobState::Cancelled => job_counts.cancelled += 1,
        }
    }

    PipelineSummary {
        tick: world.current_tick,
        entities,
        intents,
        jobs,
        job_counts,
        replication_log_len: world.master.len(),
    }
}

/// The snapshot as pretty JSON, ready for the bridge
pub fn snapshot_json(world: &World) -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot(world))?)
}
