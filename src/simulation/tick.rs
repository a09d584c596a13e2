//! Tick system - orchestrates one simulation step
//!
//! This is the core loop that ties together:
//! intent draining -> flow translation -> dependency promotion ->
//! budgeted selection -> parallel execution -> serial commit ->
//! replication -> presentation refresh
//!
//! All state transitions are serialized through the tick boundary; nothing
//! a job does is observable outside the tick that committed it.

use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::{EntityId, IntentId, JobId, StashVersion, Tick};
use crate::flow::translate::translate;
use crate::intent::catalog::IntentState;
use crate::intent::ingress::supersede;
use crate::service::registry::{CapabilityProvider, Scope};
use crate::simulation::executor::{execute_jobs, JobError};
use crate::simulation::job::{Job, JobKind};
use crate::simulation::world::World;

/// Events generated during a simulation tick
///
/// Returned by `run_simulation_tick` for consumers that want a play-by-play
/// without digging through diagnostics.
#[derive(Debug, Clone)]
pub enum SimulationEvent {
    /// An intent was drained and produced jobs
    IntentTranslated {
        intent: IntentId,
        jobs: usize,
        tick: Tick,
    },
    /// An intent was superseded or cancelled before translation
    IntentCancelled { intent: IntentId, tick: Tick },
    /// A job was selected and claimed by this tick's executor
    JobStarted {
        job: JobId,
        kind: JobKind,
        subject: EntityId,
        tick: Tick,
    },
    /// A job committed successfully
    JobCompleted { job: JobId, kind: JobKind, tick: Tick },
    /// A job hit a recoverable error and returned to Ready
    JobRetried {
        job: JobId,
        attempts: u32,
        reason: String,
    },
    /// A job reached Failed (execution error, cascade, or starvation)
    JobFailed {
        job: JobId,
        reason: String,
        tick: Tick,
    },
    /// A coalesced stash delta entered the replication log
    DeltaPublished {
        entity: EntityId,
        version: StashVersion,
        tick: Tick,
    },
}

/// Run a single simulation tick
///
/// Per-job failures never abort the tick; the only fatal condition is a
/// corrupted entity store, which halts the loop by returning an error.
pub fn run_simulation_tick(world: &mut World) -> Result<Vec<SimulationEvent>> {
    let tick = world.current_tick;
    let mut events = Vec::new();

    drain_intents(world, tick, &mut events);
    world.board.promote(tick);
    let selected = select_jobs(world, tick, &mut events);
    let results = execute_jobs(&selected, &world.store, world.config.parallel_threshold);
    commit_results(world, tick, selected, results, &mut events)?;
    publish_deltas(world, tick, &mut events);
    world.board.purge(tick, world.config.job_retention_ticks);

    world.tick();
    world
        .presenter
        .refresh(&world.store, &world.board, tick);

    tracing::debug!(
        tick,
        events = events.len(),
        pending_intents = world.ingress.pending(),
        "tick complete"
    );
    Ok(events)
}

/// Drain the ingress buffer atomically, apply the supersede rule, and hand
/// live intents to Flow
fn drain_intents(world: &mut World, tick: Tick, events: &mut Vec<SimulationEvent>) {
    let batch = world.ingress.drain();
    if batch.is_empty() {
        return;
    }

    let (live, cancelled) = supersede(batch);

    for mut intent in cancelled {
        intent.drained_tick = Some(tick);
        events.push(SimulationEvent::IntentCancelled { intent: intent.id, tick });
        world.history.record(intent);
    }

    for mut intent in live {
        intent.drained_tick = Some(tick);

        // Cancelled while still buffered: drained for the record, no jobs
        if intent.state == IntentState::Cancelled {
            events.push(SimulationEvent::IntentCancelled { intent: intent.id, tick });
            world.history.record(intent);
            continue;
        }

        let jobs = translate(&intent, &mut world.job_ids);
        events.push(SimulationEvent::IntentTranslated {
            intent: intent.id,
            jobs: jobs.len(),
            tick,
        });
        for job in jobs {
            world.board.insert(job);
        }

        intent.state = IntentState::Translated;
        world.history.record(intent);
    }
}

/// Select Ready jobs up to the tick budget, resolving capabilities
///
/// Unresolvable jobs do not consume budget; they age toward the starvation
/// timeout instead. Selected jobs are claimed (Running) before execution.
fn select_jobs(
    world: &mut World,
    tick: Tick,
    events: &mut Vec<SimulationEvent>,
) -> Vec<(Job, Arc<dyn CapabilityProvider>)> {
    let budget = world.config.tick_job_budget;
    let mut selected: Vec<(Job, Arc<dyn CapabilityProvider>)> = Vec::new();

    for id in world.board.ready_in_order() {
        if selected.len() >= budget {
            break;
        }
        let Some(job) = world.board.get(id) else {
            continue;
        };
        let subject = job.subject;
        let capability = job.required_capability;

        match world.registry.resolve(capability, Scope::Entity(subject)) {
            Ok(provider) => {
                world.board.mark_running(id);
                let job = world
                    .board
                    .get(id)
                    .expect("running job present")
                    .clone();
                world.store.set_assignment(subject, Some(id));
                events.push(SimulationEvent::JobStarted {
                    job: id,
                    kind: job.kind,
                    subject,
                    tick,
                });
                selected.push((job, provider));
            }
            Err(_) => {
                let failed = world.board.record_unresolved(
                    id,
                    world.config.ready_timeout_ticks,
                    tick,
                );
                if failed {
                    world.store.clear_assignment_if(subject, id);
                    events.push(SimulationEvent::JobFailed {
                        job: id,
                        reason: crate::simulation::board::REASON_CAPABILITY_UNAVAILABLE
                            .to_string(),
                        tick,
                    });
                }
            }
        }
    }
    selected
}

/// Apply execution results in scheduling order
///
/// Mutations commit serially, so overlapping writes resolve to
/// last-writer-within-tick by job order. Only a store invariant violation
/// propagates an error out of the tick.
fn commit_results(
    world: &mut World,
    tick: Tick,
    selected: Vec<(Job, Arc<dyn CapabilityProvider>)>,
    results: Vec<crate::simulation::executor::JobRun>,
    events: &mut Vec<SimulationEvent>,
) -> Result<()> {
    for ((job, _), result) in selected.into_iter().zip(results) {
        match result {
            Ok(mutations) => {
                for mutation in &mutations {
                    world.store.apply(mutation)?;
                }
                world.board.complete(job.id, tick);
                world.store.clear_assignment_if(job.subject, job.id);
                events.push(SimulationEvent::JobCompleted {
                    job: job.id,
                    kind: job.kind,
                    tick,
                });
            }
            Err(JobError::Recoverable(reason)) => {
                let survived = world.board.requeue_or_fail(
                    job.id,
                    world.config.job_retry_limit,
                    tick,
                    &reason,
                );
                if survived {
                    let attempts = world
                        .board
                        .get(job.id)
                        .map(|j| j.attempts)
                        .unwrap_or(0);
                    events.push(SimulationEvent::JobRetried {
                        job: job.id,
                        attempts,
                        reason,
                    });
                } else {
                    world.store.clear_assignment_if(job.subject, job.id);
                    events.push(SimulationEvent::JobFailed { job: job.id, reason, tick });
                }
            }
            Err(err @ JobError::EntityGone(_)) => {
                let reason = err.reason();
                world.board.fail_cascading(job.id, tick, &reason);
                world.store.clear_assignment_if(job.subject, job.id);
                events.push(SimulationEvent::JobFailed { job: job.id, reason, tick });
            }
        }
    }
    Ok(())
}

/// Emit one coalesced delta per replicated entity whose stash changed
fn publish_deltas(world: &mut World, tick: Tick, events: &mut Vec<SimulationEvent>) {
    for entity in world.store.take_dirty_stash() {
        let Some(fragments) = world.store.get(entity) else {
            continue;
        };
        if !fragments.replication.stash {
            continue;
        }
        let Some(stash) = fragments.stash.clone() else {
            continue;
        };
        let version = world.master.publish(entity, stash, tick);
        events.push(SimulationEvent::DeltaPublished { entity, version, tick });
    }
}
