//! Job board - scheduling state and the job state machine
//!
//! Owns every job from Pending through its retention window. All
//! transitions happen here, driven by the tick loop; nothing outside the
//! loop mutates job state.

use ahash::AHashMap;

use crate::core::types::{EntityId, IntentId, JobId, Tick};
use crate::simulation::job::{Job, JobState};

/// Why a job was force-failed without executing
pub const REASON_CAPABILITY_UNAVAILABLE: &str = "CapabilityUnavailable";

pub struct JobBoard {
    jobs: AHashMap<JobId, Job>,
    /// Reverse dependency index: job → jobs that depend on it
    dependents: AHashMap<JobId, Vec<JobId>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self {
            jobs: AHashMap::new(),
            dependents: AHashMap::new(),
        }
    }

    /// Accept a freshly translated job (Pending)
    pub fn insert(&mut self, job: Job) {
        for &dep in &job.dependencies {
            self.dependents.entry(dep).or_default().push(job.id);
        }
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Promote Pending jobs whose dependencies are all Done
    ///
    /// A Pending job with a Failed or Cancelled dependency can never run;
    /// it is cancelled here, transitively.
    pub fn promote(&mut self, tick: Tick) -> Vec<JobId> {
        let mut promoted = Vec::new();
        let mut doomed = Vec::new();

        let pending: Vec<JobId> = self
            .jobs
            .values()
            .filter(|j| j.state == JobState::Pending)
            .map(|j| j.id)
            .collect();

        for id in pending {
            let job = &self.jobs[&id];
            let mut all_done = true;
            let mut dead_dep = false;
            for dep in &job.dependencies {
                match self.jobs.get(dep).map(|d| (d.state, d.cancel_requested)) {
                    Some((JobState::Done, false)) => {}
                    // Done under a cancelled intent: effects stand, but
                    // dependents are discarded
                    Some((JobState::Done, true))
                    | Some((JobState::Failed, _))
                    | Some((JobState::Cancelled, _)) => dead_dep = true,
                    Some(_) => all_done = false,
                    // Purged dependency record: the job predates the
                    // retention window and must have been Done, or this
                    // job would already be cancelled
                    None => {}
                }
            }

            if dead_dep {
                doomed.push(id);
            } else if all_done {
                let job = self.jobs.get_mut(&id).expect("pending job present");
                job.state = JobState::Ready;
                job.ready_since = Some(tick);
                promoted.push(id);
            }
        }

        for id in doomed {
            self.cancel_cascading(id, tick, "dependency failed or cancelled");
        }
        promoted
    }

    /// Ready jobs in scheduling order (priority desc, timestamp asc, id asc)
    pub fn ready_in_order(&self) -> Vec<JobId> {
        let mut ready: Vec<&Job> = self
            .jobs
            .values()
            .filter(|j| j.state == JobState::Ready)
            .collect();
        ready.sort_by(|a, b| Job::schedule_order(a, b));
        ready.iter().map(|j| j.id).collect()
    }

    pub fn mark_running(&mut self, id: JobId) {
        if let Some(job) = self.jobs.get_mut(&id) {
            debug_assert_eq!(job.state, JobState::Ready);
            job.state = JobState::Running;
            job.attempts += 1;
        }
    }

    /// Record a failed capability resolution for a Ready job; force-fails
    /// the job once it has starved past `timeout_ticks`
    pub fn record_unresolved(&mut self, id: JobId, timeout_ticks: u64, tick: Tick) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        job.unresolved_ticks += 1;
        if job.unresolved_ticks > timeout_ticks {
            self.fail_cascading(id, tick, REASON_CAPABILITY_UNAVAILABLE);
            true
        } else {
            false
        }
    }

    /// Mark a Running job Done; if its intent was cancelled mid-flight the
    /// committed effects stand but dependents are cancelled
    pub fn complete(&mut self, id: JobId, tick: Tick) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Done;
            job.finished_tick = Some(tick);
            if job.cancel_requested {
                let dependents = self.dependents.get(&id).cloned().unwrap_or_default();
                for dependent in dependents {
                    self.cancel_cascading(dependent, tick, "origin intent cancelled");
                }
            }
        }
    }

    /// Return a Running job to Ready after a recoverable error, or fail it
    /// once the retry bound is exhausted. Returns true if the job survives.
    pub fn requeue_or_fail(
        &mut self,
        id: JobId,
        retry_limit: u32,
        tick: Tick,
        reason: &str,
    ) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if job.attempts > retry_limit {
            self.fail_cascading(id, tick, reason);
            false
        } else {
            job.state = JobState::Ready;
            true
        }
    }

    /// Fail a job and transitively cancel everything depending on it
    pub fn fail_cascading(&mut self, id: JobId, tick: Tick, reason: &str) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Failed;
            job.finished_tick = Some(tick);
            job.failure = Some(reason.to_string());
            tracing::debug!(job = %id, reason, "job failed");
        }
        let dependents = self.dependents.get(&id).cloned().unwrap_or_default();
        for dependent in dependents {
            self.cancel_cascading(dependent, tick, "dependency failed");
        }
    }

    /// Cancel a job (if not already terminal) and its dependents
    pub fn cancel_cascading(&mut self, id: JobId, tick: Tick, reason: &str) {
        let mut worklist = vec![id];
        while let Some(current) = worklist.pop() {
            if let Some(job) = self.jobs.get_mut(&current) {
                if job.state.is_terminal() {
                    continue;
                }
                // In-flight executions finish; their dependents are
                // discarded when the execution commits
                if job.state == JobState::Running {
                    job.cancel_requested = true;
                    continue;
                }
                job.state = JobState::Cancelled;
                job.finished_tick = Some(tick);
                job.failure = Some(reason.to_string());
            }
            if let Some(dependents) = self.dependents.get(&current) {
                worklist.extend(dependents.iter().copied());
            }
        }
    }

    /// Cancel all not-yet-running jobs derived from an intent
    pub fn cancel_for_intent(&mut self, intent: IntentId, tick: Tick) -> usize {
        let targets: Vec<JobId> = self
            .jobs
            .values()
            .filter(|j| j.origin_intent == intent && !j.state.is_terminal())
            .map(|j| j.id)
            .collect();
        let count = targets.len();
        for id in targets {
            self.cancel_cascading(id, tick, "intent cancelled");
        }
        count
    }

    /// Cancel every job referencing a destroyed entity (subject or target)
    pub fn cancel_referencing(&mut self, entity: EntityId, tick: Tick) -> usize {
        let targets: Vec<JobId> = self
            .jobs
            .values()
            .filter(|j| {
                !j.state.is_terminal() && (j.subject == entity || j.target() == Some(entity))
            })
            .map(|j| j.id)
            .collect();
        let count = targets.len();
        for id in targets {
            self.cancel_cascading(id, tick, "entity destroyed");
        }
        count
    }

    /// Drop terminal jobs past the retention window
    pub fn purge(&mut self, tick: Tick, retention: u64) -> usize {
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|j| {
                j.state.is_terminal()
                    && j.finished_tick
                        .map(|t| t + retention < tick)
                        .unwrap_or(false)
            })
            .map(|j| j.id)
            .collect();
        for id in &expired {
            self.jobs.remove(id);
            self.dependents.remove(id);
        }
        expired.len()
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}
