//! Job execution - fragment access declarations and the parallel executor
//!
//! Providers compute mutations from committed state only; nothing is
//! written until the tick's commit phase applies the collected mutations in
//! scheduling order. Jobs whose declared fragment access sets are disjoint
//! run in parallel within a wave.

use std::sync::Arc;

use rayon::prelude::*;

use crate::core::types::EntityId;
use crate::service::registry::CapabilityProvider;
use crate::simulation::job::{Job, JobKind};
use crate::simulation::store::{EntityStore, FragmentMutation};

/// Fragment classes named by access declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Position,
    Stash,
}

/// The fragments a job may touch, instantiated with its concrete entities
#[derive(Debug, Clone, Default)]
pub struct FragmentAccess {
    pub reads: Vec<(EntityId, FragmentKind)>,
    pub writes: Vec<(EntityId, FragmentKind)>,
}

impl FragmentAccess {
    /// Two jobs conflict when either writes a fragment the other touches
    pub fn conflicts_with(&self, other: &FragmentAccess) -> bool {
        let touches = |access: &FragmentAccess, slot: &(EntityId, FragmentKind)| {
            access.reads.contains(slot) || access.writes.contains(slot)
        };
        self.writes.iter().any(|slot| touches(other, slot))
            || other.writes.iter().any(|slot| touches(self, slot))
    }
}

/// Static access declaration per job kind, bound to the job's entities
///
/// The declaration is the safety contract for in-tick parallelism: the
/// executor only co-schedules jobs whose sets are pairwise disjoint.
pub fn fragment_access(job: &Job) -> FragmentAccess {
    let subject = job.subject;
    let target = job.target();
    let mut access = FragmentAccess::default();

    match job.kind {
        JobKind::Travel => {
            access.reads.push((subject, FragmentKind::Position));
            if let Some(t) = target {
                access.reads.push((t, FragmentKind::Position));
            }
            access.writes.push((subject, FragmentKind::Position));
        }
        JobKind::Extract | JobKind::Plunder => {
            access.reads.push((subject, FragmentKind::Position));
            if let Some(t) = target {
                access.reads.push((t, FragmentKind::Position));
                access.reads.push((t, FragmentKind::Stash));
                access.writes.push((t, FragmentKind::Stash));
            }
            access.writes.push((subject, FragmentKind::Stash));
        }
        JobKind::Deposit => {
            access.reads.push((subject, FragmentKind::Position));
            access.reads.push((subject, FragmentKind::Stash));
            if let Some(t) = target {
                access.reads.push((t, FragmentKind::Position));
                access.writes.push((t, FragmentKind::Stash));
            }
            access.writes.push((subject, FragmentKind::Stash));
        }
        JobKind::Transfer => {
            access.reads.push((subject, FragmentKind::Stash));
            access.writes.push((subject, FragmentKind::Stash));
            if let Some(t) = target {
                access.writes.push((t, FragmentKind::Stash));
            }
        }
    }
    access
}

/// Execution failure classes
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    /// Transient condition; the scheduler retries up to the configured bound
    Recoverable(String),
    /// A referenced entity no longer exists; fails immediately and cascades
    EntityGone(EntityId),
}

impl JobError {
    pub fn reason(&self) -> String {
        match self {
            JobError::Recoverable(msg) => msg.clone(),
            JobError::EntityGone(id) => format!("entity gone: {id}"),
        }
    }
}

/// Result of one provider execution
pub type JobRun = Result<Vec<FragmentMutation>, JobError>;

/// Execute the selected jobs, returning results aligned with the input order
///
/// Jobs are partitioned into waves of pairwise non-conflicting access sets
/// (greedy, in scheduling order). Waves at or above `parallel_threshold`
/// run on the rayon pool; smaller waves run sequentially to avoid thread
/// overhead.
pub fn execute_jobs(
    jobs: &[(Job, Arc<dyn CapabilityProvider>)],
    store: &EntityStore,
    parallel_threshold: usize,
) -> Vec<JobRun> {
    let accesses: Vec<FragmentAccess> = jobs.iter().map(|(job, _)| fragment_access(job)).collect();
    let waves = partition_waves(&accesses);

    let mut results: Vec<Option<JobRun>> = (0..jobs.len()).map(|_| None).collect();
    for wave in waves {
        if wave.len() >= parallel_threshold {
            let wave_results: Vec<(usize, JobRun)> = wave
                .par_iter()
                .map(|&idx| {
                    let (job, provider) = &jobs[idx];
                    (idx, provider.run(job, store))
                })
                .collect();
            for (idx, run) in wave_results {
                results[idx] = Some(run);
            }
        } else {
            for &idx in &wave {
                let (job, provider) = &jobs[idx];
                results[idx] = Some(provider.run(job, store));
            }
        }
    }

    results
        .into_iter()
        .map(|run| run.expect("every selected job executed"))
        .collect()
}

/// Greedy wave partitioning: a job joins the earliest wave it does not
/// conflict with
fn partition_waves(accesses: &[FragmentAccess]) -> Vec<Vec<usize>> {
    let mut waves: Vec<Vec<usize>> = Vec::new();

    for (idx, access) in accesses.iter().enumerate() {
        let wave = waves.iter_mut().find(|wave| {
            !wave
                .iter()
                .any(|&other| access.conflicts_with(&accesses[other]))
        });
        match wave {
            Some(wave) => wave.push(idx),
            None => waves.push(vec![idx]),
        }
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IntentId, JobId, Vec2};
    use crate::intent::catalog::{ParamKey, ParamValue, Params};
    use crate::service::registry::Capability;
    use crate::simulation::job::JobState;

    fn travel_job(id: u64, subject: EntityId) -> Job {
        let mut params = Params::default();
        params.insert(ParamKey::Dest, ParamValue::Position(Vec2::new(1.0, 1.0)));
        Job {
            id: JobId(id),
            origin_intent: IntentId::new(),
            subject,
            kind: JobKind::Travel,
            params,
            priority: 0,
            timestamp: id,
            dependencies: Vec::new(),
            required_capability: Capability::Locomotion,
            state: JobState::Ready,
            attempts: 0,
            ready_since: None,
            unresolved_ticks: 0,
            finished_tick: None,
            failure: None,
            cancel_requested: false,
        }
    }

    fn transfer_job(id: u64, subject: EntityId, target: EntityId) -> Job {
        let mut params = Params::default();
        params.insert(ParamKey::Target, ParamValue::Entity(target));
        params.insert(
            ParamKey::Resource,
            ParamValue::Resource(crate::core::types::ResourceKind::Wood),
        );
        params.insert(ParamKey::Amount, ParamValue::Amount(1));
        let mut job = travel_job(id, subject);
        job.kind = JobKind::Transfer;
        job.required_capability = Capability::StashTransfer;
        job.params = params;
        job
    }

    #[test]
    fn test_disjoint_travels_share_a_wave() {
        let a = travel_job(0, EntityId::new());
        let b = travel_job(1, EntityId::new());
        let accesses = vec![fragment_access(&a), fragment_access(&b)];
        let waves = partition_waves(&accesses);
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0], vec![0, 1]);
    }

    #[test]
    fn test_shared_target_stash_forces_separate_waves() {
        let depot = EntityId::new();
        let a = transfer_job(0, EntityId::new(), depot);
        let b = transfer_job(1, EntityId::new(), depot);
        let accesses = vec![fragment_access(&a), fragment_access(&b)];
        let waves = partition_waves(&accesses);
        assert_eq!(waves.len(), 2);
    }

    #[test]
    fn test_same_subject_jobs_conflict() {
        let subject = EntityId::new();
        let a = travel_job(0, subject);
        let b = travel_job(1, subject);
        assert!(fragment_access(&a).conflicts_with(&fragment_access(&b)));
    }
}
