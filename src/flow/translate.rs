//! Intent→job translation
//!
//! Pure and deterministic: the same intent content always produces the same
//! job structure (ids aside). No side effects beyond job creation; the
//! caller hands the new jobs to the simulation's scheduling queue.

use crate::core::types::JobIdGen;
use crate::intent::catalog::{Intent, IntentState};
use crate::simulation::job::{Job, JobState};

use super::rules::rule_for;

/// Produce the jobs for one intent
///
/// A cancelled intent translates to nothing: re-translating an
/// already-superseded intent is a no-op by construction. Jobs inherit the
/// intent's priority, timestamp and full parameter map, and enter Pending.
pub fn translate(intent: &Intent, ids: &mut JobIdGen) -> Vec<Job> {
    if intent.state == IntentState::Cancelled {
        return Vec::new();
    }

    let templates = rule_for(intent.kind);
    let job_ids: Vec<_> = templates.iter().map(|_| ids.next()).collect();

    let jobs: Vec<Job> = templates
        .iter()
        .enumerate()
        .map(|(idx, template)| Job {
            id: job_ids[idx],
            origin_intent: intent.id,
            subject: intent.subject,
            kind: template.kind,
            params: intent.params.clone(),
            priority: intent.priority,
            timestamp: intent.timestamp,
            dependencies: template.depends_on.iter().map(|&dep| job_ids[dep]).collect(),
            required_capability: template.requires,
            state: JobState::Pending,
            attempts: 0,
            ready_since: None,
            unresolved_ticks: 0,
            finished_tick: None,
            failure: None,
            cancel_requested: false,
        })
        .collect();

    tracing::debug!(
        intent = %intent.id,
        kind = ?intent.kind,
        jobs = jobs.len(),
        "intent translated"
    );
    jobs
}
