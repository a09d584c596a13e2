//! Built-in capability providers
//!
//! One provider per capability key, registered by `register_defaults` at
//! startup. Each `run` reads committed state only and returns the fragment
//! mutations for the commit phase; range and availability checks that can
//! change between ticks surface as recoverable errors.

use std::sync::Arc;

use crate::core::types::{EntityId, ResourceKind, Vec2};
use crate::intent::catalog::{ParamKey, ParamValue};
use crate::service::registry::{Capability, CapabilityProvider, ServiceRegistry};
use crate::simulation::executor::{JobError, JobRun};
use crate::simulation::job::Job;
use crate::simulation::store::{EntityStore, FragmentMutation, Stash};

/// How close a subject must be to interact with another entity's stash
const INTERACTION_RANGE: f32 = 2.0;

fn require_entity(store: &EntityStore, id: EntityId) -> Result<(), JobError> {
    if store.contains(id) {
        Ok(())
    } else {
        Err(JobError::EntityGone(id))
    }
}

fn require_target(job: &Job) -> Result<EntityId, JobError> {
    job.target()
        .ok_or_else(|| JobError::Recoverable("job carries no target entity".into()))
}

fn require_in_range(store: &EntityStore, subject: EntityId, target: EntityId) -> Result<(), JobError> {
    let (Some(a), Some(b)) = (store.position(subject), store.position(target)) else {
        return Err(JobError::Recoverable("positions unavailable".into()));
    };
    if a.distance(&b) <= INTERACTION_RANGE {
        Ok(())
    } else {
        Err(JobError::Recoverable(format!(
            "subject out of range of {target}"
        )))
    }
}

fn requested_resource(job: &Job) -> Option<ResourceKind> {
    match job.params.get(&ParamKey::Resource) {
        Some(ParamValue::Resource(kind)) => Some(*kind),
        _ => None,
    }
}

fn requested_amount(job: &Job) -> Option<u32> {
    match job.params.get(&ParamKey::Amount) {
        Some(ParamValue::Amount(n)) => Some(*n),
        _ => None,
    }
}

/// Mutations that move `stash`'s entire contents from one entity to another,
/// iterated in resource order for a deterministic mutation stream
fn drain_stash(from: EntityId, to: EntityId, stash: &Stash) -> Vec<FragmentMutation> {
    let mut kinds: Vec<(ResourceKind, u32)> =
        stash.iter().map(|(kind, count)| (*kind, *count)).collect();
    kinds.sort_by_key(|(kind, _)| *kind);

    let mut mutations = Vec::with_capacity(kinds.len() * 2);
    for (resource, amount) in kinds {
        mutations.push(FragmentMutation::StashRemove { entity: from, resource, amount });
        mutations.push(FragmentMutation::StashAdd { entity: to, resource, amount });
    }
    mutations
}

/// Locomotion: place the subject at the destination
pub struct TravelProvider;

impl CapabilityProvider for TravelProvider {
    fn name(&self) -> &'static str {
        "travel"
    }

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun {
        require_entity(store, job.subject)?;

        let dest: Vec2 = match job.params.get(&ParamKey::Dest) {
            Some(ParamValue::Position(pos)) => *pos,
            _ => {
                // Moving to an entity: resolve its committed position
                let target = require_target(job)?;
                store
                    .position(target)
                    .ok_or(JobError::EntityGone(target))?
            }
        };

        tracing::trace!(job = %job.id, subject = %job.subject, ?dest, "travel resolved");
        Ok(vec![FragmentMutation::SetPosition {
            entity: job.subject,
            position: dest,
        }])
    }
}

/// Harvesting: pull goods from a node entity into the subject's stash
pub struct ExtractProvider;

impl CapabilityProvider for ExtractProvider {
    fn name(&self) -> &'static str {
        "extract"
    }

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun {
        require_entity(store, job.subject)?;
        let node = require_target(job)?;
        require_entity(store, node)?;
        require_in_range(store, job.subject, node)?;

        let resource = requested_resource(job)
            .ok_or_else(|| JobError::Recoverable("extract without resource".into()))?;
        let requested = requested_amount(job).unwrap_or(0);

        let available = store
            .stash(node)
            .and_then(|stash| stash.get(&resource).copied())
            .unwrap_or(0);
        if available == 0 {
            return Err(JobError::Recoverable(format!(
                "node {node} exhausted of {resource:?}"
            )));
        }

        let amount = requested.min(available);
        Ok(vec![
            FragmentMutation::StashRemove { entity: node, resource, amount },
            FragmentMutation::StashAdd { entity: job.subject, resource, amount },
        ])
    }
}

/// Hauling: unload the subject's stash into a depot
pub struct DepositProvider;

impl CapabilityProvider for DepositProvider {
    fn name(&self) -> &'static str {
        "deposit"
    }

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun {
        require_entity(store, job.subject)?;
        let depot = require_target(job)?;
        require_entity(store, depot)?;
        require_in_range(store, job.subject, depot)?;

        let stash = store
            .stash(job.subject)
            .ok_or_else(|| JobError::Recoverable("subject has no stash".into()))?;
        if stash.is_empty() {
            return Err(JobError::Recoverable("nothing to deposit".into()));
        }

        match requested_resource(job) {
            // Partial deposit of one resource
            Some(resource) => {
                let available = stash.get(&resource).copied().unwrap_or(0);
                if available == 0 {
                    return Err(JobError::Recoverable(format!(
                        "no {resource:?} to deposit"
                    )));
                }
                let amount = requested_amount(job).unwrap_or(available).min(available);
                Ok(vec![
                    FragmentMutation::StashRemove { entity: job.subject, resource, amount },
                    FragmentMutation::StashAdd { entity: depot, resource, amount },
                ])
            }
            // Full unload
            None => Ok(drain_stash(job.subject, depot, stash)),
        }
    }
}

/// Stash transfer: hand goods to another entity
pub struct TransferProvider;

impl CapabilityProvider for TransferProvider {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun {
        require_entity(store, job.subject)?;
        let recipient = require_target(job)?;
        require_entity(store, recipient)?;

        let resource = requested_resource(job)
            .ok_or_else(|| JobError::Recoverable("transfer without resource".into()))?;
        let requested = requested_amount(job).unwrap_or(0);

        let available = store
            .stash(job.subject)
            .and_then(|stash| stash.get(&resource).copied())
            .unwrap_or(0);
        if available == 0 {
            return Err(JobError::Recoverable(format!(
                "no {resource:?} available to transfer"
            )));
        }

        let amount = requested.min(available);
        Ok(vec![
            FragmentMutation::StashRemove { entity: job.subject, resource, amount },
            FragmentMutation::StashAdd { entity: recipient, resource, amount },
        ])
    }
}

/// Raiding: seize the entire target stash
pub struct PlunderProvider;

impl CapabilityProvider for PlunderProvider {
    fn name(&self) -> &'static str {
        "plunder"
    }

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun {
        require_entity(store, job.subject)?;
        let target = require_target(job)?;
        require_entity(store, target)?;
        require_in_range(store, job.subject, target)?;

        let stash = store
            .stash(target)
            .ok_or_else(|| JobError::Recoverable("target has no stash".into()))?;
        if stash.is_empty() {
            return Err(JobError::Recoverable("nothing to plunder".into()));
        }

        Ok(drain_stash(target, job.subject, stash))
    }
}

/// Register the built-in provider for every capability key
///
/// Called once at startup, before the registry is frozen.
pub fn register_defaults(registry: &mut ServiceRegistry) -> crate::core::error::Result<()> {
    registry.register(Capability::Locomotion, Arc::new(TravelProvider), false)?;
    registry.register(Capability::Harvesting, Arc::new(ExtractProvider), false)?;
    registry.register(Capability::Hauling, Arc::new(DepositProvider), false)?;
    registry.register(Capability::StashTransfer, Arc::new(TransferProvider), false)?;
    registry.register(Capability::Raiding, Arc::new(PlunderProvider), false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IntentId, JobId};
    use crate::intent::catalog::Params;
    use crate::simulation::job::{JobKind, JobState};

    fn make_job(kind: JobKind, subject: EntityId, params: Params) -> Job {
        Job {
            id: JobId(0),
            origin_intent: IntentId::new(),
            subject,
            kind,
            params,
            priority: 0,
            timestamp: 0,
            dependencies: Vec::new(),
            required_capability: Capability::Locomotion,
            state: JobState::Running,
            attempts: 0,
            ready_since: None,
            unresolved_ticks: 0,
            finished_tick: None,
            failure: None,
            cancel_requested: false,
        }
    }

    #[test]
    fn test_travel_to_position() {
        let mut store = EntityStore::new();
        let unit = store.spawn_unit(Vec2::default());

        let mut params = Params::default();
        params.insert(ParamKey::Dest, ParamValue::Position(Vec2::new(10.0, 5.0)));
        let job = make_job(JobKind::Travel, unit, params);

        let mutations = TravelProvider.run(&job, &store).unwrap();
        assert_eq!(
            mutations,
            vec![FragmentMutation::SetPosition {
                entity: unit,
                position: Vec2::new(10.0, 5.0)
            }]
        );
    }

    #[test]
    fn test_travel_to_missing_entity_is_entity_gone() {
        let mut store = EntityStore::new();
        let unit = store.spawn_unit(Vec2::default());
        let ghost = EntityId::new();

        let mut params = Params::default();
        params.insert(ParamKey::Target, ParamValue::Entity(ghost));
        let job = make_job(JobKind::Travel, unit, params);

        let err = TravelProvider.run(&job, &store).unwrap_err();
        assert_eq!(err, JobError::EntityGone(ghost));
    }

    #[test]
    fn test_extract_clamps_to_availability() {
        let mut store = EntityStore::new();
        let mut contents = Stash::default();
        contents.insert(ResourceKind::Wood, 3);
        let node = store.spawn_node(Vec2::default(), contents);
        let unit = store.spawn_unit(Vec2::default());

        let mut params = Params::default();
        params.insert(ParamKey::Target, ParamValue::Entity(node));
        params.insert(ParamKey::Resource, ParamValue::Resource(ResourceKind::Wood));
        params.insert(ParamKey::Amount, ParamValue::Amount(10));
        let job = make_job(JobKind::Extract, unit, params);

        let mutations = ExtractProvider.run(&job, &store).unwrap();
        assert!(mutations.contains(&FragmentMutation::StashAdd {
            entity: unit,
            resource: ResourceKind::Wood,
            amount: 3
        }));
    }

    #[test]
    fn test_extract_out_of_range_is_recoverable() {
        let mut store = EntityStore::new();
        let node = store.spawn_node(Vec2::new(100.0, 0.0), Stash::default());
        let unit = store.spawn_unit(Vec2::default());

        let mut params = Params::default();
        params.insert(ParamKey::Target, ParamValue::Entity(node));
        params.insert(ParamKey::Resource, ParamValue::Resource(ResourceKind::Ore));
        params.insert(ParamKey::Amount, ParamValue::Amount(1));
        let job = make_job(JobKind::Extract, unit, params);

        assert!(matches!(
            ExtractProvider.run(&job, &store),
            Err(JobError::Recoverable(_))
        ));
    }

    #[test]
    fn test_plunder_drains_in_resource_order() {
        let mut store = EntityStore::new();
        let mut contents = Stash::default();
        contents.insert(ResourceKind::Stone, 2);
        contents.insert(ResourceKind::Wood, 4);
        let victim = store.spawn_unit(Vec2::default());
        let raider = store.spawn_unit(Vec2::default());
        for (resource, amount) in &contents {
            store
                .apply(&FragmentMutation::StashAdd {
                    entity: victim,
                    resource: *resource,
                    amount: *amount,
                })
                .unwrap();
        }

        let mut params = Params::default();
        params.insert(ParamKey::Target, ParamValue::Entity(victim));
        let job = make_job(JobKind::Plunder, raider, params);

        let mutations = PlunderProvider.run(&job, &store).unwrap();
        // Wood sorts before Stone; removal precedes the paired add
        assert_eq!(
            mutations[0],
            FragmentMutation::StashRemove {
                entity: victim,
                resource: ResourceKind::Wood,
                amount: 4
            }
        );
        assert_eq!(mutations.len(), 4);
    }

    #[test]
    fn test_register_defaults_covers_every_capability() {
        let mut registry = ServiceRegistry::new();
        register_defaults(&mut registry).unwrap();
        for capability in [
            Capability::Locomotion,
            Capability::Harvesting,
            Capability::Hauling,
            Capability::StashTransfer,
            Capability::Raiding,
        ] {
            assert!(registry
                .resolve(capability, crate::service::registry::Scope::Global)
                .is_ok());
        }
    }
}
