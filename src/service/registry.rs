//! Capability registry - maps capability keys to provider implementations
//!
//! All layers resolve capabilities through this registry instead of
//! depending on each other's concrete types. Registration happens during
//! startup; the registry is frozen before the first tick and is read-only
//! while the simulation runs.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::EntityId;
use crate::simulation::executor::JobRun;
use crate::simulation::job::Job;
use crate::simulation::store::EntityStore;

/// Closed set of capability keys
///
/// Every job kind names exactly one of these; providers are registered
/// under them at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Locomotion,
    Harvesting,
    Hauling,
    StashTransfer,
    Raiding,
}

/// Resolution scope: an entity-level override beats the global default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Entity(EntityId),
}

/// A capability implementation resolved by key
///
/// `run` computes fragment mutations from committed state only; the tick
/// loop applies them at commit. Implementations must not hold references
/// into the store across calls.
pub trait CapabilityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, job: &Job, store: &EntityStore) -> JobRun;
}

/// Central provider registry
///
/// Append-only during initialization; `freeze` ends the registration phase.
pub struct ServiceRegistry {
    global: AHashMap<Capability, Arc<dyn CapabilityProvider>>,
    entity_overrides: AHashMap<(EntityId, Capability), Arc<dyn CapabilityProvider>>,
    frozen: bool,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            global: AHashMap::new(),
            entity_overrides: AHashMap::new(),
            frozen: false,
        }
    }

    /// Register a global provider for a capability
    ///
    /// Fails with `DuplicateCapability` if one is already registered and
    /// `replace` was not requested, and with `RegistryFrozen` after the
    /// registration phase has ended.
    pub fn register(
        &mut self,
        capability: Capability,
        provider: Arc<dyn CapabilityProvider>,
        replace: bool,
    ) -> Result<()> {
        if self.frozen {
            return Err(SimError::RegistryFrozen);
        }
        if self.global.contains_key(&capability) && !replace {
            return Err(SimError::DuplicateCapability(capability));
        }
        tracing::debug!(?capability, provider = provider.name(), "registered provider");
        self.global.insert(capability, provider);
        Ok(())
    }

    /// Register an entity-level override for a capability
    pub fn register_for_entity(
        &mut self,
        entity: EntityId,
        capability: Capability,
        provider: Arc<dyn CapabilityProvider>,
        replace: bool,
    ) -> Result<()> {
        if self.frozen {
            return Err(SimError::RegistryFrozen);
        }
        let key = (entity, capability);
        if self.entity_overrides.contains_key(&key) && !replace {
            return Err(SimError::DuplicateCapability(capability));
        }
        tracing::debug!(
            %entity,
            ?capability,
            provider = provider.name(),
            "registered entity override"
        );
        self.entity_overrides.insert(key, provider);
        Ok(())
    }

    /// End the registration phase
    ///
    /// After this, registration attempts fail and resolution is the only
    /// permitted operation. Called once before the tick loop starts.
    pub fn freeze(&mut self) {
        self.frozen = true;
        tracing::info!(
            providers = self.global.len(),
            overrides = self.entity_overrides.len(),
            "service registry frozen"
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Resolve a provider: entity-level override first, then the global
    /// default
    pub fn resolve(
        &self,
        capability: Capability,
        scope: Scope,
    ) -> Result<Arc<dyn CapabilityProvider>> {
        if let Scope::Entity(entity) = scope {
            if let Some(provider) = self.entity_overrides.get(&(entity, capability)) {
                return Ok(Arc::clone(provider));
            }
        }
        self.global
            .get(&capability)
            .map(Arc::clone)
            .ok_or(SimError::CapabilityNotFound(capability))
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
