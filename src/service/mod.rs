//! Service layer - capability registry and built-in providers
//!
//! Layers depend on capability keys, not on each other: Intent, Flow and
//! Simulation all resolve implementations through the registry.

pub mod providers;
pub mod registry;

pub use providers::register_defaults;
pub use registry::{Capability, CapabilityProvider, Scope, ServiceRegistry};
