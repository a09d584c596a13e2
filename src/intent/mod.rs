//! Intent layer - declarative decisions from external sources
//!
//! Converts AI/player decisions into validated intent records, independent
//! of how they will be executed.

pub mod catalog;
pub mod ingress;

pub use catalog::{Intent, IntentKind, IntentState, ParamKey, ParamValue, Params};
pub use ingress::{IntentHistory, IntentIngress};
