//! Flow layer - translates intents into ordered job descriptors

pub mod rules;
pub mod translate;

pub use rules::{rule_for, JobTemplate};
pub use translate::translate;
