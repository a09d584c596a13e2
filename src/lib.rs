//! Stormkeep - tick-driven strategy simulation core
//!
//! A decoupled intent-to-simulation pipeline: external decisions become
//! declarative intents, Flow translates them into dependency-ordered jobs,
//! the simulation executes jobs against entities each tick, and a
//! presentation layer plus a replicated stash log expose the results
//! read-only.

pub mod core;
pub mod diagnostics;
pub mod flow;
pub mod intent;
pub mod presentation;
pub mod replication;
pub mod service;
pub mod simulation;
