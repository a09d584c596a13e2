//! Simulation layer - entity store, job scheduling and the tick loop

pub mod board;
pub mod executor;
pub mod job;
pub mod store;
pub mod tick;
pub mod world;

pub use job::{Job, JobKind, JobState};
pub use store::{EntityStore, Fragments, Stash};
pub use tick::{run_simulation_tick, SimulationEvent};
pub use world::World;
