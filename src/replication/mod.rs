//! Replication component - versioned stash mirroring for observers

pub mod stash;

pub use stash::{DeltaLog, LogCursor, Replica, ResyncNeeded, StashRecord};
