//! Simulation configuration with documented constants
//!
//! All tunable values are collected here with explanations of their purpose
//! and how they interact with each other.

use serde::Deserialize;

use crate::core::error::{Result, SimError};

/// Configuration for the pipeline and tick loop
///
/// These values bound per-tick work and retention windows. Changing them
/// affects throughput and how long diagnostics can observe terminal state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === SCHEDULING ===
    /// Maximum number of Ready jobs executed in one tick
    ///
    /// Jobs beyond the budget stay Ready and are reconsidered next tick,
    /// in the same scheduling order. Keeps tick duration bounded under
    /// intent bursts.
    pub tick_job_budget: usize,

    /// Ticks a job may sit in Ready with an unresolvable capability
    ///
    /// Capability resolution is either immediate or never (the registry is
    /// frozen before the first tick), so this only controls how quickly the
    /// failure surfaces to diagnostics.
    pub ready_timeout_ticks: u64,

    /// Retry bound for recoverable execution errors
    ///
    /// A job returns to Ready after a recoverable failure. After this many
    /// attempts it is marked Failed. Bounds worst-case work per job.
    pub job_retry_limit: u32,

    // === RETENTION ===
    /// Ticks a terminal job record is kept before being purged
    ///
    /// Terminal jobs are queryable by diagnostics; they never silently
    /// vanish before this window has elapsed.
    pub job_retention_ticks: u64,

    /// Maximum number of replication deltas retained in the log
    ///
    /// Consumers whose cursor falls behind the truncation point must
    /// request a full resync.
    pub delta_log_retention: usize,

    /// Maximum retained intent history records (for diagnostics)
    pub intent_history_limit: usize,

    // === EXECUTION ===
    /// Minimum selected-job count before using parallel execution
    ///
    /// Below this threshold, thread overhead exceeds benefits.
    pub parallel_threshold: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_job_budget: 64,
            ready_timeout_ticks: 10,
            job_retry_limit: 3,
            job_retention_ticks: 32,
            delta_log_retention: 1024,
            intent_history_limit: 256,
            parallel_threshold: 32,
        }
    }
}

impl SimConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML string, falling back to defaults for
    /// missing keys
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.tick_job_budget == 0 {
            return Err(SimError::Config(
                "tick_job_budget must be at least 1".into(),
            ));
        }

        // Terminal jobs must outlive the ready timeout, or a timed-out job
        // could be purged before diagnostics can observe the failure
        if self.job_retention_ticks < self.ready_timeout_ticks {
            return Err(SimError::Config(format!(
                "job_retention_ticks ({}) should be >= ready_timeout_ticks ({})",
                self.job_retention_ticks, self.ready_timeout_ticks
            )));
        }

        Ok(())
    }
}

// === GLOBAL CONFIG ACCESS ===

use std::sync::OnceLock;

static CONFIG: OnceLock<SimConfig> = OnceLock::new();

/// Get the global simulation config (initializes with defaults if not set)
pub fn config() -> &'static SimConfig {
    CONFIG.get_or_init(SimConfig::default)
}

/// Set the global simulation config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: SimConfig) -> std::result::Result<(), SimConfig> {
    CONFIG.set(config)
}
