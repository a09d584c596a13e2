//! Intent definitions and shape contracts
//!
//! Intents are declarative statements of desired outcome, issued by an
//! external decision source (AI controller or input layer). The kind set is
//! closed; each kind declares the parameters a well-formed submission must
//! carry. Validation happens at ingress, before any state changes.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{EntityId, IntentId, ResourceKind, Tick, Vec2};

/// Closed set of recognized intent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    /// Move the subject to a destination
    Move,
    /// Harvest a resource from a node entity
    Gather,
    /// Carry the subject's stash contents to a depot entity
    Haul,
    /// Hand goods from the subject's stash to another entity
    Transfer,
    /// Seize goods from another entity's stash
    Raid,
}

/// Parameter slots an intent may fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKey {
    Dest,
    Target,
    Resource,
    Amount,
}

/// Typed parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Position(Vec2),
    Entity(EntityId),
    Resource(ResourceKind),
    Amount(u32),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Position(_) => "position",
            ParamValue::Entity(_) => "entity",
            ParamValue::Resource(_) => "resource",
            ParamValue::Amount(_) => "amount",
        }
    }
}

/// Typed key→value parameter mapping
pub type Params = AHashMap<ParamKey, ParamValue>;

/// One slot of a kind's shape contract
struct ParamSlot {
    key: ParamKey,
    expected: &'static str,
    required: bool,
}

macro_rules! slot {
    ($key:ident, $expected:literal, $required:literal) => {
        ParamSlot {
            key: ParamKey::$key,
            expected: $expected,
            required: $required,
        }
    };
}

impl IntentKind {
    /// The shape contract: which parameters this kind accepts, which are
    /// mandatory, and the value type each must carry
    fn shape(&self) -> &'static [ParamSlot] {
        match self {
            IntentKind::Move => &[slot!(Dest, "position", true)],
            IntentKind::Gather => &[
                slot!(Target, "entity", true),
                slot!(Resource, "resource", true),
                slot!(Amount, "amount", true),
            ],
            IntentKind::Haul => &[
                slot!(Target, "entity", true),
                slot!(Resource, "resource", false),
                slot!(Amount, "amount", false),
            ],
            IntentKind::Transfer => &[
                slot!(Target, "entity", true),
                slot!(Resource, "resource", true),
                slot!(Amount, "amount", true),
            ],
            IntentKind::Raid => &[slot!(Target, "entity", true)],
        }
    }

    /// Validate a parameter map against this kind's shape contract
    pub fn validate_params(&self, params: &Params) -> Result<()> {
        let shape = self.shape();

        for slot in shape {
            match params.get(&slot.key) {
                Some(value) => {
                    if value.type_name() != slot.expected {
                        return Err(SimError::InvalidIntentShape {
                            kind: format!("{:?}", self),
                            reason: format!(
                                "parameter {:?} expects {}, got {}",
                                slot.key,
                                slot.expected,
                                value.type_name()
                            ),
                        });
                    }
                }
                None if slot.required => {
                    return Err(SimError::InvalidIntentShape {
                        kind: format!("{:?}", self),
                        reason: format!("missing required parameter {:?}", slot.key),
                    });
                }
                None => {}
            }
        }

        // Reject keys the contract does not mention
        for key in params.keys() {
            if !shape.iter().any(|slot| slot.key == *key) {
                return Err(SimError::InvalidIntentShape {
                    kind: format!("{:?}", self),
                    reason: format!("unrecognized parameter {:?}", key),
                });
            }
        }

        Ok(())
    }
}

/// Lifecycle of a submitted intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    /// Accepted, waiting for Flow translation
    Queued,
    /// Consumed by Flow; jobs were produced
    Translated,
    /// Superseded or explicitly cancelled before translation
    Cancelled,
}

/// A declarative statement of desired outcome
///
/// Immutable once issued; consumed exactly once by Flow translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub subject: EntityId,
    pub kind: IntentKind,
    pub params: Params,
    pub priority: i32,
    /// Monotonic submission sequence, the scheduling tie-breaker
    pub timestamp: u64,
    pub state: IntentState,
    /// Tick at which the intent was drained into the pipeline (diagnostics)
    pub drained_tick: Option<Tick>,
}
