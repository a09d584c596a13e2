//! The translation rule table
//!
//! One entry per intent kind: which job kinds it becomes, their mutual
//! dependencies, and the capability each job requires. The table is the
//! single source of truth for intent→job structure; translation itself
//! never special-cases a kind.

use crate::intent::catalog::IntentKind;
use crate::service::registry::Capability;
use crate::simulation::job::JobKind;

/// Blueprint for one job produced from an intent
pub struct JobTemplate {
    pub kind: JobKind,
    pub requires: Capability,
    /// Indices into the same rule's template list; those jobs must be Done
    /// before this one may become Ready
    pub depends_on: &'static [usize],
}

macro_rules! template {
    ($kind:ident requires $cap:ident after [$($dep:literal),*]) => {
        JobTemplate {
            kind: JobKind::$kind,
            requires: Capability::$cap,
            depends_on: &[$($dep),*],
        }
    };
}

/// Look up the job templates for an intent kind
pub fn rule_for(kind: IntentKind) -> &'static [JobTemplate] {
    match kind {
        IntentKind::Move => &[template!(Travel requires Locomotion after [])],
        IntentKind::Gather => &[
            template!(Travel requires Locomotion after []),
            template!(Extract requires Harvesting after [0]),
        ],
        IntentKind::Haul => &[
            template!(Travel requires Locomotion after []),
            template!(Deposit requires Hauling after [0]),
        ],
        IntentKind::Transfer => &[template!(Transfer requires StashTransfer after [])],
        IntentKind::Raid => &[
            template!(Travel requires Locomotion after []),
            template!(Plunder requires Raiding after [0]),
        ],
    }
}
