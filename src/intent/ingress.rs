//! Intent ingress - concurrent submission buffer with supersede semantics
//!
//! Submissions are validated and buffered here; the tick loop drains the
//! buffer atomically at the start of each tick, so jobs always see a
//! consistent intent snapshot and nothing is injected mid-tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use ahash::AHashMap;

use crate::core::error::Result;
use crate::core::types::{EntityId, IntentId};
use crate::intent::catalog::{Intent, IntentKind, IntentState, Params};

/// Thread-safe intent submission queue
///
/// `submit` may be called from any thread while a tick is running; the
/// buffer is only handed to the pipeline through `drain`, which swaps it
/// out in one critical section.
pub struct IntentIngress {
    buffer: Mutex<Vec<Intent>>,
    sequence: AtomicU64,
}

impl IntentIngress {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Submit an intent on behalf of a subject
    ///
    /// Validates the kind's shape contract before anything is buffered;
    /// a rejected submission leaves no trace in the pipeline.
    pub fn submit(
        &self,
        subject: EntityId,
        kind: IntentKind,
        params: Params,
        priority: i32,
    ) -> Result<IntentId> {
        kind.validate_params(&params)?;

        let id = IntentId::new();
        let timestamp = self.sequence.fetch_add(1, Ordering::Relaxed);
        let intent = Intent {
            id,
            subject,
            kind,
            params,
            priority,
            timestamp,
            state: IntentState::Queued,
            drained_tick: None,
        };

        tracing::debug!(%id, subject = %subject, ?kind, priority, "intent accepted");
        self.buffer
            .lock()
            .expect("intent buffer poisoned")
            .push(intent);
        Ok(id)
    }

    /// Take the buffered intents, leaving the buffer empty
    ///
    /// Called exactly once per tick, before any translation.
    pub fn drain(&self) -> Vec<Intent> {
        std::mem::take(&mut *self.buffer.lock().expect("intent buffer poisoned"))
    }

    /// Number of buffered, not-yet-drained intents
    pub fn pending(&self) -> usize {
        self.buffer.lock().expect("intent buffer poisoned").len()
    }

    /// Cancel an intent that is still buffered
    ///
    /// Returns true if the intent was found; it will be drained as
    /// Cancelled and translate to zero jobs.
    pub fn cancel_buffered(&self, id: IntentId) -> bool {
        let mut buffer = self.buffer.lock().expect("intent buffer poisoned");
        for intent in buffer.iter_mut() {
            if intent.id == id {
                intent.state = IntentState::Cancelled;
                return true;
            }
        }
        false
    }
}

impl Default for IntentIngress {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the supersede rule to a drained batch
///
/// A newer intent for the same subject cancels any older, not-yet-translated
/// one: the older intent produces zero jobs. Returns (live, cancelled), with
/// the live intents in submission order.
pub fn supersede(batch: Vec<Intent>) -> (Vec<Intent>, Vec<Intent>) {
    let mut latest_per_subject: AHashMap<EntityId, u64> = AHashMap::new();
    for intent in &batch {
        let entry = latest_per_subject.entry(intent.subject).or_insert(0);
        if intent.timestamp >= *entry {
            *entry = intent.timestamp;
        }
    }

    let mut live = Vec::new();
    let mut cancelled = Vec::new();
    for mut intent in batch {
        if latest_per_subject[&intent.subject] == intent.timestamp {
            live.push(intent);
        } else {
            intent.state = IntentState::Cancelled;
            tracing::debug!(id = %intent.id, subject = %intent.subject, "intent superseded");
            cancelled.push(intent);
        }
    }
    (live, cancelled)
}

/// Bounded record of drained intents, for the diagnostics bridge
///
/// Terminal intent state is queryable here until the record ages out.
pub struct IntentHistory {
    order: VecDeque<IntentId>,
    records: AHashMap<IntentId, Intent>,
    limit: usize,
}

impl IntentHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            order: VecDeque::new(),
            records: AHashMap::new(),
            limit,
        }
    }

    pub fn record(&mut self, intent: Intent) {
        if self.records.insert(intent.id, intent.clone()).is_none() {
            self.order.push_back(intent.id);
        }
        while self.order.len() > self.limit {
            if let Some(old) = self.order.pop_front() {
                self.records.remove(&old);
            }
        }
    }

    pub fn mark(&mut self, id: IntentId, state: IntentState) {
        if let Some(record) = self.records.get_mut(&id) {
            record.state = state;
        }
    }

    pub fn get(&self, id: IntentId) -> Option<&Intent> {
        self.records.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
