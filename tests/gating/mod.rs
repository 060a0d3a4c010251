//! End-to-end gating tests.
//!
//! These wire a [`SessionManager`], its presence caches and the balance gate
//! together against a scripted record backend, the way a dashboard would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod gate_table;
mod presence_flow;

use async_trait::async_trait;
use module_gate::config::PresenceConfig;
use module_gate::{
    Clock, Error, ManualClock, PresenceCache, PresenceEvent, PresenceEventsChannel, RecordLookup,
    RecordStats, Result, SessionManager, SnapshotStore,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed start time for the manual clock.
pub const T0: i64 = 1_700_000_000_000;

/// What the scripted backend answers for a module.
#[derive(Debug, Clone, Copy)]
pub enum Answer {
    /// Successful answer with this many records.
    Total(u64),
    /// Backend reports `success: false`.
    Unsuccessful,
    /// Transport failure.
    Fail,
}

/// Record backend driven by a per-module script. Unscripted modules have no records.
#[derive(Default)]
pub struct ScriptedLookup {
    answers: Mutex<HashMap<String, Answer>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl ScriptedLookup {
    /// Script the answer for `module_id`.
    pub fn answer(&self, module_id: &str, answer: Answer) {
        self.answers.lock().insert(module_id.to_string(), answer);
    }

    /// Lookups issued for `module_id`.
    pub fn calls_for(&self, module_id: &str) -> usize {
        self.calls.lock().get(module_id).copied().unwrap_or(0)
    }

    /// Lookups issued overall.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordLookup for ScriptedLookup {
    async fn record_stats(&self, module_id: &str) -> Result<RecordStats> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(module_id.to_string()).or_default() += 1;
        tokio::task::yield_now().await;

        let answer = self.answers.lock().get(module_id).copied();
        match answer.unwrap_or(Answer::Total(0)) {
            Answer::Total(total) => Ok(RecordStats::with_total(total)),
            Answer::Unsuccessful => Ok(RecordStats::unsuccessful()),
            Answer::Fail => Err(Error::Lookup(format!("backend down for {module_id}"))),
        }
    }
}

/// A dashboard process: one session manager over shared backend and store.
pub struct Harness {
    /// Scripted backend.
    pub lookup: Arc<ScriptedLookup>,
    /// Snapshot store.
    pub store: Arc<dyn SnapshotStore>,
    /// Controllable clock.
    pub clock: Arc<ManualClock>,
    /// Session manager under test.
    pub sessions: Arc<SessionManager>,
}

impl Harness {
    /// Harness over an in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(module_gate::MemoryStore::new()))
    }

    /// Harness over `store`, starting at [`T0`].
    pub fn with_store(store: Arc<dyn SnapshotStore>) -> Self {
        Self::sharing(
            Arc::new(ScriptedLookup::default()),
            store,
            Arc::new(ManualClock::new(T0)),
        )
    }

    /// A second process sharing backend, store and clock with this one.
    pub fn second_process(&self) -> Self {
        Self::sharing(
            Arc::clone(&self.lookup),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        )
    }

    fn sharing(
        lookup: Arc<ScriptedLookup>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let sessions = SessionManager::new(
            PresenceConfig::default(),
            lookup.clone(),
            Arc::clone(&store),
        )
        .with_clock(clock.clone() as Arc<dyn Clock>);

        Self {
            lookup,
            store,
            clock,
            sessions: Arc::new(sessions),
        }
    }
}

/// Wait for the next lookup outcome for `module_id` on `events`.
pub async fn outcome_for(events: &mut PresenceEventsChannel, module_id: &str) -> PresenceEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if event.is_lookup_outcome() && event.module_id() == Some(module_id) {
                return event;
            }
        }
    })
    .await
    .expect("lookup outcome within 5s")
}

/// Poll `module_id` the way a re-rendering UI would, until no lookup is
/// pending or the answer turns positive.
pub async fn settle(cache: &PresenceCache, module_id: &str) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if cache.has_records(module_id) {
                return true;
            }
            if !cache.is_loading() {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("presence settled within 5s")
}
