//! Per-user cache of "which modules does this user have records in".
//!
//! The cache answers synchronously. A module it has never seen answers
//! `false` and, as a side effect, spawns one background lookup; the next call
//! after that lookup lands sees the real answer. Each module is looked up at
//! most once per cache lifetime, because it joins the `checked` set before the
//! request goes out.
//!
//! A lifetime ends when the freshness window elapses (the cache empties itself,
//! drops the stored snapshot and starts over) or when the owning session closes
//! it at logout. The window is timed from the last snapshot write, so the live
//! cache and the stored snapshot always expire together.
//!
//! Store writes are prepared under the state lock and applied after it is
//! released. A sequence number keeps a slower, older write from overwriting a
//! newer one.

use crate::config::PresenceConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, PresenceEvent, PresenceEventsChannel, PresenceEventsSender};
use crate::presence::clock::{duration_ms, Clock, SystemClock};
use crate::presence::lookup::RecordLookup;
use crate::presence::snapshot::Snapshot;
use crate::presence::store::SnapshotStore;
use crate::session::UserId;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// `has_records` calls that answered `true`.
    pub hits: u64,
    /// `has_records` calls that answered `false`.
    pub misses: u64,
    /// Backend lookups issued.
    pub lookups_issued: u64,
    /// Backend lookups that failed.
    pub lookup_failures: u64,
    /// `mark_present` calls.
    pub marks: u64,
    /// Times the freshness window elapsed and the cache started over.
    pub resets: u64,
    /// Snapshot writes that failed.
    pub persist_failures: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct State {
    present: BTreeSet<String>,
    checked: BTreeSet<String>,
    /// Start of the current lifetime, in ms since the Unix epoch. Moves to the
    /// timestamp of every snapshot written.
    started_at: i64,
    /// Bumped on every reset; lookups from an older generation are dropped.
    generation: u64,
    in_flight: usize,
    closed: bool,
    /// Sequence number of the last store write prepared.
    write_seq: u64,
}

impl State {
    fn empty(now_ms: i64) -> Self {
        Self {
            present: BTreeSet::new(),
            checked: BTreeSet::new(),
            started_at: now_ms,
            generation: 0,
            in_flight: 0,
            closed: false,
            write_seq: 0,
        }
    }

    fn snapshot(&self, now_ms: i64) -> Snapshot {
        Snapshot {
            present: self.present.clone(),
            checked: self.checked.clone(),
            saved_at: now_ms,
        }
    }
}

/// What a prepared store write does.
enum StoreOp {
    Save(String),
    Remove,
}

struct StoreWrite {
    seq: u64,
    op: StoreOp,
}

struct Inner {
    user_id: UserId,
    key: String,
    freshness: Duration,
    state: Mutex<State>,
    stats: Mutex<CacheStats>,
    /// Sequence number of the last store write applied.
    applied_seq: Mutex<u64>,
    lookup: Arc<dyn RecordLookup>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    events: PresenceEventsSender,
    runtime: Handle,
}

/// Presence cache for one authenticated user.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct PresenceCache {
    inner: Arc<Inner>,
}

impl PresenceCache {
    /// Create a cache for `user_id`, hydrating it from `store` if the stored
    /// snapshot is still fresh.
    ///
    /// Must be called from within a tokio runtime; lookups are spawned on it.
    ///
    /// # Errors
    ///
    /// Returns an error if no tokio runtime is available.
    pub fn new(
        user_id: UserId,
        config: &PresenceConfig,
        lookup: Arc<dyn RecordLookup>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        Self::with_clock(user_id, config, lookup, store, Arc::new(SystemClock))
    }

    /// Like [`PresenceCache::new`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if no tokio runtime is available.
    pub fn with_clock(
        user_id: UserId,
        config: &PresenceConfig,
        lookup: Arc<dyn RecordLookup>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("presence cache needs a tokio runtime: {e}")))?;
        let key = Snapshot::key(&config.key_prefix, &user_id);
        let freshness = config.freshness();
        let state = hydrate(store.as_ref(), &key, clock.now_ms(), freshness);
        let (events, _) = create_event_channel();

        debug!(
            "Presence cache for {user_id} ready ({} present, {} checked)",
            state.present.len(),
            state.checked.len()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                user_id,
                key,
                freshness,
                state: Mutex::new(state),
                stats: Mutex::new(CacheStats::default()),
                applied_seq: Mutex::new(0),
                lookup,
                store,
                clock,
                events,
                runtime,
            }),
        })
    }

    /// Does the user have records in `module_id`, as far as the cache knows?
    ///
    /// Never blocks. The first call for an unseen module answers `false` and
    /// spawns a lookup; later calls reflect its result once it has landed.
    pub fn has_records(&self, module_id: &str) -> bool {
        let now = self.inner.clock.now_ms();
        let (present, spawn, reset) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return false;
            }
            let reset = self.expire_if_stale(&mut state, now);
            let present = state.present.contains(module_id);
            let spawn = if state.checked.insert(module_id.to_string()) {
                state.in_flight += 1;
                Some(state.generation)
            } else {
                None
            };
            (present, spawn, reset)
        };

        {
            let mut stats = self.inner.stats.lock();
            if present {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }

        if let Some(write) = reset {
            self.apply(write);
            self.emit(PresenceEvent::CacheReset);
        }
        if let Some(generation) = spawn {
            self.spawn_lookup(module_id.to_string(), generation);
        }

        present
    }

    /// Record that the user now has records in `module_id`.
    ///
    /// Called right after the user's own action created a record, so the gate
    /// does not wait for the backend to catch up. Idempotent. Persists the
    /// snapshot.
    pub fn mark_present(&self, module_id: &str) {
        let now = self.inner.clock.now_ms();
        let (reset, write) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                debug!("Ignoring mark_present({module_id}) on a closed cache");
                return;
            }
            let reset = self.expire_if_stale(&mut state, now);
            state.present.insert(module_id.to_string());
            state.checked.insert(module_id.to_string());
            let save = self.prepare_save(&mut state, now);
            // A save supersedes the removal a reset asked for.
            (reset.is_some(), save.or(reset))
        };

        if let Some(write) = write {
            self.apply(write);
        }
        self.inner.stats.lock().marks += 1;
        if reset {
            self.emit(PresenceEvent::CacheReset);
        }
        self.emit(PresenceEvent::MarkedPresent {
            module_id: module_id.to_string(),
        });
    }

    /// The user this cache belongs to.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Storage key of this user's snapshot.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    /// Returns true while at least one lookup of the current lifetime is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().in_flight > 0
    }

    /// Modules known to have records.
    #[must_use]
    pub fn known_present(&self) -> Vec<String> {
        self.inner.state.lock().present.iter().cloned().collect()
    }

    /// Modules a lookup has been issued for.
    #[must_use]
    pub fn checked(&self) -> Vec<String> {
        self.inner.state.lock().checked.iter().cloned().collect()
    }

    /// Current state in persisted form, stamped with the current time.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let now = self.inner.clock.now_ms();
        self.inner.state.lock().snapshot(now)
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.lock().clone()
    }

    /// Subscribe to cache events.
    #[must_use]
    pub fn subscribe(&self) -> PresenceEventsChannel {
        self.inner.events.subscribe()
    }

    /// End this cache's life. In-flight lookups are discarded when they land,
    /// and later calls answer `false` without touching the backend or store.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.generation += 1;
            state.in_flight = 0;
            state.present.clear();
            state.checked.clear();
        }
        // Writes prepared before the close must not land after it.
        *self.inner.applied_seq.lock() = u64::MAX;
    }

    /// Returns true once [`PresenceCache::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Start a new lifetime if the current one has run out. Returns the
    /// removal of the stored snapshot that goes with it.
    fn expire_if_stale(&self, state: &mut State, now: i64) -> Option<StoreWrite> {
        if now.saturating_sub(state.started_at) < duration_ms(self.inner.freshness) {
            return None;
        }

        debug!(
            "Presence cache for {} expired, starting over",
            self.inner.user_id
        );
        state.present.clear();
        state.checked.clear();
        state.started_at = now;
        state.generation += 1;
        state.in_flight = 0;
        self.inner.stats.lock().resets += 1;
        Some(next_write(state, StoreOp::Remove))
    }

    fn spawn_lookup(&self, module_id: String, generation: u64) {
        self.inner.stats.lock().lookups_issued += 1;
        self.emit(PresenceEvent::LookupStarted {
            module_id: module_id.clone(),
        });

        let cache = self.clone();
        self.inner.runtime.spawn(async move {
            cache.lookup(module_id, generation).await;
        });
    }

    async fn lookup(self, module_id: String, generation: u64) {
        debug!("Looking up records for {module_id}");

        let event = match self.inner.lookup.record_stats(&module_id).await {
            Ok(stats) if stats.has_records() => {
                if !self.complete_lookup(&module_id, generation, true) {
                    return;
                }
                debug!("User has records in {module_id}");
                PresenceEvent::PresenceConfirmed { module_id }
            }
            Ok(_) => {
                if !self.complete_lookup(&module_id, generation, false) {
                    return;
                }
                debug!("No records in {module_id}");
                PresenceEvent::NoRecords { module_id }
            }
            Err(e) => {
                if !self.complete_lookup(&module_id, generation, false) {
                    return;
                }
                self.inner.stats.lock().lookup_failures += 1;
                warn!("Record lookup for {module_id} failed, assuming no records: {e}");
                PresenceEvent::LookupFailed {
                    module_id,
                    message: e.to_string(),
                }
            }
        };

        self.emit(event);
    }

    /// Apply a lookup result. Returns false if the result belongs to a
    /// lifetime that has since ended.
    fn complete_lookup(&self, module_id: &str, generation: u64, present: bool) -> bool {
        let now = self.inner.clock.now_ms();
        let mut state = self.inner.state.lock();
        let reset = if state.closed {
            None
        } else {
            self.expire_if_stale(&mut state, now)
        };
        if let Some(write) = reset {
            drop(state);
            self.apply(write);
            self.emit(PresenceEvent::CacheReset);
            debug!("Discarding lookup result for {module_id} from an expired cache");
            return false;
        }
        if state.closed || state.generation != generation {
            debug!("Discarding lookup result for {module_id} from an ended cache lifetime");
            return false;
        }

        state.in_flight = state.in_flight.saturating_sub(1);
        let write = if present && state.present.insert(module_id.to_string()) {
            self.prepare_save(&mut state, now)
        } else {
            None
        };
        drop(state);

        if let Some(write) = write {
            self.apply(write);
        }
        true
    }

    /// Encode the full snapshot for writing and restart the lifetime at its
    /// timestamp.
    fn prepare_save(&self, state: &mut State, now: i64) -> Option<StoreWrite> {
        match state.snapshot(now).encode() {
            Ok(encoded) => {
                state.started_at = now;
                Some(next_write(state, StoreOp::Save(encoded)))
            }
            Err(e) => {
                warn!(
                    "Failed to encode presence snapshot for {}: {e}",
                    self.inner.user_id
                );
                self.inner.stats.lock().persist_failures += 1;
                None
            }
        }
    }

    /// Apply a prepared write unless a newer one already landed. Failures only
    /// cost durability.
    fn apply(&self, write: StoreWrite) {
        let mut applied = self.inner.applied_seq.lock();
        if write.seq <= *applied {
            debug!(
                "Skipping superseded snapshot write for {}",
                self.inner.user_id
            );
            return;
        }
        *applied = write.seq;

        let result = match &write.op {
            StoreOp::Save(encoded) => self.inner.store.save(&self.inner.key, encoded),
            StoreOp::Remove => self.inner.store.remove(&self.inner.key),
        };
        if let Err(e) = result {
            warn!(
                "Failed to update presence snapshot for {}: {e}",
                self.inner.user_id
            );
            self.inner.stats.lock().persist_failures += 1;
        }
    }

    fn emit(&self, event: PresenceEvent) {
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for PresenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PresenceCache")
            .field("user_id", &self.inner.user_id)
            .field("present", &state.present)
            .field("checked", &state.checked)
            .field("in_flight", &state.in_flight)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

fn next_write(state: &mut State, op: StoreOp) -> StoreWrite {
    state.write_seq += 1;
    StoreWrite {
        seq: state.write_seq,
        op,
    }
}

/// Build the initial state from the stored snapshot, or start cold.
fn hydrate(store: &dyn SnapshotStore, key: &str, now: i64, freshness: Duration) -> State {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No presence snapshot under {key}, starting cold");
            return State::empty(now);
        }
        Err(e) => {
            warn!("Could not read presence snapshot {key}, starting cold: {e}");
            return State::empty(now);
        }
    };

    let snapshot = match Snapshot::decode(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!("Discarding malformed presence snapshot {key}: {e}");
            return State::empty(now);
        }
    };

    if !snapshot.is_fresh(now, freshness) {
        debug!("Presence snapshot {key} is stale, starting cold");
        return State::empty(now);
    }

    State {
        present: snapshot.present,
        checked: snapshot.checked,
        // The data is at least as old as the snapshot; a future timestamp is
        // clamped so clock skew cannot extend the lifetime.
        started_at: snapshot.saved_at.min(now),
        ..State::empty(now)
    }
}
