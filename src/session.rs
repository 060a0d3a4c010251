//! User sessions: one presence cache per logged-in user.
//!
//! The cache is never ambient. It is built at login, handed out to whoever
//! needs it for the life of the session, and closed at logout or when a
//! different user logs in.

use crate::config::PresenceConfig;
use crate::error::Result;
use crate::presence::{Clock, PresenceCache, RecordLookup, Snapshot, SnapshotStore, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who is logged in right now, if anyone.
pub trait IdentityProvider: Send + Sync {
    /// The authenticated user, or `None`.
    fn current_user(&self) -> Option<UserId>;
}

/// Owns the presence cache of the current session.
pub struct SessionManager {
    config: PresenceConfig,
    lookup: Arc<dyn RecordLookup>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<PresenceCache>>,
}

impl SessionManager {
    /// Create a manager with nobody logged in.
    #[must_use]
    pub fn new(
        config: PresenceConfig,
        lookup: Arc<dyn RecordLookup>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            config,
            lookup,
            store,
            clock: Arc::new(SystemClock),
            current: Mutex::new(None),
        }
    }

    /// Use `clock` for every cache this manager creates.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start (or keep) a session for `user_id` and return its cache.
    ///
    /// Logging in as the user already in session returns the existing cache.
    /// Logging in as someone else ends the previous session first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be created (no tokio runtime).
    pub fn login(&self, user_id: UserId) -> Result<PresenceCache> {
        let mut current = self.current.lock();
        if let Some(cache) = current.as_ref() {
            if cache.user_id() == &user_id {
                return Ok(cache.clone());
            }
        }

        if let Some(previous) = current.take() {
            info!("Switching session from {} to {user_id}", previous.user_id());
            self.end(&previous);
        }

        let cache = PresenceCache::with_clock(
            user_id,
            &self.config,
            Arc::clone(&self.lookup),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        )?;
        info!("Session started for {}", cache.user_id());
        *current = Some(cache.clone());
        Ok(cache)
    }

    /// End the current session, if any. Returns true if one was ended.
    pub fn logout(&self) -> bool {
        let Some(cache) = self.current.lock().take() else {
            debug!("Logout with no active session");
            return false;
        };
        info!("Session ended for {}", cache.user_id());
        self.end(&cache);
        true
    }

    /// The current session's cache.
    #[must_use]
    pub fn cache(&self) -> Option<PresenceCache> {
        self.current.lock().clone()
    }

    /// Bring the session in line with what `identity` reports: log in the
    /// reported user, or log out if nobody is authenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if a new cache cannot be created.
    pub fn sync_with(&self, identity: &dyn IdentityProvider) -> Result<Option<PresenceCache>> {
        match identity.current_user() {
            Some(user_id) => self.login(user_id).map(Some),
            None => {
                self.logout();
                Ok(None)
            }
        }
    }

    fn end(&self, cache: &PresenceCache) {
        cache.close();
        let key = Snapshot::key(&self.config.key_prefix, cache.user_id());
        if let Err(e) = self.store.remove(&key) {
            warn!("Failed to remove presence snapshot {key}: {e}");
        }
    }
}

impl IdentityProvider for SessionManager {
    fn current_user(&self) -> Option<UserId> {
        self.current.lock().as_ref().map(|c| c.user_id().clone())
    }
}
