//! Persisted form of a user's presence cache.

use crate::error::Result;
use crate::presence::clock::duration_ms;
use crate::session::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Serialized presence cache, stored under `<prefix><user id>`.
///
/// Wire shape: `{ "routes": [...], "checked": [...], "ts": <ms> }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Modules confirmed to have records.
    #[serde(rename = "routes")]
    pub present: BTreeSet<String>,
    /// Modules a lookup was already issued for.
    #[serde(default)]
    pub checked: BTreeSet<String>,
    /// When the snapshot was written, in ms since the Unix epoch.
    #[serde(rename = "ts")]
    pub saved_at: i64,
}

impl Snapshot {
    /// Storage key for a user's snapshot.
    #[must_use]
    pub fn key(prefix: &str, user_id: &UserId) -> String {
        format!("{prefix}{user_id}")
    }

    /// Decode a stored snapshot.
    ///
    /// Older writers did not always include `checked`; every present module is
    /// folded back into it so that `present ⊆ checked` holds after loading.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a valid snapshot document.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut snapshot: Self = serde_json::from_str(raw)?;
        snapshot.checked.extend(snapshot.present.iter().cloned());
        Ok(snapshot)
    }

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true if the snapshot is younger than `freshness` at `now_ms`.
    #[must_use]
    pub fn is_fresh(&self, now_ms: i64, freshness: Duration) -> bool {
        now_ms.saturating_sub(self.saved_at) < duration_ms(freshness)
    }
}
