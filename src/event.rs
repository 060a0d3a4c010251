//! Presence cache event system.

use tokio::sync::broadcast;

/// Events emitted by a presence cache.
///
/// Polling [`crate::PresenceCache::has_records`] is the primary way to see a
/// lookup's result; these events are for callers that want to react as soon
/// as it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A backend lookup was issued for a module.
    LookupStarted {
        /// Module identifier.
        module_id: String,
    },

    /// The backend reported records for a module.
    PresenceConfirmed {
        /// Module identifier.
        module_id: String,
    },

    /// The backend reported no records for a module.
    NoRecords {
        /// Module identifier.
        module_id: String,
    },

    /// The lookup failed; the module is treated as having no records.
    LookupFailed {
        /// Module identifier.
        module_id: String,
        /// Error message.
        message: String,
    },

    /// A module was marked present by a record-creation flow.
    MarkedPresent {
        /// Module identifier.
        module_id: String,
    },

    /// The freshness window elapsed and the cache started over empty.
    CacheReset,
}

impl PresenceEvent {
    /// Module this event concerns, if any.
    #[must_use]
    pub fn module_id(&self) -> Option<&str> {
        match self {
            Self::LookupStarted { module_id }
            | Self::PresenceConfirmed { module_id }
            | Self::NoRecords { module_id }
            | Self::LookupFailed { module_id, .. }
            | Self::MarkedPresent { module_id } => Some(module_id),
            Self::CacheReset => None,
        }
    }

    /// Returns true if this event ends a lookup.
    #[must_use]
    pub fn is_lookup_outcome(&self) -> bool {
        matches!(
            self,
            Self::PresenceConfirmed { .. } | Self::NoRecords { .. } | Self::LookupFailed { .. }
        )
    }
}

/// Channel for receiving presence events.
pub type PresenceEventsChannel = broadcast::Receiver<PresenceEvent>;

/// Sender for presence events.
pub type PresenceEventsSender = broadcast::Sender<PresenceEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (PresenceEventsSender, PresenceEventsChannel) {
    broadcast::channel(256)
}
