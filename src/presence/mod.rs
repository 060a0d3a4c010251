//! Module-record presence: does the user already have records in a module?
//!
//! # Architecture
//!
//! ```text
//! has_records(module)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ in `checked`?       │
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!   YES            NO
//!    │             │
//!    ▼             ▼
//! answer from   mark checked, answer false,
//! `present`     spawn lookup ──▶ RecordLookup
//!                                   │
//!                            ┌──────┴──────┐
//!                            │             │
//!                        total > 0    none / error
//!                            │             │
//!                            ▼             ▼
//!                   add to `present`   leave absent
//!                   + persist snapshot (no retry)
//! ```

mod cache;
mod clock;
mod lookup;
mod snapshot;
mod store;

pub use cache::{CacheStats, PresenceCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lookup::{HttpRecordLookup, RecordLookup, RecordStats, RecordTotals};
pub use snapshot::Snapshot;
pub use store::{FileStore, MemoryStore, SnapshotStore};
