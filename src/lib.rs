//! # module-gate
//!
//! Navigation gating for a pay-per-query module marketplace.
//!
//! Every module on the dashboard costs money per query. Before a user is sent
//! to a module, the [`gate`] decides whether their balance covers the price,
//! or whether they should be let in anyway because they already have records
//! there. Knowing "does this user have records in module X" is the job of the
//! [`presence`] cache, which answers synchronously, deduplicates backend
//! lookups and persists a short-lived snapshot per user.
//!
//! ```text
//! navigation request
//!        │
//!        ▼
//! ┌─────────────────────┐      miss       ┌──────────────────┐
//! │ PresenceCache       │ ──────────────▶ │ RecordLookup     │
//! │ has_records(module) │  (spawned once) │ (backend stats)  │
//! └─────────┬───────────┘                 └──────────────────┘
//!           │ bool
//!           ▼
//! ┌─────────────────────┐
//! │ BalanceGate::decide │ ──▶ Allow / AllowWithNotice / Block
//! └─────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod presence;
pub mod session;

pub use config::GateConfig;
pub use error::{Error, Result};
pub use event::{PresenceEvent, PresenceEventsChannel};
pub use gate::{
    BalanceGate, BalanceSource, Decision, NavigationSink, Notice, PanelNavigator, Price,
    TopUpPrompt,
};
pub use presence::{
    CacheStats, Clock, FileStore, HttpRecordLookup, ManualClock, MemoryStore, PresenceCache,
    RecordLookup, RecordStats, RecordTotals, Snapshot, SnapshotStore, SystemClock,
};
pub use session::{IdentityProvider, SessionManager, UserId};
