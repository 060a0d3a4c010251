//! Balance gate: may the user enter a priced module?
//!
//! ```text
//! balance >= price? ──yes──▶ Allow
//!        │
//!        no
//!        │
//! has records? ──yes──▶ AllowWithNotice
//!        │
//!        no
//!        │
//!        ▼
//! Block (top-up = max(price - balance, 0.01))
//! ```
//!
//! A free module is always allowed.

mod decision;
mod navigator;
mod price;

pub use decision::{BalanceGate, Decision, Notice, TopUpPrompt, MIN_TOP_UP};
pub use navigator::{BalanceSource, NavigationSink, PanelNavigator};
pub use price::Price;
