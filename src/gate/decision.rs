//! The balance gate decision.

use crate::config::GateSettings;
use crate::gate::price::Price;
use std::time::Duration;
use tracing::debug;

/// Smallest top-up the gate will suggest.
pub const MIN_TOP_UP: f64 = 0.01;

/// What to do with a navigation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Go to the module.
    Allow {
        /// Destination.
        path: String,
    },
    /// Go to the module, telling the user that new queries need funds.
    AllowWithNotice {
        /// Destination.
        path: String,
        /// Message to show.
        notice: Notice,
    },
    /// Stay put and offer a top-up.
    Block {
        /// Call to action.
        prompt: TopUpPrompt,
    },
}

impl Decision {
    /// Where the user should be sent, if anywhere.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Allow { path } | Self::AllowWithNotice { path, .. } => Some(path),
            Self::Block { .. } => None,
        }
    }

    /// Returns true if the user may enter the module.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Block { .. })
    }

    /// Suggested top-up amount, for blocked attempts.
    #[must_use]
    pub fn top_up_amount(&self) -> Option<f64> {
        match self {
            Self::Block { prompt } => Some(prompt.amount),
            _ => None,
        }
    }
}

/// Informational message for users let in on the strength of their history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Module display name.
    pub module_name: String,
    /// Text to show.
    pub message: String,
    /// How long to show it.
    pub duration: Duration,
}

/// Call to action for a blocked navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct TopUpPrompt {
    /// Module display name.
    pub module_name: String,
    /// Price of one query.
    pub price: Price,
    /// Suggested deposit, never below [`MIN_TOP_UP`].
    pub amount: f64,
    /// Text to show.
    pub message: String,
    /// Deposit page link, pre-filled with `amount`.
    pub deposit_link: String,
}

/// Decides whether a user may enter a priced module.
#[derive(Debug, Clone, Default)]
pub struct BalanceGate {
    settings: GateSettings,
}

impl BalanceGate {
    /// Create a gate.
    #[must_use]
    pub fn new(settings: GateSettings) -> Self {
        Self { settings }
    }

    /// Decide on a navigation to `path`.
    ///
    /// `has_records` is asked about `path` on every call, whatever the
    /// balance, so that a lazy presence lookup gets started early. The
    /// gate itself never navigates.
    ///
    /// Any balance below the price is insufficient, however small the gap.
    /// Amounts are only rounded for display.
    pub fn decide<F>(
        &self,
        path: &str,
        module_name: &str,
        price: Price,
        available_balance: f64,
        has_records: F,
    ) -> Decision
    where
        F: FnOnce(&str) -> bool,
    {
        let has_records = has_records(path);

        let balance = if available_balance.is_nan() {
            0.0
        } else {
            available_balance
        };

        debug!(
            "Gate check for {module_name}: price={price}, balance={available_balance:.2}, has_records={has_records}"
        );

        if price.is_free() || balance >= price.value() {
            return Decision::Allow {
                path: path.to_string(),
            };
        }

        if has_records {
            return Decision::AllowWithNotice {
                path: path.to_string(),
                notice: Notice {
                    module_name: module_name.to_string(),
                    message: format!(
                        "You can view your history in {module_name}, but new queries require balance."
                    ),
                    duration: self.settings.notice_duration(),
                },
            };
        }

        let amount = (price.value() - balance).max(MIN_TOP_UP);
        Decision::Block {
            prompt: TopUpPrompt {
                module_name: module_name.to_string(),
                price,
                amount,
                message: format!("Insufficient balance for {module_name}! Required: {price}"),
                deposit_link: format!(
                    "{}?valor={amount:.2}&fromModule=true",
                    self.settings.deposit_route
                ),
            },
        }
    }
}
