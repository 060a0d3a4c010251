//! Applies gate decisions to navigation for the current session.

use crate::gate::decision::{BalanceGate, Decision, Notice, TopUpPrompt};
use crate::gate::price::Price;
use crate::session::SessionManager;
use std::sync::Arc;
use tracing::{debug, info};

/// Supplies the user's spendable balance.
pub trait BalanceSource: Send + Sync {
    /// Total available balance.
    fn available_balance(&self) -> f64;
}

impl<F> BalanceSource for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn available_balance(&self) -> f64 {
        self()
    }
}

/// Where decisions end up: the router and the toast area.
pub trait NavigationSink: Send + Sync {
    /// Move the user to `path`.
    fn navigate(&self, path: &str);

    /// Keep the user where they are and offer a top-up.
    fn block(&self, prompt: &TopUpPrompt);

    /// Show an informational notice.
    fn notify(&self, notice: &Notice);
}

/// Dashboard panel navigation guarded by the balance gate.
pub struct PanelNavigator {
    sessions: Arc<SessionManager>,
    balance: Arc<dyn BalanceSource>,
    sink: Arc<dyn NavigationSink>,
    gate: BalanceGate,
    panel_id: Option<String>,
}

impl PanelNavigator {
    /// Create a navigator.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        balance: Arc<dyn BalanceSource>,
        sink: Arc<dyn NavigationSink>,
        gate: BalanceGate,
    ) -> Self {
        Self {
            sessions,
            balance,
            sink,
            gate,
            panel_id: None,
        }
    }

    /// Tag log lines with the panel this navigator serves.
    #[must_use]
    pub fn with_panel_id(mut self, panel_id: impl Into<String>) -> Self {
        self.panel_id = Some(panel_id.into());
        self
    }

    /// Check the balance for a module and act on the result.
    ///
    /// Returns `None`, and does nothing, when nobody is logged in.
    pub fn check_balance_and_navigate(
        &self,
        path: &str,
        module_name: &str,
        price: Price,
    ) -> Option<Decision> {
        let Some(cache) = self.sessions.cache() else {
            debug!("Ignoring navigation to {path}: no authenticated user");
            return None;
        };

        let balance = self.balance.available_balance();
        let decision = self
            .gate
            .decide(path, module_name, price, balance, |m| cache.has_records(m));

        info!(
            panel = self.panel_id.as_deref().unwrap_or("-"),
            user = %cache.user_id(),
            "Navigation to {module_name} ({path}): {}",
            outcome_label(&decision)
        );

        match &decision {
            Decision::Allow { path } => self.sink.navigate(path),
            Decision::AllowWithNotice { path, notice } => {
                self.sink.notify(notice);
                self.sink.navigate(path);
            }
            Decision::Block { prompt } => self.sink.block(prompt),
        }

        Some(decision)
    }
}

fn outcome_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Allow { .. } => "allowed",
        Decision::AllowWithNotice { .. } => "allowed with notice",
        Decision::Block { .. } => "blocked",
    }
}
