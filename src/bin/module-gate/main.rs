//! module-gate CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use module_gate::{
    BalanceGate, Error, FileStore, HttpRecordLookup, NavigationSink, Notice, PanelNavigator,
    PresenceCache, PresenceEvent, Price, SessionManager, TopUpPrompt, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Prints decisions instead of routing a browser.
struct ConsoleSink;

impl NavigationSink for ConsoleSink {
    fn navigate(&self, path: &str) {
        println!("navigate: {path}");
    }

    fn block(&self, prompt: &TopUpPrompt) {
        println!("blocked: {}", prompt.message);
        println!("top up {:.2}: {}", prompt.amount, prompt.deposit_link);
    }

    fn notify(&self, notice: &Notice) {
        println!("notice: {}", notice.message);
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("module-gate v{}", env!("CARGO_PKG_VERSION"));

    let user = cli.user.clone().map(UserId::from).ok_or(Error::NotAuthenticated)?;
    let lookup = Arc::new(HttpRecordLookup::new(config.lookup.clone())?);
    let store = Arc::new(FileStore::new(config.store.dir.clone()));
    let sessions = Arc::new(SessionManager::new(config.presence.clone(), lookup, store));
    let cache = sessions.login(user)?;

    match cli.command {
        Command::Check {
            path,
            name,
            price,
            balance,
            wait_secs,
        } => {
            let price = Price::parse(&price)?;
            settle(&cache, &path, Duration::from_secs(wait_secs)).await;

            let navigator = PanelNavigator::new(
                Arc::clone(&sessions),
                Arc::new(move || balance),
                Arc::new(ConsoleSink),
                BalanceGate::new(config.gate.clone()),
            )
            .with_panel_id("cli");
            navigator.check_balance_and_navigate(&path, &name, price);
        }
        Command::Mark { path } => {
            cache.mark_present(&path);
            println!("marked {path} for {}", cache.user_id());
        }
        Command::Show => {
            for module in cache.checked() {
                let state = if cache.known_present().contains(&module) {
                    "records"
                } else {
                    "none"
                };
                println!("{module}\t{state}");
            }
        }
        Command::Logout => {
            sessions.logout();
            println!("logged out");
        }
    }

    Ok(())
}

/// Start the presence lookup for `path` if needed and wait for it to land,
/// so a one-shot check does not act on a cold miss.
async fn settle(cache: &PresenceCache, path: &str, wait: Duration) {
    let mut events = cache.subscribe();
    cache.has_records(path);
    if !cache.is_loading() {
        return;
    }

    let outcome = tokio::time::timeout(wait, async {
        while let Ok(event) = events.recv().await {
            if event.is_lookup_outcome() && event.module_id() == Some(path) {
                return Some(event);
            }
        }
        None
    })
    .await;

    match outcome {
        Ok(Some(PresenceEvent::LookupFailed { message, .. })) => {
            warn!("Presence lookup failed, gating on balance only: {message}");
        }
        Ok(Some(_)) => {}
        Ok(None) | Err(_) => warn!("Presence lookup for {path} did not finish in time"),
    }
}
