//! Command-line interface definition.

use clap::{Parser, Subcommand};
use module_gate::GateConfig;
use std::path::PathBuf;

/// Inspect and exercise module gating for a dashboard user.
#[derive(Parser, Debug)]
#[command(name = "module-gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// User whose session to act on.
    #[arg(long, short, env = "MODULE_GATE_USER")]
    pub user: Option<String>,

    /// Directory holding presence snapshots.
    #[arg(long, env = "MODULE_GATE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Base URL of the dashboard API.
    #[arg(long, env = "MODULE_GATE_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the dashboard API.
    #[arg(long, env = "MODULE_GATE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decide whether the user may enter a module.
    Check {
        /// Module path.
        #[arg(long)]
        path: String,

        /// Module display name.
        #[arg(long)]
        name: String,

        /// Price of one query, e.g. "10.00".
        #[arg(long)]
        price: String,

        /// The user's available balance.
        #[arg(long, allow_hyphen_values = true)]
        balance: f64,

        /// How long to wait for a pending presence lookup, in seconds.
        #[arg(long, default_value = "10")]
        wait_secs: u64,
    },

    /// Record that the user now has records in a module.
    Mark {
        /// Module path.
        #[arg(long)]
        path: String,
    },

    /// Print the user's cached presence.
    Show,

    /// End the user's session and drop their snapshot.
    Logout,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<GateConfig> {
        let mut config = if let Some(ref path) = self.config {
            GateConfig::from_file(path)?
        } else {
            GateConfig::default()
        };

        if let Some(ref dir) = self.store_dir {
            config.store.dir = dir.clone();
        }
        if let Some(ref url) = self.api_url {
            config.lookup.base_url = Some(url.clone());
        }
        if let Some(ref token) = self.api_token {
            config.lookup.auth_token = Some(token.clone());
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }

        Ok(config)
    }
}
