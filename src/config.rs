//! Configuration for module-gate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Presence cache configuration.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Record-lookup backend configuration.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Snapshot store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Balance gate configuration.
    #[serde(default)]
    pub gate: GateSettings,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Presence cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// How long a snapshot (and a live cache) stays fresh, in seconds.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,

    /// Prefix of the per-user snapshot key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// Record-lookup backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Whether to query the backend at all (false = every module has no records).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the dashboard API.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path of the module-history stats endpoint.
    #[serde(default = "default_stats_path")]
    pub stats_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token sent with every lookup.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one snapshot file per user.
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

/// Balance gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// Route of the deposit page a blocked user is pointed to.
    #[serde(default = "default_deposit_route")]
    pub deposit_route: String,

    /// How long an allow-with-notice message stays on screen, in milliseconds.
    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            stats_path: default_stats_path(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            deposit_route: default_deposit_route(),
            notice_duration_ms: default_notice_duration_ms(),
        }
    }
}

impl PresenceConfig {
    /// Freshness window as a [`Duration`].
    #[must_use]
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

impl LookupConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GateSettings {
    /// Notice display time as a [`Duration`].
    #[must_use]
    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

fn default_store_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "module-gate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".module-gate"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key_prefix() -> String {
    "module_records_".to_string()
}

fn default_stats_path() -> String {
    "/module-history/stats".to_string()
}

fn default_deposit_route() -> String {
    "/dashboard/adicionar-saldo".to_string()
}

const fn default_freshness_secs() -> u64 {
    300 // 5 minutes
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_notice_duration_ms() -> u64 {
    4000
}

const fn default_true() -> bool {
    true
}

impl GateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
