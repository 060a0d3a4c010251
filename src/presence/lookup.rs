//! Record-lookup backend: "how many records does this user have in module X?"

use crate::config::LookupConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Answer of the module-history stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStats {
    /// Whether the backend handled the request.
    pub success: bool,
    /// Totals, present on success.
    #[serde(default)]
    pub data: Option<RecordTotals>,
}

/// Record totals for one module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTotals {
    /// Number of records the user has in the module.
    pub total: u64,
}

impl RecordStats {
    /// Successful answer with `total` records.
    #[must_use]
    pub fn with_total(total: u64) -> Self {
        Self {
            success: true,
            data: Some(RecordTotals { total }),
        }
    }

    /// Unsuccessful answer.
    #[must_use]
    pub fn unsuccessful() -> Self {
        Self::default()
    }

    /// Presence means a successful answer with at least one record.
    #[must_use]
    pub fn has_records(&self) -> bool {
        self.success && self.data.is_some_and(|d| d.total > 0)
    }
}

/// Looks up a user's record totals for a module.
///
/// Implementations carry the user's credentials themselves; the cache only
/// passes the module identifier.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Fetch record totals for `module_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or answers garbage.
    async fn record_stats(&self, module_id: &str) -> Result<RecordStats>;
}

/// [`RecordLookup`] over the dashboard HTTP API.
///
/// Issues `GET <base_url><stats_path>?module=<module_id>`.
pub struct HttpRecordLookup {
    config: LookupConfig,
    client: Option<reqwest::Client>,
}

impl HttpRecordLookup {
    /// Create a lookup client from configuration.
    ///
    /// A disabled config, or one without a base URL, yields a client that
    /// answers "unsuccessful" for every module.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LookupConfig) -> Result<Self> {
        if !config.enabled {
            info!("Record lookup disabled - no module will be treated as having records");
            return Ok(Self {
                config,
                client: None,
            });
        }

        if config.base_url.is_none() {
            warn!("No record lookup base URL configured - lookup disabled");
            return Ok(Self {
                config: LookupConfig {
                    enabled: false,
                    ..config
                },
                client: None,
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        info!(
            "Record lookup initialized against {}",
            config.base_url.as_deref().unwrap_or_default()
        );

        Ok(Self {
            config,
            client: Some(client),
        })
    }

    /// Check if lookups actually reach a backend.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.client.is_some()
    }

    fn stats_url(&self, base: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.config.stats_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RecordLookup for HttpRecordLookup {
    async fn record_stats(&self, module_id: &str) -> Result<RecordStats> {
        let (Some(client), Some(base)) = (&self.client, self.config.base_url.as_deref()) else {
            debug!("Record lookup disabled, answering unsuccessful for {module_id}");
            return Ok(RecordStats::unsuccessful());
        };

        let url = self.stats_url(base);
        debug!("Fetching record stats for {module_id} from {url}");

        let mut request = client.get(&url).query(&[("module", module_id)]);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Lookup(format!(
                "stats request for {module_id} returned {status}"
            )));
        }

        let stats: RecordStats = response.json().await?;
        debug!(
            "Record stats for {module_id}: success={}, total={:?}",
            stats.success,
            stats.data.map(|d| d.total)
        );
        Ok(stats)
    }
}
