use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, trace};

use crate::catalog::{CatalogSeed, CatalogStore, MemoryCatalog};

/// Catalog backend configuration
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory catalog (no persistence)
    #[default]
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./rackwatch.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Listen address for the WebSocket channels and the REST API
    #[serde(default = "crate::util::get_bind_addr")]
    pub bind: SocketAddr,

    /// Bearer token required on `/api/v1/*` when set
    pub auth_token: Option<String>,

    /// Seconds between full aggregation passes, `0` disables them
    #[serde(default = "default_aggregation_interval")]
    pub aggregation_interval_secs: u64,

    /// Seconds a socket may stay silent before it is closed, `0` disables the check
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Topology imported into the catalog at startup
    pub catalog: Option<CatalogSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: crate::util::get_bind_addr(),
            auth_token: None,
            aggregation_interval_secs: default_aggregation_interval(),
            idle_timeout_secs: default_idle_timeout(),
            storage: StorageConfig::default(),
            catalog: None,
        }
    }
}

impl Config {
    pub fn aggregation_period(&self) -> Option<Duration> {
        non_zero_secs(self.aggregation_interval_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_aggregation_interval() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    300
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided! ({e})"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Open the configured catalog backend
pub async fn open_catalog(storage: &StorageConfig) -> anyhow::Result<Arc<dyn CatalogStore>> {
    match storage {
        StorageConfig::None => {
            info!("using in-memory catalog");
            Ok(Arc::new(MemoryCatalog::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let catalog = crate::catalog::sqlite::SqliteCatalog::new(path)
                .await
                .with_context(|| format!("failed to open catalog at {}", path.display()))?;
            Ok(Arc::new(catalog))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite catalog requested but the storage-sqlite feature is disabled")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.aggregation_period(), Some(Duration::from_secs(60)));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
        assert!(matches!(config.storage, StorageConfig::None));
        assert!(config.catalog.is_none());
    }

    #[test]
    fn test_zero_interval_disables_periodic_pass() {
        let config: Config = serde_json::from_str(
            r#"{"bind": "127.0.0.1:9000", "aggregation_interval_secs": 0, "storage": {"backend": "sqlite"}}"#,
        )
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.aggregation_period(), None);
        assert!(matches!(
            config.storage,
            StorageConfig::Sqlite { ref path } if path == &PathBuf::from("./rackwatch.db")
        ));
    }

    #[test]
    fn test_catalog_section_parses() {
        let config: Config = serde_json::from_str(
            r#"{
                "catalog": {
                    "hubs": [{"id": "H1", "name": "Hub 1", "dataCenterId": "dc-1"}],
                    "modes": [{"clusterId": "C1", "autoEnabled": true}]
                }
            }"#,
        )
        .unwrap();

        let seed = config.catalog.unwrap();
        assert_eq!(seed.hubs.len(), 1);
        assert!(seed.modes[0].auto_enabled);
        assert!(!seed.modes[0].manual_command);
    }
}
