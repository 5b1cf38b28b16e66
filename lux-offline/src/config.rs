//! Configuration of the bridge, of the storage host and of tile downloads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::LOCALFORAGE_PLUGIN;
use crate::error::OfflineError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PARALLEL_DOWNLOADS: usize = 11;

/// Storage key of the description of the cached extent and layers.
pub const OFFLINE_CONTENT_KEY: &str = "offline_content";

/// Parameters of a [`StorageBridge`](crate::StorageBridge).
///
/// ```
/// use std::time::Duration;
/// use lux_offline::BridgeConfig;
///
/// let config = BridgeConfig::default().with_request_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.plugin(), "localforage");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    plugin: String,
    request_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            plugin: LOCALFORAGE_PLUGIN.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl BridgeConfig {
    /// Sets the plugin name written into every request envelope.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = plugin.into();
        self
    }

    /// Sets the time the bridge waits for a reply. `None` waits forever.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Plugin name of request envelopes.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Time the bridge waits for a reply.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

/// Options of the storage instance, sent to the host with the `config` command.
///
/// Field names follow the localforage `config()` options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOptions {
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the key-value store inside the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    /// Description of the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema version of the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
    /// Requested database size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Preferred storage drivers, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Vec<String>>,
}

impl StorageOptions {
    /// Options selecting the given database and store.
    pub fn new(name: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            store_name: Some(store_name.into()),
            ..Default::default()
        }
    }
}

/// Origin the iframe transport talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Any origin (`"*"`). Messages are broadcast and every sender is trusted.
    Any,
    /// Only this origin, e.g. `https://map.geoportail.lu`.
    Exact(String),
}

impl TargetOrigin {
    /// Creates a target restricted to the given origin.
    ///
    /// Fails for an empty origin or for `"*"`, use [`TargetOrigin::Any`] for the latter.
    pub fn exact(origin: impl Into<String>) -> Result<Self, OfflineError> {
        let origin = origin.into();
        let trimmed = origin.trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "*" {
            return Err(OfflineError::Configuration(format!(
                "invalid target origin {origin:?}"
            )));
        }

        Ok(Self::Exact(trimmed.to_string()))
    }

    /// Value passed as `targetOrigin` to `postMessage`.
    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Any => "*",
            TargetOrigin::Exact(origin) => origin,
        }
    }

    /// Whether a message sent from `origin` may be processed.
    pub fn accepts(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin.trim_end_matches('/'),
        }
    }
}

/// Parameters of a [`TileDownloader`](crate::tiles::TileDownloader).
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    max_parallel_downloads: usize,
    content_key: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            content_key: OFFLINE_CONTENT_KEY.to_string(),
        }
    }
}

impl DownloadConfig {
    /// Sets the maximum number of tile requests in flight.
    pub fn with_max_parallel_downloads(mut self, count: usize) -> Result<Self, OfflineError> {
        if count == 0 {
            return Err(OfflineError::Configuration(
                "at least one parallel download is required".into(),
            ));
        }

        self.max_parallel_downloads = count;
        Ok(self)
    }

    /// Sets the storage key of the offline content description.
    pub fn with_content_key(mut self, key: impl Into<String>) -> Self {
        self.content_key = key.into();
        self
    }

    /// Maximum number of tile requests in flight.
    pub fn max_parallel_downloads(&self) -> usize {
        self.max_parallel_downloads
    }

    /// Storage key of the offline content description.
    pub fn content_key(&self) -> &str {
        &self.content_key
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn default_bridge_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.plugin(), LOCALFORAGE_PLUGIN);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));

        let config = config.with_request_timeout(None).with_plugin("sqlite");
        assert_eq!(config.plugin(), "sqlite");
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn storage_options_omit_missing_fields() {
        let options = StorageOptions::new("ngeo", "offline");
        assert_eq!(
            serde_json::to_value(&options).expect("serialize options"),
            json!({"name": "ngeo", "storeName": "offline"})
        );
    }

    #[test]
    fn target_origin_validation() {
        assert_matches!(TargetOrigin::exact(""), Err(OfflineError::Configuration(_)));
        assert_matches!(TargetOrigin::exact("*"), Err(OfflineError::Configuration(_)));

        let origin = TargetOrigin::exact("https://map.geoportail.lu/").expect("valid origin");
        assert_eq!(origin.as_str(), "https://map.geoportail.lu");
        assert!(origin.accepts("https://map.geoportail.lu"));
        assert!(!origin.accepts("https://evil.example"));

        assert_eq!(TargetOrigin::Any.as_str(), "*");
        assert!(TargetOrigin::Any.accepts("https://evil.example"));
    }

    #[test]
    fn download_config_rejects_zero_parallelism() {
        assert_matches!(
            DownloadConfig::default().with_max_parallel_downloads(0),
            Err(OfflineError::Configuration(_))
        );

        let config = DownloadConfig::default()
            .with_max_parallel_downloads(2)
            .expect("valid parallelism")
            .with_content_key("tiles");
        assert_eq!(config.max_parallel_downloads(), 2);
        assert_eq!(config.content_key(), "tiles");
    }
}
