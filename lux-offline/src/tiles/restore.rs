use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;

use crate::bridge::StorageBridge;
use crate::config::OFFLINE_CONTENT_KEY;
use crate::error::OfflineError;
use crate::extent::Extent;
use crate::tiles::{ExtentRestorer, OfflineContent, OfflineMap, OfflineTileSource};

/// Attaches the layers cached by a [`TileDownloader`](super::TileDownloader) back to a map.
#[derive(Debug, Clone)]
pub struct TileRestorer {
    bridge: Rc<StorageBridge>,
    content_key: String,
}

impl TileRestorer {
    /// Creates a restorer reading the offline content from the default key.
    pub fn new(bridge: Rc<StorageBridge>) -> Self {
        Self {
            bridge,
            content_key: OFFLINE_CONTENT_KEY.to_string(),
        }
    }

    /// Sets the storage key of the offline content.
    pub fn with_content_key(mut self, key: impl Into<String>) -> Self {
        self.content_key = key.into();
        self
    }

    /// Reads the description of the cached extent and layers.
    pub fn content(
        &self,
    ) -> impl Future<Output = Result<Option<OfflineContent>, OfflineError>> + 'static {
        self.bridge.get_item(&self.content_key)
    }

    /// Whether an extent was cached.
    pub fn has_offline_data(&self) -> impl Future<Output = Result<bool, OfflineError>> + 'static {
        let content = self.content();
        async move { Ok(content.await?.is_some()) }
    }
}

#[async_trait(?Send)]
impl ExtentRestorer for TileRestorer {
    async fn restore(&self, map: &dyn OfflineMap) -> Result<Extent, OfflineError> {
        let Some(OfflineContent { extent, layers }) = self.content().await? else {
            log::info!("No offline content under {}", self.content_key);
            return Err(OfflineError::NotFound);
        };

        let count = layers.len();
        for layer in layers {
            log::debug!("Restoring offline layer {}", layer.name);
            map.add_offline_layer(OfflineTileSource::new(layer, self.bridge.clone()));
        }

        log::info!("Restored {count} offline layers");
        Ok(extent)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bytes::Bytes;

    use super::*;
    use crate::config::{BridgeConfig, DownloadConfig};
    use crate::tile_schema::TileIndex;
    use crate::tiles::tests::{luxembourg, topo_layer, FakeFetcher, FakeMap};
    use crate::tiles::{ExtentDownloader, TileDownloader};
    use crate::transport::MemoryHost;

    #[tokio::test]
    async fn restore_without_content_fails() {
        let host = MemoryHost::new();
        let restorer = TileRestorer::new(Rc::new(host.bridge(BridgeConfig::default())));

        assert!(!restorer.has_offline_data().await.expect("read content"));
        assert_matches!(
            restorer.restore(&FakeMap::default()).await,
            Err(OfflineError::NotFound)
        );
    }

    #[tokio::test]
    async fn restores_downloaded_layers() {
        let host = MemoryHost::new();
        let bridge = Rc::new(host.bridge(BridgeConfig::default()));

        let source_map = FakeMap {
            layers: vec![topo_layer()],
            ..Default::default()
        };
        TileDownloader::new(bridge.clone(), FakeFetcher::default(), DownloadConfig::default())
            .save(luxembourg(), &source_map)
            .await
            .expect("download");

        let restorer = TileRestorer::new(bridge);
        assert!(restorer.has_offline_data().await.expect("read content"));

        let map = FakeMap::default();
        let extent = restorer.restore(&map).await.expect("restore");
        assert_eq!(extent, luxembourg());

        let restored = map.restored.borrow();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].layer(), &topo_layer());

        let tile = restored[0]
            .load_bytes(TileIndex::new(132, 86, 8))
            .await
            .expect("cached tile");
        assert_eq!(
            tile,
            Bytes::from("tile:https://tiles.geoportail.lu/topo/8/132/86.png")
        );

        assert_matches!(
            restored[0].load(TileIndex::new(0, 0, 0)).await,
            Err(OfflineError::NotFound)
        );
    }

    #[tokio::test]
    async fn custom_content_key() {
        let host = MemoryHost::new();
        host.insert(
            "tiles_v2",
            serde_json::json!({"extent": [0.0, 0.0, 1.0, 1.0], "layers": []}),
        );
        let restorer = TileRestorer::new(Rc::new(host.bridge(BridgeConfig::default())))
            .with_content_key("tiles_v2");

        let extent = restorer
            .restore(&FakeMap::default())
            .await
            .expect("restore");
        assert_eq!(extent, Extent::new(0.0, 0.0, 1.0, 1.0).expect("valid extent"));
    }
}
