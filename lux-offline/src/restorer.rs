use async_trait::async_trait;

use crate::error::OfflineError;
use crate::extent::Extent;
use crate::mymaps::MymapsOffline;
use crate::tiles::{ExtentRestorer, OfflineMap};

/// Restores the cached tiles of a map, then the "My maps" state.
///
/// Wraps the tile restoring algorithm `R`.
#[derive(Debug)]
pub struct OfflineRestorer<R> {
    base: R,
    mymaps: MymapsOffline,
}

impl<R: ExtentRestorer> OfflineRestorer<R> {
    /// Creates a new restorer.
    pub fn new(base: R, mymaps: MymapsOffline) -> Self {
        Self { base, mymaps }
    }

    /// Wrapped tile restoring algorithm.
    pub fn base(&self) -> &R {
        &self.base
    }

    /// Restores the cached layers of `map` and starts restoring the "My maps" state.
    ///
    /// Resolves with the cached extent as soon as the layers are restored. The "My maps" state is
    /// restored in the background and its failure is logged. If the layers cannot be restored,
    /// the "My maps" state is not touched.
    ///
    /// On native targets this must be called inside a `tokio::task::LocalSet`.
    pub async fn restore(&self, map: &dyn OfflineMap) -> Result<Extent, OfflineError> {
        let extent = self.base.restore(map).await?;

        let mymaps = self.mymaps.restore();
        crate::async_runtime::spawn_local(async move {
            match mymaps.await {
                Ok(true) => {}
                Ok(false) => log::debug!("No my maps state to restore"),
                Err(err) => log::error!("Failed to restore my maps state: {err}"),
            }
        });

        Ok(extent)
    }

    /// Restores the cached layers of `map` and then the "My maps" state.
    pub async fn restore_sequential(&self, map: &dyn OfflineMap) -> Result<Extent, OfflineError> {
        let extent = self.base.restore(map).await?;
        self.mymaps.restore().await?;
        Ok(extent)
    }
}

#[async_trait(?Send)]
impl<R: ExtentRestorer> ExtentRestorer for OfflineRestorer<R> {
    async fn restore(&self, map: &dyn OfflineMap) -> Result<Extent, OfflineError> {
        OfflineRestorer::restore(self, map).await
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use assert_matches::assert_matches;
    use serde_json::json;
    use tokio::task::LocalSet;

    use super::*;
    use crate::action::Command;
    use crate::config::{BridgeConfig, DownloadConfig};
    use crate::mymaps::tests::TestService;
    use crate::mymaps::{DrawnFeatures, MymapsService, MYMAPS_STORAGE_KEY};
    use crate::tiles::tests::{luxembourg, topo_layer, FakeFetcher, FakeMap};
    use crate::tiles::{ExtentDownloader, TileDownloader, TileRestorer};
    use crate::transport::MemoryHost;

    fn mymaps_requested(host: &MemoryHost) -> bool {
        host.received().iter().any(|action| {
            action.command == Command::GetItem && action.args[0] == json!(MYMAPS_STORAGE_KEY)
        })
    }

    /// Fails if the "My maps" state was requested before the tiles were restored.
    struct CheckingBase {
        host: MemoryHost,
        result: Result<Extent, ()>,
    }

    #[async_trait(?Send)]
    impl ExtentRestorer for CheckingBase {
        async fn restore(&self, _map: &dyn OfflineMap) -> Result<Extent, OfflineError> {
            assert!(!mymaps_requested(&self.host));
            self.result.map_err(|()| OfflineError::NotFound)
        }
    }

    fn restorer(
        host: &MemoryHost,
        result: Result<Extent, ()>,
    ) -> (OfflineRestorer<CheckingBase>, Rc<TestService>) {
        let bridge = Rc::new(host.bridge(BridgeConfig::default()));
        let service = Rc::new(TestService::default());
        let mymaps = MymapsOffline::new(bridge, service.clone(), DrawnFeatures::new());
        let base = CheckingBase {
            host: host.clone(),
            result,
        };
        (OfflineRestorer::new(base, mymaps), service)
    }

    #[tokio::test]
    async fn tiles_are_restored_before_mymaps() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                host.insert(MYMAPS_STORAGE_KEY, json!({"mapId": "f5b3e9"}));
                let (restorer, service) = restorer(&host, Ok(luxembourg()));

                let extent = restorer.restore(&FakeMap::default()).await.expect("restore");
                assert_eq!(extent, luxembourg());
                assert!(mymaps_requested(&host));

                tokio::task::yield_now().await;
                assert_eq!(service.map_id(), Some("f5b3e9".to_string()));
            })
            .await;
    }

    #[tokio::test]
    async fn failed_tile_restore_skips_mymaps() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let (restorer, _) = restorer(&host, Err(()));

                assert_matches!(
                    restorer.restore(&FakeMap::default()).await,
                    Err(OfflineError::NotFound)
                );
                assert!(!mymaps_requested(&host));
            })
            .await;
    }

    #[tokio::test]
    async fn failed_mymaps_restore_is_not_reported() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                host.fail_command(Command::GetItem, "boom");
                let (restorer, _) = restorer(&host, Ok(luxembourg()));

                let extent = restorer.restore(&FakeMap::default()).await;
                assert_eq!(extent.expect("restore"), luxembourg());
                tokio::task::yield_now().await;
            })
            .await;
    }

    #[tokio::test]
    async fn sequential_restore_reports_mymaps_failure() {
        let host = MemoryHost::new();
        host.fail_command(Command::GetItem, "boom");
        let (restorer, _) = restorer(&host, Ok(luxembourg()));

        assert_matches!(
            restorer.restore_sequential(&FakeMap::default()).await,
            Err(OfflineError::Backend { .. })
        );
    }

    #[tokio::test]
    async fn restores_downloaded_extent() {
        LocalSet::new()
            .run_until(async {
                let host = MemoryHost::new();
                let bridge = Rc::new(host.bridge(BridgeConfig::default()));
                let source = FakeMap {
                    layers: vec![topo_layer()],
                    ..Default::default()
                };
                TileDownloader::new(bridge.clone(), FakeFetcher::default(), DownloadConfig::default())
                    .save(luxembourg(), &source)
                    .await
                    .expect("download");

                let service = Rc::new(TestService::default());
                let mymaps = MymapsOffline::new(bridge.clone(), service, DrawnFeatures::new());
                let restorer = OfflineRestorer::new(TileRestorer::new(bridge), mymaps);

                let map = FakeMap::default();
                let extent = ExtentRestorer::restore(&restorer, &map)
                    .await
                    .expect("restore");
                assert_eq!(extent, luxembourg());
                assert_eq!(map.restored.borrow().len(), 1);
            })
            .await;
    }
}
