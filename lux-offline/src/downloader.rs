use std::future::Future;

use async_trait::async_trait;

use crate::error::OfflineError;
use crate::extent::Extent;
use crate::mymaps::MymapsOffline;
use crate::tiles::{DownloadSummary, ExtentDownloader, OfflineMap};

/// Saves an extent for offline use together with the "My maps" state.
///
/// Wraps the tile downloading algorithm `D`.
#[derive(Debug)]
pub struct OfflineDownloader<D> {
    base: D,
    mymaps: MymapsOffline,
}

impl<D: ExtentDownloader> OfflineDownloader<D> {
    /// Creates a new downloader.
    pub fn new(base: D, mymaps: MymapsOffline) -> Self {
        Self { base, mymaps }
    }

    /// Wrapped tile downloading algorithm.
    pub fn base(&self) -> &D {
        &self.base
    }

    /// Starts saving the "My maps" snapshot, then caches the tiles of `extent`.
    ///
    /// The snapshot write is posted before this method returns, but it is not awaited: the returned
    /// future resolves with the result of the tile download only. A failed snapshot write is
    /// logged. Use [`OfflineDownloader::save_sequential`] to wait for both.
    ///
    /// On native targets this must be called inside a `tokio::task::LocalSet`.
    pub fn save<'a>(
        &'a self,
        extent: Extent,
        map: &'a dyn OfflineMap,
    ) -> impl Future<Output = Result<DownloadSummary, OfflineError>> + 'a {
        let snapshot = self.mymaps.save();
        crate::async_runtime::spawn_local(async move {
            if let Err(err) = snapshot.await {
                log::error!("Failed to save my maps snapshot: {err}");
            }
        });

        self.base.save(extent, map)
    }

    /// Saves the "My maps" snapshot and then caches the tiles of `extent`.
    ///
    /// Fails without downloading tiles if the snapshot cannot be saved.
    pub async fn save_sequential(
        &self,
        extent: Extent,
        map: &dyn OfflineMap,
    ) -> Result<DownloadSummary, OfflineError> {
        self.mymaps.save().await?;
        self.base.save(extent, map).await
    }
}

#[async_trait(?Send)]
impl<D: ExtentDownloader> ExtentDownloader for OfflineDownloader<D> {
    async fn save(
        &self,
        extent: Extent,
        map: &dyn OfflineMap,
    ) -> Result<DownloadSummary, OfflineError> {
        OfflineDownloader::save(self, extent, map).await
    }
}
