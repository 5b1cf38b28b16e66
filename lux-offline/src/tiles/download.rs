use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::StreamExt;

use crate::bridge::StorageBridge;
use crate::config::DownloadConfig;
use crate::error::OfflineError;
use crate::extent::Extent;
use crate::tiles::{encode_data_url, ExtentDownloader, OfflineContent, OfflineMap, TileFetcher};

/// Result of a download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Number of tiles covering the extent.
    pub total: usize,
    /// Number of tiles stored.
    pub saved: usize,
    /// Number of tiles that could not be fetched or stored.
    pub failed: usize,
    /// Whether the download was stopped before all tiles were handled.
    pub cancelled: bool,
}

/// Stops a running download. Clones control the same download.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    /// Stops scheduling tiles. Tiles in flight are still stored.
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// Whether the download was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    fn reset(&self) {
        self.0.set(false);
    }
}

/// Fetches the tiles of an extent and stores them.
///
/// A tile that cannot be fetched or stored is logged and counted, the download goes on. Once every
/// tile is handled, the extent and the layers are stored under the offline content key. A
/// cancelled download does not update the offline content.
pub struct TileDownloader<F> {
    bridge: Rc<StorageBridge>,
    fetcher: F,
    config: DownloadConfig,
    cancel_token: CancelToken,
    progress: Option<Box<dyn Fn(f64)>>,
}

impl<F> std::fmt::Debug for TileDownloader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileDownloader")
            .field("config", &self.config)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish()
    }
}

impl<F: TileFetcher> TileDownloader<F> {
    /// Creates a new downloader.
    pub fn new(bridge: Rc<StorageBridge>, fetcher: F, config: DownloadConfig) -> Self {
        Self {
            bridge,
            fetcher,
            config,
            cancel_token: CancelToken::default(),
            progress: None,
        }
    }

    /// Sets the callback receiving the handled fraction of the tiles, from `0.0` to `1.0`.
    pub fn with_progress(mut self, progress: impl Fn(f64) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Token stopping the running download.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_token.clone()
    }

    /// Stops the running download.
    pub fn cancel(&self) {
        log::info!("Cancelling tile download");
        self.cancel_token.cancel();
    }

    async fn save_tile(&self, url: &str, mime_type: &str) -> Result<(), OfflineError> {
        let data = self.fetcher.fetch(url).await?;
        self.bridge
            .set_item(url, &encode_data_url(mime_type, &data))
            .await
    }
}

#[async_trait(?Send)]
impl<F: TileFetcher> ExtentDownloader for TileDownloader<F> {
    async fn save(
        &self,
        extent: Extent,
        map: &dyn OfflineMap,
    ) -> Result<DownloadSummary, OfflineError> {
        self.cancel_token.reset();

        let layers = map.offline_layers();
        let mut tiles = vec![];
        for layer in &layers {
            for z in layer.zoom_levels() {
                let Some(indices) = layer.tile_schema.iter_tiles(&extent, z) else {
                    log::warn!("Layer {} has no z-level {z}, skipping it", layer.name);
                    continue;
                };

                for index in indices {
                    tiles.push((layer.tile_url(index)?, layer.mime_type.clone()));
                }
            }
        }

        let total = tiles.len();
        log::info!("Downloading {total} tiles of {} layers", layers.len());

        let mut summary = DownloadSummary {
            total,
            ..Default::default()
        };

        let cancel_token = self.cancel_token.clone();
        let mut results = futures::stream::iter(tiles)
            .take_while(move |_| futures::future::ready(!cancel_token.is_cancelled()))
            .map(|(url, mime_type)| async move {
                let result = self.save_tile(&url, &mime_type).await;
                (url, result)
            })
            .buffer_unordered(self.config.max_parallel_downloads());

        while let Some((url, result)) = results.next().await {
            match result {
                Ok(()) => summary.saved += 1,
                Err(err) => {
                    log::warn!("Failed to save tile {url}: {err}");
                    summary.failed += 1;
                }
            }

            if let Some(progress) = &self.progress {
                progress((summary.saved + summary.failed) as f64 / total as f64);
            }
        }

        if self.cancel_token.is_cancelled() {
            summary.cancelled = true;
            log::info!(
                "Tile download cancelled after {} of {total} tiles",
                summary.saved + summary.failed
            );
            return Ok(summary);
        }

        let content = OfflineContent { extent, layers };
        self.bridge
            .set_item(self.config.content_key(), &content)
            .await?;

        log::info!(
            "Tile download finished: {} saved, {} failed",
            summary.saved,
            summary.failed
        );
        Ok(summary)
    }
}
