//! Caching of map tiles for offline use.
//!
//! [`TileDownloader`] fetches every tile of the offline layers of a map covering an extent and
//! stores it through the [`StorageBridge`] under its URL, as a data URL. The list of layers and the
//! extent are stored under the offline content key. [`TileRestorer`] reads that description back
//! and gives the map an [`OfflineTileSource`] for every cached layer.

use std::collections::HashMap;
use std::future::Future;
use std::ops::RangeInclusive;
use std::rc::Rc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::bridge::StorageBridge;
use crate::error::OfflineError;
use crate::extent::Extent;
use crate::tile_schema::{TileIndex, TileSchema};

mod download;
mod restore;

pub use download::{CancelToken, DownloadSummary, TileDownloader};
pub use restore::TileRestorer;

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Loads tile data over the network.
#[async_trait(?Send)]
pub trait TileFetcher {
    /// Loads the data at the given URL.
    async fn fetch(&self, url: &str) -> Result<Bytes, OfflineError>;
}

/// Map whose layers can be cached and restored.
pub trait OfflineMap {
    /// Layers that should be cached when an extent is saved.
    fn offline_layers(&self) -> Vec<OfflineLayer>;
    /// Adds a layer serving cached tiles.
    fn add_offline_layer(&self, source: OfflineTileSource);
}

/// Algorithm caching the tiles of an extent. Resolves once all tiles are handled.
#[async_trait(?Send)]
pub trait ExtentDownloader {
    /// Caches the tiles of the offline layers of `map` covering `extent`.
    async fn save(
        &self,
        extent: Extent,
        map: &dyn OfflineMap,
    ) -> Result<DownloadSummary, OfflineError>;
}

/// Algorithm attaching cached layers back to a map.
#[async_trait(?Send)]
pub trait ExtentRestorer {
    /// Adds the cached layers to `map` and resolves with the cached extent.
    async fn restore(&self, map: &dyn OfflineMap) -> Result<Extent, OfflineError>;
}

/// Tile layer that can be cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineLayer {
    /// Name of the layer.
    pub name: String,
    /// URL of the tiles with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// Tile schema of the layer.
    pub tile_schema: TileSchema,
    /// Smallest cached z-level.
    pub min_zoom: u32,
    /// Largest cached z-level.
    pub max_zoom: u32,
    /// Content type of the tiles.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_string()
}

impl OfflineLayer {
    /// Creates a layer cached at every z-level of its schema.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        tile_schema: TileSchema,
    ) -> Self {
        let min_zoom = tile_schema.min_z().unwrap_or_default();
        let max_zoom = tile_schema.max_z().unwrap_or_default();

        Self {
            name: name.into(),
            url_template: url_template.into(),
            tile_schema,
            min_zoom,
            max_zoom,
            mime_type: default_mime_type(),
        }
    }

    /// Restricts the cached z-levels.
    pub fn with_zoom_range(mut self, min_zoom: u32, max_zoom: u32) -> Result<Self, OfflineError> {
        if min_zoom > max_zoom {
            return Err(OfflineError::Configuration(format!(
                "min zoom {min_zoom} is larger than max zoom {max_zoom}"
            )));
        }

        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        Ok(self)
    }

    /// Sets the content type of the tiles.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Cached z-levels.
    pub fn zoom_levels(&self) -> RangeInclusive<u32> {
        self.min_zoom..=self.max_zoom
    }

    /// URL of the tile, which is also its storage key.
    pub fn tile_url(&self, index: TileIndex) -> Result<String, OfflineError> {
        let vars = HashMap::from([
            ("z".to_string(), index.z as i64),
            ("x".to_string(), index.x as i64),
            ("y".to_string(), index.y as i64),
        ]);

        strfmt::strfmt(&self.url_template, &vars).map_err(|err| {
            OfflineError::Configuration(format!(
                "invalid url template {}: {err}",
                self.url_template
            ))
        })
    }
}

/// Extent and layers cached by the last download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineContent {
    /// Cached extent.
    pub extent: Extent,
    /// Cached layers.
    pub layers: Vec<OfflineLayer>,
}

/// Serves the cached tiles of a layer.
#[derive(Debug, Clone)]
pub struct OfflineTileSource {
    layer: OfflineLayer,
    bridge: Rc<StorageBridge>,
}

impl OfflineTileSource {
    pub(crate) fn new(layer: OfflineLayer, bridge: Rc<StorageBridge>) -> Self {
        Self { layer, bridge }
    }

    /// Cached layer.
    pub fn layer(&self) -> &OfflineLayer {
        &self.layer
    }

    /// Loads the tile as a data URL. Fails with [`OfflineError::NotFound`] if the tile is not
    /// cached.
    pub fn load(
        &self,
        index: TileIndex,
    ) -> impl Future<Output = Result<String, OfflineError>> + 'static {
        let read = self
            .layer
            .tile_url(index)
            .map(|url| self.bridge.get_item::<String>(&url));

        async move { read?.await?.ok_or(OfflineError::NotFound) }
    }

    /// Loads the tile data.
    pub fn load_bytes(
        &self,
        index: TileIndex,
    ) -> impl Future<Output = Result<Bytes, OfflineError>> + 'static {
        let read = self.load(index);
        async move { decode_data_url(&read.await?) }
    }
}

pub(crate) fn encode_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(data))
}

pub(crate) fn decode_data_url(data_url: &str) -> Result<Bytes, OfflineError> {
    let encoded = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, encoded)| encoded)
        .ok_or_else(|| OfflineError::InvalidData("tile is not a base64 data url".into()))?;

    STANDARD
        .decode(encoded)
        .map(Bytes::from)
        .map_err(|err| OfflineError::InvalidData(format!("tile data: {err}")))
}
