//! Offline support for the Geoportail Luxembourg map client. It keeps user-drawn maps and cached
//! tiles available when the device has no network.
//!
//! # Main components
//!
//! All durable reads and writes go through a [`StorageBridge`]. The bridge turns every storage call
//! (`setItem`, `getItem`, `clear`, `config`, ...) into an [`Action`] envelope with a fresh
//! [request id](RequestId). It remembers the pending call and hands the envelope to a
//! [`Transport`]. The host environment (an Android WebView, a Cordova shell hosting the app in an
//! iframe, or the in-process [`MemoryHost`]) eventually answers with a `response` or `error`
//! envelope carrying the same id. That answer is fed back through the bridge's [`Inbox`].
//!
//! On top of the bridge:
//!
//! * [`MymapsOffline`] writes and reads back a [`MymapsSnapshot`] of the user's "My maps" state,
//! * [`TileDownloader`](tiles::TileDownloader) and [`TileRestorer`](tiles::TileRestorer) cache the
//!   tiles of a map extent and attach them back to the map,
//! * [`OfflineDownloader`] and [`OfflineRestorer`] combine the two, so that saving (or restoring)
//!   an extent also saves (or restores) the "My maps" state,
//! * [`OfflineState`] tells the UI whether it should behave as offline.
//!
//! ```no_run
//! use std::rc::Rc;
//! use lux_offline::{BridgeConfig, MemoryHost, OfflineState, ManualNetworkStatus};
//!
//! # tokio_test::block_on(async {
//! let host = MemoryHost::new();
//! let bridge = Rc::new(host.bridge(BridgeConfig::default()));
//!
//! bridge.set_item("greeting", "moien").await?;
//! let value: Option<String> = bridge.get_item("greeting").await?;
//! assert_eq!(value.as_deref(), Some("moien"));
//!
//! let state = OfflineState::new(Rc::new(ManualNetworkStatus::default()));
//! state.set_offline(true);
//! assert!(state.is_offline());
//! # Ok::<(), lux_offline::error::OfflineError>(())
//! # });
//! ```

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

mod action;
pub(crate) mod async_runtime;
mod bridge;
pub mod config;
mod downloader;
pub mod error;
mod extent;
mod lod;
mod mymaps;
mod network;
pub mod platform;
mod restorer;
mod state;
pub mod tile_schema;
pub mod tiles;
pub mod transport;

pub use action::{Action, Command, InboundMessage, RequestId, LOCALFORAGE_PLUGIN};
pub use bridge::{Inbox, StorageBridge};
pub use config::{BridgeConfig, DownloadConfig, StorageOptions, TargetOrigin};
pub use downloader::OfflineDownloader;
pub use extent::Extent;
pub use mymaps::{
    DrawnFeatures, MapInfo, MymapsOffline, MymapsService, MymapsSnapshot, MYMAPS_STORAGE_KEY,
};
pub use network::{ManualNetworkStatus, NetworkStatus};
pub use restorer::OfflineRestorer;
pub use state::OfflineState;
pub use tile_schema::{TileIndex, TileSchema};
pub use tiles::{
    CancelToken, DownloadSummary, ExtentDownloader, ExtentRestorer, OfflineContent, OfflineLayer,
    OfflineMap, OfflineTileSource, TileDownloader, TileFetcher, TileRestorer,
};
pub use transport::{
    AndroidTransport, IframeReceiver, IframeTransport, MemoryHost, NativeHost, ParentWindow,
    Transport,
};

// Reexport geojson, features of the snapshot are geojson features
pub use geojson;
