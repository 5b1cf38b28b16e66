//! Platform specific implementations of the tile fetcher and of the host integration.

#[cfg(not(target_arch = "wasm32"))]
pub mod native;

/// Tile fetcher for the current platform.
#[cfg(not(target_arch = "wasm32"))]
pub type DefaultTileFetcher = native::HttpTileFetcher;

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Tile fetcher for the current platform.
#[cfg(target_arch = "wasm32")]
pub type DefaultTileFetcher = web::WebTileFetcher;
