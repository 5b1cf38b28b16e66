//! [`TileSchema`] is used to find the [tile indices](TileIndex) covering an extent at a zoom level.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub use crate::lod::Lod;
use crate::extent::Extent;

/// Direction of the Y index of tiles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum VerticalDirection {
    /// Tiles with `Y == 0` are at the top of the map.
    TopToBottom,
    /// Tiles with `Y == 0` are at the bottom of the map.
    BottomToTop,
}

/// Tile index.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    /// Z index.
    pub z: u32,
    /// X index.
    pub x: i32,
    /// Y index.
    pub y: i32,
}

impl TileIndex {
    /// Create a new index instance.
    pub fn new(x: i32, y: i32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tile schema specifies how tile indices are calculated for an area of the map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileSchema {
    /// Position where all tiles have `X == 0, Y == 0` indices, as `[x, y]`.
    pub origin: [f64; 2],
    /// Rectangle that contains all tiles of the tile schema.
    pub bounds: Extent,
    /// Sorted set of levels of detail that specify resolutions for each z-level.
    pub lods: BTreeSet<Lod>,
    /// Width of a single tile in pixels.
    pub tile_width: u32,
    /// Height of a single tile in pixels.
    pub tile_height: u32,
    /// Direction of the Y-axis.
    pub y_direction: VerticalDirection,
}

impl TileSchema {
    /// Level of detail of the given z-level, if exists.
    pub fn lod(&self, z: u32) -> Option<Lod> {
        self.lods.iter().find(|lod| lod.z_index() == z).copied()
    }

    /// Resolution of the given z-level, if exists.
    pub fn lod_resolution(&self, z: u32) -> Option<f64> {
        self.lod(z).map(|lod| lod.resolution())
    }

    /// Smallest z-level of the schema.
    pub fn min_z(&self) -> Option<u32> {
        self.lods.first().map(Lod::z_index)
    }

    /// Largest z-level of the schema.
    pub fn max_z(&self) -> Option<u32> {
        self.lods.last().map(Lod::z_index)
    }

    /// Width of a single tile.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Height of a single tile.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Iterate over the indices of the tiles of z-level `z` intersecting the extent.
    ///
    /// Returns `None` if the schema has no such level. Tiles outside of the schema bounds are
    /// never returned.
    pub fn iter_tiles(&self, extent: &Extent, z: u32) -> Option<impl Iterator<Item = TileIndex>> {
        let lod = self.lod(z)?;

        let (x_range, y_range) = match extent.intersection(&self.bounds) {
            Some(clipped) => {
                let (x_range, y_range) = self.index_range(&clipped, lod);
                let (x_bounds, y_bounds) = self.index_range(&self.bounds, lod);
                (clamp(x_range, &x_bounds), clamp(y_range, &y_bounds))
            }
            None => (1..=0, 1..=0),
        };

        Some(x_range.flat_map(move |x| y_range.clone().map(move |y| TileIndex::new(x, y, z))))
    }

    /// Number of tiles of z-levels `zooms` intersecting the extent.
    pub fn count_tiles(&self, extent: &Extent, zooms: RangeInclusive<u32>) -> usize {
        zooms
            .filter_map(|z| self.iter_tiles(extent, z))
            .map(|tiles| tiles.count())
            .sum()
    }

    /// Area covered by the tile.
    pub fn tile_extent(&self, index: TileIndex) -> Option<Extent> {
        let resolution = self.lod_resolution(index.z)?;
        let tile_w = self.tile_width as f64 * resolution;
        let tile_h = self.tile_height as f64 * resolution;

        let x_min = self.origin[0] + index.x as f64 * tile_w;
        let y_min = match self.y_direction {
            VerticalDirection::TopToBottom => self.origin[1] - (index.y + 1) as f64 * tile_h,
            VerticalDirection::BottomToTop => self.origin[1] + index.y as f64 * tile_h,
        };

        Extent::new(x_min, y_min, x_min + tile_w, y_min + tile_h).ok()
    }

    /// Standard Web Mercator based tile schema (used, for example, by OSM and the Geoportail
    /// background layers).
    pub fn web(lods_count: u32) -> Self {
        const ORIGIN: [f64; 2] = [-20037508.342787, 20037508.342787];
        const TOP_RESOLUTION: f64 = 156543.03392800014;

        let lods = (0..lods_count)
            .filter_map(|z| Lod::new(TOP_RESOLUTION / 2f64.powi(z as i32), z))
            .collect();

        TileSchema {
            origin: ORIGIN,
            bounds: Extent::from_raw(
                -20037508.342787,
                -20037508.342787,
                20037508.342787,
                20037508.342787,
            ),
            lods,
            tile_width: 256,
            tile_height: 256,
            y_direction: VerticalDirection::TopToBottom,
        }
    }

    fn index_range(
        &self,
        extent: &Extent,
        lod: Lod,
    ) -> (RangeInclusive<i32>, RangeInclusive<i32>) {
        let tile_w = lod.resolution() * self.tile_width as f64;
        let tile_h = lod.resolution() * self.tile_height as f64;

        let x_min = ((extent.x_min() - self.origin[0]) / tile_w).floor() as i32;
        let x_max = ((extent.x_max() - self.origin[0]) / tile_w).ceil() as i32 - 1;

        let (near, far) = match self.y_direction {
            VerticalDirection::TopToBottom => (
                self.origin[1] - extent.y_max(),
                self.origin[1] - extent.y_min(),
            ),
            VerticalDirection::BottomToTop => (
                extent.y_min() - self.origin[1],
                extent.y_max() - self.origin[1],
            ),
        };
        let y_min = (near / tile_h).floor() as i32;
        let y_max = (far / tile_h).ceil() as i32 - 1;

        (x_min..=x_max.max(x_min), y_min..=y_max.max(y_min))
    }
}

fn clamp(range: RangeInclusive<i32>, bounds: &RangeInclusive<i32>) -> RangeInclusive<i32> {
    (*range.start()).max(*bounds.start())..=(*range.end()).min(*bounds.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Extent {
        Extent::new(x_min, y_min, x_max, y_max).expect("valid extent")
    }

    fn simple_schema() -> TileSchema {
        TileSchema {
            origin: [0.0, 0.0],
            bounds: extent(0.0, 0.0, 2048.0, 2048.0),
            lods: [
                Lod::new(8.0, 0).expect("valid lod"),
                Lod::new(4.0, 1).expect("valid lod"),
                Lod::new(2.0, 2).expect("valid lod"),
            ]
            .into(),
            tile_width: 256,
            tile_height: 256,
            y_direction: VerticalDirection::BottomToTop,
        }
    }

    fn tiles(schema: &TileSchema, extent: &Extent, z: u32) -> Vec<TileIndex> {
        schema
            .iter_tiles(extent, z)
            .expect("z level exists")
            .collect()
    }

    #[test]
    fn iter_indices_full_bounds() {
        let schema = simple_schema();
        let bounds = schema.bounds;

        assert_eq!(tiles(&schema, &bounds, 0), vec![TileIndex::new(0, 0, 0)]);

        let level_1 = tiles(&schema, &bounds, 1);
        assert_eq!(level_1.len(), 4);
        assert!(level_1.iter().all(|t| (0..=1).contains(&t.x) && (0..=1).contains(&t.y)));

        assert_eq!(tiles(&schema, &bounds, 2).len(), 16);
    }

    #[test]
    fn iter_indices_part_extent() {
        let schema = simple_schema();
        let area = extent(200.0, 700.0, 1200.0, 1100.0);

        assert_eq!(tiles(&schema, &area, 0).len(), 1);
        assert_eq!(tiles(&schema, &area, 1).len(), 4);

        let level_2 = tiles(&schema, &area, 2);
        assert_eq!(level_2.len(), 6);
        for tile in level_2 {
            assert!((0..=2).contains(&tile.x));
            assert!((1..=2).contains(&tile.y));
            assert_eq!(tile.z, 2);
        }
    }

    #[test]
    fn extent_outside_of_bounds() {
        let schema = simple_schema();

        let area = extent(-100.0, -100.0, -50.0, -50.0);
        assert_eq!(tiles(&schema, &area, 0).len(), 0);
        assert_eq!(tiles(&schema, &area, 2).len(), 0);

        let area = extent(1800.0, 0.0, 2500.0, 2048.0);
        let level_2 = tiles(&schema, &area, 2);
        assert_eq!(level_2.len(), 4);
        assert!(level_2.iter().all(|t| t.x == 3));
    }

    #[test]
    fn unknown_level() {
        let schema = simple_schema();
        assert!(schema.iter_tiles(&schema.bounds, 3).is_none());
        assert_eq!(schema.count_tiles(&schema.bounds, 0..=5), 21);
    }

    #[test]
    fn tile_extent_covers_tile() {
        let schema = simple_schema();
        assert_eq!(
            schema.tile_extent(TileIndex::new(1, 2, 2)),
            Some(extent(512.0, 1024.0, 1024.0, 1536.0))
        );

        let web = TileSchema::web(19);
        let top = web.tile_extent(TileIndex::new(0, 0, 1)).expect("tile extent");
        assert!((top.x_min() + 20037508.342787).abs() < 1e-6);
        assert!((top.y_max() - 20037508.342787).abs() < 1e-6);
        // The top resolution is rounded, the tile edge is off the equator by a few micrometers.
        assert!(top.y_min().abs() < top.height() * 1e-9);
    }

    #[test]
    fn web_schema_over_luxembourg() {
        let schema = TileSchema::web(19);
        assert_eq!(schema.min_z(), Some(0));
        assert_eq!(schema.max_z(), Some(18));

        let luxembourg = extent(638000.0, 6340000.0, 724000.0, 6450000.0);
        assert_eq!(tiles(&schema, &luxembourg, 0), vec![TileIndex::new(0, 0, 0)]);
        assert_eq!(
            tiles(&schema, &luxembourg, 8),
            vec![TileIndex::new(132, 86, 8), TileIndex::new(132, 87, 8)]
        );
    }

    #[test]
    fn tile_index_display() {
        assert_eq!(TileIndex::new(132, 86, 8).to_string(), "8/132/86");
    }
}
