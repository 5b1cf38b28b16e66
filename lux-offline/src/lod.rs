use serde::{Deserialize, Serialize};

/// Zoom level of a tile schema with its resolution.
///
/// Levels are ordered and compared by their z index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Lod {
    z_index: u32,
    resolution: f64,
}

impl Lod {
    /// Creates new level of detail. Returns `None` for a resolution that is not a positive number.
    pub fn new(resolution: f64, z_index: u32) -> Option<Lod> {
        if resolution.is_finite() && resolution > 0.0 {
            Some(Self {
                z_index,
                resolution,
            })
        } else {
            None
        }
    }

    /// Z index of the level.
    pub fn z_index(&self) -> u32 {
        self.z_index
    }

    /// Map units per pixel at this level.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }
}

impl PartialEq for Lod {
    fn eq(&self, other: &Self) -> bool {
        self.z_index == other.z_index
    }
}

impl Eq for Lod {}

impl PartialOrd for Lod {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lod {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.z_index.cmp(&other.z_index)
    }
}
