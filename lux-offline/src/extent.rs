use serde::{Deserialize, Serialize};

use crate::error::OfflineError;

/// Rectangular area of the map in the projected coordinates of the tile schema.
///
/// Serialized as `[x_min, y_min, x_max, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl Extent {
    /// Creates a new extent. Fails if a coordinate is not finite or if the minimum is larger than
    /// the maximum.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, OfflineError> {
        let finite = [x_min, y_min, x_max, y_max].iter().all(|v| v.is_finite());
        if !finite || x_min > x_max || y_min > y_max {
            return Err(OfflineError::Configuration(format!(
                "invalid extent [{x_min}, {y_min}, {x_max}, {y_max}]"
            )));
        }

        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub(crate) const fn from_raw(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Minimum X coordinate.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Minimum Y coordinate.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximum X coordinate.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Maximum Y coordinate.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width of the extent.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the extent.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Common part of two extents, `None` if they do not overlap.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let x_min = self.x_min.max(other.x_min);
        let y_min = self.y_min.max(other.y_min);
        let x_max = self.x_max.min(other.x_max);
        let y_max = self.y_max.min(other.y_max);

        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

impl TryFrom<[f64; 4]> for Extent {
    type Error = OfflineError;

    fn try_from([x_min, y_min, x_max, y_max]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(x_min, y_min, x_max, y_max)
    }
}

impl From<Extent> for [f64; 4] {
    fn from(extent: Extent) -> Self {
        [extent.x_min, extent.y_min, extent.x_max, extent.y_max]
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn invalid_extents_are_rejected() {
        assert_matches!(
            Extent::new(1.0, 0.0, 0.0, 1.0),
            Err(OfflineError::Configuration(_))
        );
        assert_matches!(
            Extent::new(0.0, f64::NAN, 1.0, 1.0),
            Err(OfflineError::Configuration(_))
        );
        assert!(Extent::new(0.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn serialized_as_array() {
        let extent = Extent::new(638000.0, 6340000.0, 724000.0, 6450000.0).expect("valid extent");
        let value = serde_json::to_value(extent).expect("serialize extent");
        assert_eq!(value, json!([638000.0, 6340000.0, 724000.0, 6450000.0]));

        let parsed: Extent = serde_json::from_value(value).expect("deserialize extent");
        assert_eq!(parsed, extent);

        assert!(serde_json::from_value::<Extent>(json!([1.0, 0.0, 0.0, 1.0])).is_err());
    }

    #[test]
    fn intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0).expect("valid extent");
        let b = Extent::new(5.0, -5.0, 15.0, 5.0).expect("valid extent");
        assert_eq!(
            a.intersection(&b),
            Some(Extent::new(5.0, 0.0, 10.0, 5.0).expect("valid extent"))
        );

        let c = Extent::new(20.0, 20.0, 30.0, 30.0).expect("valid extent");
        assert_eq!(a.intersection(&c), None);
    }
}
