//! Axis-aligned bounding boxes with an explicit empty state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hex::{float_to_hex, hex_to_float};

/// Minimum and maximum corners of a non-empty box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Extent {
    /// Width along X
    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    /// Depth along Y
    pub fn depth(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    /// Center in the XY plane
    pub fn center_xy(&self) -> (f32, f32) {
        (
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        )
    }
}

/// Bounding box that starts empty and grows as points are included.
///
/// An empty box has no extent at all; callers never see sentinel
/// infinities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    extent: Option<Extent>,
}

/// Error decoding a bounding box from text
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid bounding box encoding: {0}")]
pub struct BoundsParseError(pub String);

impl BoundingBox {
    /// Create an empty bounding box
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a box spanning two corners
    pub fn from_corners(min: [f32; 3], max: [f32; 3]) -> Self {
        let mut bounds = Self::new();
        bounds.include(min[0], min[1], min[2]);
        bounds.include(max[0], max[1], max[2]);
        bounds
    }

    /// Grow the box to contain a point
    pub fn include(&mut self, x: f32, y: f32, z: f32) {
        let point = [x, y, z];
        match &mut self.extent {
            Some(extent) => {
                for axis in 0..3 {
                    extent.min[axis] = extent.min[axis].min(point[axis]);
                    extent.max[axis] = extent.max[axis].max(point[axis]);
                }
            }
            None => {
                self.extent = Some(Extent {
                    min: point,
                    max: point,
                });
            }
        }
    }

    /// Grow the box to contain another box
    pub fn merge(&mut self, other: &BoundingBox) {
        if let Some(extent) = other.extent {
            self.include(extent.min[0], extent.min[1], extent.min[2]);
            self.include(extent.max[0], extent.max[1], extent.max[2]);
        }
    }

    /// Whether no point has been included yet
    pub fn is_empty(&self) -> bool {
        self.extent.is_none()
    }

    /// The extent, if any point has been included
    pub fn extent(&self) -> Option<&Extent> {
        self.extent.as_ref()
    }

    /// Encode as `minX,minY,minZ,maxX,maxY,maxZ` float32 hex, or `empty`
    pub fn to_hex(&self) -> String {
        match &self.extent {
            None => "empty".to_string(),
            Some(extent) => extent
                .min
                .iter()
                .chain(extent.max.iter())
                .map(|v| float_to_hex(*v))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Decode text produced by [`BoundingBox::to_hex`]
    pub fn from_hex(text: &str) -> Result<Self, BoundsParseError> {
        let text = text.trim();
        if text == "empty" {
            return Ok(Self::new());
        }

        let values = text
            .split(',')
            .map(|field| {
                hex_to_float(field.trim())
                    .ok_or_else(|| BoundsParseError(format!("bad field '{}'", field)))
            })
            .collect::<Result<Vec<f32>, _>>()?;

        if values.len() != 6 {
            return Err(BoundsParseError(format!(
                "expected 6 fields, found {}",
                values.len()
            )));
        }

        Ok(Self {
            extent: Some(Extent {
                min: [values[0], values[1], values[2]],
                max: [values[3], values[4], values[5]],
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_box() {
        let bounds = BoundingBox::new();
        assert!(bounds.is_empty());
        assert!(bounds.extent().is_none());
        assert_eq!(bounds.to_hex(), "empty");
        assert_eq!(BoundingBox::from_hex("empty").unwrap(), bounds);
    }

    #[test]
    fn test_include_grows() {
        let mut bounds = BoundingBox::new();
        bounds.include(10.0, 20.0, 0.2);
        bounds.include(-5.0, 30.0, 0.4);
        let extent = bounds.extent().unwrap();
        assert_eq!(extent.min, [-5.0, 20.0, 0.2]);
        assert_eq!(extent.max, [10.0, 30.0, 0.4]);
        assert_eq!(extent.width(), 15.0);
        assert_eq!(extent.center_xy(), (2.5, 25.0));
    }

    #[test]
    fn test_merge() {
        let mut a = BoundingBox::from_corners([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::from_corners([2.0, -1.0, 0.0], [3.0, 0.5, 2.0]);
        a.merge(&b);
        a.merge(&BoundingBox::new());
        let extent = a.extent().unwrap();
        assert_eq!(extent.min, [0.0, -1.0, 0.0]);
        assert_eq!(extent.max, [3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rejects_bad_text() {
        assert!(BoundingBox::from_hex("3dcccccd,3dcccccd").is_err());
        assert!(BoundingBox::from_hex("nothex").is_err());
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(
            a in -1000.0f32..1000.0, b in -1000.0f32..1000.0, c in 0.0f32..300.0,
            d in -1000.0f32..1000.0, e in -1000.0f32..1000.0, f in 0.0f32..300.0,
        ) {
            let bounds = BoundingBox::from_corners([a, b, c], [d, e, f]);
            let decoded = BoundingBox::from_hex(&bounds.to_hex()).unwrap();
            prop_assert_eq!(decoded, bounds);
        }
    }
}
