//! Planar points and rectangles

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point (or vector) in the XY plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        (*self - other).norm()
    }

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Point a fraction `t` of the way from `self` to `other`
    pub fn lerp(&self, other: Point, t: f32) -> Point {
        *self + (other - *self) * t
    }

    /// Reflection across the vertical line `x = axis`
    pub fn mirror_x(&self, axis: f32) -> Point {
        Point::new(2.0 * axis - self.x, self.y)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, scalar: f32) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Rectangle from its center and half extents
    pub fn centered(center: Point, half_width: f32, half_height: f32) -> Self {
        Self {
            min: Point::new(center.x - half_width, center.y - half_height),
            max: Point::new(center.x + half_width, center.y + half_height),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }

    /// Shrink on every side, or `None` when nothing would be left
    pub fn inset(&self, offset: f32) -> Option<Rect> {
        let rect = Rect {
            min: Point::new(self.min.x + offset, self.min.y + offset),
            max: Point::new(self.max.x - offset, self.max.y - offset),
        };
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }

    /// Corners in counter-clockwise order starting at the minimum corner
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}
