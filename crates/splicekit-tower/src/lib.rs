//! # SpliceKit Tower
//!
//! Self-generated transition towers:
//! - Sizing: per-layer density and an overall footprint from the purge load
//!   preflight schedules on each layer
//! - Rasterization: contracting perimeters and 45° diagonal infill, one
//!   layer at a time
//! - A cursor the output pass uses to consume a layer's path purge by purge

pub mod cursor;
pub mod geometry;
pub mod raster;
pub mod sizing;

pub use cursor::{Consumed, TowerCursor};
pub use geometry::{Point, Rect};
pub use raster::{path_extrusion, rasterize_layer, TowerMove};
pub use sizing::{LayerLoad, Tower, TowerLayer};
