//! Tower sizing
//!
//! The tower is sized once, after preflight. Each layer's purge volume
//! becomes a footprint area at that layer's thickness; the largest area
//! sets the footprint of the whole tower and every other layer is printed
//! proportionally sparser.

use serde::{Deserialize, Serialize};

use splicekit_core::constants::{ACCESSORY_PING_EXTRUSION, GOLDEN_RATIO, TOWER_SAFETY_FACTOR};
use splicekit_core::{Palette, PrintSettings, TowerError, TowerSettings};

use crate::geometry::{Point, Rect};
use crate::raster::{rasterize_layer, TowerMove};

/// Purge load preflight scheduled on one print layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerLoad {
    pub top_z: f32,
    pub thickness: f32,
    /// Purge length (mm of filament) of every transition on the layer
    pub purge_lengths: Vec<f32>,
}

impl LayerLoad {
    pub fn total_purge(&self) -> f32 {
        self.purge_lengths.iter().sum()
    }
}

/// One physical tower layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TowerLayer {
    pub top_z: f32,
    pub thickness: f32,
    /// Infill density, percent
    pub density: f32,
}

/// A sized tower
#[derive(Debug, Clone, PartialEq)]
pub struct Tower {
    layers: Vec<TowerLayer>,
    footprint: Rect,
    footprint_area: f32,
    settings: TowerSettings,
    print: PrintSettings,
}

impl Tower {
    /// Size a tower for the given per-layer loads
    pub fn size(loads: &[LayerLoad], palette: &Palette) -> Result<Self, TowerError> {
        let settings = &palette.tower;
        let print = &palette.print;

        let layer_count = loads
            .iter()
            .rposition(|load| load.total_purge() > 0.0)
            .map(|last| last + 1)
            .ok_or(TowerError::NoTransitions)?;
        let loads = &loads[..layer_count];

        let max_fraction = settings.max_density / 100.0;
        let areas: Vec<f32> = loads
            .iter()
            .map(|load| {
                if load.purge_lengths.is_empty() || load.thickness <= 0.0 {
                    return 0.0;
                }
                let length = load.total_purge().max(ACCESSORY_PING_EXTRUSION);
                let volume = length * print.filament_area() * print.extrusion_multiplier
                    / max_fraction
                    * TOWER_SAFETY_FACTOR;
                volume / load.thickness
            })
            .collect();

        let footprint_area = areas.iter().copied().fold(0.0_f32, f32::max);
        if footprint_area <= 0.0 {
            return Err(TowerError::NoTransitions);
        }

        let layers = loads
            .iter()
            .zip(&areas)
            .enumerate()
            .map(|(index, (load, area))| {
                let floor = if index == 0 {
                    settings.min_first_layer_density
                } else {
                    settings.min_density
                };
                let density = (area / footprint_area * settings.max_density)
                    .clamp(floor, settings.max_density);
                TowerLayer {
                    top_z: load.top_z,
                    thickness: load.thickness,
                    density,
                }
            })
            .collect();

        let aspect = if settings.aspect_width > 0.0 && settings.aspect_height > 0.0 {
            settings.aspect_width / settings.aspect_height
        } else {
            GOLDEN_RATIO
        };
        let height = (footprint_area / aspect).sqrt();
        let width = footprint_area / height;
        let footprint = Rect::centered(
            Point::new(settings.center_x, settings.center_y),
            width / 2.0,
            height / 2.0,
        );

        tracing::info!(
            "Tower sized: {} layers, footprint {:.2} x {:.2} mm at ({:.2}, {:.2})",
            layer_count,
            width,
            height,
            settings.center_x,
            settings.center_y
        );

        Ok(Self {
            layers,
            footprint,
            footprint_area,
            settings: settings.clone(),
            print: print.clone(),
        })
    }

    pub fn layers(&self) -> &[TowerLayer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&TowerLayer> {
        self.layers.get(index)
    }

    pub fn footprint(&self) -> Rect {
        self.footprint
    }

    pub fn footprint_area(&self) -> f32 {
        self.footprint_area
    }

    pub fn settings(&self) -> &TowerSettings {
        &self.settings
    }

    /// Path for one layer
    pub fn rasterize(&self, index: usize) -> Result<Vec<TowerMove>, TowerError> {
        let layer = self.layer(index).ok_or(TowerError::LayerOutOfRange {
            layer: index,
            layer_count: self.layers.len(),
        })?;
        Ok(rasterize_layer(
            self.footprint,
            layer,
            index,
            &self.settings,
            &self.print,
        ))
    }
}
