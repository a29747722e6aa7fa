//! Per-layer tower paths

use serde::{Deserialize, Serialize};
use std::f32::consts::SQRT_2;

use splicekit_core::{PrintSettings, TowerSettings};

use crate::geometry::{Point, Rect};
use crate::sizing::TowerLayer;

/// One move of a tower path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TowerMove {
    pub to: Point,
    /// Filament pushed during the move (mm), 0 for travel
    pub extrusion: f32,
}

impl TowerMove {
    pub fn travel(to: Point) -> Self {
        Self { to, extrusion: 0.0 }
    }

    pub fn is_travel(&self) -> bool {
        self.extrusion <= 0.0
    }
}

/// Filament per mm of line; matches the volume model used for sizing so a
/// full-density layer absorbs exactly its sized volume
fn extrusion_per_mm(width: f32, thickness: f32, print: &PrintSettings) -> f32 {
    width * thickness * print.extrusion_multiplier / print.filament_area()
}

struct PathWriter {
    moves: Vec<TowerMove>,
    position: Option<Point>,
    flow: f32,
}

impl PathWriter {
    fn travel_to(&mut self, to: Point) {
        if self.position != Some(to) {
            self.moves.push(TowerMove::travel(to));
            self.position = Some(to);
        }
    }

    fn extrude_to(&mut self, to: Point) {
        let from = self.position.unwrap_or(to);
        let length = from.distance(to);
        if length > 0.0 {
            self.moves.push(TowerMove {
                to,
                extrusion: length * self.flow,
            });
        }
        self.position = Some(to);
    }
}

/// Build the path for one tower layer.
///
/// Perimeters contract inwards from the footprint edge. They are skipped
/// above the density threshold, except on the first layer after the raft
/// when forced. Infill is laid at 45° with a line spacing of
/// `extrusion_width / density`, alternating direction line by line and
/// mirrored in X on odd layers.
pub fn rasterize_layer(
    footprint: Rect,
    layer: &TowerLayer,
    index: usize,
    settings: &TowerSettings,
    print: &PrintSettings,
) -> Vec<TowerMove> {
    let width = settings.extrusion_width;
    let mut writer = PathWriter {
        moves: Vec::new(),
        position: None,
        flow: extrusion_per_mm(width, layer.thickness, print),
    };

    let force = settings.force_bottom_perimeter && index == settings.raft_layers;
    let draw_perimeters = settings.perimeters
        && (layer.density <= settings.perimeter_density_threshold || force);

    let mut drawn = 0;
    if draw_perimeters {
        for ring in 0..settings.perimeter_count {
            let Some(rect) = footprint.inset((ring as f32 + 0.5) * width) else {
                break;
            };
            let corners = rect.corners();
            writer.travel_to(corners[0]);
            for corner in corners.iter().skip(1).chain(std::iter::once(&corners[0])) {
                writer.extrude_to(*corner);
            }
            drawn += 1;
        }
    }

    let region = if drawn > 0 {
        footprint.inset(drawn as f32 * width)
    } else {
        Some(footprint)
    };
    if let Some(region) = region.filter(|_| layer.density > 0.0) {
        let mirror = index % 2 == 1;
        let axis = footprint.center().x;
        let stride = width / (layer.density / 100.0);
        let step = stride * SQRT_2;

        let (x0, y0, x1, y1) = (region.min.x, region.min.y, region.max.x, region.max.y);
        let mut c = x0 - y1 + step / 2.0;
        let mut line = 0;
        while c < x1 - y0 {
            let y_lo = y0.max(x0 - c);
            let y_hi = y1.min(x1 - c);
            if y_hi > y_lo {
                let mut a = Point::new(y_lo + c, y_lo);
                let mut b = Point::new(y_hi + c, y_hi);
                if line % 2 == 1 {
                    std::mem::swap(&mut a, &mut b);
                }
                if mirror {
                    a = a.mirror_x(axis);
                    b = b.mirror_x(axis);
                }
                writer.travel_to(a);
                writer.extrude_to(b);
                line += 1;
            }
            c += step;
        }
    }

    writer.moves
}

/// Filament used by a path
pub fn path_extrusion(moves: &[TowerMove]) -> f32 {
    moves.iter().map(|m| m.extrusion).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(density: f32) -> (Rect, TowerLayer, TowerSettings, PrintSettings) {
        (
            Rect::centered(Point::new(50.0, 50.0), 10.0, 6.0),
            TowerLayer {
                top_z: 0.4,
                thickness: 0.2,
                density,
            },
            TowerSettings::default(),
            PrintSettings::default(),
        )
    }

    fn inside(rect: &Rect, point: Point) -> bool {
        let eps = 1e-3;
        point.x >= rect.min.x - eps
            && point.x <= rect.max.x + eps
            && point.y >= rect.min.y - eps
            && point.y <= rect.max.y + eps
    }

    #[test]
    fn test_path_stays_inside_footprint() {
        let (rect, layer, settings, print) = setup(40.0);
        let moves = rasterize_layer(rect, &layer, 1, &settings, &print);
        assert!(!moves.is_empty());
        assert!(moves[0].is_travel());
        assert!(moves.iter().all(|m| inside(&rect, m.to)));
        assert!(path_extrusion(&moves) > 0.0);
    }

    #[test]
    fn test_denser_layers_use_more_filament() {
        let (rect, sparse, mut settings, print) = setup(20.0);
        settings.perimeters = false;
        let dense = TowerLayer {
            density: 80.0,
            ..sparse
        };
        let sparse_total = path_extrusion(&rasterize_layer(rect, &sparse, 1, &settings, &print));
        let dense_total = path_extrusion(&rasterize_layer(rect, &dense, 1, &settings, &print));
        assert!(dense_total > sparse_total * 3.0);
    }

    #[test]
    fn test_perimeters_skipped_above_threshold() {
        let (rect, layer, settings, print) = setup(95.0);
        let moves = rasterize_layer(rect, &layer, 3, &settings, &print);
        // first move goes straight to a diagonal line start, not a perimeter corner
        let first_corner = rect.inset(settings.extrusion_width / 2.0).unwrap().min;
        assert_ne!(moves[0].to, first_corner);

        let forced = rasterize_layer(rect, &layer, 0, &settings, &print);
        assert_eq!(forced[0].to, first_corner);
    }

    #[test]
    fn test_odd_layers_mirrored() {
        let (rect, layer, mut settings, print) = setup(30.0);
        settings.perimeters = false;
        let even = rasterize_layer(rect, &layer, 2, &settings, &print);
        let odd = rasterize_layer(rect, &layer, 3, &settings, &print);
        assert_eq!(even.len(), odd.len());
        for (a, b) in even.iter().zip(&odd) {
            assert!((a.to.mirror_x(50.0).x - b.to.x).abs() < 1e-3);
            assert!((a.to.y - b.to.y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_extrusion_per_mm() {
        let print = PrintSettings::default();
        let flow = extrusion_per_mm(0.45, 0.2, &print);
        let expected = 0.45 * 0.2 / print.filament_area();
        assert!((flow - expected).abs() < 1e-6);
    }
}
