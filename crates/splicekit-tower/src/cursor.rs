//! Consumption cursor over a tower's layer paths
//!
//! The output pass purges into the tower by asking for a length of filament;
//! the cursor hands back the moves that use it, splitting a move where the
//! purge ends. Whatever is left of a layer is printed when the model moves
//! on to the next layer, so every tower layer is printed exactly once.

use std::collections::VecDeque;

use splicekit_core::TowerError;

use crate::geometry::Point;
use crate::raster::TowerMove;
use crate::sizing::Tower;

const EPSILON: f32 = 1e-4;

/// Moves handed out for a purge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consumed {
    pub moves: Vec<TowerMove>,
    /// Filament the layer path could not absorb (mm)
    pub shortfall: f32,
}

/// Walks tower layers in order
#[derive(Debug, Clone)]
pub struct TowerCursor {
    tower: Tower,
    active: Option<usize>,
    remaining: VecDeque<TowerMove>,
    position: Option<Point>,
    /// Layers below this index have been fully printed
    completed: usize,
}

impl TowerCursor {
    pub fn new(tower: Tower) -> Self {
        Self {
            tower,
            active: None,
            remaining: VecDeque::new(),
            position: None,
            completed: 0,
        }
    }

    pub fn tower(&self) -> &Tower {
        &self.tower
    }

    /// Layer currently being consumed
    pub fn active_layer(&self) -> Option<usize> {
        self.active
    }

    /// Number of layers fully printed
    pub fn completed_layers(&self) -> usize {
        self.completed
    }

    /// Last point the nozzle was sent to by the cursor
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// Make `index` the active layer, rasterizing it on first use
    pub fn begin_layer(&mut self, index: usize) -> Result<(), TowerError> {
        if self.active == Some(index) {
            return Ok(());
        }
        if index < self.completed {
            // Already printed; further purges on this layer have no path left
            self.active = Some(index);
            self.remaining.clear();
            return Ok(());
        }
        self.remaining = self.tower.rasterize(index)?.into();
        self.active = Some(index);
        Ok(())
    }

    /// Filament still available on the active layer
    pub fn remaining_extrusion(&self) -> f32 {
        self.remaining.iter().map(|m| m.extrusion).sum()
    }

    /// Take moves from the active layer until `amount` of filament is used
    pub fn consume(&mut self, amount: f32) -> Consumed {
        let mut left = amount;
        let mut moves = Vec::new();

        while left > EPSILON {
            let Some(next) = self.remaining.front_mut() else {
                break;
            };

            if next.is_travel() {
                moves.push(*next);
                self.position = Some(next.to);
                self.remaining.pop_front();
                continue;
            }

            if next.extrusion <= left + EPSILON {
                moves.push(*next);
                left -= next.extrusion;
                self.position = Some(next.to);
                self.remaining.pop_front();
            } else {
                let from = self.position.unwrap_or(next.to);
                let split = from.lerp(next.to, left / next.extrusion);
                moves.push(TowerMove {
                    to: split,
                    extrusion: left,
                });
                next.extrusion -= left;
                self.position = Some(split);
                left = 0.0;
            }
        }

        Consumed {
            moves,
            shortfall: if left > EPSILON { left } else { 0.0 },
        }
    }

    /// Complete layer `index` and return the moves still to be printed.
    ///
    /// An active layer yields its remainder; a layer never touched yields
    /// its whole path; layers already completed or beyond the top of the
    /// tower yield nothing.
    pub fn finish_layer(&mut self, index: usize) -> Result<Vec<TowerMove>, TowerError> {
        if index >= self.tower.layer_count() || index < self.completed {
            if self.active == Some(index) {
                self.active = None;
            }
            return Ok(Vec::new());
        }

        if self.active != Some(index) {
            self.begin_layer(index)?;
        }
        let moves: Vec<TowerMove> = self.remaining.drain(..).collect();
        if let Some(last) = moves.last() {
            self.position = Some(last.to);
        }
        self.active = None;
        self.completed = index + 1;
        Ok(moves)
    }

    /// Whether every tower layer has been printed
    pub fn is_finished(&self) -> bool {
        self.completed >= self.tower.layer_count()
    }
}
