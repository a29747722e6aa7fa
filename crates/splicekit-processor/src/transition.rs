//! Transition records produced by preflight

use serde::{Deserialize, Serialize};

/// One tool change after the initial tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Print layer the change happens on (0 before the first layer hint)
    pub layer: usize,
    pub from: usize,
    pub to: usize,
    /// Stream extrusion when the tool change was read (mm)
    pub total_extrusion: f32,
    /// Configured transition length scaled by the transition target (mm)
    pub transition_length: f32,
    /// Filament to purge after the change (mm)
    pub purge_length: f32,
    /// Infill extruded since the previous change that counts as purge (mm)
    pub usable_infill: f32,
    /// Predicted splice position in filament coordinates (mm)
    pub splice_length: f32,
    /// 1-based line of the tool command
    pub line: usize,
}

/// Positions a side transition routes between
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideLookahead {
    /// Nozzle XYZ when the tool change was read
    pub current: [f32; 3],
    /// Where printing resumes: the start of the first extruding linear move
    /// after the change, with that move's Z. `None` if the stream never
    /// extrudes again before the next change.
    pub next: Option<[f32; 3]>,
}

impl SideLookahead {
    /// Resume position, falling back to where the transition started
    pub fn resume(&self) -> [f32; 3] {
        self.next.unwrap_or(self.current)
    }
}
