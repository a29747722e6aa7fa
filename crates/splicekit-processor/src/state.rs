//! Runtime state shared by the preflight and output passes
//!
//! Each pass creates its own [`RuntimeState`] and throws it away at the end;
//! nothing carries over between passes except the preflight result.

use splicekit_core::{GcodeError, Palette};
use splicekit_gcode::{GcodeCommand, SlicerHint, Tracker, Trackers, TypeHint};

use crate::ping::PingState;

/// Mutable per-pass state
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub trackers: Trackers,
    /// Drive currently feeding the nozzle
    pub current_tool: Option<usize>,
    /// Index of the current print layer, `None` before the first layer hint
    pub layer: Option<usize>,
    pub in_wipe_tower: bool,
    pub in_infill: bool,
    /// Whether the print start marker has been passed
    pub started: bool,
    pub ping: PingState,
    /// Next preflight transition the output pass expects
    pub transition_index: usize,
}

impl RuntimeState {
    pub fn new(palette: &Palette) -> Self {
        Self {
            trackers: Trackers::default(),
            current_tool: None,
            layer: None,
            in_wipe_tower: false,
            in_infill: false,
            started: palette.print.start_marker.is_none(),
            ping: PingState::new(palette.ping_mode()),
            transition_index: 0,
        }
    }

    /// Live filament coordinate (mm), including any inserted extrusion
    pub fn filament_position(&self) -> f32 {
        self.trackers.extrusion.total_extrusion
    }

    /// Current layer, treating everything before the first layer hint as layer 0
    pub fn layer_index(&self) -> usize {
        self.layer.unwrap_or(0)
    }

    /// Nozzle position
    pub fn xyz(&self) -> [f32; 3] {
        let position = &self.trackers.position;
        [position.x, position.y, position.z]
    }

    pub fn track(&mut self, command: &GcodeCommand) {
        self.trackers.track_instruction(command);
    }

    /// Whether the last tracked line was a move that pushed filament
    pub fn last_move_extruded(&self) -> bool {
        self.trackers.extrusion.last_move_extruded()
    }

    /// Apply the region and layer effects of a slicer hint
    pub fn apply_hint(&mut self, hint: &SlicerHint) {
        match hint {
            SlicerHint::LayerChange => {
                self.layer = Some(self.layer.map_or(0, |layer| layer + 1));
            }
            SlicerHint::Type(kind) => {
                self.in_wipe_tower = *kind == TypeHint::WipeTower;
                self.in_infill = *kind == TypeHint::InternalInfill;
            }
            _ => {}
        }
    }

    /// Whether `line` is the configured print start marker
    pub fn is_start_marker(&self, palette: &Palette, line: &str) -> bool {
        palette
            .print
            .start_marker
            .as_deref()
            .is_some_and(|marker| line.trim() == marker.trim())
    }

    /// Map a tool number to a drive with a loaded material
    pub fn resolve_tool(palette: &Palette, tool: u32, line: usize) -> Result<usize, GcodeError> {
        let drive = tool as usize;
        if palette.material(drive).is_some() {
            Ok(drive)
        } else {
            Err(GcodeError::UnknownTool { tool, line })
        }
    }
}
