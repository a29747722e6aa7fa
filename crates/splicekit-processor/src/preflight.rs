//! Preflight scanner
//!
//! The first of the two passes. It reads the whole stream once, writes
//! nothing, and collects everything the output pass must know in advance:
//! tool changes and their purge lengths, predicted ping positions, bounding
//! boxes, per-layer Z and object markers, and the positions side
//! transitions route between.

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use splicekit_core::constants::{
    round_layer_value, ACCESSORY_PING_EXTRUSION, IN_PLACE_PURGE_STEP, SPLICE_MIN_LENGTH,
};
use splicekit_core::{BoundingBox, LayerError, Palette, Result, TransitionMethod};
use splicekit_gcode::{for_each_line, parse_line, GcodeCommand, SlicerHint};
use splicekit_tower::LayerLoad;

use crate::ping::PingEvent;
use crate::side_transitions;
use crate::state::RuntimeState;
use crate::transition::{SideLookahead, Transition};

/// Per-layer bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub top_z: f32,
    /// Largest height hint seen on the layer
    pub thickness: f32,
    pub object_starts: u32,
    pub object_ends: u32,
}

/// Everything the output pass needs from the first pass.
///
/// `ping_starts`, `wipe_tower_bounds` and `summary_line` are not read by the
/// output pass; they are reported in the preflight dump. The output pass
/// runs its own ping machine and finds the summary from the slicer hint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub drives_used: BTreeSet<usize>,
    /// Tool selected by the first tool command after the print start
    pub initial_tool: Option<usize>,
    /// Predicted ping start positions in filament coordinates
    pub ping_starts: Vec<f32>,
    /// Extrusion outside the slicer's wipe tower
    pub model_bounds: BoundingBox,
    pub wipe_tower_bounds: BoundingBox,
    /// First `; filament used` line, where the recomputed summary goes
    pub summary_line: Option<usize>,
    pub layers: Vec<LayerInfo>,
    pub transitions: Vec<Transition>,
    /// Transition indexes keyed by layer
    pub transitions_by_layer: BTreeMap<usize, Vec<usize>>,
    /// One entry per transition when side transitions are configured
    pub side_lookahead: Vec<SideLookahead>,
    /// Slicer time estimate in seconds
    pub time_estimate: Option<u64>,
    pub layer_count: usize,
    /// Stream extrusion at end of file (mm)
    pub total_extrusion: f32,
}

impl PreflightResult {
    /// Purge load per print layer, for tower sizing
    pub fn layer_loads(&self) -> Vec<LayerLoad> {
        self.layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerLoad {
                top_z: layer.top_z,
                thickness: layer.thickness,
                purge_lengths: self
                    .transitions_by_layer
                    .get(&index)
                    .map(|ids| {
                        ids.iter()
                            .map(|&id| self.transitions[id].purge_length)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Transition at `index`, if any
    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    /// Side lookahead for transition `index`
    pub fn lookahead(&self, index: usize) -> Option<&SideLookahead> {
        self.side_lookahead.get(index)
    }
}

/// Line-by-line scanner for the first pass
pub struct PreflightScanner<'a> {
    palette: &'a Palette,
    state: RuntimeState,
    result: PreflightResult,
    /// Extrusion the output pass will have inserted so far (mm)
    inserted: f32,
    last_splice: Option<f32>,
    infill_since_transition: f32,
    /// Transition still waiting for its resume position
    awaiting_lookahead: Option<usize>,
    /// Last move extruded inside the wipe tower, so the next move starts there
    leaving_wipe_tower: bool,
}

impl<'a> PreflightScanner<'a> {
    pub fn new(palette: &'a Palette) -> Self {
        Self {
            palette,
            state: RuntimeState::new(palette),
            result: PreflightResult::default(),
            inserted: 0.0,
            last_splice: None,
            infill_since_transition: 0.0,
            awaiting_lookahead: None,
            leaving_wipe_tower: false,
        }
    }

    /// Scan one line (1-based line number)
    pub fn scan_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        let command = parse_line(line);

        let was_in_wipe_tower = self.state.in_wipe_tower;
        if let Some(hint) = SlicerHint::from_command(&command) {
            self.state.apply_hint(&hint);
            self.record_hint(&hint, line_no);
        }
        if was_in_wipe_tower && !self.state.in_wipe_tower {
            let position = self.state.filament_position();
            if let Some(pending) = self.state.ping.region_ended(position) {
                tracing::debug!(
                    "Wipe tower ended before ping at {:.2} mm completed; discarded",
                    pending.start
                );
            }
        }

        if !self.state.started {
            if self.state.is_start_marker(self.palette, line) {
                self.state.started = true;
            }
            self.state.track(&command);
            return Ok(());
        }

        if let Some(tool) = command.tool() {
            self.tool_change(tool, line_no)?;
        }

        let before = self.state.xyz();
        self.state.track(&command);
        if command.is_motion() {
            if self.state.last_move_extruded() {
                self.after_extrusion(&command, before);
            } else {
                self.leaving_wipe_tower = false;
            }
        }

        Ok(())
    }

    /// Close the scan and validate per-layer invariants
    pub fn finish(mut self) -> Result<PreflightResult> {
        self.result.layer_count = self.result.layers.len();
        self.result.total_extrusion = self.state.filament_position();

        if self.palette.transition_method == TransitionMethod::CustomTower {
            validate_layers(&self.result)?;
        }

        tracing::info!(
            "Preflight found {} transitions across {} layers using drives {:?}",
            self.result.transitions.len(),
            self.result.layer_count,
            self.result.drives_used
        );
        Ok(self.result)
    }

    fn record_hint(&mut self, hint: &SlicerHint, line_no: usize) {
        match hint {
            SlicerHint::LayerChange => self.result.layers.push(LayerInfo::default()),
            SlicerHint::FilamentUsed => {
                self.result.summary_line.get_or_insert(line_no);
            }
            SlicerHint::TimeEstimate(seconds) => self.result.time_estimate = Some(*seconds),
            _ => {
                let Some(layer) = self
                    .state
                    .layer
                    .and_then(|index| self.result.layers.get_mut(index))
                else {
                    return;
                };
                match hint {
                    SlicerHint::TopZ(z) => layer.top_z = round_layer_value(*z),
                    SlicerHint::Height(height) => {
                        layer.thickness = layer.thickness.max(round_layer_value(*height))
                    }
                    SlicerHint::ObjectStart(_) => layer.object_starts += 1,
                    SlicerHint::ObjectEnd(_) => layer.object_ends += 1,
                    _ => {}
                }
            }
        }
    }

    fn tool_change(&mut self, tool: u32, line_no: usize) -> Result<()> {
        let to = RuntimeState::resolve_tool(self.palette, tool, line_no)?;
        match self.state.current_tool {
            None => {
                self.result.initial_tool = Some(to);
                self.result.drives_used.insert(to);
                self.state.current_tool = Some(to);
                self.infill_since_transition = 0.0;
            }
            Some(from) if from == to => {}
            Some(from) => self.record_transition(from, to, line_no),
        }
        Ok(())
    }

    fn record_transition(&mut self, from: usize, to: usize, line_no: usize) {
        let palette = self.palette;
        let total_extrusion = self.state.filament_position();
        let transition_length =
            palette.transition_length(from, to) * palette.transition_target / 100.0;
        let usable_infill = if palette.use_infill_for_transitions {
            self.infill_since_transition.min(transition_length)
        } else {
            0.0
        };

        let mut purge_length = transition_length - usable_infill;
        let mut splice_length = total_extrusion + self.inserted + purge_length;
        let previous = self.last_splice.unwrap_or(0.0);
        let minimum = if self.last_splice.is_none() {
            palette.palette_type.first_piece_min_length()
        } else {
            SPLICE_MIN_LENGTH
        };
        if splice_length - previous < minimum {
            purge_length += minimum - (splice_length - previous);
            splice_length = previous + minimum;
        }

        let purge_start = total_extrusion + self.inserted;
        if palette.transition_method.inserts_purge() {
            self.inserted += purge_length;
            self.predict_purge_pings(purge_start, purge_length);
        }

        let layer = self.state.layer_index();
        let index = self.result.transitions.len();
        tracing::debug!(
            "Transition {} at line {}: T{} -> T{}, purge {:.2} mm, splice at {:.2} mm",
            index,
            line_no,
            from,
            to,
            purge_length,
            splice_length
        );

        self.result.transitions.push(Transition {
            layer,
            from,
            to,
            total_extrusion,
            transition_length,
            purge_length,
            usable_infill,
            splice_length,
            line: line_no,
        });
        self.result
            .transitions_by_layer
            .entry(layer)
            .or_default()
            .push(index);
        self.result.drives_used.insert(to);

        if palette.transition_method == TransitionMethod::SideTransitions {
            self.result.side_lookahead.push(SideLookahead {
                current: self.state.xyz(),
                next: None,
            });
            self.awaiting_lookahead = Some(index);
        }

        self.last_splice = Some(splice_length);
        self.infill_since_transition = 0.0;
        self.state.current_tool = Some(to);
    }

    fn after_extrusion(&mut self, command: &GcodeCommand, before: [f32; 3]) {
        let after = self.state.xyz();

        if self.state.in_wipe_tower {
            self.result.wipe_tower_bounds.include(after[0], after[1], after[2]);
            self.leaving_wipe_tower = true;
        } else {
            if !self.leaving_wipe_tower {
                self.result.model_bounds.include(before[0], before[1], after[2]);
            }
            self.result.model_bounds.include(after[0], after[1], after[2]);
            self.leaving_wipe_tower = false;
        }

        if self.state.in_infill {
            self.infill_since_transition += self.state.trackers.extrusion.last_extrusion;
        }

        if command.is_linear_move() {
            if let Some(index) = self.awaiting_lookahead.take() {
                if let Some(lookahead) = self.result.side_lookahead.get_mut(index) {
                    lookahead.next = Some([before[0], before[1], after[2]]);
                }
            }
        }

        if self.state.in_wipe_tower
            && self.palette.transition_method == TransitionMethod::SlicerTower
        {
            let position = self.state.filament_position();
            if let Some(event) = self.state.ping.update(position, true) {
                self.record_ping(event);
            }
        }
    }

    /// Walk an inserted purge move by move, the way the output pass feeds
    /// the ping machine.
    ///
    /// Built-in side transitions are replayed exactly. Tower segments and
    /// scripted purges are walked in fixed steps, so their pings are only
    /// estimates.
    fn predict_purge_pings(&mut self, start: f32, purge_length: f32) {
        let end = start + purge_length;
        let side_steps = match self.palette.transition_method {
            TransitionMethod::SideTransitions => {
                side_transitions::purge_steps(&self.palette.side_transitions, purge_length)
            }
            _ => None,
        };
        let gated = side_steps.is_some();
        let steps = side_steps.unwrap_or_else(|| fixed_steps(purge_length));

        let mut position = start;
        for step in steps {
            position += step;
            let may_start = !gated || end - position >= ACCESSORY_PING_EXTRUSION;
            if let Some(event) = self.state.ping.update(position, may_start) {
                self.record_ping(event);
            }
        }
        self.state.ping.region_ended(end);
    }

    fn record_ping(&mut self, event: PingEvent) {
        match event {
            PingEvent::Connected { position } => self.result.ping_starts.push(position),
            PingEvent::Complete { start, .. } => self.result.ping_starts.push(start),
            PingEvent::Begin { .. } => {}
        }
    }
}

fn fixed_steps(purge_length: f32) -> Vec<f32> {
    let mut steps = Vec::new();
    let mut remaining = purge_length;
    while remaining > 1e-4 {
        let step = remaining.min(IN_PLACE_PURGE_STEP);
        steps.push(step);
        remaining -= step;
    }
    steps
}

fn validate_layers(result: &PreflightResult) -> std::result::Result<(), LayerError> {
    if result.layers.is_empty() && !result.transitions.is_empty() {
        return Err(LayerError::ZeroThickness { layer: 0 });
    }
    for (layer, info) in result.layers.iter().enumerate() {
        if info.thickness <= 0.0 {
            return Err(LayerError::ZeroThickness { layer });
        }
        if info.top_z <= 0.0 {
            return Err(LayerError::ZeroTopZ { layer });
        }
        if info.object_starts != info.object_ends {
            return Err(LayerError::UnbalancedObjects {
                layer,
                starts: info.object_starts,
                ends: info.object_ends,
            });
        }
    }
    Ok(())
}

/// Run the first pass over a stream
pub fn preflight<R: BufRead>(reader: R, palette: &Palette) -> Result<PreflightResult> {
    let mut scanner = PreflightScanner::new(palette);
    let lines = for_each_line(reader, |line_no, line| scanner.scan_line(line_no, line))?;
    tracing::debug!("Preflight read {} lines", lines);
    scanner.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use splicekit_core::{Error, GcodeError, Material, PingMode};

    fn palette(method: TransitionMethod) -> Palette {
        Palette {
            materials: vec![
                Some(Material::new("a", 1, "A", "ff0000")),
                Some(Material::new("b", 2, "B", "00ff00")),
                Some(Material::new("c", 3, "C", "0000ff")),
            ],
            transition_lengths: vec![vec![30.0; 4]; 4],
            transition_method: method,
            ..Palette::default()
        }
    }

    fn scan(gcode: &str, palette: &Palette) -> Result<PreflightResult> {
        preflight(gcode.as_bytes(), palette)
    }

    #[test]
    fn test_transitions_and_drives() {
        let gcode = "M83\nT0\nG1 X10 E200\nT1\nG1 X20 E80\nT1\nT2\nG1 X30 E90\n";
        let result = scan(gcode, &palette(TransitionMethod::SlicerTower)).unwrap();

        assert_eq!(result.initial_tool, Some(0));
        assert_eq!(result.drives_used, BTreeSet::from([0, 1, 2]));
        assert_eq!(result.transitions.len(), 2);
        assert_eq!(result.transitions[0].line, 4);
        assert_eq!(result.transitions[1].from, 1);
        assert_eq!(result.transitions[1].total_extrusion, 280.0);
        // no inserted purge in slicer tower mode
        assert_eq!(result.transitions[1].splice_length, 310.0);
        assert_eq!(result.total_extrusion, 370.0);
        assert!(result.side_lookahead.is_empty());
    }

    #[test]
    fn test_first_piece_minimum_tops_up_purge() {
        let gcode = "M83\nT0\nG1 X10 E40\nT1\nG1 X20 E100\n";
        let result = scan(gcode, &palette(TransitionMethod::SlicerTower)).unwrap();
        let transition = &result.transitions[0];
        // Palette 2 requires 100 mm for the first piece
        assert_eq!(transition.purge_length, 60.0);
        assert_eq!(transition.splice_length, 100.0);
    }

    #[test]
    fn test_usable_infill_reduces_purge() {
        let mut palette = palette(TransitionMethod::CustomTower);
        palette.use_infill_for_transitions = true;
        let gcode = "\
M83
;LAYER_CHANGE
;Z:0.2
;HEIGHT:0.2
T0
;TYPE:Perimeter
G1 X10 E150
;TYPE:Internal infill
G1 X20 E12
T1
;TYPE:Internal infill
G1 X30 E100
T0
G1 X40 E100
";
        let result = scan(gcode, &palette).unwrap();
        assert_eq!(result.transitions[0].usable_infill, 12.0);
        assert_eq!(result.transitions[0].purge_length, 18.0);
        // infill is capped at the transition length
        assert_eq!(result.transitions[1].usable_infill, 30.0);
        assert_eq!(result.transitions[1].purge_length, 0.0);
        assert_eq!(result.layer_loads()[0].purge_lengths, vec![18.0, 0.0]);
    }

    #[test]
    fn test_unknown_tool() {
        let mut palette = palette(TransitionMethod::SlicerTower);
        palette.materials[1] = None;
        let err = scan("T0\nG1 X1 E5\nT1\n", &palette).unwrap_err();
        assert!(matches!(
            err,
            Error::Gcode(GcodeError::UnknownTool { tool: 1, line: 3 })
        ));
    }

    #[test]
    fn test_start_marker_gates_tools() {
        let mut palette = palette(TransitionMethod::SlicerTower);
        palette.print.start_marker = Some(";PRINT_START".to_string());
        let gcode = "M83\nT2\nG1 X5 E3\n;PRINT_START\nT1\nG1 X10 E200\nT0\n";
        let result = scan(gcode, &palette).unwrap();
        assert_eq!(result.initial_tool, Some(1));
        assert_eq!(result.transitions.len(), 1);
        assert_eq!(result.transitions[0].total_extrusion, 203.0);
        assert!(!result.drives_used.contains(&2));
    }

    #[test]
    fn test_layer_bookkeeping() {
        let gcode = "\
;LAYER_CHANGE
;Z:0.2
;HEIGHT:0.2
; printing object cube
; stop printing object cube
;LAYER_CHANGE
;Z:0.400001
;HEIGHT:0.15
;HEIGHT:0.2
; filament used [mm] = 12.5
; filament used [g] = 0.1
; estimated printing time (normal mode) = 1h 2m 3s
";
        let result = scan(gcode, &palette(TransitionMethod::CustomTower)).unwrap();
        assert_eq!(result.layer_count, 2);
        assert_eq!(result.layers[1].top_z, 0.4);
        assert_eq!(result.layers[1].thickness, 0.2);
        assert_eq!(result.layers[0].object_starts, 1);
        assert_eq!(result.summary_line, Some(10));
        assert_eq!(result.time_estimate, Some(3723));
    }

    #[test]
    fn test_custom_tower_layer_validation() {
        let tower_palette = palette(TransitionMethod::CustomTower);

        let err = scan(";LAYER_CHANGE\n;Z:0.2\n", &tower_palette).unwrap_err();
        assert!(matches!(err, Error::Layer(LayerError::ZeroThickness { layer: 0 })));

        let err = scan(";LAYER_CHANGE\n;HEIGHT:0.2\n", &tower_palette).unwrap_err();
        assert!(matches!(err, Error::Layer(LayerError::ZeroTopZ { layer: 0 })));

        let gcode = ";LAYER_CHANGE\n;Z:0.2\n;HEIGHT:0.2\n;LAYER_CHANGE\n;Z:0.4\n;HEIGHT:0.2\n; printing object a\n";
        let err = scan(gcode, &tower_palette).unwrap_err();
        assert!(matches!(
            err,
            Error::Layer(LayerError::UnbalancedObjects {
                layer: 1,
                starts: 1,
                ends: 0
            })
        ));

        // the same stream is fine when the slicer's tower is used
        assert!(scan(gcode, &palette(TransitionMethod::SlicerTower)).is_ok());
    }

    #[test]
    fn test_side_lookahead() {
        let gcode = "\
G90
M83
T0
G1 X10 Y10 Z0.2 E150
T1
G0 X50 Y60
G1 X55 Y60 E0
G1 X60 Y60 Z0.2 E5
T0
";
        let result = scan(gcode, &palette(TransitionMethod::SideTransitions)).unwrap();
        assert_eq!(result.side_lookahead.len(), 2);
        assert_eq!(result.side_lookahead[0].current, [10.0, 10.0, 0.2]);
        assert_eq!(result.side_lookahead[0].next, Some([55.0, 60.0, 0.2]));
        assert_eq!(result.side_lookahead[1].next, None);
        assert_eq!(result.side_lookahead[1].resume(), [60.0, 60.0, 0.2]);
    }

    #[test]
    fn test_wipe_tower_pings_and_bounds() {
        let mut palette = palette(TransitionMethod::SlicerTower);
        palette.palette_type = splicekit_core::PaletteType::Palette3;
        palette.connected_mode = true;
        assert_eq!(palette.ping_mode(), PingMode::Connected);

        let gcode = "\
M83
T0
;TYPE:Perimeter
G1 X10 Y10 E340
;TYPE:Wipe tower
G1 X200 Y200 E5
G1 X201 Y200 E10
;TYPE:Perimeter
G1 X20 Y20 E5
";
        let result = scan(gcode, &palette).unwrap();
        assert_eq!(result.ping_starts, vec![355.0]);
        let tower = result.wipe_tower_bounds.extent().unwrap();
        assert_eq!(tower.min[0], 200.0);
        let model = result.model_bounds.extent().unwrap();
        assert_eq!(model.max[0], 20.0);
    }

    #[test]
    fn test_accessory_ping_cut_short_is_discarded() {
        let palette = palette(TransitionMethod::SlicerTower);
        let gcode = "\
M83
T0
G1 X10 E350
;TYPE:Wipe tower
G1 X200 E10
;TYPE:Perimeter
G1 X10 E10
;TYPE:Wipe tower
G1 X200 E10
G1 X201 E25
";
        let result = scan(gcode, &palette).unwrap();
        assert_eq!(result.ping_starts, vec![380.0]);
    }

    #[test]
    fn test_result_serializes() {
        let gcode = "M83\nT0\nG1 X10 E200\nT1\nG1 X20 E80\n";
        let result = scan(gcode, &palette(TransitionMethod::SlicerTower)).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: PreflightResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
