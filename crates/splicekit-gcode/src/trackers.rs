//! Per-axis state trackers
//!
//! Every line of both passes is fed to all three trackers; the passes only
//! read the plain fields afterwards.

use super::GcodeCommand;

/// Consumes commands and updates accumulated machine state
pub trait Tracker {
    fn track_instruction(&mut self, command: &GcodeCommand);
}

/// Extruder axis state
///
/// `total_extrusion` only ever grows: retractions are tracked separately as
/// `retraction` and the matching unretraction is not counted again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrusionTracker {
    /// E values are relative (M83)
    pub relative: bool,
    /// E coordinate as the printer sees it
    pub current_position: f32,
    /// Net filament pushed through the nozzle so far (mm)
    pub total_extrusion: f32,
    /// Current retraction depth (mm)
    pub retraction: f32,
    /// E delta of the last move
    pub last_delta: f32,
    /// Filament counted by the last move (mm)
    pub last_extrusion: f32,
}

impl Tracker for ExtrusionTracker {
    fn track_instruction(&mut self, command: &GcodeCommand) {
        match command.mnemonic.as_str() {
            "M82" | "G90" => self.relative = false,
            "M83" | "G91" => self.relative = true,
            "G92" => {
                if let Some(e) = command.param('e') {
                    self.current_position = e;
                }
            }
            _ if command.is_motion() => {
                let Some(e) = command.param('e') else {
                    self.last_delta = 0.0;
                    self.last_extrusion = 0.0;
                    return;
                };
                let delta = if self.relative {
                    e
                } else {
                    e - self.current_position
                };
                self.current_position = if self.relative {
                    self.current_position + e
                } else {
                    e
                };
                self.apply_delta(delta);
            }
            _ => {}
        }
    }
}

impl ExtrusionTracker {
    fn apply_delta(&mut self, delta: f32) {
        self.last_delta = delta;
        self.last_extrusion = 0.0;

        if delta < 0.0 {
            self.retraction -= delta;
            return;
        }

        let unretract = delta.min(self.retraction);
        self.retraction -= unretract;
        let extruded = delta - unretract;
        self.total_extrusion += extruded;
        self.last_extrusion = extruded;
    }

    /// Whether the last move pushed filament through the nozzle
    pub fn last_move_extruded(&self) -> bool {
        self.last_extrusion > 0.0
    }
}

/// Nozzle position and feedrate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTracker {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Last feedrate (mm/min)
    pub f: f32,
    /// Coordinates are relative (G91)
    pub relative: bool,
}

impl Tracker for PositionTracker {
    fn track_instruction(&mut self, command: &GcodeCommand) {
        match command.mnemonic.as_str() {
            "G90" => self.relative = false,
            "G91" => self.relative = true,
            "G92" => {
                if let Some(x) = command.param('x') {
                    self.x = x;
                }
                if let Some(y) = command.param('y') {
                    self.y = y;
                }
                if let Some(z) = command.param('z') {
                    self.z = z;
                }
            }
            "G28" => {
                let all = !command.has('x') && !command.has('y') && !command.has('z');
                if all || command.has('x') {
                    self.x = 0.0;
                }
                if all || command.has('y') {
                    self.y = 0.0;
                }
                if all || command.has('z') {
                    self.z = 0.0;
                }
            }
            _ if command.is_motion() => {
                let relative = self.relative;
                let apply = |current: &mut f32, value: Option<f32>| {
                    if let Some(value) = value {
                        *current = if relative { *current + value } else { value };
                    }
                };
                apply(&mut self.x, command.param('x'));
                apply(&mut self.y, command.param('y'));
                apply(&mut self.z, command.param('z'));
                if let Some(f) = command.param('f') {
                    self.f = f;
                }
            }
            _ => {}
        }
    }
}

/// Temperature setpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureTracker {
    /// Extruder setpoint (°C)
    pub extruder: f32,
    /// Bed setpoint (°C)
    pub bed: f32,
}

impl Tracker for TemperatureTracker {
    fn track_instruction(&mut self, command: &GcodeCommand) {
        let target = || command.param('s').or_else(|| command.param('r'));
        match command.mnemonic.as_str() {
            "M104" | "M109" => {
                if let Some(t) = target() {
                    self.extruder = t;
                }
            }
            "M140" | "M190" => {
                if let Some(t) = target() {
                    self.bed = t;
                }
            }
            _ => {}
        }
    }
}

/// The three trackers fed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trackers {
    pub extrusion: ExtrusionTracker,
    pub position: PositionTracker,
    pub temperature: TemperatureTracker,
}

impl Tracker for Trackers {
    fn track_instruction(&mut self, command: &GcodeCommand) {
        self.extrusion.track_instruction(command);
        self.position.track_instruction(command);
        self.temperature.track_instruction(command);
    }
}
