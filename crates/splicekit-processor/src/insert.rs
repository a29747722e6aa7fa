//! Writing synthesized purge sequences into the output stream
//!
//! Tower segments and side transitions are emitted through an
//! [`Insertion`]. Every line it writes is tracked like a line read from the
//! input, so the filament coordinate the ledger uses stays live. The purge
//! body is wrapped so the stream's own extrusion state survives:
//!
//! - absolute E is reset with `G92 E0` and restored afterwards
//! - any pending retraction is undone before purging and redone after
//! - the feedrate in effect before the insertion is restored

use std::io::Write;

use splicekit_core::constants::{ACCESSORY_PING_EXTRUSION, EOL};
use splicekit_core::{PingError, Result};
use splicekit_gcode::{format_number, parse_line};
use splicekit_msf::Msf;

use crate::state::RuntimeState;

/// A move in a synthesized sequence
#[derive(Debug, Clone, PartialEq)]
pub enum InsertMove {
    /// Non-extruding move; absent axes stay where they are
    Travel {
        x: Option<f32>,
        y: Option<f32>,
        z: Option<f32>,
        feedrate: f32,
    },
    /// Extruding move; without a target the filament is pushed in place
    Extrude {
        to: Option<(f32, f32)>,
        extrusion: f32,
        feedrate: f32,
    },
    /// Pre-rendered G-code, one line
    Raw(String),
}

impl InsertMove {
    pub fn travel_xy(x: f32, y: f32, feedrate: f32) -> Self {
        Self::Travel {
            x: Some(x),
            y: Some(y),
            z: None,
            feedrate,
        }
    }

    pub fn travel_z(z: f32, feedrate: f32) -> Self {
        Self::Travel {
            x: None,
            y: None,
            z: Some(z),
            feedrate,
        }
    }
}

/// What kind of region the purge body is, for ping handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Generated tower; an unfinished ping is dropped
    Tower,
    /// Side transition; an unfinished ping cannot be recovered
    SideTransition,
}

/// When a new ping may start inside the purge body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingGate {
    /// Whenever one is due
    Always,
    /// Only while the rest of a purge of this length can complete it
    Covering { purge_length: f32 },
}

/// One synthesized sequence being written
pub struct Insertion<'a, W: Write> {
    out: &'a mut W,
    state: &'a mut RuntimeState,
    ledger: &'a mut Msf,
    region: Region,
    saved_position: f32,
    saved_feedrate: f32,
    absolute: bool,
    retraction: f32,
    purge_end: Option<f32>,
    purging: bool,
}

impl<'a, W: Write> Insertion<'a, W> {
    pub fn new(
        out: &'a mut W,
        state: &'a mut RuntimeState,
        ledger: &'a mut Msf,
        region: Region,
    ) -> Self {
        let saved_position = state.trackers.extrusion.current_position;
        let saved_feedrate = state.trackers.position.f;
        let absolute = !state.trackers.extrusion.relative;
        Self {
            out,
            state,
            ledger,
            region,
            saved_position,
            saved_feedrate,
            absolute,
            retraction: 0.0,
            purge_end: None,
            purging: false,
        }
    }

    /// Write a complete sequence: `pre`, the purge body, then `post`
    pub fn run(
        mut self,
        pre: &[InsertMove],
        body: &[InsertMove],
        post: &[InsertMove],
        gate: PingGate,
    ) -> Result<()> {
        for mv in pre {
            self.emit(mv)?;
        }
        self.begin_purge(gate)?;
        for mv in body {
            self.emit(mv)?;
        }
        self.end_purge()?;
        for mv in post {
            self.emit(mv)?;
        }
        self.finish()
    }

    fn begin_purge(&mut self, gate: PingGate) -> Result<()> {
        if self.absolute {
            self.write_line("G92 E0")?;
        }
        self.purge_end = match gate {
            PingGate::Always => None,
            PingGate::Covering { purge_length } => {
                Some(self.state.filament_position() + purge_length)
            }
        };

        self.retraction = self.state.trackers.extrusion.retraction;
        if self.retraction > 0.0 {
            let line = format!("G1 E{}", self.e_value(self.retraction));
            self.write_line(&line)?;
        }
        self.purging = true;
        Ok(())
    }

    fn end_purge(&mut self) -> Result<()> {
        self.purging = false;
        if self.retraction > 0.0 {
            let line = format!("G1 E{}", self.e_value(-self.retraction));
            self.write_line(&line)?;
        }

        let position = self.state.filament_position();
        if let Some(pending) = self.state.ping.region_ended(position) {
            match self.region {
                Region::Tower => tracing::debug!(
                    "Tower segment ended before ping at {:.2} mm completed; cancelled",
                    pending.start
                ),
                Region::SideTransition => {
                    return Err(PingError::IncompleteDuringSideTransition {
                        start: pending.start,
                        remaining: pending.remaining,
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if self.absolute {
            let line = format!("G92 E{}", format_number(self.saved_position as f64));
            self.write_line(&line)?;
        }
        if self.saved_feedrate > 0.0 {
            let line = format!("G1 F{}", format_number(self.saved_feedrate as f64));
            self.write_line(&line)?;
        }
        Ok(())
    }

    fn emit(&mut self, mv: &InsertMove) -> Result<()> {
        match mv {
            InsertMove::Travel { x, y, z, feedrate } => {
                let mut line = String::from("G0");
                for (axis, value) in [('X', x), ('Y', y), ('Z', z)] {
                    if let Some(value) = value {
                        line.push_str(&format!(" {}{}", axis, format_number(*value as f64)));
                    }
                }
                line.push_str(&format!(" F{}", format_number(*feedrate as f64)));
                self.write_line(&line)
            }
            InsertMove::Extrude {
                to,
                extrusion,
                feedrate,
            } => {
                let mut line = String::from("G1");
                if let Some((x, y)) = to {
                    line.push_str(&format!(
                        " X{} Y{}",
                        format_number(*x as f64),
                        format_number(*y as f64)
                    ));
                }
                line.push_str(&format!(
                    " E{} F{}",
                    self.e_value(*extrusion),
                    format_number(*feedrate as f64)
                ));
                self.write_line(&line)
            }
            InsertMove::Raw(text) => self.write_line(text),
        }
    }

    /// E parameter for a filament delta in the stream's extrusion mode
    fn e_value(&self, delta: f32) -> String {
        let value = if self.absolute {
            self.state.trackers.extrusion.current_position + delta
        } else {
            delta
        };
        format_number(value as f64)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        write!(self.out, "{}{}", line, EOL)?;
        let command = parse_line(line);
        self.state.track(&command);

        if self.purging && command.is_motion() && self.state.last_move_extruded() {
            let position = self.state.filament_position();
            let may_start = self
                .purge_end
                .map_or(true, |end| end - position >= ACCESSORY_PING_EXTRUSION);
            if let Some(event) = self.state.ping.update(position, may_start) {
                write!(self.out, "{}{}", event.gcode(), EOL)?;
                event.record(self.ledger);
            }
        }
        Ok(())
    }
}
