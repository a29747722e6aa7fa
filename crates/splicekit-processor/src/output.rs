//! Output compositor
//!
//! The second pass. It replays the stream preflight read, passing most lines
//! through and substituting at a handful of points:
//!
//! - the print start switches the printer to the primer tool, and every
//!   later tool command is consumed
//! - a tool change registers its splice and purges into the generated
//!   tower or off to the side, depending on the transition method
//! - a layer change prints what is left of the current tower layer
//! - the slicer's filament summary is replaced by one built from the
//!   finalized ledger
//!
//! Pings are fired inside the slicer's wipe tower, generated tower segments
//! and side-transition purges.

use std::io::{BufRead, Write};
use std::sync::Arc;

use splicekit_core::constants::EOL;
use splicekit_core::{GcodeError, Palette, Result, TransitionMethod};
use splicekit_gcode::{for_each_line, parse_line, GcodeCommand, SlicerHint};
use splicekit_msf::Msf;
use splicekit_tower::{Tower, TowerCursor, TowerMove};

use crate::insert::{InsertMove, Insertion, PingGate, Region};
use crate::preflight::PreflightResult;
use crate::side_transitions::{self, SideContext, SideScripts};
use crate::state::RuntimeState;
use crate::summary::summary_lines;
use crate::transition::{SideLookahead, Transition};

/// Second-pass state
pub struct Compositor<'a> {
    palette: Arc<Palette>,
    preflight: &'a PreflightResult,
    scripts: &'a SideScripts,
    state: RuntimeState,
    ledger: Msf,
    tower: Option<TowerCursor>,
}

impl<'a> Compositor<'a> {
    pub fn new(
        palette: Arc<Palette>,
        preflight: &'a PreflightResult,
        tower: Option<Tower>,
        scripts: &'a SideScripts,
    ) -> Self {
        Self {
            state: RuntimeState::new(&palette),
            ledger: Msf::new(palette.clone()),
            tower: tower.map(TowerCursor::new),
            palette,
            preflight,
            scripts,
        }
    }

    /// Process one input line (1-based line number)
    pub fn process_line<W: Write>(&mut self, out: &mut W, line_no: usize, line: &str) -> Result<()> {
        let command = parse_line(line);
        let hint = SlicerHint::from_command(&command);

        if hint == Some(SlicerHint::FilamentUsed) {
            if !self.ledger.is_finalized() {
                self.finalize(out)?;
            }
            return Ok(());
        }

        if hint == Some(SlicerHint::LayerChange) && self.state.started {
            self.finish_tower_layer(out)?;
        }

        let was_in_wipe_tower = self.state.in_wipe_tower;
        if let Some(hint) = &hint {
            self.state.apply_hint(hint);
        }
        if was_in_wipe_tower && !self.state.in_wipe_tower {
            let position = self.state.filament_position();
            if let Some(pending) = self.state.ping.region_ended(position) {
                tracing::debug!(
                    "Wipe tower ended before ping at {:.2} mm completed; cancelled",
                    pending.start
                );
            }
        }

        if !self.state.started {
            self.pass_through(out, line, &command)?;
            if self.state.is_start_marker(&self.palette, line) {
                self.state.started = true;
                self.write_primer(out)?;
            }
            return Ok(());
        }

        if let Some(tool) = command.tool() {
            return self.tool_change(out, tool, line_no);
        }

        self.pass_through(out, line, &command)?;

        if self.palette.transition_method == TransitionMethod::SlicerTower
            && self.state.in_wipe_tower
            && command.is_motion()
            && self.state.last_move_extruded()
        {
            let position = self.state.filament_position();
            if let Some(event) = self.state.ping.update(position, true) {
                write!(out, "{}{}", event.gcode(), EOL)?;
                event.record(&mut self.ledger);
            }
        }
        Ok(())
    }

    /// Close the pass and hand back the finalized ledger
    pub fn finish<W: Write>(mut self, out: &mut W) -> Result<Msf> {
        if !self.ledger.is_finalized() {
            self.finalize(out)?;
        }
        if self.state.transition_index != self.preflight.transitions.len() {
            tracing::warn!(
                "Output pass saw {} of {} preflight transitions",
                self.state.transition_index,
                self.preflight.transitions.len()
            );
        }
        if let Some(cursor) = &self.tower {
            if !cursor.is_finished() {
                tracing::debug!(
                    "{} of {} tower layers printed",
                    cursor.completed_layers(),
                    cursor.tower().layer_count()
                );
            }
        }
        Ok(self.ledger)
    }

    fn pass_through<W: Write>(&mut self, out: &mut W, line: &str, command: &GcodeCommand) -> Result<()> {
        write!(out, "{}{}", line, EOL)?;
        self.state.track(command);
        Ok(())
    }

    fn write_primer<W: Write>(&mut self, out: &mut W) -> Result<()> {
        write!(out, "T{}{}", self.palette.print.primer_tool, EOL)?;
        Ok(())
    }

    fn tool_change<W: Write>(&mut self, out: &mut W, tool: u32, line_no: usize) -> Result<()> {
        let to = RuntimeState::resolve_tool(&self.palette, tool, line_no)?;
        match self.state.current_tool {
            None => {
                self.state.current_tool = Some(to);
                if self.palette.print.start_marker.is_none() {
                    self.write_primer(out)?;
                }
                Ok(())
            }
            Some(from) if from == to => Ok(()),
            Some(from) => self.transition(out, from, to, line_no),
        }
    }

    fn transition<W: Write>(&mut self, out: &mut W, from: usize, to: usize, line_no: usize) -> Result<()> {
        let index = self.state.transition_index;
        let transition = self
            .preflight
            .transition(index)
            .filter(|t| t.from == from && t.to == to)
            .cloned()
            .ok_or(GcodeError::UnexpectedTransition { line: line_no })?;
        self.state.transition_index += 1;

        let splice = self.state.filament_position() + transition.purge_length;
        self.ledger.add_splice(from, splice)?;
        self.state.current_tool = Some(to);

        match self.palette.transition_method {
            TransitionMethod::SlicerTower => Ok(()),
            TransitionMethod::CustomTower => self.purge_into_tower(out, &transition),
            TransitionMethod::SideTransitions => self.side_transition(out, index, &transition),
        }
    }

    fn purge_into_tower<W: Write>(&mut self, out: &mut W, transition: &Transition) -> Result<()> {
        if transition.purge_length <= 0.0 {
            return Ok(());
        }
        let print_feedrate = self.palette.tower.print_feedrate;

        let Some(cursor) = self.tower.as_mut() else {
            tracing::warn!(
                "No tower to purge transition at line {} into; purging in place",
                transition.line
            );
            let body = [InsertMove::Extrude {
                to: None,
                extrusion: transition.purge_length,
                feedrate: print_feedrate,
            }];
            return Insertion::new(out, &mut self.state, &mut self.ledger, Region::Tower)
                .run(&[], &body, &[], PingGate::Always);
        };

        cursor.begin_layer(transition.layer)?;
        let resume = cursor.position();
        let consumed = cursor.consume(transition.purge_length);

        let mut body = self.tower_moves(&consumed.moves);
        if consumed.shortfall > 0.0 {
            tracing::warn!(
                "Tower layer {} ran out of path; extruding {:.2} mm in place",
                transition.layer,
                consumed.shortfall
            );
            body.push(InsertMove::Extrude {
                to: None,
                extrusion: consumed.shortfall,
                feedrate: print_feedrate,
            });
        }

        let mut pre = Vec::new();
        if let Some(point) = resume.filter(|_| consumed.moves.first().is_some_and(|m| !m.is_travel())) {
            pre.push(InsertMove::travel_xy(point.x, point.y, self.palette.print.travel_feedrate));
        }
        self.write_tower_segment(out, &pre, &body)
    }

    /// Print whatever is left of the current tower layer before the model
    /// moves up
    fn finish_tower_layer<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let (Some(layer), Some(cursor)) = (self.state.layer, self.tower.as_mut()) else {
            return Ok(());
        };
        let moves = cursor.finish_layer(layer)?;
        if moves.is_empty() {
            return Ok(());
        }
        tracing::debug!("Printing remainder of tower layer {}", layer);
        let body = self.tower_moves(&moves);
        self.write_tower_segment(out, &[], &body)
    }

    fn tower_moves(&self, moves: &[TowerMove]) -> Vec<InsertMove> {
        let travel = self.palette.print.travel_feedrate;
        let print = self.palette.tower.print_feedrate;
        moves
            .iter()
            .map(|m| {
                if m.is_travel() {
                    InsertMove::travel_xy(m.to.x, m.to.y, travel)
                } else {
                    InsertMove::Extrude {
                        to: Some((m.to.x, m.to.y)),
                        extrusion: m.extrusion,
                        feedrate: print,
                    }
                }
            })
            .collect()
    }

    /// Tower moves, returning to where the model left off
    fn write_tower_segment<W: Write>(&mut self, out: &mut W, pre: &[InsertMove], body: &[InsertMove]) -> Result<()> {
        let [x, y, _] = self.state.xyz();
        let back = [InsertMove::travel_xy(x, y, self.palette.print.travel_feedrate)];
        Insertion::new(out, &mut self.state, &mut self.ledger, Region::Tower).run(
            pre,
            body,
            &back,
            PingGate::Always,
        )
    }

    fn side_transition<W: Write>(&mut self, out: &mut W, index: usize, transition: &Transition) -> Result<()> {
        let current = self.state.xyz();
        let lookahead = self
            .preflight
            .lookahead(index)
            .copied()
            .unwrap_or(SideLookahead {
                current,
                next: None,
            });
        let temperature = &self.state.trackers.temperature;
        let ctx = SideContext {
            layer: self.state.layer_index(),
            current,
            next: lookahead.next.unwrap_or(current),
            print_temperature: temperature.extruder,
            bed_temperature: temperature.bed,
            purge_length: transition.purge_length,
            model_bounds: &self.preflight.model_bounds,
            travel_feedrate: self.palette.print.travel_feedrate,
        };
        let plan = side_transitions::plan(&self.palette.side_transitions, self.scripts, &ctx)?;

        Insertion::new(out, &mut self.state, &mut self.ledger, Region::SideTransition).run(
            &plan.pre,
            &plan.body,
            &plan.post,
            plan.gate,
        )
    }

    /// Close the ledger and write the recomputed summary
    fn finalize<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let drive = self
            .state
            .current_tool
            .or(self.preflight.initial_tool)
            .unwrap_or(0);
        self.ledger
            .add_last_splice(drive, self.state.filament_position())?;

        for line in summary_lines(&self.ledger, self.preflight) {
            write!(out, "{}{}", line, EOL)?;
        }
        tracing::info!(
            "Ledger finalized: {} splices, {} pings, {:.2} mm of filament",
            self.ledger.splices().len(),
            self.ledger.pings().len(),
            self.ledger.total_filament_length()
        );
        Ok(())
    }
}

/// Run the second pass over a stream, writing the rewritten G-code to `out`
pub fn compose<R: BufRead, W: Write>(
    reader: R,
    out: &mut W,
    palette: Arc<Palette>,
    preflight: &PreflightResult,
    tower: Option<Tower>,
    scripts: &SideScripts,
) -> Result<Msf> {
    let mut compositor = Compositor::new(palette, preflight, tower, scripts);
    for_each_line(reader, |line_no, line| {
        compositor.process_line(out, line_no, line)
    })?;
    compositor.finish(out)
}
