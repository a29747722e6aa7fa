//! Splice and ping ledger
//!
//! The ledger is append-only. Every splice is validated against the piece
//! length minimums when it is added; a violating splice fails the run rather
//! than being moved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use splicekit_core::constants::{FINAL_SEGMENT_BUFFER, SPLICE_MIN_LENGTH};
use splicekit_core::{LedgerError, Palette, PieceKind, Result, SpliceError};

/// Slack for positions rebuilt from G-code written at five decimals (mm)
const LENGTH_TOLERANCE: f32 = 1e-3;

/// A splice point: the drive feeding the piece that ends here, and the
/// cumulative filament length at the splice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Splice {
    pub drive: usize,
    pub length: f32,
}

/// A ping: filament position at its start and, for accessory pings, the
/// extrusion between its two pauses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub start: f32,
    pub extrusion: Option<f32>,
}

/// Splice/ping ledger for one conversion
#[derive(Debug, Clone)]
pub struct Msf {
    palette: Arc<Palette>,
    splices: Vec<Splice>,
    pings: Vec<Ping>,
    drives_used: BTreeSet<usize>,
    finalized: bool,
}

impl Msf {
    /// Create an empty ledger
    pub fn new(palette: Arc<Palette>) -> Self {
        Self {
            palette,
            splices: Vec::new(),
            pings: Vec::new(),
            drives_used: BTreeSet::new(),
            finalized: false,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn splices(&self) -> &[Splice] {
        &self.splices
    }

    pub fn pings(&self) -> &[Ping] {
        &self.pings
    }

    /// Drives that appear in the splice list, ascending
    pub fn drives_used(&self) -> &BTreeSet<usize> {
        &self.drives_used
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Length of the last splice, or 0 for an empty ledger
    pub fn last_splice_length(&self) -> f32 {
        self.splices.last().map(|s| s.length).unwrap_or(0.0)
    }

    /// Minimum length of the next piece
    fn next_piece_minimum(&self) -> (PieceKind, f32) {
        if self.splices.is_empty() {
            (
                PieceKind::First,
                self.palette.palette_type.first_piece_min_length(),
            )
        } else {
            (PieceKind::Later, SPLICE_MIN_LENGTH)
        }
    }

    fn check_drive(&self, drive: usize) -> Result<()> {
        if self.finalized {
            return Err(LedgerError::AlreadyFinalized.into());
        }
        if drive >= self.palette.drive_count() {
            return Err(LedgerError::UnknownDrive { drive }.into());
        }
        Ok(())
    }

    /// Append a splice, failing if the new piece is shorter than allowed
    pub fn add_splice(&mut self, drive: usize, length: f32) -> Result<()> {
        self.check_drive(drive)?;

        let (kind, required) = self.next_piece_minimum();
        let piece = self.splices.len() + 1;
        let actual = length - self.last_splice_length();
        if !actual.is_finite() || actual < required - LENGTH_TOLERANCE {
            return Err(SpliceError {
                kind,
                piece,
                actual,
                required,
            }
            .into());
        }

        tracing::debug!("Splice {}: drive {} at {:.2} mm", piece, drive, length);
        self.splices.push(Splice { drive, length });
        self.drives_used.insert(drive);
        Ok(())
    }

    /// Close the ledger with the final piece.
    ///
    /// The final segment is buffered, topped up to the piece minimum, extended
    /// by the tube length between splicer and extruder, and the total is
    /// clamped up to the smallest length the hardware accepts.
    pub fn add_last_splice(&mut self, drive: usize, final_length: f32) -> Result<()> {
        self.check_drive(drive)?;

        let (_, minimum) = self.next_piece_minimum();
        let last = self.last_splice_length();
        let segment = ((final_length - last) * FINAL_SEGMENT_BUFFER).max(minimum);
        let length = (last + segment + self.palette.palette_type.bowden_length())
            .max(self.palette.minimum_total_length());

        tracing::debug!(
            "Final splice: drive {} at {:.2} mm ({:.2} mm of print)",
            drive,
            length,
            final_length
        );
        self.splices.push(Splice { drive, length });
        self.drives_used.insert(drive);
        self.finalized = true;
        Ok(())
    }

    /// Record a ping
    pub fn add_ping(&mut self, start: f32, extrusion: Option<f32>) {
        self.pings.push(Ping { start, extrusion });
    }

    /// Filament each drive contributes, indexed by drive
    pub fn filament_lengths_by_drive(&self) -> Vec<f32> {
        let mut lengths = vec![0.0; self.palette.drive_count()];
        let mut previous = 0.0;
        for splice in &self.splices {
            lengths[splice.drive] += splice.length - previous;
            previous = splice.length;
        }
        lengths
    }

    /// Total filament length of the program
    pub fn total_filament_length(&self) -> f32 {
        self.last_splice_length()
    }

    /// Material index per drive for used drives, 0 elsewhere
    pub fn drive_material_indexes(&self) -> Vec<u8> {
        (0..self.palette.drive_count())
            .map(|drive| {
                if self.drives_used.contains(&drive) {
                    self.palette.material_index(drive)
                } else {
                    0
                }
            })
            .collect()
    }

    pub(crate) fn require_finalized(&self) -> Result<()> {
        if self.finalized {
            Ok(())
        } else {
            Err(LedgerError::NotFinalized.into())
        }
    }
}
