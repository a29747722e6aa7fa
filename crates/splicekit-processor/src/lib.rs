//! # SpliceKit Processor
//!
//! Two-pass conversion of a single-extruder multi-material print into one a
//! Palette splicer can feed:
//!
//! 1. Preflight reads the whole stream once, scheduling every transition and
//!    the purge each needs.
//! 2. The output pass replays the stream, consuming tool changes, purging
//!    into a generated tower or off the side of the model, firing pings and
//!    building the splice ledger.
//!
//! The finalized ledger is then encoded as the splice program for the
//! configured hardware generation.

pub mod insert;
pub mod output;
pub mod ping;
pub mod preflight;
pub mod side_transitions;
pub mod state;
pub mod summary;
pub mod transition;

pub use output::{compose, Compositor};
pub use ping::{PendingPing, PingEvent, PingState};
pub use preflight::{preflight, LayerInfo, PreflightResult, PreflightScanner};
pub use side_transitions::SideScripts;
pub use state::RuntimeState;
pub use transition::{SideLookahead, Transition};

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use splicekit_core::{Error, Palette, Result, TowerError, TransitionMethod};
use splicekit_msf::{create_msf, Msf, MsfDocument, Placement};
use splicekit_tower::Tower;

/// A conversion that either ran or was not needed
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome<T> {
    Converted(T),
    /// The print uses at most one drive; the input needs no splicing
    Skipped { drives_used: Vec<usize> },
}

/// What a finished conversion produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub transitions: usize,
    pub splices: usize,
    pub pings: usize,
    pub total_filament: f32,
    pub filament_by_drive: Vec<f32>,
    /// Side file written next to the output, if the format uses one
    pub msf_path: Option<PathBuf>,
}

impl ConversionReport {
    fn new(preflight: &PreflightResult, ledger: &Msf) -> Self {
        Self {
            transitions: preflight.transitions.len(),
            splices: ledger.splices().len(),
            pings: ledger.pings().len(),
            total_filament: ledger.total_filament_length(),
            filament_by_drive: ledger.filament_lengths_by_drive(),
            msf_path: None,
        }
    }
}

/// In-memory conversion result
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    /// Output G-code, with the splice program prepended when the hardware
    /// reads it in-band
    pub gcode: String,
    pub msf: MsfDocument,
    pub report: ConversionReport,
}

/// Everything the output pass needs from the first pass
struct Plan {
    preflight: PreflightResult,
    scripts: SideScripts,
    tower: Option<Tower>,
}

fn plan<R: io::BufRead>(reader: R, palette: &Palette) -> Result<ConversionOutcome<Plan>> {
    palette.validate()?;
    let scripts = SideScripts::compile(palette)?;
    let preflight = preflight(reader, palette)?;

    if preflight.drives_used.len() <= 1 {
        tracing::info!(
            "Print uses {} drive(s); nothing to splice",
            preflight.drives_used.len()
        );
        return Ok(ConversionOutcome::Skipped {
            drives_used: preflight.drives_used.iter().copied().collect(),
        });
    }

    let tower = if palette.transition_method == TransitionMethod::CustomTower {
        match Tower::size(&preflight.layer_loads(), palette) {
            Ok(tower) => Some(tower),
            Err(TowerError::NoTransitions) => {
                tracing::info!("No transitions need a tower");
                None
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    tracing::debug!(
        "Preflight: {} transitions over {} layers",
        preflight.transitions.len(),
        preflight.layer_count
    );
    Ok(ConversionOutcome::Converted(Plan {
        preflight,
        scripts,
        tower,
    }))
}

/// Convert G-code held in memory
pub fn convert_str(
    input: &str,
    palette: Arc<Palette>,
    job_name: &str,
) -> Result<ConversionOutcome<Converted>> {
    let plan = match plan(input.as_bytes(), &palette)? {
        ConversionOutcome::Converted(plan) => plan,
        ConversionOutcome::Skipped { drives_used } => {
            return Ok(ConversionOutcome::Skipped { drives_used })
        }
    };

    let mut body = Vec::new();
    let ledger = compose(
        input.as_bytes(),
        &mut body,
        palette,
        &plan.preflight,
        plan.tower,
        &plan.scripts,
    )?;
    let msf = create_msf(&ledger, job_name)?;
    let report = ConversionReport::new(&plan.preflight, &ledger);

    let body = String::from_utf8(body).map_err(|e| Error::other(e.to_string()))?;
    let gcode = match msf.placement {
        Placement::GcodeHeader => format!("{}{}", msf.contents, body),
        Placement::SideFile { .. } => body,
    };
    Ok(ConversionOutcome::Converted(Converted { gcode, msf, report }))
}

/// Convert a G-code file into `output`.
///
/// The input is read twice. A side-file splice program is written next to
/// `output` with the format's extension; an in-band one is prepended to it.
pub fn convert_file(
    input: &Path,
    output: &Path,
    palette: Arc<Palette>,
) -> Result<ConversionOutcome<ConversionReport>> {
    let job_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let plan = match plan(BufReader::new(File::open(input)?), &palette)? {
        ConversionOutcome::Converted(plan) => plan,
        ConversionOutcome::Skipped { drives_used } => {
            return Ok(ConversionOutcome::Skipped { drives_used })
        }
    };

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut body = tempfile::NamedTempFile::new_in(&dir)?;
    let ledger = {
        let mut writer = BufWriter::new(body.as_file_mut());
        let ledger = compose(
            BufReader::new(File::open(input)?),
            &mut writer,
            palette,
            &plan.preflight,
            plan.tower,
            &plan.scripts,
        )?;
        writer.flush()?;
        ledger
    };

    let msf = create_msf(&ledger, &job_name)?;
    let mut report = ConversionReport::new(&plan.preflight, &ledger);

    match msf.placement {
        Placement::SideFile { extension } => {
            body.persist(output).map_err(|e| e.error)?;
            let msf_path = output.with_extension(extension);
            std::fs::write(&msf_path, &msf.contents)?;
            tracing::info!("Wrote splice program to {}", msf_path.display());
            report.msf_path = Some(msf_path);
        }
        Placement::GcodeHeader => {
            let mut combined = tempfile::NamedTempFile::new_in(&dir)?;
            {
                let mut writer = BufWriter::new(combined.as_file_mut());
                writer.write_all(msf.contents.as_bytes())?;
                let mut reader = body.reopen()?;
                io::copy(&mut reader, &mut writer)?;
                writer.flush()?;
            }
            combined.persist(output).map_err(|e| e.error)?;
        }
    }

    tracing::info!(
        "Converted {} -> {}: {} splices, {} pings",
        input.display(),
        output.display(),
        report.splices,
        report.pings
    );
    Ok(ConversionOutcome::Converted(report))
}
