//! Recomputed print summary
//!
//! Replaces the slicer's `; filament used` block once the ledger is final.

use splicekit_msf::Msf;

use crate::preflight::PreflightResult;

/// Summary comment lines for a finalized ledger
pub fn summary_lines(ledger: &Msf, preflight: &PreflightResult) -> Vec<String> {
    let mut lines = vec![
        format!("; splices = {}", ledger.splices().len()),
        format!("; pings = {}", ledger.pings().len()),
        format!(
            "; filament used [mm] = {:.2}",
            ledger.total_filament_length()
        ),
    ];

    for (drive, length) in ledger.filament_lengths_by_drive().iter().enumerate() {
        if ledger.drives_used().contains(&drive) {
            lines.push(format!(
                "; filament used drive {} [mm] = {:.2}",
                drive + 1,
                length
            ));
        }
    }

    if let Some(seconds) = preflight.time_estimate {
        lines.push(format!("; estimated print time = {}", format_duration(seconds)));
    }
    lines.push(format!(
        "; model bounds = {}",
        preflight.model_bounds.to_hex()
    ));
    lines
}

/// Format seconds as `1d 2h 3m 4s`, leaving out leading zero units
pub fn format_duration(seconds: u64) -> String {
    let units = [
        (seconds / 86_400, 'd'),
        ((seconds % 86_400) / 3_600, 'h'),
        ((seconds % 3_600) / 60, 'm'),
        (seconds % 60, 's'),
    ];
    let parts: Vec<String> = units
        .iter()
        .skip_while(|(value, unit)| *value == 0 && *unit != 's')
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();
    parts.join(" ")
}
