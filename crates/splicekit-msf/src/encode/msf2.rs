//! MSF 2.0 O-command format

use splicekit_core::constants::EOL;
use splicekit_core::hex::{float_to_hex, int16_to_hex, uint_to_hex};

use super::truncate_name;
use crate::ledger::Msf;

const NAME_LENGTH: usize = 32;

/// Encode a ledger as an MSF 2.0 side file (accessory mode)
pub fn encode_msf2(msf: &Msf) -> String {
    encode(msf, false)
}

/// Encode a ledger as the in-band header prepended to connected-mode G-code
pub fn encode_msf2_header(msf: &Msf, job_name: &str) -> String {
    let mut out = encode(msf, true);
    out.push_str(&format!(
        "O1 D{} D{}",
        job_name.replace(' ', "_"),
        float_to_hex(msf.total_filament_length())
    ));
    out.push_str(EOL);
    out
}

/// In-band ping marker at a filament position
pub fn ping_command(position: f32) -> String {
    format!("O31 D{}", float_to_hex(position))
}

fn encode(msf: &Msf, in_band: bool) -> String {
    let palette = msf.palette();
    let algorithms = msf.output_algorithms();
    let ping_count = if in_band { 0 } else { msf.pings().len() };

    let mut lines = vec![
        "O21 D0020".to_string(),
        format!("O22 D{}", palette.printer_profile_id),
        "O23 D0001".to_string(),
        "O24 D0000".to_string(),
    ];

    let drives: Vec<String> = (0..palette.drive_count())
        .map(|drive| match palette.material(drive) {
            Some(material) if msf.drives_used().contains(&drive) => format!(
                "D{}{}{}",
                uint_to_hex(u32::from(material.index), 1),
                material.color_hex(),
                truncate_name(&material.name, NAME_LENGTH).replace(' ', "_")
            ),
            _ => "D0".to_string(),
        })
        .collect();
    lines.push(format!("O25 {}", drives.join(" ")));

    lines.push(format!("O26 D{}", uint_to_hex(msf.splices().len() as u32, 4)));
    lines.push(format!("O27 D{}", uint_to_hex(ping_count as u32, 4)));
    lines.push(format!("O28 D{}", uint_to_hex(algorithms.len() as u32, 4)));
    lines.push("O29 D0000".to_string());

    for splice in msf.splices() {
        lines.push(format!(
            "O30 D{} D{}",
            uint_to_hex(splice.drive as u32, 1),
            float_to_hex(splice.length)
        ));
    }

    if !in_band {
        for ping in msf.pings() {
            lines.push(format!(
                "O31 D{} D{}",
                float_to_hex(ping.start),
                float_to_hex(ping.extrusion.unwrap_or(0.0))
            ));
        }
    }

    for algorithm in &algorithms {
        lines.push(format!(
            "O32 D{}{} D{} D{} D{}",
            uint_to_hex(u32::from(algorithm.ingoing), 1),
            uint_to_hex(u32::from(algorithm.outgoing), 1),
            int16_to_hex(algorithm.heat),
            int16_to_hex(algorithm.compression),
            int16_to_hex(algorithm.cooling)
        ));
    }

    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push_str(EOL);
    }
    out
}
