//! MSF 1.4 line format

use splicekit_core::constants::EOL;
use splicekit_core::hex::{float_to_hex, int16_to_hex, uint_to_hex};

use super::truncate_name;
use crate::ledger::Msf;

const NAME_LENGTH: usize = 20;

/// Encode a ledger as MSF 1.4
pub fn encode_msf1(msf: &Msf) -> String {
    let palette = msf.palette();
    let algorithms = msf.output_algorithms();
    let mut out = String::new();

    let mut push_line = |line: String| {
        out.push_str(&line);
        out.push_str(EOL);
    };

    push_line("MSF1.4".to_string());

    let mut materials = String::from("cu:");
    for drive in 0..palette.drive_count() {
        match palette.material(drive) {
            Some(material) if msf.drives_used().contains(&drive) => {
                materials.push_str(&uint_to_hex(u32::from(material.index), 1));
                materials.push_str(&truncate_name(&material.name, NAME_LENGTH));
            }
            _ => materials.push('0'),
        }
        materials.push(';');
    }
    push_line(materials);

    push_line(format!("ppm:{}", float_to_hex(palette.pulses_per_mm)));
    push_line(format!("lo:{}", uint_to_hex(palette.loading_offset, 4)));
    push_line(format!("ns:{}", uint_to_hex(msf.splices().len() as u32, 4)));
    push_line(format!("np:{}", uint_to_hex(msf.pings().len() as u32, 4)));
    push_line("nh:0000".to_string());
    push_line(format!("na:{}", uint_to_hex(algorithms.len() as u32, 4)));

    for splice in msf.splices() {
        push_line(format!(
            "({},{})",
            uint_to_hex(splice.drive as u32, 2),
            float_to_hex(splice.length)
        ));
    }
    for ping in msf.pings() {
        push_line(format!("(64,{})", float_to_hex(ping.start)));
    }
    for algorithm in &algorithms {
        push_line(format!(
            "({}{},{},{},{})",
            uint_to_hex(u32::from(algorithm.ingoing), 1),
            uint_to_hex(u32::from(algorithm.outgoing), 1),
            int16_to_hex(algorithm.heat),
            int16_to_hex(algorithm.compression),
            u8::from(algorithm.reverse)
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use splicekit_core::constants::FINAL_SEGMENT_BUFFER;
    use splicekit_core::{Material, Palette, PaletteType, SpliceSettings};
    use std::sync::Arc;

    #[test]
    fn test_encode_msf1() {
        let palette = Palette {
            palette_type: PaletteType::Palette,
            pulses_per_mm: 30.0,
            loading_offset: 1500,
            materials: vec![
                Some(Material::new("w", 1, "White PLA with a very long name", "ffffff")),
                None,
                Some(Material::new("b", 2, "Black PLA", "000000")),
            ],
            splice_settings: vec![SpliceSettings {
                ingoing: 2,
                outgoing: 1,
                heat: -1,
                compression: 2,
                cooling: 0,
                reverse: true,
            }],
            ..Palette::default()
        };
        let mut msf = Msf::new(Arc::new(palette));
        msf.add_splice(0, 200.0).unwrap();
        msf.add_ping(100.0, Some(20.0));
        msf.add_last_splice(2, 300.0).unwrap();

        let expected_total = 200.0_f32 + 100.0 * FINAL_SEGMENT_BUFFER + 750.0;
        let expected = [
            "MSF1.4".to_string(),
            "cu:1White PLA with a ver;0;2Black PLA;0;".to_string(),
            "ppm:41f00000".to_string(),
            "lo:05dc".to_string(),
            "ns:0002".to_string(),
            "np:0001".to_string(),
            "nh:0000".to_string(),
            "na:0003".to_string(),
            "(00,43480000)".to_string(),
            format!("(02,{})", float_to_hex(expected_total)),
            "(64,42c80000)".to_string(),
            "(11,0000,0000,0)".to_string(),
            "(21,ffff,0002,1)".to_string(),
            "(22,0000,0000,0)".to_string(),
        ]
        .join("\r\n")
            + "\r\n";

        assert_eq!(encode_msf1(&msf), expected);
    }
}
