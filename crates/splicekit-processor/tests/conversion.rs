use std::sync::Arc;

use splicekit_core::constants::EOL;
use splicekit_core::{
    Error, GcodeError, Material, MsfFormat, Palette, PaletteType, SideTransitionStyle,
    TransitionMethod,
};
use splicekit_msf::Placement;
use splicekit_processor::{convert_file, convert_str, preflight, ConversionOutcome, Converted};

fn palette(palette_type: PaletteType, method: TransitionMethod) -> Palette {
    Palette {
        palette_type,
        materials: vec![
            Some(Material::new("pla-red", 1, "Red PLA", "ff0000")),
            Some(Material::new("pla-green", 2, "Green PLA", "00ff00")),
            Some(Material::new("pla-blue", 3, "Blue PLA", "0000ff")),
        ],
        transition_lengths: vec![vec![30.0; 4]; 4],
        transition_method: method,
        ..Palette::default()
    }
}

fn convert(gcode: &str, palette: Palette) -> Converted {
    match convert_str(gcode, Arc::new(palette), "job").unwrap() {
        ConversionOutcome::Converted(converted) => converted,
        ConversionOutcome::Skipped { .. } => panic!("conversion was skipped"),
    }
}

fn lines(text: &str) -> Vec<&str> {
    text.split_terminator(EOL).collect()
}

const THREE_COLORS: &str = "\
M83
T0
G1 X10 Y10 E200
T1
G1 X20 Y10 E80
T2
G1 X30 Y10 E90
T1
G1 X40 Y10 E10
; filament used [mm] = 380.0
; filament used [g] = 1.1
";

fn single_layer(segments: &[(u32, f32)]) -> String {
    let mut gcode = String::from("M83\n;LAYER_CHANGE\n;Z:0.2\n;HEIGHT:0.2\n");
    for (i, (tool, extrusion)) in segments.iter().enumerate() {
        gcode.push_str(&format!("T{}\nG1 X{} Y10 E{}\n", tool, 10 * (i + 1), extrusion));
    }
    gcode
}

#[test]
fn test_preflight_schedules_transitions() {
    let palette = palette(PaletteType::Palette2, TransitionMethod::CustomTower);
    let gcode = single_layer(&[(0, 200.0), (1, 80.0), (2, 90.0), (1, 100.0)]);
    let result = preflight(gcode.as_bytes(), &palette).unwrap();

    let totals: Vec<f32> = result.transitions.iter().map(|t| t.total_extrusion).collect();
    let purges: Vec<f32> = result.transitions.iter().map(|t| t.purge_length).collect();
    assert_eq!(totals, vec![200.0, 280.0, 370.0]);
    assert_eq!(purges, vec![30.0, 30.0, 30.0]);
    assert_eq!(result.layer_count, 1);
}

#[test]
fn test_short_piece_absorbs_shortfall() {
    let palette = palette(PaletteType::Palette2, TransitionMethod::CustomTower);
    let gcode = single_layer(&[(0, 200.0), (1, 80.0), (2, 10.0), (1, 100.0)]);
    let result = preflight(gcode.as_bytes(), &palette).unwrap();

    let last = &result.transitions[2];
    assert_eq!(last.total_extrusion, 290.0);
    assert_eq!(last.purge_length, 70.0);
    assert_eq!(last.splice_length, 420.0);

    // the ledger accepts the topped-up piece during the output pass
    let converted = convert(&gcode, palette);
    assert_eq!(converted.report.splices, 4);
    assert!((converted.report.filament_by_drive[2] - 80.0).abs() < 1e-3);
}

#[test]
fn test_slicer_tower_conversion() {
    let converted = convert(
        THREE_COLORS,
        palette(PaletteType::Palette2, TransitionMethod::SlicerTower),
    );
    let output = lines(&converted.gcode);

    assert_eq!(&output[..3], &["M83", "T0", "G1 X10 Y10 E200"]);
    assert!(!output.iter().any(|l| matches!(*l, "T1" | "T2")));
    assert!(!output.iter().any(|l| l.starts_with("; filament used [g]")));
    assert!(output.contains(&"; splices = 4"));
    assert!(output.contains(&"; filament used [mm] = 1480.00"));
    assert!(output.contains(&"; filament used drive 2 [mm] = 1160.00"));

    let report = &converted.report;
    assert_eq!(report.transitions, 3);
    assert_eq!(report.splices, 4);
    assert_eq!(report.pings, 0);
    assert_eq!(report.filament_by_drive, vec![230.0, 1160.0, 90.0, 0.0]);
    assert_eq!(report.total_filament, 1480.0);

    // accessory-mode Palette 2 reads its program from a side file
    assert_eq!(converted.msf.format, MsfFormat::V2_0);
    assert_eq!(
        converted.msf.placement,
        Placement::SideFile { extension: "maf" }
    );
    assert!(converted.msf.contents.starts_with("O21 D0020\r\n"));
}

#[test]
fn test_side_transition_with_ping() {
    let gcode = "\
G90
M83
T0
G1 X10 Y10 Z0.2 F1200
G1 X20 Y10 E340
T1
G1 X30 Y10 E80
";
    let converted = convert(
        gcode,
        palette(PaletteType::Palette2, TransitionMethod::SideTransitions),
    );
    let output = lines(&converted.gcode);

    assert_eq!(
        &output[..17],
        &[
            "G90",
            "M83",
            "T0",
            "G1 X10 Y10 Z0.2 F1200",
            "G1 X20 Y10 E340",
            "G0 Z1.2 F6000",
            "G0 X0 Y0 F6000",
            "G0 Z0.2 F6000",
            "G1 E10 F200",
            "G4 P13000",
            "G1 E10 F200",
            "G1 E10 F200",
            "G4 P7000",
            "G0 Z1.2 F6000",
            "G0 X20 Y10 F6000",
            "G0 Z0.2 F6000",
            "G1 F1200",
        ]
    );
    assert_eq!(output[17], "G1 X30 Y10 E80");

    let report = &converted.report;
    assert_eq!(report.pings, 1);
    assert_eq!(report.filament_by_drive[0], 370.0);
}

#[test]
fn test_on_edge_pings_match_preflight() {
    // 345 mm leaves no room for a ping inside a 30 mm purge; 330 mm with an
    // 80 mm purge starts one on the second pass along the edge
    for (model, transition, expected) in [(345.0, 30.0, 0), (330.0, 80.0, 1)] {
        let mut palette = palette(PaletteType::Palette2, TransitionMethod::SideTransitions);
        palette.side_transitions.style = SideTransitionStyle::OnEdge;
        palette.transition_lengths = vec![vec![transition; 4]; 4];
        let gcode = format!(
            "M83\nT0\nG1 X10 Y10 Z0.2 F1200\nG1 X20 Y10 E{}\nT1\nG1 X30 Y10 E80\n",
            model
        );

        let result = preflight(gcode.as_bytes(), &palette).unwrap();
        let converted = convert(&gcode, palette);
        assert_eq!(result.ping_starts.len(), expected);
        assert_eq!(converted.report.pings, expected);
        if expected == 1 {
            assert!((result.ping_starts[0] - 354.6).abs() < 1e-3);
        }
    }
}

#[test]
fn test_non_utf8_comment_passes_through() {
    let mut gcode = b"M83\n; bed 60".to_vec();
    gcode.push(0xb0);
    gcode.extend_from_slice(b"C\n");
    gcode.extend_from_slice(THREE_COLORS.as_bytes());

    let palette = palette(PaletteType::Palette2, TransitionMethod::SlicerTower);
    let result = preflight(gcode.as_slice(), &palette).unwrap();
    assert_eq!(result.transitions.len(), 3);

    let converted = convert(&String::from_utf8_lossy(&gcode), palette);
    assert!(lines(&converted.gcode).contains(&"; bed 60\u{fffd}C"));
    assert_eq!(converted.report.splices, 4);
}

#[test]
fn test_custom_tower_tops_up_short_pieces() {
    let gcode = "\
M83
;LAYER_CHANGE
;Z:0.2
;HEIGHT:0.2
T0
G1 X10 Y10 E200
T1
G1 X20 Y10 E20
T2
G1 X30 Y10 E80
;LAYER_CHANGE
;Z:0.4
;HEIGHT:0.2
G1 X40 Y10 E10
";
    let converted = convert(
        gcode,
        palette(PaletteType::Palette2, TransitionMethod::CustomTower),
    );
    let output = lines(&converted.gcode);

    // the second piece is only 20 mm of model, so its purge grows to 60 mm
    let report = &converted.report;
    assert_eq!(report.transitions, 2);
    assert_eq!(report.splices, 3);
    assert_eq!(report.filament_by_drive[0], 230.0);
    // tower moves are written at five decimals, so the live position drifts
    assert!((report.filament_by_drive[1] - 80.0).abs() < 1e-3);

    assert!(output
        .iter()
        .any(|l| l.starts_with("G1 X") && l.ends_with(" F1800")));
    assert!(output.contains(&"G0 X10 Y10 F6000"));
    assert!(output.contains(&"G0 X20 Y10 F6000"));
    assert!(!output.iter().any(|l| matches!(*l, "T1" | "T2")));
}

#[test]
fn test_single_drive_is_skipped() {
    let gcode = "M83\nT1\nG1 X10 E500\nT1\nG1 X20 E20\n";
    let outcome = convert_str(
        gcode,
        Arc::new(palette(PaletteType::Palette2, TransitionMethod::SlicerTower)),
        "job",
    )
    .unwrap();
    assert_eq!(outcome, ConversionOutcome::Skipped { drives_used: vec![1] });
}

#[test]
fn test_unknown_tool_fails() {
    let mut palette = palette(PaletteType::Palette2, TransitionMethod::SlicerTower);
    palette.materials[2] = None;
    let err = convert_str(THREE_COLORS, Arc::new(palette), "job").unwrap_err();
    assert!(matches!(
        err,
        Error::Gcode(GcodeError::UnknownTool { tool: 2, line: 6 })
    ));
}

#[test]
fn test_connected_palette2_prepends_header() {
    let mut palette = palette(PaletteType::Palette2, TransitionMethod::SlicerTower);
    palette.connected_mode = true;
    let converted = convert(THREE_COLORS, palette);

    assert_eq!(converted.msf.placement, Placement::GcodeHeader);
    assert!(converted.gcode.starts_with("O21 D0020\r\n"));
    assert!(converted.gcode.contains("O1 Djob D"));
    let body_start = converted.msf.contents.len();
    assert!(converted.gcode[body_start..].starts_with("M83\r\n"));
}

#[test]
fn test_convert_file_side_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cube.gcode");
    std::fs::write(&input, THREE_COLORS).unwrap();

    for (palette_type, extension) in [
        (PaletteType::Palette, "msf"),
        (PaletteType::Palette2, "maf"),
        (PaletteType::Palette3, "msf.json"),
    ] {
        let output = dir.path().join(format!("out-{}.gcode", palette_type as u8));
        let palette = Arc::new(palette(palette_type, TransitionMethod::SlicerTower));
        let report = match convert_file(&input, &output, palette).unwrap() {
            ConversionOutcome::Converted(report) => report,
            ConversionOutcome::Skipped { .. } => panic!("conversion was skipped"),
        };

        let msf_path = report.msf_path.expect("side file path");
        assert_eq!(msf_path, output.with_extension(extension));
        assert!(msf_path.exists());

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("M83\r\nT0\r\n"));
        assert!(written.contains("; splices = 4\r\n"));
    }
}

#[test]
fn test_convert_file_in_band_header() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("benchy.gcode");
    let output = dir.path().join("benchy-out.gcode");
    std::fs::write(&input, THREE_COLORS).unwrap();

    let mut palette = palette(PaletteType::Palette2, TransitionMethod::SlicerTower);
    palette.connected_mode = true;
    let report = match convert_file(&input, &output, Arc::new(palette)).unwrap() {
        ConversionOutcome::Converted(report) => report,
        ConversionOutcome::Skipped { .. } => panic!("conversion was skipped"),
    };
    assert!(report.msf_path.is_none());

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("O21 D0020\r\n"));
    assert!(written.contains("O1 Dbenchy D"));
    assert!(written.contains("\r\nM83\r\nT0\r\n"));

    // only the output itself is left next to the input
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 2);
}
