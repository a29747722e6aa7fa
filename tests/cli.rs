use std::path::Path;
use std::process::{Command, Output};

const PALETTE: &str = r#"{
    "palette_type": "palette2",
    "materials": [
        {"id": "pla-red", "index": 1, "name": "Red PLA", "color": "ff0000"},
        {"id": "pla-blue", "index": 2, "name": "Blue PLA", "color": "0000ff"}
    ],
    "transition_lengths": [[0, 30], [30, 0]]
}"#;

const TWO_COLORS: &str = "M83\nT0\nG1 X10 Y10 E200\nT1\nG1 X20 Y10 E80\n";

fn splicekit(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_splicekit"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn setup(gcode: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("palette.json"), PALETTE).unwrap();
    std::fs::write(dir.path().join("cube.gcode"), gcode).unwrap();
    dir
}

#[test]
fn test_convert_writes_default_outputs() {
    let dir = setup(TWO_COLORS);
    let output = splicekit(&["convert", "cube.gcode", "--palette", "palette.json"], dir.path());
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("1 transitions, 2 splices, 0 pings, 1310.00 mm of filament"));

    let gcode = std::fs::read_to_string(dir.path().join("cube.mcf.gcode")).unwrap();
    assert!(gcode.starts_with("M83\r\nT0\r\nG1 X10 Y10 E200\r\nG1 X20 Y10 E80\r\n"));
    let maf = std::fs::read_to_string(dir.path().join("cube.mcf.maf")).unwrap();
    assert!(maf.starts_with("O21 D0020\r\n"));
}

#[test]
fn test_convert_reports_skip() {
    let dir = setup("M83\nT1\nG1 X10 E200\n");
    let output = splicekit(
        &["convert", "cube.gcode", "--palette", "palette.json", "-o", "out.gcode"],
        dir.path(),
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Skipped"));
    assert!(!dir.path().join("out.gcode").exists());
}

#[test]
fn test_preflight_prints_json() {
    let dir = setup(TWO_COLORS);
    let output = splicekit(&["preflight", "cube.gcode", "--palette", "palette.json"], dir.path());
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["transitions"].as_array().unwrap().len(), 1);
    assert_eq!(result["transitions"][0]["purge_length"], 30.0);
    assert_eq!(result["initial_tool"], 0);
}

#[test]
fn test_bad_palette_fails() {
    let dir = setup(TWO_COLORS);
    std::fs::write(dir.path().join("empty.json"), r#"{"materials": []}"#).unwrap();
    let output = splicekit(&["convert", "cube.gcode", "--palette", "empty.json"], dir.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Failed to load palette"));
}
