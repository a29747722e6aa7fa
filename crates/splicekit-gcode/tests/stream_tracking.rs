use splicekit_gcode::{
    for_each_line, parse_line, Script, ScriptLocals, SlicerHint, Tracker, Trackers, TypeHint,
};
use proptest::prelude::*;
use std::io;

const SAMPLE: &str = "\
; generated by a slicer\r
M104 S215\r
M140 S60\r
G28\r
M83\r
;LAYER_CHANGE\r
;Z:0.2\r
;HEIGHT:0.2\r
;TYPE:Perimeter\r
G1 X10 Y10 Z0.2 F1800\r
G1 X20 Y10 E1.5\r
G1 E-0.8 F2400\r
;TYPE:Wipe tower\r
G1 X30 Y30\r
G1 E0.8\r
G1 X40 Y30 E2.0\r
; filament used [mm] = 3.5\r
";

#[test]
fn test_stream_feeds_trackers_and_hints() {
    let mut trackers = Trackers::default();
    let mut hints = Vec::new();

    let lines = for_each_line(SAMPLE.as_bytes(), |_, line| -> io::Result<()> {
        let command = parse_line(line);
        trackers.track_instruction(&command);
        if let Some(hint) = SlicerHint::from_command(&command) {
            hints.push(hint);
        }
        Ok(())
    })
    .unwrap();

    assert_eq!(lines, 17);
    assert_eq!(trackers.extrusion.total_extrusion, 3.5);
    assert_eq!(trackers.extrusion.retraction, 0.0);
    assert_eq!((trackers.position.x, trackers.position.y), (40.0, 30.0));
    assert_eq!(trackers.position.z, 0.2);
    assert_eq!(trackers.temperature.extruder, 215.0);
    assert_eq!(trackers.temperature.bed, 60.0);

    assert_eq!(
        hints,
        vec![
            SlicerHint::LayerChange,
            SlicerHint::TopZ(0.2),
            SlicerHint::Height(0.2),
            SlicerHint::Type(TypeHint::Other),
            SlicerHint::Type(TypeHint::WipeTower),
            SlicerHint::FilamentUsed,
        ]
    );
}

#[test]
fn test_script_output_can_be_retokenized() {
    let script = Script::parse("G1 X{currentX + 5} F3000\nG1 E{transitionLength} F300\n").unwrap();
    let mut locals = ScriptLocals::new();
    locals.set("currentX", 12.5_f32).set("transitionLength", 40.0_f32);

    let output = script.evaluate(&locals).unwrap();
    let mut trackers = Trackers::default();
    trackers.extrusion.relative = true;
    for line in output.lines() {
        trackers.track_instruction(&parse_line(line));
    }

    assert_eq!(trackers.position.x, 17.5);
    assert_eq!(trackers.extrusion.total_extrusion, 40.0);
}

proptest! {
    #[test]
    fn prop_relative_extrusion_accounting(deltas in prop::collection::vec(-5.0f32..20.0, 1..60)) {
        let mut trackers = Trackers::default();
        trackers.track_instruction(&parse_line("M83"));

        let mut net = 0.0f32;
        let mut previous_total = 0.0f32;
        for delta in deltas {
            let command = parse_line(&format!("G1 X1 E{:.3}", delta));
            net += command.param('e').unwrap();
            trackers.track_instruction(&command);

            let extrusion = &trackers.extrusion;
            prop_assert!(extrusion.total_extrusion >= previous_total);
            prop_assert!(extrusion.retraction >= 0.0);
            prop_assert!((extrusion.total_extrusion - extrusion.retraction - net).abs() < 1e-2);
            previous_total = extrusion.total_extrusion;
        }
    }
}
