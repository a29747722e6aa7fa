//! Fixed hardware and algorithm constants.

/// Minimum length of every piece after the first (mm)
pub const SPLICE_MIN_LENGTH: f32 = 80.0;

/// Filament that must pass between two ping starts (mm)
pub const PING_SPACING: f32 = 350.0;

/// Extrusion between the two pauses of an accessory-mode ping (mm)
pub const ACCESSORY_PING_EXTRUSION: f32 = 20.0;

/// Dwell that begins an accessory-mode ping (ms)
pub const ACCESSORY_PING_BEGIN_DWELL_MS: u32 = 13_000;

/// Dwell that completes an accessory-mode ping (ms)
pub const ACCESSORY_PING_COMPLETE_DWELL_MS: u32 = 7_000;

/// Buffer applied to the final piece when the ledger is closed
pub const FINAL_SEGMENT_BUFFER: f32 = 1.04;

/// Largest single extrusion step of an in-place side transition (mm)
pub const IN_PLACE_PURGE_STEP: f32 = 10.0;

/// Decimal places kept for per-layer Z and thickness values
pub const LAYER_PRECISION: i32 = 5;

/// Safety inflation applied to tower purge volumes
pub const TOWER_SAFETY_FACTOR: f32 = 1.05;

/// Aspect ratio used when the tower aspect is not configured
pub const GOLDEN_RATIO: f32 = 1.618_034;

/// Line terminator for every text file written
pub const EOL: &str = "\r\n";

/// Round a value to [`LAYER_PRECISION`] decimal places
pub fn round_layer_value(value: f32) -> f32 {
    let multiplier = 10_f64.powi(LAYER_PRECISION);
    ((value as f64 * multiplier).round() / multiplier) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_layer_value() {
        assert_eq!(round_layer_value(0.2000001), 0.2);
        assert_eq!(round_layer_value(1.234567), 1.23457);
        assert_eq!(round_layer_value(0.0), 0.0);
    }
}
