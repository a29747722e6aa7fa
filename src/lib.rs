//! # SpliceKit
//!
//! Post-processes single-extruder multi-material G-code for Palette
//! splicers. The work happens in the member crates:
//!
//! 1. **splicekit-core** - Palette configuration, error taxonomy, hex helpers
//! 2. **splicekit-gcode** - Line tokenizer, trackers, slicer hints, scripts
//! 3. **splicekit-msf** - Splice/ping ledger and splice program encoders
//! 4. **splicekit-tower** - Transition tower sizing and rasterization
//! 5. **splicekit-processor** - Preflight, output compositor, side transitions
//!
//! This crate adds the command line front end and logging setup.

pub use splicekit_core::{Error, Palette, Result};
pub use splicekit_processor::{
    convert_file, convert_str, preflight, ConversionOutcome, ConversionReport, Converted,
    PreflightResult,
};

/// Build timestamp baked in by the build script
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support (INFO by default)
/// - Human-readable or JSON lines
/// - Output on stderr, leaving stdout for command output
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
