//! Splice program encoders
//!
//! The hardware generation picks the encoding. Text formats use CRLF line
//! endings and lowercase fixed-width hex fields; both are load-bearing for
//! the firmware that parses them.

mod msf1;
mod msf2;
mod msf3;

pub use msf1::encode_msf1;
pub use msf2::{encode_msf2, encode_msf2_header, ping_command};
pub use msf3::encode_msf3;

use splicekit_core::{MsfFormat, PingMode, Result};

use crate::ledger::Msf;

/// Where an encoded splice program goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Written next to the output G-code with this extension
    SideFile { extension: &'static str },
    /// Prepended to the output G-code
    GcodeHeader,
}

/// An encoded splice program
#[derive(Debug, Clone, PartialEq)]
pub struct MsfDocument {
    pub format: MsfFormat,
    pub placement: Placement,
    pub contents: String,
}

/// Encode a finalized ledger in the format its palette generation uses.
///
/// `job_name` only appears in the in-band header of connected O-command
/// hardware.
pub fn create_msf(msf: &Msf, job_name: &str) -> Result<MsfDocument> {
    msf.require_finalized()?;

    let palette = msf.palette();
    let format = palette.palette_type.msf_format();
    let connected = palette.ping_mode() == PingMode::Connected;

    let (placement, contents) = match format {
        MsfFormat::V1_4 => (
            Placement::SideFile { extension: "msf" },
            encode_msf1(msf),
        ),
        MsfFormat::V2_0 if connected => (Placement::GcodeHeader, encode_msf2_header(msf, job_name)),
        MsfFormat::V2_0 => (
            Placement::SideFile { extension: "maf" },
            encode_msf2(msf),
        ),
        MsfFormat::V3_0 => (
            Placement::SideFile {
                extension: "msf.json",
            },
            encode_msf3(msf, connected)?,
        ),
    };

    tracing::info!(
        "Encoded {:?} splice program: {} splices, {} pings",
        format,
        msf.splices().len(),
        msf.pings().len()
    );

    Ok(MsfDocument {
        format,
        placement,
        contents,
    })
}

/// Material name cut to `max_chars` characters
pub(crate) fn truncate_name(name: &str, max_chars: usize) -> String {
    name.chars().take(max_chars).collect()
}
