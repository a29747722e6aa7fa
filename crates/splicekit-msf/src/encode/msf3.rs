//! MSF 3.0 JSON document

use serde::Serialize;

use splicekit_core::Result;

use crate::algorithms::Algorithm;
use crate::ledger::{Msf, Splice};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MsfJson<'a> {
    version: &'static str,
    drives: Vec<u8>,
    splices: &'a [Splice],
    #[serde(skip_serializing_if = "Option::is_none")]
    pings: Option<Vec<PingJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping_count: Option<usize>,
    algorithms: Vec<Algorithm>,
}

#[derive(Serialize)]
struct PingJson {
    length: f32,
    extrusion: Option<f32>,
}

/// Encode a ledger as an MSF 3.0 JSON document.
///
/// Connected hardware gets the bare ping count instead of the ping list.
pub fn encode_msf3(msf: &Msf, connected: bool) -> Result<String> {
    let (pings, ping_count) = if connected {
        (None, Some(msf.pings().len()))
    } else {
        let pings = msf
            .pings()
            .iter()
            .map(|ping| PingJson {
                length: ping.start,
                extrusion: ping.extrusion,
            })
            .collect();
        (Some(pings), None)
    };

    let document = MsfJson {
        version: "3.0",
        drives: msf.drive_material_indexes(),
        splices: msf.splices(),
        pings,
        ping_count,
        algorithms: msf.output_algorithms(),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}
