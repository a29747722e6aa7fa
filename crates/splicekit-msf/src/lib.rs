//! # SpliceKit MSF
//!
//! The splice/ping ledger built up during the output pass, and the encoders
//! that turn a finalized ledger into the splice program the hardware reads:
//! - MSF 1.4 line format (first generation)
//! - MSF 2.0 O-command format, as a side file or an in-band G-code header
//! - MSF 3.0 JSON document

pub mod algorithms;
pub mod encode;
pub mod ledger;

pub use algorithms::Algorithm;
pub use encode::{create_msf, ping_command, MsfDocument, Placement};
pub use ledger::{Msf, Ping, Splice};
