//! # SpliceKit G-code
//!
//! The collaborators the conversion passes are built on:
//! - A line tokenizer producing [`GcodeCommand`] values
//! - Extrusion, position, and temperature trackers fed with every line
//! - Slicer hint comment recognition
//! - A line streaming helper with early abort
//! - The templating language used for custom transition sequences

pub mod command;
pub mod hints;
pub mod parser;
pub mod script;
pub mod stream;
pub mod trackers;

pub use command::GcodeCommand;
pub use hints::{SlicerHint, TypeHint};
pub use parser::parse_line;
pub use script::{format_number, Script, ScriptLocals};
pub use stream::for_each_line;
pub use trackers::{ExtrusionTracker, PositionTracker, TemperatureTracker, Tracker, Trackers};
