//! # SpliceKit Core
//!
//! Core types shared by every SpliceKit crate:
//! - The palette configuration (hardware generation, materials, splice
//!   algorithms, transition matrix, tower and side-transition settings)
//! - The error taxonomy used by the two conversion passes
//! - Hex encoding helpers used by the splice program encoders
//! - Bounding boxes with an explicit "unset" state

pub mod bounds;
pub mod constants;
pub mod error;
pub mod hex;
pub mod palette;

pub use bounds::{BoundingBox, Extent};
pub use error::{
    ConfigError, Error, GcodeError, LayerError, LedgerError, PieceKind, PingError, Result,
    ScriptError, ScriptErrorKind, SpliceError, TowerError,
};
pub use palette::{
    BedEdge, HookSettings, Material, MsfFormat, Palette, PaletteType, PingMode, PrintSettings,
    SideTransitionSettings, SideTransitionStyle, SpliceSettings, TowerSettings, TransitionMethod,
};
