//! Error handling for SpliceKit
//!
//! Provides structured error types for every stage of a conversion:
//! - Configuration errors (malformed palette data)
//! - Splice length violations (ledger invariants)
//! - Per-layer structural violations found by preflight
//! - Ping state machine failures
//! - Script syntax/runtime errors from the transition templating language
//!
//! Numeric context travels in the variants; user-facing wording is produced
//! by [`Error::user_message`] at the presentation boundary.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors raised while loading or validating a palette configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The palette file could not be read.
    #[error("Failed to read palette file: {0}")]
    Io(#[from] io::Error),

    /// The palette file is not valid JSON.
    #[error("Invalid JSON palette: {0}")]
    Json(#[from] serde_json::Error),

    /// The palette file is not valid TOML.
    #[error("Invalid TOML palette: {0}")]
    Toml(#[from] toml::de::Error),

    /// The palette file extension is not recognised.
    #[error("Unsupported palette file format: {0}")]
    UnsupportedFormat(String),

    /// A palette value failed validation.
    #[error("Invalid palette setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidSetting`]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Which piece of filament a splice length violation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    /// The first piece, bounded by the generation-specific minimum
    First,
    /// Any later piece, bounded by the global minimum
    Later,
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first piece"),
            Self::Later => write!(f, "later piece"),
        }
    }
}

/// A splice would create a piece shorter than the hardware can handle.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Piece {piece} ({kind}) is {actual:.2} mm, minimum is {required:.2} mm")]
pub struct SpliceError {
    /// First piece or later piece
    pub kind: PieceKind,
    /// 1-based piece number
    pub piece: usize,
    /// Length the piece would have had (mm)
    pub actual: f32,
    /// Minimum length for this piece (mm)
    pub required: f32,
}

impl SpliceError {
    /// Two-line message shown to the user
    pub fn user_message(&self) -> String {
        format!(
            "Piece {} is too short ({}).\nLength: {:.2} mm, required: {:.2} mm",
            self.piece, self.kind, self.actual, self.required
        )
    }
}

/// Per-layer invariant violations found by preflight.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// A layer never received a thickness hint
    #[error("Layer {layer} has zero thickness")]
    ZeroThickness { layer: usize },

    /// A layer never received a top-Z value
    #[error("Layer {layer} has zero top Z")]
    ZeroTopZ { layer: usize },

    /// Object start and end markers do not pair up on a layer
    #[error("Layer {layer} has unbalanced object markers ({starts} starts, {ends} ends)")]
    UnbalancedObjects {
        layer: usize,
        starts: u32,
        ends: u32,
    },
}

impl LayerError {
    /// Index of the offending layer
    pub fn layer(&self) -> usize {
        match self {
            Self::ZeroThickness { layer }
            | Self::ZeroTopZ { layer }
            | Self::UnbalancedObjects { layer, .. } => *layer,
        }
    }
}

/// Ping state machine failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PingError {
    /// An accessory ping began during a side transition that ended first
    #[error(
        "Ping started at {start:.2} mm could not complete during a side transition ({remaining:.2} mm short)"
    )]
    IncompleteDuringSideTransition { start: f32, remaining: f32 },
}

/// Category of a script failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// The script text could not be parsed
    Syntax,
    /// The script failed while being evaluated
    Runtime,
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax error"),
            Self::Runtime => write!(f, "Runtime error"),
        }
    }
}

/// An error from the transition templating language.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at line {line}, column {column}: {message}")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    /// 1-based source line
    pub line: usize,
    /// 1-based source column
    pub column: usize,
}

impl ScriptError {
    /// Create a syntax error at a source location
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: ScriptErrorKind::Syntax,
            message: message.into(),
            line,
            column,
        }
    }

    /// Create a runtime error at a source location
    pub fn runtime(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: ScriptErrorKind::Runtime,
            message: message.into(),
            line,
            column,
        }
    }
}

/// Tower sizing failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TowerError {
    /// No layer carries any transition volume
    #[error("No tower needed: no layer has any transition volume")]
    NoTransitions,

    /// A layer cannot be rasterized
    #[error("Tower layer {layer} out of range (tower has {layer_count} layers)")]
    LayerOutOfRange { layer: usize, layer_count: usize },
}

/// Problems with the G-code stream itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// A tool command selects a drive with no configured material
    #[error("Tool T{tool} at line {line} has no material loaded")]
    UnknownTool { tool: u32, line: usize },

    /// A tool change appeared in the output pass that preflight never saw
    #[error("Unexpected tool change at line {line}")]
    UnexpectedTransition { line: usize },
}

/// Ledger usage errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The ledger was already closed by `add_last_splice`
    #[error("Splice ledger already finalized")]
    AlreadyFinalized,

    /// The ledger was serialized before being closed
    #[error("Splice ledger not finalized")]
    NotFinalized,

    /// A splice referenced a drive the palette does not have
    #[error("Drive {drive} does not exist on this palette")]
    UnknownDrive { drive: usize },
}

/// Main error type for SpliceKit
#[derive(Error, Debug)]
pub enum Error {
    /// Palette configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Splice length violation
    #[error(transparent)]
    Splice(#[from] SpliceError),

    /// Per-layer structural violation
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// Ping failure
    #[error(transparent)]
    Ping(#[from] PingError),

    /// Script failure
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Tower sizing failure
    #[error(transparent)]
    Tower(#[from] TowerError),

    /// G-code stream problem
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Ledger usage error
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Text suitable for showing to the person running the conversion
    pub fn user_message(&self) -> String {
        match self {
            Error::Splice(err) => err.user_message(),
            Error::Layer(err) => format!(
                "The print could not be analysed (layer {}).\n{}",
                err.layer(),
                err
            ),
            other => other.to_string(),
        }
    }

    /// Check if this is a splice length violation
    pub fn is_splice_error(&self) -> bool {
        matches!(self, Error::Splice(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
