//! Palette configuration
//!
//! The palette describes the splicing hardware and everything loaded into it:
//! generation, materials per drive, splice tuning, the transition-length
//! matrix, and the settings for each transition method. It is loaded once
//! from JSON or TOML, validated, and never mutated afterwards.

mod material;
mod settings;

pub use material::{Material, SpliceSettings};
pub use settings::{
    BedEdge, HookSettings, PrintSettings, SideTransitionSettings, SideTransitionStyle,
    TowerSettings, TransitionMethod,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// Splice program encoding consumed by the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsfFormat {
    /// Legacy line format (MSF 1.4)
    V1_4,
    /// O-command line format (MSF 2.0)
    V2_0,
    /// JSON document (MSF 3.0)
    V3_0,
}

/// Hardware generation and model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteType {
    Palette,
    PalettePlus,
    #[default]
    Palette2,
    Palette2Pro,
    Palette3,
    Palette3Pro,
}

impl PaletteType {
    /// Number of input drives
    pub fn drive_count(self) -> usize {
        match self {
            Self::Palette3Pro => 8,
            _ => 4,
        }
    }

    /// Minimum length of the first piece (mm)
    pub fn first_piece_min_length(self) -> f32 {
        match self {
            Self::Palette | Self::PalettePlus => 140.0,
            Self::Palette2 | Self::Palette2Pro => 100.0,
            Self::Palette3 | Self::Palette3Pro => 130.0,
        }
    }

    /// Length of the tube between splicer and extruder (mm)
    pub fn bowden_length(self) -> f32 {
        match self {
            Self::Palette | Self::PalettePlus => 750.0,
            Self::Palette2 | Self::Palette2Pro => 1000.0,
            Self::Palette3 | Self::Palette3Pro => 1200.0,
        }
    }

    /// Splice program encoding for this generation
    pub fn msf_format(self) -> MsfFormat {
        match self {
            Self::Palette | Self::PalettePlus => MsfFormat::V1_4,
            Self::Palette2 | Self::Palette2Pro => MsfFormat::V2_0,
            Self::Palette3 | Self::Palette3Pro => MsfFormat::V3_0,
        }
    }

    /// Whether the generation can receive in-band commands
    pub fn supports_connected_mode(self) -> bool {
        !matches!(self, Self::Palette | Self::PalettePlus)
    }
}

impl fmt::Display for PaletteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Palette => write!(f, "Palette"),
            Self::PalettePlus => write!(f, "Palette+"),
            Self::Palette2 => write!(f, "Palette 2"),
            Self::Palette2Pro => write!(f, "Palette 2 Pro"),
            Self::Palette3 => write!(f, "Palette 3"),
            Self::Palette3Pro => write!(f, "Palette 3 Pro"),
        }
    }
}

/// How pings reach the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingMode {
    /// A single in-band marker
    Connected,
    /// Two dwell pauses the hardware observes
    Accessory,
}

/// Complete palette configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Hardware generation
    pub palette_type: PaletteType,
    /// Hardware receives in-band commands instead of observing pauses
    pub connected_mode: bool,
    /// Printer profile identifier written into O-command headers
    pub printer_profile_id: String,
    /// Scroll wheel pulses per mm of filament
    pub pulses_per_mm: f32,
    /// Loading offset in pulses
    pub loading_offset: u32,
    /// Material per drive (`None` when the drive is empty)
    pub materials: Vec<Option<Material>>,
    /// Splice tuning rows keyed by material index pairs
    pub splice_settings: Vec<SpliceSettings>,
    /// Transition length (mm) indexed `[from drive][to drive]`
    pub transition_lengths: Vec<Vec<f32>>,
    /// Percentage of the configured transition length to purge
    pub transition_target: f32,
    /// Let internal infill absorb part of each transition
    pub use_infill_for_transitions: bool,
    /// Where transitions happen
    pub transition_method: TransitionMethod,
    pub print: PrintSettings,
    pub tower: TowerSettings,
    pub side_transitions: SideTransitionSettings,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            palette_type: PaletteType::Palette2,
            connected_mode: false,
            printer_profile_id: "0000000000000000".to_string(),
            pulses_per_mm: 30.0,
            loading_offset: 1500,
            materials: Vec::new(),
            splice_settings: Vec::new(),
            transition_lengths: vec![vec![130.0; 4]; 4],
            transition_target: 100.0,
            use_infill_for_transitions: false,
            transition_method: TransitionMethod::SlicerTower,
            print: PrintSettings::default(),
            tower: TowerSettings::default(),
            side_transitions: SideTransitionSettings::default(),
        }
    }
}

impl Palette {
    /// Load a palette from a `.json` or `.toml` file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let palette = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&content)?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        };

        tracing::debug!(
            "Loaded {} palette with {} materials from {}",
            palette.palette_type,
            palette.materials.iter().flatten().count(),
            path.display()
        );
        Ok(palette)
    }

    /// Parse and validate a JSON palette
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let palette: Self = serde_json::from_str(content)?;
        palette.validate()?;
        Ok(palette)
    }

    /// Parse and validate a TOML palette
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let palette: Self = toml::from_str(content)?;
        palette.validate()?;
        Ok(palette)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let drives = self.drive_count();

        if self.materials.iter().flatten().next().is_none() {
            return Err(ConfigError::invalid("materials", "no material loaded"));
        }
        if self.materials.len() > drives {
            return Err(ConfigError::invalid(
                "materials",
                format!(
                    "{} has {} drives but {} were configured",
                    self.palette_type,
                    drives,
                    self.materials.len()
                ),
            ));
        }
        for (drive, material) in self.materials.iter().enumerate() {
            if let Some(material) = material {
                if material.index == 0 {
                    return Err(ConfigError::invalid(
                        format!("materials[{}].index", drive),
                        "must be > 0",
                    ));
                }
            }
        }

        if self.transition_lengths.len() < self.materials.len()
            || self
                .transition_lengths
                .iter()
                .any(|row| row.len() != self.transition_lengths.len())
        {
            return Err(ConfigError::invalid(
                "transition_lengths",
                "must be a square matrix covering every configured drive",
            ));
        }
        if self
            .transition_lengths
            .iter()
            .flatten()
            .any(|len| !len.is_finite() || *len < 0.0)
        {
            return Err(ConfigError::invalid(
                "transition_lengths",
                "lengths must be finite and >= 0",
            ));
        }

        if !(self.transition_target > 0.0 && self.transition_target <= 100.0) {
            return Err(ConfigError::invalid(
                "transition_target",
                "must be in (0, 100]",
            ));
        }

        if !(self.pulses_per_mm.is_finite() && self.pulses_per_mm > 0.0) {
            return Err(ConfigError::invalid("pulses_per_mm", "must be > 0"));
        }

        if self.connected_mode && !self.palette_type.supports_connected_mode() {
            return Err(ConfigError::invalid(
                "connected_mode",
                format!("{} only supports accessory mode", self.palette_type),
            ));
        }

        if self.print.filament_diameter <= 0.0 || self.print.extrusion_multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "print",
                "filament diameter and extrusion multiplier must be > 0",
            ));
        }

        let tower = &self.tower;
        if !(tower.min_density > 0.0
            && tower.min_density <= tower.min_first_layer_density
            && tower.min_first_layer_density <= tower.max_density
            && tower.max_density <= 100.0)
        {
            return Err(ConfigError::invalid(
                "tower",
                "density bounds must satisfy 0 < min <= first layer min <= max <= 100",
            ));
        }
        if tower.extrusion_width <= 0.0 || tower.print_feedrate <= 0.0 {
            return Err(ConfigError::invalid(
                "tower",
                "extrusion width and feedrate must be > 0",
            ));
        }
        if tower.aspect_width < 0.0 || tower.aspect_height < 0.0 {
            return Err(ConfigError::invalid("tower", "aspect terms must be >= 0"));
        }

        let side = &self.side_transitions;
        if side.purge_feedrate <= 0.0 || side.jog_feedrate <= 0.0 {
            return Err(ConfigError::invalid(
                "side_transitions",
                "feedrates must be > 0",
            ));
        }
        if side.bed_max_x <= side.bed_min_x || side.bed_max_y <= side.bed_min_y {
            return Err(ConfigError::invalid(
                "side_transitions",
                "bed extents must be non-empty",
            ));
        }
        if side.style == SideTransitionStyle::Custom && side.script.trim().is_empty() {
            return Err(ConfigError::invalid(
                "side_transitions.script",
                "custom style requires a script",
            ));
        }

        Ok(())
    }

    /// Number of drives on this hardware
    pub fn drive_count(&self) -> usize {
        self.palette_type.drive_count()
    }

    /// Material loaded into a drive
    pub fn material(&self, drive: usize) -> Option<&Material> {
        self.materials.get(drive).and_then(|m| m.as_ref())
    }

    /// Material display index for a drive (0 when empty)
    pub fn material_index(&self, drive: usize) -> u8 {
        self.material(drive).map(|m| m.index).unwrap_or(0)
    }

    /// Configured transition length between two drives (mm)
    pub fn transition_length(&self, from: usize, to: usize) -> f32 {
        if from == to {
            return 0.0;
        }
        self.transition_lengths
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Splice tuning row for a material index pair
    pub fn splice_settings_for(&self, ingoing: u8, outgoing: u8) -> Option<&SpliceSettings> {
        self.splice_settings
            .iter()
            .find(|row| row.ingoing == ingoing && row.outgoing == outgoing)
    }

    /// How pings are delivered
    pub fn ping_mode(&self) -> PingMode {
        if self.connected_mode && self.palette_type.supports_connected_mode() {
            PingMode::Connected
        } else {
            PingMode::Accessory
        }
    }

    /// Loading offset converted to mm
    pub fn effective_loading_offset(&self) -> f32 {
        self.loading_offset as f32 / self.pulses_per_mm
    }

    /// Smallest total filament length the hardware accepts (mm)
    pub fn minimum_total_length(&self) -> f32 {
        self.effective_loading_offset() + self.palette_type.first_piece_min_length()
    }
}
