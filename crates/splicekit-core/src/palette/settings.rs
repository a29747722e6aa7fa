//! Print, tower, and side-transition settings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where transitions are purged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMethod {
    /// The slicer's own wipe tower absorbs the purge
    #[default]
    SlicerTower,
    /// A tower generated during conversion absorbs the purge
    CustomTower,
    /// The purge happens off the model
    SideTransitions,
}

impl TransitionMethod {
    /// Whether purge extrusion is inserted into the stream by the converter
    pub fn inserts_purge(self) -> bool {
        !matches!(self, Self::SlicerTower)
    }
}

impl fmt::Display for TransitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlicerTower => write!(f, "slicer tower"),
            Self::CustomTower => write!(f, "custom tower"),
            Self::SideTransitions => write!(f, "side transitions"),
        }
    }
}

/// General print settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintSettings {
    /// Filament diameter (mm)
    pub filament_diameter: f32,
    /// Extrusion multiplier applied to the volume model
    pub extrusion_multiplier: f32,
    /// Tool the printer uses for every material
    pub primer_tool: u8,
    /// Comment marking the start of the print, if the slicer emits one
    pub start_marker: Option<String>,
    /// Travel feedrate for inserted moves (mm/min)
    pub travel_feedrate: f32,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            filament_diameter: 1.75,
            extrusion_multiplier: 1.0,
            primer_tool: 0,
            start_marker: None,
            travel_feedrate: 6000.0,
        }
    }
}

impl PrintSettings {
    /// Cross-sectional area of the filament (mm²)
    pub fn filament_area(&self) -> f32 {
        let radius = self.filament_diameter / 2.0;
        std::f32::consts::PI * radius * radius
    }
}

/// Geometry and density bounds of a generated tower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerSettings {
    /// Tower center X (mm)
    pub center_x: f32,
    /// Tower center Y (mm)
    pub center_y: f32,
    /// Width term of the footprint aspect ratio (0 = unset)
    pub aspect_width: f32,
    /// Height term of the footprint aspect ratio (0 = unset)
    pub aspect_height: f32,
    /// Density floor for every layer except the first (percent)
    pub min_density: f32,
    /// Density floor for the first layer (percent)
    pub min_first_layer_density: f32,
    /// Density ceiling (percent)
    pub max_density: f32,
    /// Extrusion line width (mm)
    pub extrusion_width: f32,
    /// Feedrate for tower moves (mm/min)
    pub print_feedrate: f32,
    /// Draw perimeters around each layer
    pub perimeters: bool,
    /// Number of contracting perimeters
    pub perimeter_count: u32,
    /// Perimeters are skipped above this density (percent)
    pub perimeter_density_threshold: f32,
    /// Always draw perimeters on the first layer after the raft
    pub force_bottom_perimeter: bool,
    /// Raft layers printed by the slicer below the tower
    pub raft_layers: usize,
}

impl Default for TowerSettings {
    fn default() -> Self {
        Self {
            center_x: 20.0,
            center_y: 20.0,
            aspect_width: 0.0,
            aspect_height: 0.0,
            min_density: 5.0,
            min_first_layer_density: 50.0,
            max_density: 100.0,
            extrusion_width: 0.45,
            print_feedrate: 1800.0,
            perimeters: true,
            perimeter_count: 2,
            perimeter_density_threshold: 90.0,
            force_bottom_perimeter: true,
            raft_layers: 0,
        }
    }
}

/// Bed edge used by on-edge side transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedEdge {
    /// Maximum Y edge
    North,
    /// Minimum Y edge
    #[default]
    South,
    /// Maximum X edge
    East,
    /// Minimum X edge
    West,
}

/// Purge path style for side transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideTransitionStyle {
    /// Extrude in place at a fixed or model-relative position
    #[default]
    InPlace,
    /// Jog back and forth along a bed edge
    OnEdge,
    /// Run the configured script
    Custom,
}

/// Sequence run immediately before or after a side-transition purge
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookSettings {
    /// Emit nothing
    None,
    /// Built-in travel (lift and move before, return and lower after)
    #[default]
    Builtin,
    /// A user script in the templating language
    Script(String),
}

/// Settings for purging off the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideTransitionSettings {
    /// Purge path style
    pub style: SideTransitionStyle,
    /// Script body for the custom style
    pub script: String,
    /// Filament feedrate while purging (mm/min)
    pub purge_feedrate: f32,
    /// Nozzle travel feedrate while jogging (mm/min)
    pub jog_feedrate: f32,
    /// Fixed in-place X (mm)
    pub position_x: f32,
    /// Fixed in-place Y (mm)
    pub position_y: f32,
    /// Place in-place purges relative to the model bounding box
    pub relative_to_model: bool,
    /// Distance from the model bounding box for relative placement (mm)
    pub model_offset: f32,
    /// Edge used by on-edge purges
    pub edge: BedEdge,
    /// Bed extents (mm)
    pub bed_min_x: f32,
    pub bed_max_x: f32,
    pub bed_min_y: f32,
    pub bed_max_y: f32,
    /// Inset from the bed edge (mm)
    pub edge_margin: f32,
    /// Z lift while travelling to and from the purge (mm)
    pub z_lift: f32,
    /// Sequence before the purge body
    pub pre_hook: HookSettings,
    /// Sequence after the purge body
    pub post_hook: HookSettings,
}

impl Default for SideTransitionSettings {
    fn default() -> Self {
        Self {
            style: SideTransitionStyle::InPlace,
            script: String::new(),
            purge_feedrate: 200.0,
            jog_feedrate: 2000.0,
            position_x: 0.0,
            position_y: 0.0,
            relative_to_model: false,
            model_offset: 5.0,
            edge: BedEdge::South,
            bed_min_x: 0.0,
            bed_max_x: 250.0,
            bed_min_y: 0.0,
            bed_max_y: 210.0,
            edge_margin: 2.0,
            z_lift: 1.0,
            pre_hook: HookSettings::Builtin,
            post_hook: HookSettings::Builtin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filament_area() {
        let print = PrintSettings::default();
        let expected = std::f32::consts::PI * 0.875 * 0.875;
        assert!((print.filament_area() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_hook_settings_serde() {
        let hook: HookSettings = serde_json::from_str(r#""builtin""#).unwrap();
        assert_eq!(hook, HookSettings::Builtin);

        let hook: HookSettings = serde_json::from_str(r#"{"script": "G1 Z{currentZ + 2}"}"#).unwrap();
        assert_eq!(hook, HookSettings::Script("G1 Z{currentZ + 2}".to_string()));
    }

    #[test]
    fn test_inserts_purge() {
        assert!(!TransitionMethod::SlicerTower.inserts_purge());
        assert!(TransitionMethod::CustomTower.inserts_purge());
        assert!(TransitionMethod::SideTransitions.inserts_purge());
    }
}
