//! Materials and splice algorithm rows

use serde::{Deserialize, Serialize};

/// A filament loaded into one drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Stable identifier of the material profile
    pub id: String,
    /// Display index written into splice programs (1-based, 0 means unused)
    pub index: u8,
    /// Human-readable name
    pub name: String,
    /// Colour as `rrggbb` hex
    pub color: String,
}

impl Material {
    /// Create a new material
    pub fn new(
        id: impl Into<String>,
        index: u8,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            index,
            name: name.into(),
            color: color.into(),
        }
    }

    /// Colour normalised to six lowercase hex digits
    pub fn color_hex(&self) -> String {
        let trimmed = self.color.trim_start_matches('#').to_lowercase();
        if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            trimmed
        } else {
            "000000".to_string()
        }
    }
}

/// Splice tuning for one (ingoing, outgoing) material index pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpliceSettings {
    /// Material index of the filament entering the splice
    pub ingoing: u8,
    /// Material index of the filament leaving the splice
    pub outgoing: u8,
    /// Heat offset
    #[serde(default)]
    pub heat: i16,
    /// Compression offset
    #[serde(default)]
    pub compression: i16,
    /// Cooling offset
    #[serde(default)]
    pub cooling: i16,
    /// Splice in reverse orientation
    #[serde(default)]
    pub reverse: bool,
}

impl SpliceSettings {
    /// Neutral row used when the palette has no tuning for a pair
    pub fn neutral(ingoing: u8, outgoing: u8) -> Self {
        Self {
            ingoing,
            outgoing,
            heat: 0,
            compression: 0,
            cooling: 0,
            reverse: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_normalisation() {
        assert_eq!(Material::new("a", 1, "Red", "#FF0000").color_hex(), "ff0000");
        assert_eq!(Material::new("a", 1, "Red", "00ff00").color_hex(), "00ff00");
        assert_eq!(Material::new("a", 1, "Red", "red").color_hex(), "000000");
    }

    #[test]
    fn test_splice_settings_defaults_from_json() {
        let settings: SpliceSettings =
            serde_json::from_str(r#"{"ingoing": 1, "outgoing": 2, "heat": -3}"#).unwrap();
        assert_eq!(settings.heat, -3);
        assert_eq!(settings.compression, 0);
        assert!(!settings.reverse);
    }
}
