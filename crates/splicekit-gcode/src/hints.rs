//! Slicer hint comments
//!
//! Slicers annotate their output with comments that mark layer changes,
//! feature types, object boundaries and print summaries. Both conversion
//! passes key off these hints; they are recognised here once.

use regex::Regex;
use std::sync::OnceLock;

use super::GcodeCommand;

/// Feature type announced by a `;TYPE:` comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    /// The slicer's own wipe tower
    WipeTower,
    /// Internal (sparse) infill, usable as free purge
    InternalInfill,
    /// Any other feature
    Other,
}

/// A recognised slicer comment
#[derive(Debug, Clone, PartialEq)]
pub enum SlicerHint {
    /// `;LAYER_CHANGE` or `;LAYER:<n>`
    LayerChange,
    /// `;Z:<value>`
    TopZ(f32),
    /// `;HEIGHT:<value>`
    Height(f32),
    /// `;TYPE:<name>`
    Type(TypeHint),
    /// `; printing object <name>`
    ObjectStart(String),
    /// `; stop printing object <name>`
    ObjectEnd(String),
    /// `; filament used ...` summary line
    FilamentUsed,
    /// `; estimated printing time (normal mode) = ...`, in seconds
    TimeEstimate(u64),
}

impl SlicerHint {
    /// Recognise the hint carried by a command's comment, if any
    pub fn from_command(command: &GcodeCommand) -> Option<Self> {
        command.comment_text().and_then(Self::from_comment)
    }

    /// Recognise a hint from comment text (without the leading ';')
    pub fn from_comment(comment: &str) -> Option<Self> {
        let comment = comment.trim();

        if comment == "LAYER_CHANGE" || layer_regex().is_match(comment) {
            return Some(Self::LayerChange);
        }
        if let Some(value) = comment.strip_prefix("Z:") {
            return value.trim().parse().ok().map(Self::TopZ);
        }
        if let Some(value) = comment.strip_prefix("HEIGHT:") {
            return value.trim().parse().ok().map(Self::Height);
        }
        if let Some(name) = comment.strip_prefix("TYPE:") {
            return Some(Self::Type(TypeHint::from_name(name.trim())));
        }
        if let Some(name) = comment.strip_prefix("stop printing object") {
            return Some(Self::ObjectEnd(name.trim().to_string()));
        }
        if let Some(name) = comment.strip_prefix("printing object") {
            return Some(Self::ObjectStart(name.trim().to_string()));
        }
        if comment.starts_with("filament used") {
            return Some(Self::FilamentUsed);
        }
        if let Some(caps) = time_regex().captures(comment) {
            return Some(Self::TimeEstimate(parse_duration(&caps[1])));
        }

        None
    }
}

impl TypeHint {
    fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("Wipe tower") {
            Self::WipeTower
        } else if name.eq_ignore_ascii_case("Internal infill") || name == "FILL" {
            Self::InternalInfill
        } else {
            Self::Other
        }
    }
}

fn layer_regex() -> &'static Regex {
    static LAYER_REGEX: OnceLock<Regex> = OnceLock::new();
    LAYER_REGEX.get_or_init(|| Regex::new(r"^LAYER:-?\d+$").expect("invalid regex pattern"))
}

fn time_regex() -> &'static Regex {
    static TIME_REGEX: OnceLock<Regex> = OnceLock::new();
    TIME_REGEX.get_or_init(|| {
        Regex::new(r"^estimated printing time \(normal mode\)\s*=\s*(.+)$")
            .expect("invalid regex pattern")
    })
}

fn duration_part_regex() -> &'static Regex {
    static PART_REGEX: OnceLock<Regex> = OnceLock::new();
    PART_REGEX.get_or_init(|| Regex::new(r"(\d+)\s*([dhms])").expect("invalid regex pattern"))
}

/// Parse "1d 2h 3m 4s" style durations into seconds
fn parse_duration(text: &str) -> u64 {
    duration_part_regex()
        .captures_iter(text)
        .map(|caps| {
            let value: u64 = caps[1].parse().unwrap_or(0);
            match &caps[2] {
                "d" => value * 86_400,
                "h" => value * 3_600,
                "m" => value * 60,
                _ => value,
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_line;

    #[test]
    fn test_layer_change_hints() {
        assert_eq!(
            SlicerHint::from_comment("LAYER_CHANGE"),
            Some(SlicerHint::LayerChange)
        );
        assert_eq!(
            SlicerHint::from_comment("LAYER:12"),
            Some(SlicerHint::LayerChange)
        );
        assert_eq!(SlicerHint::from_comment("LAYER_COUNT:40"), None);
    }

    #[test]
    fn test_z_and_height() {
        assert_eq!(SlicerHint::from_comment("Z:0.6"), Some(SlicerHint::TopZ(0.6)));
        assert_eq!(
            SlicerHint::from_comment("HEIGHT:0.2"),
            Some(SlicerHint::Height(0.2))
        );
        assert_eq!(SlicerHint::from_comment("Z:abc"), None);
    }

    #[test]
    fn test_type_hints() {
        let cmd = parse_line(";TYPE:Wipe tower");
        assert_eq!(
            SlicerHint::from_command(&cmd),
            Some(SlicerHint::Type(TypeHint::WipeTower))
        );
        assert_eq!(
            SlicerHint::from_comment("TYPE:Internal infill"),
            Some(SlicerHint::Type(TypeHint::InternalInfill))
        );
        assert_eq!(
            SlicerHint::from_comment("TYPE:FILL"),
            Some(SlicerHint::Type(TypeHint::InternalInfill))
        );
        assert_eq!(
            SlicerHint::from_comment("TYPE:Perimeter"),
            Some(SlicerHint::Type(TypeHint::Other))
        );
    }

    #[test]
    fn test_object_markers() {
        assert_eq!(
            SlicerHint::from_comment(" printing object cube.stl id:0 copy 0"),
            Some(SlicerHint::ObjectStart("cube.stl id:0 copy 0".to_string()))
        );
        assert_eq!(
            SlicerHint::from_comment(" stop printing object cube.stl id:0 copy 0"),
            Some(SlicerHint::ObjectEnd("cube.stl id:0 copy 0".to_string()))
        );
    }

    #[test]
    fn test_summary_hints() {
        assert_eq!(
            SlicerHint::from_comment(" filament used [mm] = 1234.5"),
            Some(SlicerHint::FilamentUsed)
        );
        assert_eq!(
            SlicerHint::from_comment(" estimated printing time (normal mode) = 1d 2h 3m 4s"),
            Some(SlicerHint::TimeEstimate(93_784))
        );
        assert_eq!(
            SlicerHint::from_comment(" estimated printing time (normal mode) = 12m 0s"),
            Some(SlicerHint::TimeEstimate(720))
        );
    }
}
