//! Tokenized G-code line

use std::collections::{BTreeMap, BTreeSet};

/// One tokenized G-code line
///
/// The raw text is kept verbatim so unchanged lines can be passed through
/// byte for byte.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcodeCommand {
    /// Original line text without the line terminator
    pub raw: String,
    /// Uppercase mnemonic with leading zeros removed (e.g. "G1", "T2", "M104")
    pub mnemonic: String,
    /// Lowercase parameter letter to value
    pub params: BTreeMap<char, f32>,
    /// Lowercase parameter letters given without a value
    pub flags: BTreeSet<char>,
    /// Text after the first ';', if any
    pub comment: Option<String>,
}

impl GcodeCommand {
    /// Value of a parameter (case-insensitive letter)
    pub fn param(&self, letter: char) -> Option<f32> {
        self.params.get(&letter.to_ascii_lowercase()).copied()
    }

    /// Whether a parameter or flag is present (case-insensitive letter)
    pub fn has(&self, letter: char) -> bool {
        let letter = letter.to_ascii_lowercase();
        self.params.contains_key(&letter) || self.flags.contains(&letter)
    }

    /// Whether the line is a G0/G1 move
    pub fn is_move(&self) -> bool {
        matches!(self.mnemonic.as_str(), "G0" | "G1")
    }

    /// Whether the line is a G1 linear move
    pub fn is_linear_move(&self) -> bool {
        self.mnemonic == "G1"
    }

    /// Whether the line is any motion command (including arcs)
    pub fn is_motion(&self) -> bool {
        matches!(self.mnemonic.as_str(), "G0" | "G1" | "G2" | "G3")
    }

    /// Tool number if this is a `T<n>` command
    pub fn tool(&self) -> Option<u32> {
        self.mnemonic
            .strip_prefix('T')
            .and_then(|n| n.parse::<u32>().ok())
    }

    /// Comment text with surrounding whitespace removed
    pub fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref().map(str::trim)
    }

    /// Whether the line holds no command and no comment
    pub fn is_blank(&self) -> bool {
        self.mnemonic.is_empty() && self.comment.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_line;

    #[test]
    fn test_param_lookup_is_case_insensitive() {
        let cmd = parse_line("G1 X10.5 e0.25");
        assert_eq!(cmd.param('x'), Some(10.5));
        assert_eq!(cmd.param('X'), Some(10.5));
        assert_eq!(cmd.param('E'), Some(0.25));
        assert!(cmd.has('e'));
        assert!(!cmd.has('y'));
    }

    #[test]
    fn test_tool_detection() {
        assert_eq!(parse_line("T3").tool(), Some(3));
        assert_eq!(parse_line("T0 ; change").tool(), Some(0));
        assert_eq!(parse_line("G1 X1").tool(), None);
        assert_eq!(parse_line("TX").tool(), None);
    }

    #[test]
    fn test_move_classification() {
        assert!(parse_line("G1 X1 E1").is_linear_move());
        assert!(parse_line("G0 X1").is_move());
        assert!(!parse_line("G0 X1").is_linear_move());
        assert!(parse_line("G2 X1 I1 J0").is_motion());
        assert!(parse_line("").is_blank());
        assert!(!parse_line("; note").is_blank());
    }
}
