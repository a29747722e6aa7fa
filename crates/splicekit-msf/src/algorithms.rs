//! Splice algorithm derivation

use std::collections::BTreeMap;

use splicekit_core::SpliceSettings;

use crate::ledger::Msf;

/// Splice algorithm row written into the program
pub type Algorithm = SpliceSettings;

impl Msf {
    /// Algorithms needed by the splice list, deduplicated and sorted by
    /// (ingoing, outgoing) material index.
    ///
    /// Adjacent splices produce one pair each (ingoing is the splice's own
    /// drive, outgoing the previous splice's drive). Every used drive also
    /// produces a self pair for runout detection.
    pub fn output_algorithms(&self) -> Vec<Algorithm> {
        let palette = self.palette();
        let mut pairs: BTreeMap<(u8, u8), Algorithm> = BTreeMap::new();

        let mut add_pair = |ingoing: usize, outgoing: usize| {
            let ingoing = palette.material_index(ingoing);
            let outgoing = palette.material_index(outgoing);
            pairs.entry((ingoing, outgoing)).or_insert_with(|| {
                match palette.splice_settings_for(ingoing, outgoing) {
                    Some(row) => *row,
                    None => {
                        tracing::warn!(
                            "No splice settings for materials {} -> {}, using neutral settings",
                            ingoing,
                            outgoing
                        );
                        SpliceSettings::neutral(ingoing, outgoing)
                    }
                }
            });
        };

        for window in self.splices().windows(2) {
            add_pair(window[1].drive, window[0].drive);
        }
        for &drive in self.drives_used() {
            add_pair(drive, drive);
        }

        pairs.into_values().collect()
    }
}
