use itertools::Itertools;
use strum::IntoEnumIterator;

/// Mutation categories following the Mutation Annotation Format (MAF) naming.
/// These are the values written to the `Mutation_Type` column of the detail chart.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
pub enum MutationType {
    #[strum(serialize = "Silent")]
    Silent,
    #[strum(serialize = "Missense_Mutation")]
    MissenseMutation,
    #[strum(serialize = "Nonsense_Mutation")]
    NonsenseMutation,
    #[strum(serialize = "Frame_Shift_Del")]
    FrameShiftDel,
    #[strum(serialize = "Frame_Shift_Ins")]
    FrameShiftIns,
    /// Frame shift whose direction is decided by the called allele, see `resolve(...)`
    #[strum(serialize = "Frame_Shift")]
    FrameShift,
    #[strum(serialize = "Splice_Site")]
    SpliceSite,
    #[strum(serialize = "In_Frame_Del")]
    InFrameDel,
    #[strum(serialize = "In_Frame_Ins")]
    InFrameIns
}

impl MutationType {
    /// All MAF names, comma separated, for error messages
    pub fn valid_names() -> String {
        MutationType::iter().join(", ")
    }

    /// Resolves the direction-less `FrameShift` into a deletion or insertion based on allele lengths.
    /// All other types are returned unchanged.
    /// # Arguments
    /// * `reference` - the REF allele of the record
    /// * `allele` - the called ALT allele
    pub fn resolve(self, reference: &str, allele: &str) -> Self {
        match self {
            MutationType::FrameShift => {
                if allele.len() < reference.len() {
                    MutationType::FrameShiftDel
                } else {
                    MutationType::FrameShiftIns
                }
            },
            other => other
        }
    }
}
