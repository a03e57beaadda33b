use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    #[default]
    Generation,
    Lyrics,
    StemSeparation,
    Extension,
    WavConversion,
    Video,
    Allocation,
    Refund,
    Bonus,
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entry_type = match self {
            LedgerEntryType::Generation => "generation",
            LedgerEntryType::Lyrics => "lyrics",
            LedgerEntryType::StemSeparation => "stem_separation",
            LedgerEntryType::Extension => "extension",
            LedgerEntryType::WavConversion => "wav_conversion",
            LedgerEntryType::Video => "video",
            LedgerEntryType::Allocation => "allocation",
            LedgerEntryType::Refund => "refund",
            LedgerEntryType::Bonus => "bonus",
        };
        write!(f, "{}", entry_type)
    }
}

impl LedgerEntryType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "generation" => Some(LedgerEntryType::Generation),
            "lyrics" => Some(LedgerEntryType::Lyrics),
            "stem_separation" => Some(LedgerEntryType::StemSeparation),
            "extension" => Some(LedgerEntryType::Extension),
            "wav_conversion" => Some(LedgerEntryType::WavConversion),
            "video" => Some(LedgerEntryType::Video),
            "allocation" => Some(LedgerEntryType::Allocation),
            "refund" => Some(LedgerEntryType::Refund),
            "bonus" => Some(LedgerEntryType::Bonus),
            _ => None,
        }
    }

    /// Usage entries debit the balance; everything else credits it.
    pub fn is_debit(&self) -> bool {
        !matches!(
            self,
            LedgerEntryType::Allocation | LedgerEntryType::Refund | LedgerEntryType::Bonus
        )
    }
}
