use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Quality category of a candidate match, ordered best-first.
///
/// The ordering is informational; selection of the best candidate within a
/// response goes by the service's numeric match-type score, not this enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
pub enum MatchKind {
    ExactMatch,
    ExactCanonicalMatch,
    FuzzyCanonicalMatch,
    ExactPartialMatch,
    FuzzyPartialMatch,
    ExactAbbreviatedMatch,
    FuzzyAbbreviatedMatch,
    ExactPartialAbbreviatedMatch,
    FuzzyPartialAbbreviatedMatch,
    EmptyMatch,
    ErrorInMatch,
}

impl MatchKind {
    /// Maps a match-type kind string from the index service. Older API
    /// versions use the `*ByUUID` spellings.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "ExactMatch" | "ExactNameMatchByUUID" => Self::ExactMatch,
            "ExactCanonicalMatch" | "ExactCanonicalNameMatchByUUID" => Self::ExactCanonicalMatch,
            "FuzzyCanonicalMatch" => Self::FuzzyCanonicalMatch,
            "ExactPartialMatch" | "ExactMatchPartialByGenus" => Self::ExactPartialMatch,
            "FuzzyPartialMatch" => Self::FuzzyPartialMatch,
            "ExactAbbreviatedMatch" => Self::ExactAbbreviatedMatch,
            "FuzzyAbbreviatedMatch" => Self::FuzzyAbbreviatedMatch,
            "ExactPartialAbbreviatedMatch" => Self::ExactPartialAbbreviatedMatch,
            "FuzzyPartialAbbreviatedMatch" => Self::FuzzyPartialAbbreviatedMatch,
            "EmptyMatch" => Self::EmptyMatch,
            _ => Self::ErrorInMatch,
        }
    }

    /// Human-readable label for output rows. Never used for control flow.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactMatch => "Exact string match",
            Self::ExactCanonicalMatch => "Canonical form exact match",
            Self::FuzzyCanonicalMatch => "Canonical form fuzzy match",
            Self::ExactPartialMatch => "Partial canonical form match",
            Self::FuzzyPartialMatch => "Partial canonical form fuzzy match",
            Self::ExactAbbreviatedMatch => "Abbreviated canonical form match",
            Self::FuzzyAbbreviatedMatch => "Abbreviated canonical form fuzzy match",
            Self::ExactPartialAbbreviatedMatch => "Partial abbreviated canonical form match",
            Self::FuzzyPartialAbbreviatedMatch => "Partial abbreviated canonical form fuzzy match",
            Self::EmptyMatch => "No match",
            Self::ErrorInMatch => "Error in match",
        }
    }
}
