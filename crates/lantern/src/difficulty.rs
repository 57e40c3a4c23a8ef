use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Puzzle difficulty tier.
///
/// The closed set of tiers a client can ask for. Labels are matched
/// case-insensitively; anything unrecognized, including an absent label,
/// normalizes to [`Difficulty::Medium`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Clue-density search parameters handed to [`generate`](crate::generate).
///
/// `start` is the initial wall count for a candidate layout; `step` is how
/// many walls are added each time a candidate fails the uniqueness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisParams {
    pub start: usize,
    pub step: usize,
}

impl Difficulty {
    /// Parse a client-supplied label. Unknown labels fall back to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Map this tier and the board dimensions to synthesis parameters.
    ///
    /// - hard: one wall per five cells
    /// - easy: a single wall
    /// - medium: one wall per row or column, whichever is longer
    ///
    /// `step` is 1 for every tier.
    pub const fn synthesis_params(self, width: usize, height: usize) -> SynthesisParams {
        let start = match self {
            Self::Hard => width * height / 5,
            Self::Easy => 1,
            Self::Medium => {
                if width > height {
                    width
                } else {
                    height
                }
            }
        };
        SynthesisParams { start, step: 1 }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_the_published_formulas() {
        assert_eq!(
            Difficulty::from_label("hard").synthesis_params(10, 10),
            SynthesisParams { start: 20, step: 1 }
        );
        assert_eq!(
            Difficulty::from_label("easy").synthesis_params(7, 3),
            SynthesisParams { start: 1, step: 1 }
        );
        assert_eq!(
            Difficulty::from_label("weird").synthesis_params(6, 9),
            SynthesisParams { start: 9, step: 1 }
        );
    }

    #[test]
    fn labels_normalize_case_insensitively() {
        assert_eq!(Difficulty::from_label("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::from_label("Easy"), Difficulty::Easy);
        assert_eq!(Difficulty::from_label("medium"), Difficulty::Medium);
        assert_eq!(Difficulty::from_label(""), Difficulty::Medium);
        assert_eq!(Difficulty::from_label("nightmare"), Difficulty::Medium);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn display_round_trips_through_from_label() {
        for tier in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::from_label(tier.as_str()), tier);
        }
    }
}
