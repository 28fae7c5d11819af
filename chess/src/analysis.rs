//! Engine evaluation types shared by the engine interpreter and the session.

use cozy_chess::Color;
use serde::{Deserialize, Serialize};

/// Evaluation reported for a forced mate, in pawns.
pub const MATE_EVALUATION: f32 = 100.0;

/// One ranked line of a multi-PV search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineAnalysis {
    pub multipv: u8,
    pub depth: Option<u32>,
    /// Score from White's point of view.
    pub score: Option<AnalysisScore>,
    /// Principal variation as UCI move strings.
    pub pv: Vec<String>,
}

/// Engine evaluation score.
///
/// As reported by the engine this is relative to the side to move:
/// positive centipawns favour the side to move, positive N for mate means
/// the side to move mates in N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }

    /// Re-express a side-to-move score from White's point of view.
    ///
    /// `side_to_move` must be the side that was to move when the search was
    /// requested, not whatever position is on screen now.
    pub fn for_white(&self, side_to_move: Color) -> Self {
        match side_to_move {
            Color::White => *self,
            Color::Black => self.negate(),
        }
    }

    /// Evaluation in pawns. Mate scores saturate to ±[`MATE_EVALUATION`];
    /// `Mate(0)` means the side to move is already mated.
    pub fn pawns(&self) -> f32 {
        match self {
            Self::Centipawns(cp) => *cp as f32 / 100.0,
            Self::Mate(m) if *m > 0 => MATE_EVALUATION,
            Self::Mate(_) => -MATE_EVALUATION,
        }
    }
}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_to_move_flips_sign() {
        let score = AnalysisScore::Centipawns(35).for_white(Color::Black);
        assert_eq!(score.pawns(), -0.35);
    }

    #[test]
    fn test_mate_saturates() {
        assert_eq!(AnalysisScore::Mate(-3).for_white(Color::White).pawns(), -MATE_EVALUATION);
        assert_eq!(AnalysisScore::Mate(-3).for_white(Color::Black).pawns(), MATE_EVALUATION);
        assert_eq!(AnalysisScore::Mate(2).pawns(), MATE_EVALUATION);
    }

    #[test]
    fn test_display() {
        assert_eq!(AnalysisScore::Centipawns(-120).display(), "-1.20");
        assert_eq!(AnalysisScore::Mate(-4).display(), "-M4");
    }
}
