//! Evaluation scores and lines. Pure data, White-perspective throughout.
//!
//! Engines report scores relative to the side to move; the oracle flips
//! them before they reach this layer, so every `Score` in the tree is
//! from White's point of view.

use serde::{Deserialize, Serialize};

/// Mate scores fold into centipawns just outside this band.
pub const MATE_CP_BASE: i32 = 10_000;

/// Anything beyond this is a folded mate score.
pub const MATE_CP_THRESHOLD: i32 = 9_000;

/// A single evaluation score, always from White's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Score {
    /// Centipawns (positive = White better)
    Cp(i32),
    /// Mate in N moves (positive = White mates, negative = Black mates)
    Mate(i32),
}

impl Score {
    /// Fold a mate score into the centipawn scale so scores stay
    /// comparable: closer mates score higher.
    pub fn as_cp(&self) -> i32 {
        match *self {
            Score::Cp(cp) => cp,
            Score::Mate(m) => {
                if m > 0 {
                    MATE_CP_BASE - m * 10
                } else {
                    -MATE_CP_BASE - m * 10
                }
            }
        }
    }

    /// Same value seen from the given side.
    pub fn as_cp_for(&self, color: chess::Color) -> i32 {
        match color {
            chess::Color::White => self.as_cp(),
            chess::Color::Black => -self.as_cp(),
        }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, Score::Mate(_))
    }

    /// Flip perspective (used once, inside the oracle).
    pub fn flipped(&self) -> Score {
        match *self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(m) => Score::Mate(-m),
        }
    }
}

/// One ranked engine line for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationLine {
    /// Rank, 1 = strongest. Unique within a line set.
    pub id: u32,
    /// Search depth the line was reported at
    pub depth: u32,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
    /// Score from White's perspective
    pub score: Score,
}

impl EvaluationLine {
    /// First move of the principal variation, if any.
    pub fn first_move(&self) -> Option<&str> {
        self.pv.first().map(|s| s.as_str())
    }
}

/// White's win probability for a centipawn score (White perspective).
///
/// Same logistic curve Lichess uses for its evaluation bar.
pub fn win_probability(cp: i32) -> f64 {
    1.0 / (1.0 + (-0.003_682_08 * cp as f64).exp())
}

/// Evaluation-bar percentage in [0, 100], 50 = even.
pub fn eval_bar_percent(score: &Score) -> f64 {
    match score {
        Score::Mate(m) if *m > 0 => 100.0,
        Score::Mate(_) => 0.0,
        Score::Cp(cp) => 100.0 * win_probability(*cp),
    }
}

/// Precomputed evaluation for the standard starting position.
///
/// The first move of a game has no engine-evaluated predecessor; this
/// seed stands in for it instead of treating the gap as an error.
pub fn start_position_lines() -> Vec<EvaluationLine> {
    let mk = |id: u32, cp: i32, pv: &[&str]| EvaluationLine {
        id,
        depth: 20,
        pv: pv.iter().map(|m| m.to_string()).collect(),
        score: Score::Cp(cp),
    };
    vec![
        mk(1, 28, &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"]),
        mk(2, 25, &["d2d4", "g8f6", "c2c4", "e7e6", "b1c3"]),
        mk(3, 21, &["g1f3", "d7d5", "d2d4", "g8f6", "c2c4"]),
        mk(4, 16, &["c2c4", "e7e5", "b1c3", "g8f6", "g1f3"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_folds_outside_cp_band() {
        assert_eq!(Score::Mate(1).as_cp(), 9990);
        assert_eq!(Score::Mate(-1).as_cp(), -9990);
        assert!(Score::Mate(3).as_cp() > MATE_CP_THRESHOLD);
        assert!(Score::Mate(3).as_cp() < Score::Mate(2).as_cp());
        assert!(Score::Mate(-2).as_cp() < Score::Mate(-5).as_cp());
    }

    #[test]
    fn test_perspective_flip() {
        assert_eq!(Score::Cp(120).as_cp_for(chess::Color::Black), -120);
        assert_eq!(Score::Mate(2).flipped(), Score::Mate(-2));
    }

    #[test]
    fn test_win_probability_symmetry() {
        assert!((win_probability(0) - 0.5).abs() < 1e-9);
        let p = win_probability(300);
        let q = win_probability(-300);
        assert!((p + q - 1.0).abs() < 1e-9);
        assert!(p > 0.7);
    }

    #[test]
    fn test_eval_bar_bounds() {
        assert_eq!(eval_bar_percent(&Score::Mate(4)), 100.0);
        assert_eq!(eval_bar_percent(&Score::Mate(-4)), 0.0);
        let mid = eval_bar_percent(&Score::Cp(0));
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_seed_is_ranked() {
        let lines = start_position_lines();
        assert_eq!(lines[0].id, 1);
        for pair in lines.windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].score.as_cp() >= pair[1].score.as_cp());
        }
    }
}
