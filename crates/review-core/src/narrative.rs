//! Game-level narrative classification from the evaluation-bar curve.
//!
//! Consumes the per-ply bar percentages (0..=100, 50 = even) plus the
//! game result and produces a story label and a one-line summary. The
//! summary text is picked from fixed pools with a seed derived from the
//! curve itself, so the same game always reads the same way.

use serde::{Deserialize, Serialize};

/// Swing magnitude (0..1 scale) that counts as a game-deciding blunder.
const BLUNDER_SWING: f64 = 0.25;

/// Mean swing above which a game reads as volatile.
const VOLATILE_MEAN_SWING: f64 = 0.15;

/// Time-in-advantage fraction above which one side dominated.
const DOMINANT_FRACTION: f64 = 0.70;

/// How far from even (0..1 scale) the final bar may sit for a "close
/// finish".
const CLOSE_FINISH_BAND: f64 = 0.10;

/// Bar percentage band treated as "no one is better".
const EVEN_BAND: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStory {
    BlunderDecided,
    Volatile,
    Dominant,
    CloseFinish,
    Balanced,
}

/// A swing between consecutive plies, magnitudes on a 0..1 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSwing {
    pub ply: usize,
    pub magnitude: f64,
    /// True when the bar moved toward White
    pub toward_white: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub story: GameStory,
    pub message: String,
    pub volatility: f64,
    pub biggest_swing: f64,
    pub blunder_count: usize,
    pub white_advantage_time: f64,
    pub black_advantage_time: f64,
}

/// Classify the whole game. Deterministic: identical inputs always
/// produce the identical summary, message included.
pub fn classify_game(bar_percents: &[f64], result: GameResult) -> NarrativeSummary {
    let swings = compute_swings(bar_percents);
    let volatility = if swings.is_empty() {
        0.0
    } else {
        swings.iter().map(|s| s.magnitude).sum::<f64>() / swings.len() as f64
    };

    let mut blunders: Vec<EvalSwing> = swings
        .iter()
        .copied()
        .filter(|s| s.magnitude >= BLUNDER_SWING)
        .collect();
    blunders.sort_by(|a, b| b.magnitude.partial_cmp(&a.magnitude).unwrap());
    let biggest_swing = blunders
        .first()
        .map(|s| s.magnitude)
        .or_else(|| {
            swings
                .iter()
                .map(|s| s.magnitude)
                .max_by(|a, b| a.partial_cmp(b).unwrap())
        })
        .unwrap_or(0.0);

    let (white_time, black_time) = advantage_fractions(bar_percents);
    let final_percent = bar_percents.last().copied().unwrap_or(50.0);

    let story = if !blunders.is_empty() {
        GameStory::BlunderDecided
    } else if volatility >= VOLATILE_MEAN_SWING {
        GameStory::Volatile
    } else if white_time > DOMINANT_FRACTION || black_time > DOMINANT_FRACTION {
        GameStory::Dominant
    } else if (final_percent / 100.0 - 0.5).abs() <= CLOSE_FINISH_BAND {
        GameStory::CloseFinish
    } else {
        GameStory::Balanced
    };

    let seed = message_seed(
        final_percent,
        volatility,
        white_time.max(black_time),
        blunders.len(),
        biggest_swing,
    );
    let pool = message_pool(story, result);
    let message = pool[(seed % pool.len() as u64) as usize].to_string();

    NarrativeSummary {
        story,
        message,
        volatility,
        biggest_swing,
        blunder_count: blunders.len(),
        white_advantage_time: white_time,
        black_advantage_time: black_time,
    }
}

/// Consecutive bar deltas, normalized to a 0..1 scale.
pub fn compute_swings(bar_percents: &[f64]) -> Vec<EvalSwing> {
    bar_percents
        .windows(2)
        .enumerate()
        .map(|(i, w)| EvalSwing {
            ply: i + 1,
            magnitude: (w[1] - w[0]).abs() / 100.0,
            toward_white: w[1] > w[0],
        })
        .collect()
}

/// Fraction of plies each side spent with the bar in its favor.
fn advantage_fractions(bar_percents: &[f64]) -> (f64, f64) {
    if bar_percents.is_empty() {
        return (0.0, 0.0);
    }
    let total = bar_percents.len() as f64;
    let white = bar_percents
        .iter()
        .filter(|&&p| p > 50.0 + EVEN_BAND)
        .count() as f64;
    let black = bar_percents
        .iter()
        .filter(|&&p| p < 50.0 - EVEN_BAND)
        .count() as f64;
    (white / total, black / total)
}

/// Integer seed from rounded curve statistics. Rounding first keeps the
/// seed stable against float noise in equivalent inputs.
fn message_seed(
    final_percent: f64,
    volatility: f64,
    advantage: f64,
    blunder_count: usize,
    biggest_swing: f64,
) -> u64 {
    let mut seed = final_percent.round() as u64;
    seed = seed
        .wrapping_mul(31)
        .wrapping_add((volatility * 1000.0).round() as u64);
    seed = seed
        .wrapping_mul(31)
        .wrapping_add((advantage * 100.0).round() as u64);
    seed = seed.wrapping_mul(31).wrapping_add(blunder_count as u64);
    seed.wrapping_mul(31)
        .wrapping_add((biggest_swing * 100.0).round() as u64)
}

fn message_pool(story: GameStory, result: GameResult) -> &'static [&'static str] {
    use GameResult::*;
    use GameStory::*;
    match (story, result) {
        (BlunderDecided, WhiteWins) => &[
            "One slip decided everything, and White pounced on it.",
            "The game turned on a single mistake that White never let Black recover from.",
            "Black's blunder handed White the game in one stroke.",
        ],
        (BlunderDecided, BlackWins) => &[
            "One slip decided everything, and Black pounced on it.",
            "The game turned on a single mistake that Black never let White recover from.",
            "White's blunder handed Black the game in one stroke.",
        ],
        (BlunderDecided, Draw) => &[
            "Big mistakes flew in both directions, and somehow the game still ended level.",
            "A game of heavy swings that cancelled each other out into a draw.",
        ],
        (Volatile, WhiteWins) => &[
            "A wild, swinging battle that White finally dragged over the line.",
            "The advantage changed hands over and over before White kept it last.",
            "Chaos from start to finish, with White standing when the dust settled.",
        ],
        (Volatile, BlackWins) => &[
            "A wild, swinging battle that Black finally dragged over the line.",
            "The advantage changed hands over and over before Black kept it last.",
            "Chaos from start to finish, with Black standing when the dust settled.",
        ],
        (Volatile, Draw) => &[
            "A rollercoaster of a game that neither side could hold onto.",
            "Both players had it won at some point; neither could keep it.",
        ],
        (Dominant, WhiteWins) => &[
            "White took control early and never gave it back.",
            "A one-sided squeeze: White dictated the play from the opening onward.",
            "White converted a long-held advantage without real drama.",
        ],
        (Dominant, BlackWins) => &[
            "Black took control early and never gave it back.",
            "A one-sided squeeze: Black dictated the play from the opening onward.",
            "Black converted a long-held advantage without real drama.",
        ],
        (Dominant, Draw) => &[
            "One side pressed for most of the game but the defence held.",
            "A long advantage that never quite became a full point.",
        ],
        (CloseFinish, WhiteWins) => &[
            "Balanced to the very end, until White found the last idea.",
            "A tense, level game decided only in the final moves by White.",
        ],
        (CloseFinish, BlackWins) => &[
            "Balanced to the very end, until Black found the last idea.",
            "A tense, level game decided only in the final moves by Black.",
        ],
        (CloseFinish, Draw) => &[
            "Dead level throughout; a fair draw.",
            "Neither side ever got a real edge, and the draw reflects it.",
        ],
        (Balanced, WhiteWins) => &[
            "A steady game where White's small edges slowly added up.",
            "No fireworks: White simply accumulated an advantage move by move.",
        ],
        (Balanced, BlackWins) => &[
            "A steady game where Black's small edges slowly added up.",
            "No fireworks: Black simply accumulated an advantage move by move.",
        ],
        (Balanced, Draw) => &[
            "A quiet, well-matched game that drifted to a fair draw.",
            "Solid play on both sides with never enough to tip the balance.",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_deterministic() {
        let curve = vec![50.0, 55.0, 52.0, 60.0, 58.0, 90.0, 95.0];
        let a = classify_game(&curve, GameResult::WhiteWins);
        let b = classify_game(&curve, GameResult::WhiteWins);
        assert_eq!(a, b);
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn test_large_swing_reads_as_blunder_decided() {
        let curve = vec![50.0, 52.0, 51.0, 20.0, 15.0, 5.0];
        let summary = classify_game(&curve, GameResult::BlackWins);
        assert_eq!(summary.story, GameStory::BlunderDecided);
        assert_eq!(summary.blunder_count, 1);
        assert!(summary.biggest_swing >= 0.25);
        assert!(summary.message.contains("Black"));
    }

    #[test]
    fn test_jittery_curve_reads_as_volatile() {
        let curve = vec![50.0, 70.0, 48.0, 68.0, 46.0, 66.0, 44.0];
        let summary = classify_game(&curve, GameResult::Draw);
        assert_eq!(summary.story, GameStory::Volatile);
    }

    #[test]
    fn test_one_sided_curve_reads_as_dominant() {
        let curve = vec![50.0, 62.0, 64.0, 66.0, 68.0, 70.0, 72.0, 74.0, 75.0, 76.0];
        let summary = classify_game(&curve, GameResult::WhiteWins);
        assert_eq!(summary.story, GameStory::Dominant);
        assert!(summary.white_advantage_time > 0.7);
    }

    #[test]
    fn test_level_curve_reads_as_close_finish() {
        let curve = vec![50.0, 52.0, 49.0, 51.0, 50.0, 48.0, 50.0];
        let summary = classify_game(&curve, GameResult::Draw);
        assert_eq!(summary.story, GameStory::CloseFinish);
    }

    #[test]
    fn test_empty_curve_is_handled() {
        let summary = classify_game(&[], GameResult::Draw);
        assert_eq!(summary.blunder_count, 0);
        assert_eq!(summary.volatility, 0.0);
    }
}
