//! Move classification as pure functions of evaluation data.
//!
//! `classify` maps (move lines, predecessor lines, move history) to a
//! classification plus auxiliary data. No hidden state: identical
//! inputs always produce identical output.

use std::str::FromStr;
use std::sync::OnceLock;

use chess::{Board, BoardStatus, Color, Piece, Square};
use serde::{Deserialize, Serialize};

use crate::board_utils::{attackers, piece_letter, piece_points};
use crate::eval::{win_probability, EvaluationLine};
use crate::exchange::{hanging_pieces, is_hanging, safely_capturable, HangingPiece};
use crate::move_tree::MoveRecord;
use crate::theory::TheoryBook;

/// Mover already decisively ahead at this many centipawns; sacrifices
/// from here are cashing in, not brilliant.
const OVERWHELMING_CP: i32 = 700;

/// Best-vs-second-best gap that makes a best move "hard to find".
const GREAT_GAP_CP: i32 = 130;

/// "Clearly ahead" bound used for the drawn-a-winning-position branch.
const AHEAD_CP: i32 = 100;

/// Win-probability band outside which a blunder is dampened.
const DECIDED_WP: f64 = 0.80;

/// Move quality tiers, strongest context first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Theory,
    Brilliant,
    Great,
    Perfect,
    Excellent,
    Good,
    Forced,
    Inaccuracy,
    Mistake,
    Blunder,
    Miss,
}

impl Classification {
    pub fn name(&self) -> &'static str {
        match self {
            Classification::Theory => "theory",
            Classification::Brilliant => "brilliant",
            Classification::Great => "great",
            Classification::Perfect => "perfect",
            Classification::Excellent => "excellent",
            Classification::Good => "good",
            Classification::Forced => "forced",
            Classification::Inaccuracy => "inaccuracy",
            Classification::Mistake => "mistake",
            Classification::Blunder => "blunder",
            Classification::Miss => "miss",
        }
    }

    /// Contribution to the accuracy average, in [0, 1].
    pub fn accuracy_weight(&self) -> f64 {
        match self {
            Classification::Theory
            | Classification::Brilliant
            | Classification::Great
            | Classification::Perfect
            | Classification::Forced => 1.0,
            Classification::Excellent => 0.9,
            Classification::Good => 0.7,
            Classification::Inaccuracy => 0.4,
            Classification::Mistake => 0.2,
            Classification::Miss => 0.1,
            Classification::Blunder => 0.0,
        }
    }
}

/// A piece left en prise on its own destination square.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrownAwayPiece {
    #[serde(rename = "type")]
    pub piece: char,
    pub square: String,
    pub value: i32,
}

/// Side data recorded alongside a classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thrown_away_piece: Option<ThrownAwayPiece>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sacrificed_pieces: Vec<HangingPiece>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub safely_capturable: Vec<HangingPiece>,
    /// Forced mate length after the move (positive = for the mover)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mate_in: Option<i32>,
    /// Forced mate length before the move, mover's perspective
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_mate_in: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub accuracy_weight: f64,
    pub centipawn_loss: i32,
    #[serde(default)]
    pub aux: AuxData,
}

impl ClassificationResult {
    fn new(classification: Classification, centipawn_loss: i32, aux: AuxData) -> Self {
        Self {
            classification,
            accuracy_weight: classification.accuracy_weight(),
            centipawn_loss,
            aux,
        }
    }

    fn plain(classification: Classification) -> Self {
        Self::new(classification, 0, AuxData::default())
    }
}

/// The move being classified: resulting position, its lines, its record.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    pub fen: &'a str,
    pub lines: &'a [EvaluationLine],
    pub record: Option<&'a MoveRecord>,
}

/// The predecessor position the move was played from.
#[derive(Debug, Clone, Copy)]
pub struct PreviousContext<'a> {
    pub fen: &'a str,
    pub lines: &'a [EvaluationLine],
    /// Classification of the move that produced the predecessor;
    /// `None` for the root (the starting position counts as theory).
    pub classification: Option<Classification>,
}

fn builtin_book() -> &'static TheoryBook {
    static BOOK: OnceLock<TheoryBook> = OnceLock::new();
    BOOK.get_or_init(TheoryBook::builtin)
}

/// Classify with the built-in theory table.
pub fn classify(
    mv: &MoveContext<'_>,
    prev: &PreviousContext<'_>,
    history: &[String],
) -> ClassificationResult {
    classify_with_book(mv, prev, history, builtin_book())
}

/// Classify a move. First matching rule wins; see module docs.
pub fn classify_with_book(
    mv: &MoveContext<'_>,
    prev: &PreviousContext<'_>,
    history: &[String],
    book: &TheoryBook,
) -> ClassificationResult {
    let mover = mover_color(mv, prev);

    // 1. No lines at all: terminal position
    if mv.lines.is_empty() {
        return classify_terminal(mv, prev, mover);
    }

    // 2. Opening theory, chained through the predecessor
    let prev_in_theory = prev
        .classification
        .map_or(true, |c| c == Classification::Theory);
    if prev_in_theory && book.matches(history) {
        return ClassificationResult::plain(Classification::Theory);
    }

    // 3. Only one legal continuation existed
    if prev.lines.len() == 1 {
        return ClassificationResult::plain(Classification::Forced);
    }
    if prev.lines.is_empty() {
        // No reference data; nothing to grade against
        return ClassificationResult::plain(Classification::Good);
    }

    let prev_best = &prev.lines[0];
    let new_best = &mv.lines[0];
    let prev_best_cp = prev_best.score.as_cp_for(mover);
    let new_best_cp = new_best.score.as_cp_for(mover);

    // 4. Evaluation loss: the kinder of best-vs-best and best-vs-played
    let played_uci = mv.record.map(|r| r.uci());
    let played_line = played_uci
        .as_deref()
        .and_then(|uci| prev.lines.iter().find(|l| l.first_move() == Some(uci)));
    let loss_vs_best = prev_best_cp - new_best_cp;
    let loss_vs_played = played_line
        .map(|l| prev_best_cp - l.score.as_cp_for(mover))
        .unwrap_or(loss_vs_best);
    let eval_loss = loss_vs_best.min(loss_vs_played).max(0);

    let mut aux = AuxData::default();

    // 5. Mate-state transition of (previous best, new best)
    let prev_mate = mate_for(prev_best, mover);
    let new_mate = mate_for(new_best, mover);
    let mut tier = match (prev_mate, new_mate) {
        (None, None) => cp_tier(eval_loss, prev_best_cp),
        (None, Some(n)) => {
            aux.mate_in = Some(n);
            if n > 0 {
                // Found a forced mate
                Classification::Perfect
            } else if n.abs() <= 2 {
                Classification::Blunder
            } else if n.abs() <= 5 {
                Classification::Mistake
            } else {
                Classification::Inaccuracy
            }
        }
        (Some(p), None) => {
            aux.previous_mate_in = Some(p);
            if p < 0 {
                // The mate threatened against the mover evaporated
                Classification::Perfect
            } else if new_best_cp >= 700 {
                Classification::Perfect
            } else if new_best_cp >= 400 {
                Classification::Good
            } else if new_best_cp >= 200 {
                Classification::Mistake
            } else {
                Classification::Miss
            }
        }
        (Some(p), Some(n)) => {
            aux.previous_mate_in = Some(p);
            aux.mate_in = Some(n);
            grade_mate_to_mate(p, n)
        }
    };

    // 6. Playing the engine's best move is never worse than Perfect
    let is_best_move = played_uci.as_deref().is_some()
        && prev_best.first_move() == played_uci.as_deref();
    if is_best_move {
        tier = Classification::Perfect;
    }

    // 7. Brilliant upgrade: a real sacrifice the opponent can accept
    if matches!(tier, Classification::Perfect | Classification::Excellent) {
        if let Some(upgraded) = try_brilliant(mv, prev, mover, prev_best_cp, &mut aux) {
            tier = upgraded;
        }
    }

    // 8. Great upgrade: the only good move, and not a free capture
    if tier == Classification::Perfect && prev_mate.is_none() && new_mate.is_none() {
        if is_great(mv, prev, mover) {
            tier = Classification::Great;
        }
    }

    // 9. A move that does not change who is winning cannot be a blunder
    if tier == Classification::Blunder {
        let wp_before = win_probability(prev_best_cp);
        let wp_after = win_probability(new_best_cp);
        if (wp_before > DECIDED_WP && wp_after > DECIDED_WP)
            || (wp_before < 1.0 - DECIDED_WP && wp_after < 1.0 - DECIDED_WP)
        {
            tier = Classification::Inaccuracy;
        }
    }

    // A blunder that parks a piece en prise gets the piece recorded
    if tier == Classification::Blunder {
        if let (Some(record), Ok(after)) = (mv.record, Board::from_str(mv.fen)) {
            if let Some(piece) = after.piece_on(record.to) {
                if piece != Piece::King && is_hanging(&after, record.to) {
                    aux.thrown_away_piece = Some(ThrownAwayPiece {
                        piece: piece_letter(piece),
                        square: record.to.to_string(),
                        value: piece_points(piece),
                    });
                }
            }
        }
    }

    ClassificationResult::new(tier, eval_loss, aux)
}

fn mover_color(mv: &MoveContext<'_>, prev: &PreviousContext<'_>) -> Color {
    if let Some(record) = mv.record {
        record.color
    } else {
        Board::from_str(prev.fen)
            .map(|b| b.side_to_move())
            .unwrap_or(Color::White)
    }
}

/// Mate distance from the mover's perspective, if the line is a mate.
fn mate_for(line: &EvaluationLine, mover: Color) -> Option<i32> {
    match line.score {
        crate::eval::Score::Mate(m) => Some(match mover {
            Color::White => m,
            Color::Black => -m,
        }),
        crate::eval::Score::Cp(_) => None,
    }
}

/// No-lines branch: the move ended the game (or claimed a draw).
fn classify_terminal(
    mv: &MoveContext<'_>,
    prev: &PreviousContext<'_>,
    mover: Color,
) -> ClassificationResult {
    let status = Board::from_str(mv.fen).map(|b| b.status()).ok();
    match status {
        Some(BoardStatus::Checkmate) => ClassificationResult::plain(Classification::Perfect),
        Some(BoardStatus::Stalemate) => ClassificationResult::plain(Classification::Miss),
        _ => {
            // Claimed draw (repetition / fifty moves): fine unless the
            // mover was clearly ahead
            let prev_cp = prev
                .lines
                .first()
                .map(|l| l.score.as_cp_for(mover))
                .unwrap_or(0);
            if prev_cp > AHEAD_CP {
                ClassificationResult::plain(Classification::Blunder)
            } else {
                ClassificationResult::plain(Classification::Perfect)
            }
        }
    }
}

/// Centipawn-to-centipawn tier thresholds.
///
/// Each tier's allowance grows quadratically with the size of the
/// previous advantage: when a position is already lopsided, the same
/// nominal centipawn swing matters much less.
fn cp_tier(eval_loss: i32, prev_best_cp: i32) -> Classification {
    let x = prev_best_cp.abs() as f64 / 100.0;
    let threshold = |base: f64, coef: f64| base + coef * x * x;
    let loss = eval_loss as f64;

    if loss <= threshold(10.0, 2.0) {
        Classification::Perfect
    } else if loss <= threshold(25.0, 5.0) {
        Classification::Excellent
    } else if loss <= threshold(60.0, 10.0) {
        Classification::Good
    } else if loss <= threshold(120.0, 15.0) {
        Classification::Inaccuracy
    } else if loss <= threshold(250.0, 20.0) {
        Classification::Mistake
    } else {
        Classification::Blunder
    }
}

/// Both sides of the move see a forced mate; did it get better or worse?
fn grade_mate_to_mate(prev_mate: i32, new_mate: i32) -> Classification {
    if prev_mate > 0 && new_mate < 0 {
        // Had a mate, now getting mated
        return Classification::Blunder;
    }
    if prev_mate > 0 {
        // Still mating: shorter is on track
        if new_mate <= prev_mate {
            Classification::Perfect
        } else if new_mate <= prev_mate + 2 {
            Classification::Excellent
        } else {
            Classification::Good
        }
    } else if new_mate < 0 {
        // Still getting mated: dragging it out is the best defence
        if new_mate.abs() >= prev_mate.abs() {
            Classification::Perfect
        } else {
            Classification::Good
        }
    } else {
        // Was getting mated, now mating
        Classification::Perfect
    }
}

/// Brilliant gate: a genuine sacrifice the opponent can accept.
fn try_brilliant(
    mv: &MoveContext<'_>,
    prev: &PreviousContext<'_>,
    mover: Color,
    prev_best_cp: i32,
    aux: &mut AuxData,
) -> Option<Classification> {
    let record = mv.record?;
    let prev_board = Board::from_str(prev.fen).ok()?;
    let after_board = Board::from_str(mv.fen).ok()?;

    // Cashing in a won game or escaping a check is not a sacrifice
    if prev_best_cp >= OVERWHELMING_CP {
        return None;
    }
    if prev_board.checkers().popcnt() > 0 {
        return None;
    }

    let captured_points = record.captured.map(piece_points).unwrap_or(0);
    let sacrificed: Vec<HangingPiece> = hanging_pieces(&after_board, mover)
        .into_iter()
        .filter(|h| h.points > captured_points)
        .collect();
    if sacrificed.is_empty() {
        return None;
    }

    // Damage control: a bigger piece fleeing an attack that happens to
    // leave a lesser piece behind is not an offer
    let moved_points = after_board
        .piece_on(record.to)
        .map(piece_points)
        .unwrap_or(0);
    let max_sacrificed = sacrificed.iter().map(|h| h.points).max().unwrap_or(0);
    let origin_attacked = attackers(&prev_board, !mover, record.from).popcnt() > 0;
    if moved_points > max_sacrificed && origin_attacked {
        return None;
    }

    // The offer has to be acceptable: some capture keeps the material
    let capturable: Vec<HangingPiece> = sacrificed
        .iter()
        .filter(|h| {
            Square::from_str(&h.square)
                .map(|sq| safely_capturable(&after_board, sq))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    if capturable.is_empty() {
        return None;
    }

    aux.sacrificed_pieces = sacrificed;
    aux.safely_capturable = capturable;
    Some(Classification::Brilliant)
}

/// Great gate: the best move was far ahead of the alternatives and is
/// not explained by grabbing a hanging piece.
fn is_great(mv: &MoveContext<'_>, prev: &PreviousContext<'_>, mover: Color) -> bool {
    let second = match prev.lines.get(1) {
        Some(l) => l,
        None => return false,
    };
    let gap = prev.lines[0].score.as_cp_for(mover) - second.score.as_cp_for(mover);
    if gap <= GREAT_GAP_CP {
        return false;
    }

    if let Some(record) = mv.record {
        if record.captured.is_some() {
            if let Ok(prev_board) = Board::from_str(prev.fen) {
                if is_hanging(&prev_board, record.to) {
                    // Free piece: obvious, not great
                    return false;
                }
            }
        }
    }
    true
}
