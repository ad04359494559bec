//! Static exchange resolution: hanging pieces and safe captures.
//!
//! A piece is hanging when the cheapest capture sequence on its square,
//! resolved by repeatedly trading the least valuable attacker and
//! defender, nets the attacking side zero or more material. An adjacent
//! enemy king participates as an implicit attacker but may only capture
//! once no defenders remain.

use chess::{Board, Color, MoveGen, Piece, Square};
use serde::{Deserialize, Serialize};

use crate::board_utils::{attackers, piece_letter, piece_points};

/// Sentinel exchange value for the king: sorts after every real piece.
const KING_EXCHANGE_VALUE: i32 = 100;

/// A piece that can be captured without material compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangingPiece {
    pub piece: char,
    pub square: String,
    pub points: i32,
}

fn exchange_values(board: &Board, color: Color, square: Square) -> Vec<i32> {
    let mut values: Vec<i32> = attackers(board, color, square)
        .into_iter()
        .filter_map(|sq| board.piece_on(sq))
        .map(|p| {
            if p == Piece::King {
                KING_EXCHANGE_VALUE
            } else {
                piece_points(p)
            }
        })
        .collect();
    values.sort_unstable();
    values
}

/// Best net gain for the side to move on the square, capture optional.
fn exchange_gain(occupant: i32, mut to_move: Vec<i32>, other: Vec<i32>) -> i32 {
    if to_move.is_empty() {
        return 0;
    }
    // King cannot capture while the square is still covered
    if to_move[0] == KING_EXCHANGE_VALUE && !other.is_empty() {
        return 0;
    }
    let attacker = to_move.remove(0);
    let reply = exchange_gain(attacker, other, to_move);
    (occupant - reply).max(0)
}

/// Is the piece on `square` capturable with a non-negative exchange?
///
/// Color-symmetric: mirroring the position and square mirrors the result.
pub fn is_hanging(board: &Board, square: Square) -> bool {
    let piece = match board.piece_on(square) {
        Some(p) => p,
        None => return false,
    };
    let color = match board.color_on(square) {
        Some(c) => c,
        None => return false,
    };

    let mut atk = exchange_values(board, !color, square);
    let def = exchange_values(board, color, square);

    if atk.is_empty() {
        return false;
    }
    // First capture uses the least valuable attacker; a lone king
    // attacker cannot step onto a defended square.
    if atk[0] == KING_EXCHANGE_VALUE && !def.is_empty() {
        return false;
    }
    let first = atk.remove(0);
    let reply = exchange_gain(first, def, atk);
    piece_points(piece) - reply >= 0
}

/// All hanging non-king, non-pawn pieces of `color`.
pub fn hanging_pieces(board: &Board, color: Color) -> Vec<HangingPiece> {
    let mut result = Vec::new();
    let side = *board.color_combined(color);
    for sq in side {
        let piece = match board.piece_on(sq) {
            Some(Piece::King) | Some(Piece::Pawn) | None => continue,
            Some(p) => p,
        };
        if is_hanging(board, sq) {
            result.push(HangingPiece {
                piece: piece_letter(piece),
                square: sq.to_string(),
                points: piece_points(piece),
            });
        }
    }
    result
}

/// Does the side to move have a checkmate in one?
pub fn has_mate_in_one(board: &Board) -> bool {
    MoveGen::new_legal(board)
        .any(|m| board.make_move_new(m).status() == chess::BoardStatus::Checkmate)
}

/// Can the side to move actually take the piece on `square` and keep
/// the material?
///
/// True if some legal capture onto the square neither leaves a more
/// valuable friendly piece hanging afterwards nor walks into a mate in
/// one.
pub fn safely_capturable(board: &Board, square: Square) -> bool {
    let captured_points = match board.piece_on(square) {
        Some(p) => piece_points(p),
        None => return false,
    };
    let capturing_side = board.side_to_move();

    for mv in MoveGen::new_legal(board).filter(|m| m.get_dest() == square) {
        let after = board.make_move_new(mv);

        if has_mate_in_one(&after) {
            continue;
        }
        let leaves_bigger_hanging = hanging_pieces(&after, capturing_side)
            .iter()
            .any(|h| h.points > captured_points);
        if leaves_bigger_hanging {
            continue;
        }
        return true;
    }
    false
}
