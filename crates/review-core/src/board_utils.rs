//! Bitboard helpers shared by the exchange resolver and phase detector.

use chess::{BitBoard, Board, CastleRights, Color, Piece, Rank, Square, EMPTY};

/// Piece value in pawn units (king excluded).
pub fn piece_points(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 1,
        Piece::Knight => 3,
        Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 0,
    }
}

/// Single-letter piece code ("q", "r", ...), lowercase.
pub fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Pawn attack squares (diagonal attacks only, not pushes).
pub fn pawn_attacks(square: Square, color: Color) -> BitBoard {
    let file = square.get_file().to_index();
    let rank = square.get_rank().to_index();

    let mut result = EMPTY;
    let target_rank = match color {
        Color::White if rank < 7 => rank + 1,
        Color::Black if rank > 0 => rank - 1,
        _ => return EMPTY,
    };

    if file > 0 {
        result |= BitBoard::from_square(Square::make_square(
            Rank::from_index(target_rank),
            chess::File::from_index(file - 1),
        ));
    }
    if file < 7 {
        result |= BitBoard::from_square(Square::make_square(
            Rank::from_index(target_rank),
            chess::File::from_index(file + 1),
        ));
    }
    result
}

/// All pieces of `color` that can actually land a capture on `square`.
///
/// Equivalent of python-chess `board.attackers(color, square)`; includes
/// the king, so an adjacent enemy king counts as an implicit attacker.
/// A piece absolutely pinned against its own king is excluded unless
/// the pin ray runs through `square`.
pub fn attackers(board: &Board, color: Color, square: Square) -> BitBoard {
    let occupied = *board.combined();
    let color_pieces = *board.color_combined(color);

    let mut result = EMPTY;

    // Pawns: reverse lookup. Pawn attacks FROM the target square with
    // the OPPOSITE color, intersected with actual pawns
    let pawn_atk = pawn_attacks(square, !color);
    result |= pawn_atk & *board.pieces(Piece::Pawn) & color_pieces;

    let knight_atk = chess::get_knight_moves(square);
    result |= knight_atk & *board.pieces(Piece::Knight) & color_pieces;

    let king_atk = chess::get_king_moves(square);
    result |= king_atk & *board.pieces(Piece::King) & color_pieces;

    let bishop_atk = chess::get_bishop_moves(square, occupied);
    result |=
        bishop_atk & (*board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen)) & color_pieces;

    let rook_atk = chess::get_rook_moves(square, occupied);
    result |= rook_atk & (*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)) & color_pieces;

    let mut legal = EMPTY;
    for sq in result {
        if !pinned_off_line(board, sq, square) {
            legal |= BitBoard::from_square(sq);
        }
    }
    legal
}

/// Is the piece on `sq` absolutely pinned along a ray that does not
/// pass through `target`?
fn pinned_off_line(board: &Board, sq: Square, target: Square) -> bool {
    let color = match board.color_on(sq) {
        Some(c) => c,
        None => return false,
    };
    let ksq = board.king_square(color);
    if chess::line(ksq, sq) == EMPTY {
        return false;
    }

    let blockers = *board.combined() & !BitBoard::from_square(sq);
    let enemy = *board.color_combined(!color);
    let straight = (*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)) & enemy;
    let diagonal = (*board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen)) & enemy;
    let pinners = (chess::get_rook_moves(ksq, blockers) & straight)
        | (chess::get_bishop_moves(ksq, blockers) & diagonal);

    for pinner in pinners {
        if chess::between(ksq, pinner) & BitBoard::from_square(sq) == EMPTY {
            continue;
        }
        if chess::line(ksq, pinner) & BitBoard::from_square(target) == EMPTY {
            return true;
        }
    }
    false
}

/// Total pieces on the board (both sides, pawns and kings included).
pub fn total_piece_count(board: &Board) -> u32 {
    board.combined().popcnt()
}

/// Material sum for one side in pawn units (king excluded).
pub fn material_points(board: &Board, color: Color) -> i32 {
    let side = *board.color_combined(color);
    let mut total = 0;
    for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
        total += (side & *board.pieces(piece)).popcnt() as i32 * piece_points(piece);
    }
    total
}

/// Minor pieces (knights + bishops) for one side.
pub fn minor_count(board: &Board, color: Color) -> u32 {
    let side = *board.color_combined(color);
    ((*board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop)) & side).popcnt()
}

/// Major pieces (rooks + queens) for one side.
pub fn major_count(board: &Board, color: Color) -> u32 {
    let side = *board.color_combined(color);
    ((*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)) & side).popcnt()
}

pub fn has_queen(board: &Board, color: Color) -> bool {
    (*board.pieces(Piece::Queen) & *board.color_combined(color)).popcnt() > 0
}

/// Castling rights fully spent for this side.
pub fn castling_exhausted(board: &Board, color: Color) -> bool {
    board.castle_rights(color) == CastleRights::NoRights
}

/// Count minor/major pieces no longer on their starting squares.
///
/// A rough development proxy: knights, bishops, rooks and queen off
/// the back-rank squares they start the game on.
pub fn developed_count(board: &Board, color: Color) -> u32 {
    let back_rank = match color {
        Color::White => Rank::First,
        Color::Black => Rank::Eighth,
    };
    let start_squares: [(Piece, usize); 7] = [
        (Piece::Rook, 0),
        (Piece::Knight, 1),
        (Piece::Bishop, 2),
        (Piece::Queen, 3),
        (Piece::Bishop, 5),
        (Piece::Knight, 6),
        (Piece::Rook, 7),
    ];

    let side = *board.color_combined(color);
    let mut developed = 0;

    for (piece, file) in start_squares {
        let home = Square::make_square(back_rank, chess::File::from_index(file));
        let on_home = (BitBoard::from_square(home) & side & *board.pieces(piece)).popcnt() > 0;
        if !on_home {
            // Developed or traded; traded pieces still mark an opened game
            let remaining = (side & *board.pieces(piece)).popcnt();
            if remaining > 0 {
                developed += 1;
            }
        }
    }
    developed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_start_position_metrics() {
        let board = Board::default();
        assert_eq!(total_piece_count(&board), 32);
        assert_eq!(material_points(&board, Color::White), 39);
        assert_eq!(minor_count(&board, Color::Black), 4);
        assert_eq!(major_count(&board, Color::White), 3);
        assert!(has_queen(&board, Color::White));
        assert!(!castling_exhausted(&board, Color::White));
        assert_eq!(developed_count(&board, Color::White), 0);
    }

    #[test]
    fn test_attackers_includes_king() {
        // Black king on e5 attacks d4
        let board = Board::from_str("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let atk = attackers(&board, Color::Black, Square::from_str("d4").unwrap());
        assert_eq!(atk.popcnt(), 1);
    }

    #[test]
    fn test_attackers_pawn_direction() {
        // White pawn on e4 attacks d5 and f5, not d3
        let board = Board::from_str("4k3/8/8/8/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(
            attackers(&board, Color::White, Square::from_str("d5").unwrap()).popcnt(),
            1
        );
        assert_eq!(
            attackers(&board, Color::White, Square::from_str("d3").unwrap()).popcnt(),
            0
        );
    }

    #[test]
    fn test_pinned_piece_is_not_an_attacker() {
        // The e6 pawn is pinned to the e8 king by the e1 queen, so it
        // cannot capture on d5
        let board = Board::from_str("4k3/8/4p3/3N4/8/8/8/4Q1K1 b - - 0 1").unwrap();
        let atk = attackers(&board, Color::Black, Square::from_str("d5").unwrap());
        assert_eq!(atk.popcnt(), 0);
    }

    #[test]
    fn test_pinned_piece_still_attacks_its_pinner() {
        // The d6 rook is pinned to the d8 king by the d2 queen; taking
        // the queen keeps the rook on the pin ray and stays legal
        let board = Board::from_str("3k4/8/3r4/8/8/8/3Q4/6K1 b - - 0 1").unwrap();
        let atk = attackers(&board, Color::Black, Square::from_str("d2").unwrap());
        assert_eq!(atk.popcnt(), 1);
    }

    #[test]
    fn test_developed_count_after_knight_moves() {
        let board =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1").unwrap();
        assert_eq!(developed_count(&board, Color::White), 1);
        assert_eq!(developed_count(&board, Color::Black), 0);
    }
}
