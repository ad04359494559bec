//! SAN and UCI move conversion over `chess::Board`.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};

use crate::error::CoreError;

/// Parse a UCI move string ("e2e4", "e7e8q") into a ChessMove.
pub fn parse_uci_move(uci: &str) -> Option<ChessMove> {
    if uci.len() < 4 {
        return None;
    }

    let bytes = uci.as_bytes();
    if !(b'a'..=b'h').contains(&bytes[0])
        || !(b'1'..=b'8').contains(&bytes[1])
        || !(b'a'..=b'h').contains(&bytes[2])
        || !(b'1'..=b'8').contains(&bytes[3])
    {
        return None;
    }

    let from = Square::make_square(
        Rank::from_index((bytes[1] - b'1') as usize),
        File::from_index((bytes[0] - b'a') as usize),
    );
    let to = Square::make_square(
        Rank::from_index((bytes[3] - b'1') as usize),
        File::from_index((bytes[2] - b'a') as usize),
    );

    let promotion = if uci.len() > 4 {
        match bytes[4] {
            b'q' | b'Q' => Some(Piece::Queen),
            b'r' | b'R' => Some(Piece::Rook),
            b'b' | b'B' => Some(Piece::Bishop),
            b'n' | b'N' => Some(Piece::Knight),
            _ => None,
        }
    } else {
        None
    };

    Some(ChessMove::new(from, to, promotion))
}

/// Format a move as UCI ("e2e4", "e7e8q").
pub fn move_to_uci(mv: ChessMove) -> String {
    format!(
        "{}{}{}",
        mv.get_source(),
        mv.get_dest(),
        mv.get_promotion()
            .map(|p| match p {
                Piece::Queen => "q",
                Piece::Rook => "r",
                Piece::Bishop => "b",
                Piece::Knight => "n",
                _ => "",
            })
            .unwrap_or("")
    )
}

/// Find the legal move matching a SAN string.
pub fn parse_san(board: &Board, san: &str) -> Result<ChessMove, CoreError> {
    let clean = san.trim_end_matches(|c: char| c == '+' || c == '#' || c == '!' || c == '?');

    let legal_moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    // Handle castling
    if clean == "O-O" || clean == "0-0" {
        for m in &legal_moves {
            let src = m.get_source();
            let dst = m.get_dest();
            if board.piece_on(src) == Some(Piece::King) {
                let src_file = src.get_file().to_index();
                let dst_file = dst.get_file().to_index();
                if dst_file > src_file && (dst_file - src_file) == 2 {
                    return Ok(*m);
                }
            }
        }
        return Err(CoreError::InvalidSan(format!(
            "no kingside castling move for: {san}"
        )));
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        for m in &legal_moves {
            let src = m.get_source();
            let dst = m.get_dest();
            if board.piece_on(src) == Some(Piece::King) {
                let src_file = src.get_file().to_index();
                let dst_file = dst.get_file().to_index();
                if src_file > dst_file && (src_file - dst_file) == 2 {
                    return Ok(*m);
                }
            }
        }
        return Err(CoreError::InvalidSan(format!(
            "no queenside castling move for: {san}"
        )));
    }

    // Parse piece, disambiguation, capture, destination, promotion
    let bytes = clean.as_bytes();
    if bytes.is_empty() {
        return Err(CoreError::InvalidSan("empty SAN move".to_string()));
    }

    let (piece, rest) = if bytes[0].is_ascii_uppercase() {
        let p = match bytes[0] {
            b'K' => Piece::King,
            b'Q' => Piece::Queen,
            b'R' => Piece::Rook,
            b'B' => Piece::Bishop,
            b'N' => Piece::Knight,
            _ => {
                return Err(CoreError::InvalidSan(format!(
                    "unknown piece: {}",
                    bytes[0] as char
                )))
            }
        };
        (p, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    // Extract promotion
    let (rest, promotion) = if let Some(eq_pos) = rest.find('=') {
        let promo_piece = match rest.as_bytes().get(eq_pos + 1) {
            Some(b'Q') => Some(Piece::Queen),
            Some(b'R') => Some(Piece::Rook),
            Some(b'B') => Some(Piece::Bishop),
            Some(b'N') => Some(Piece::Knight),
            _ => None,
        };
        (&rest[..eq_pos], promo_piece)
    } else {
        (rest, None)
    };

    // Remove capture marker
    let rest = rest.replace('x', "");

    // The last two characters are the destination square
    let rest_bytes = rest.as_bytes();
    if rest_bytes.len() < 2 {
        return Err(CoreError::InvalidSan(format!("SAN too short: {san}")));
    }

    let dest_file = rest_bytes[rest_bytes.len() - 2];
    let dest_rank = rest_bytes[rest_bytes.len() - 1];

    if !(b'a'..=b'h').contains(&dest_file) || !(b'1'..=b'8').contains(&dest_rank) {
        return Err(CoreError::InvalidSan(format!(
            "invalid destination in SAN: {san}"
        )));
    }

    let dest = Square::make_square(
        Rank::from_index((dest_rank - b'1') as usize),
        File::from_index((dest_file - b'a') as usize),
    );

    let disambig = &rest[..rest.len() - 2];

    let mut candidates: Vec<ChessMove> = legal_moves
        .into_iter()
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() == 1 {
        return Ok(candidates[0]);
    }

    if !disambig.is_empty() {
        let disambig_bytes = disambig.as_bytes();
        candidates.retain(|m| {
            let src = m.get_source();
            for &b in disambig_bytes {
                if (b'a'..=b'h').contains(&b) {
                    if src.get_file().to_index() != (b - b'a') as usize {
                        return false;
                    }
                } else if (b'1'..=b'8').contains(&b)
                    && src.get_rank().to_index() != (b - b'1') as usize
                {
                    return false;
                }
            }
            true
        });
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err(CoreError::InvalidSan(format!(
            "no legal move matches SAN: {san}"
        ))),
        _ => Err(CoreError::InvalidSan(format!(
            "ambiguous SAN: {san} ({} candidates)",
            candidates.len()
        ))),
    }
}

/// Render a legal move in SAN, with disambiguation and check suffixes.
pub fn move_to_san(board: &Board, mv: ChessMove) -> String {
    let src = mv.get_source();
    let dest = mv.get_dest();
    let piece = board.piece_on(src).unwrap_or(Piece::Pawn);

    let after = board.make_move_new(mv);
    let suffix = match after.status() {
        chess::BoardStatus::Checkmate => "#",
        _ if after.checkers().popcnt() > 0 => "+",
        _ => "",
    };

    // Castling
    if piece == Piece::King {
        let src_file = src.get_file().to_index() as i32;
        let dst_file = dest.get_file().to_index() as i32;
        if dst_file - src_file == 2 {
            return format!("O-O{suffix}");
        }
        if src_file - dst_file == 2 {
            return format!("O-O-O{suffix}");
        }
    }

    let is_capture = board.piece_on(dest).is_some()
        || (piece == Piece::Pawn && src.get_file() != dest.get_file());

    let promo = mv
        .get_promotion()
        .map(|p| {
            format!(
                "={}",
                match p {
                    Piece::Queen => "Q",
                    Piece::Rook => "R",
                    Piece::Bishop => "B",
                    Piece::Knight => "N",
                    _ => "",
                }
            )
        })
        .unwrap_or_default();

    if piece == Piece::Pawn {
        return if is_capture {
            format!(
                "{}x{}{}{}",
                (b'a' + src.get_file().to_index() as u8) as char,
                dest,
                promo,
                suffix
            )
        } else {
            format!("{dest}{promo}{suffix}")
        };
    }

    let letter = match piece {
        Piece::King => "K",
        Piece::Queen => "Q",
        Piece::Rook => "R",
        Piece::Bishop => "B",
        Piece::Knight => "N",
        Piece::Pawn => "",
    };

    // Disambiguation: other same-type pieces that can also reach dest
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && m.get_source() != src
                && board.piece_on(m.get_source()) == Some(piece)
        })
        .map(|m| m.get_source())
        .collect();

    let disambig = if rivals.is_empty() {
        String::new()
    } else if rivals.iter().all(|r| r.get_file() != src.get_file()) {
        format!("{}", (b'a' + src.get_file().to_index() as u8) as char)
    } else if rivals.iter().all(|r| r.get_rank() != src.get_rank()) {
        format!("{}", (b'1' + src.get_rank().to_index() as u8) as char)
    } else {
        format!("{src}")
    };

    let capture = if is_capture { "x" } else { "" };
    format!("{letter}{disambig}{capture}{dest}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_uci_move() {
        let mv = parse_uci_move("e2e4").unwrap();
        assert_eq!(move_to_uci(mv), "e2e4");
        let promo = parse_uci_move("e7e8q").unwrap();
        assert_eq!(promo.get_promotion(), Some(Piece::Queen));
        assert!(parse_uci_move("e9e4").is_none());
        assert!(parse_uci_move("xyz").is_none());
    }

    #[test]
    fn test_parse_san_basic() {
        let board = Board::default();
        let mv = parse_san(&board, "e4").unwrap();
        assert_eq!(move_to_uci(mv), "e2e4");
        let mv = parse_san(&board, "Nf3").unwrap();
        assert_eq!(move_to_uci(mv), "g1f3");
    }

    #[test]
    fn test_parse_san_illegal() {
        let board = Board::default();
        assert!(parse_san(&board, "Ke2").is_err());
        assert!(parse_san(&board, "e5").is_err());
    }

    #[test]
    fn test_san_round_trip() {
        let mut board = Board::default();
        for san in ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Bxc6", "dxc6", "O-O"] {
            let mv = parse_san(&board, san).unwrap();
            assert_eq!(move_to_san(&board, mv), *san, "round trip for {san}");
            board = board.make_move_new(mv);
        }
    }

    #[test]
    fn test_san_disambiguation() {
        // d2 is vacant and both knights can reach it
        let board =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/5N2/PPP1PPPP/RNBQKB1R w KQkq - 0 1").unwrap();
        let mv = parse_san(&board, "Nfd2").unwrap();
        assert_eq!(move_to_uci(mv), "f3d2");
        assert_eq!(move_to_san(&board, mv), "Nfd2");
    }

    #[test]
    fn test_san_mate_suffix() {
        // Scholar's mate final position
        let board =
            Board::from_str("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/8/PPPP1PPP/RNBQK1NR w KQkq - 0 4")
                .unwrap();
        let mv = parse_san(&board, "Qh5").unwrap();
        assert_eq!(move_to_san(&board, mv), "Qh5");
    }
}
