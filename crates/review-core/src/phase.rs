//! Game phase detection from material and development metrics.
//!
//! Each mainline position is classified independently; a boundary is
//! recorded whenever the detected phase differs from the previous ply.
//! Phases may regress (a simplification can read as endgame while a
//! later promotion pushes the metrics back toward middlegame); that is
//! accepted rather than smoothed over.

use chess::{Board, Color};
use serde::{Deserialize, Serialize};

use crate::board_utils::{
    castling_exhausted, developed_count, has_queen, material_points, total_piece_count,
};
use crate::error::CoreError;
use crate::move_tree::MoveTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

impl GamePhase {
    pub fn name(&self) -> &'static str {
        match self {
            GamePhase::Opening => "opening",
            GamePhase::Middlegame => "middlegame",
            GamePhase::Endgame => "endgame",
        }
    }
}

/// Where a phase began on the mainline, and why it was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseBoundary {
    pub phase: GamePhase,
    pub start_ply: usize,
    pub reason: String,
}

/// Classify a single position. `ply` counts half-moves from the start,
/// 0 = initial position.
pub fn phase_of(board: &Board, ply: usize) -> (GamePhase, &'static str) {
    let pieces = total_piece_count(board);
    let material =
        material_points(board, Color::White) + material_points(board, Color::Black);
    let queens_gone =
        !has_queen(board, Color::White) && !has_queen(board, Color::Black);

    if queens_gone {
        return (GamePhase::Endgame, "Queens traded off");
    }
    if pieces <= 12 {
        return (GamePhase::Endgame, "Few pieces remain");
    }
    if material <= 20 {
        return (GamePhase::Endgame, "Low combined material");
    }
    if ply >= 40 && pieces <= 16 {
        return (GamePhase::Endgame, "Late-game simplification");
    }

    let developed = developed_count(board, Color::White)
        .max(developed_count(board, Color::Black));
    if ply >= 10 && developed >= 2 {
        return (GamePhase::Middlegame, "Pieces developed");
    }
    if castling_exhausted(board, Color::White) || castling_exhausted(board, Color::Black) {
        return (GamePhase::Middlegame, "Castling completed");
    }
    // A queen is still on the board here, so a long opening spills over
    if ply >= 8 {
        return (GamePhase::Middlegame, "Out of the opening");
    }

    (GamePhase::Opening, "Opening development")
}

/// Phase boundaries along the mainline, first entry always at ply 0.
pub fn detect_phases(tree: &MoveTree) -> Result<Vec<PhaseBoundary>, CoreError> {
    let mut boundaries = Vec::new();
    let mut current = None;

    for (ply, &id) in tree.mainline().iter().enumerate() {
        let board = tree
            .node(id)
            .ok_or(CoreError::UnknownNode(id.0))?
            .board()?;
        let (phase, reason) = phase_of(&board, ply);
        if current != Some(phase) {
            boundaries.push(PhaseBoundary {
                phase,
                start_ply: ply,
                reason: reason.to_string(),
            });
            current = Some(phase);
        }
    }
    Ok(boundaries)
}
