//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Invalid SAN move: {0}")]
    InvalidSan(String),

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Empty PGN movetext")]
    EmptyPgn,

    #[error("Unknown node id: {0}")]
    UnknownNode(u32),

    #[error("Theory book error: {0}")]
    TheoryBook(String),
}
