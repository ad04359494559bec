//! Opening theory matching over SAN move sequences.
//!
//! A played sequence counts as theory while it stays a prefix of some
//! known line. The built-in table covers the common open, closed,
//! Indian and flank systems; a larger book can be loaded from a
//! bincode file and merged in.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default path to an optional extended book file.
pub const BOOK_FILE_PATH: &str = "data/theory_book.bin";

/// Known theory lines, each a sequence of SAN moves from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TheoryBook {
    lines: Vec<Vec<String>>,
}

const BUILTIN_LINES: &[&str] = &[
    // Open games
    "e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6 O-O Be7 Re1 b5 Bb3 d6 c3 O-O",
    "e4 e5 Nf3 Nc6 Bb5 Nf6 O-O Nxe4 d4 Nd6 Bxc6 dxc6 dxe5 Nf5",
    "e4 e5 Nf3 Nc6 Bc4 Bc5 c3 Nf6 d3 d6 O-O a6",
    "e4 e5 Nf3 Nc6 Bc4 Nf6 Ng5 d5 exd5 Na5",
    "e4 e5 Nf3 Nc6 d4 exd4 Nxd4 Nf6 Nc3 Bb4",
    "e4 e5 Nf3 Nf6 Nxe5 d6 Nf3 Nxe4 d4 d5 Bd3",
    "e4 e5 Nc3 Nf6 f4 d5 fxe5 Nxe4",
    // Sicilian
    "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 a6 Be2 e5",
    "e4 c5 Nf3 d6 d4 cxd4 Nxd4 Nf6 Nc3 g6 Be3 Bg7",
    "e4 c5 Nf3 Nc6 d4 cxd4 Nxd4 Nf6 Nc3 e5 Ndb5 d6",
    "e4 c5 Nf3 e6 d4 cxd4 Nxd4 Nc6 Nc3 Qc7",
    "e4 c5 c3 Nf6 e5 Nd5 d4 cxd4 Nf3",
    "e4 c5 Nc3 Nc6 g3 g6 Bg2 Bg7 d3 d6",
    // French, Caro-Kann, Pirc, Scandinavian
    "e4 e6 d4 d5 Nc3 Bb4 e5 c5 a3 Bxc3+ bxc3 Ne7",
    "e4 e6 d4 d5 Nc3 Nf6 e5 Nfd7 f4 c5",
    "e4 e6 d4 d5 Nd2 Nf6 e5 Nfd7 Bd3 c5 c3 Nc6",
    "e4 c6 d4 d5 Nc3 dxe4 Nxe4 Bf5 Ng3 Bg6 h4 h6",
    "e4 c6 d4 d5 e5 Bf5 Nf3 e6 Be2 c5",
    "e4 d6 d4 Nf6 Nc3 g6 f4 Bg7 Nf3 c5",
    "e4 d5 exd5 Qxd5 Nc3 Qa5 d4 Nf6 Nf3 c6",
    // Queen's pawn
    "d4 d5 c4 e6 Nc3 Nf6 Bg5 Be7 e3 O-O Nf3 h6",
    "d4 d5 c4 c6 Nf3 Nf6 Nc3 dxc4 a4 Bf5 e3 e6",
    "d4 d5 c4 dxc4 Nf3 Nf6 e3 e6 Bxc4 c5 O-O a6",
    "d4 d5 Nf3 Nf6 c4 e6 g3 Be7 Bg2 O-O O-O dxc4",
    "d4 d5 Bf4 Nf6 e3 c5 c3 Nc6 Nd2 e6",
    // Indian defences
    "d4 Nf6 c4 e6 Nc3 Bb4 e3 O-O Bd3 d5 Nf3 c5",
    "d4 Nf6 c4 e6 Nf3 b6 g3 Ba6 b3 Bb4+ Bd2 Be7",
    "d4 Nf6 c4 g6 Nc3 Bg7 e4 d6 Nf3 O-O Be2 e5",
    "d4 Nf6 c4 g6 Nc3 d5 cxd5 Nxd5 e4 Nxc3 bxc3 Bg7",
    "d4 Nf6 Nf3 g6 g3 Bg7 Bg2 O-O O-O d6",
    "d4 f5 g3 Nf6 Bg2 e6 Nf3 Be7 O-O O-O",
    // Flank
    "c4 e5 Nc3 Nf6 Nf3 Nc6 g3 d5 cxd5 Nxd5 Bg2 Nb6",
    "c4 c5 Nf3 Nf6 g3 d5 cxd5 Nxd5 Bg2 Nc6",
    "c4 Nf6 Nc3 e5 Nf3 Nc6 g3 d5",
    "Nf3 d5 g3 Nf6 Bg2 e6 O-O Be7 d3 O-O",
    "Nf3 Nf6 c4 g6 Nc3 Bg7 d4 O-O e4 d6",
];

impl TheoryBook {
    /// The built-in table.
    pub fn builtin() -> Self {
        let lines = BUILTIN_LINES
            .iter()
            .map(|line| line.split_whitespace().map(normalize_san).collect())
            .collect();
        Self { lines }
    }

    /// Load an extended book from a bincode file and merge it over the
    /// built-in table. A missing or unreadable file degrades to the
    /// built-in table with a warning.
    pub fn load_or_builtin<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(mut book) => {
                tracing::info!(lines = book.lines.len(), "Loaded theory book");
                book.lines
                    .extend(Self::builtin().lines);
                book
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Theory book unavailable, using built-in lines"
                );
                Self::builtin()
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let file = File::open(&path).map_err(|e| CoreError::TheoryBook(e.to_string()))?;
        let reader = BufReader::new(file);
        let lines: Vec<Vec<String>> =
            bincode::deserialize_from(reader).map_err(|e| CoreError::TheoryBook(e.to_string()))?;
        Ok(Self { lines })
    }

    /// Does the played sequence stay inside known theory?
    ///
    /// An empty history trivially matches (the starting position is
    /// theory by definition).
    pub fn matches(&self, history: &[String]) -> bool {
        if history.is_empty() {
            return true;
        }
        let normalized: Vec<String> = history.iter().map(|s| normalize_san(s)).collect();
        self.lines.iter().any(|line| {
            line.len() >= normalized.len() && line[..normalized.len()] == normalized[..]
        })
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

impl Default for TheoryBook {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Strip annotation glyphs so "Nf3+!?" matches "Nf3".
fn normalize_san<S: AsRef<str>>(san: S) -> String {
    san.as_ref()
        .trim_end_matches(|c: char| c == '+' || c == '#' || c == '!' || c == '?')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_empty_history_is_theory() {
        assert!(TheoryBook::builtin().matches(&[]));
    }

    #[test]
    fn test_known_prefix_matches() {
        let book = TheoryBook::builtin();
        assert!(book.matches(&hist(&["e4"])));
        assert!(book.matches(&hist(&["e4", "c5", "Nf3", "d6"])));
        assert!(book.matches(&hist(&["d4", "Nf6", "c4", "g6"])));
    }

    #[test]
    fn test_annotations_are_ignored() {
        let book = TheoryBook::builtin();
        assert!(book.matches(&hist(&["e4!", "e5", "Nf3+?"])));
    }

    #[test]
    fn test_off_book_does_not_match() {
        let book = TheoryBook::builtin();
        assert!(!book.matches(&hist(&["a4"])));
        assert!(!book.matches(&hist(&["e4", "e5", "Ke2"])));
    }

    #[test]
    fn test_longer_than_any_line_does_not_match() {
        let book = TheoryBook::builtin();
        let mut long = hist(&["e4", "e5", "Nc3", "Nf6", "f4", "d5", "fxe5", "Nxe4"]);
        long.push("Qf3".to_string());
        assert!(!book.matches(&long));
    }

    #[test]
    fn test_missing_book_file_degrades_to_builtin() {
        let book = TheoryBook::load_or_builtin("/nonexistent/theory.bin");
        assert_eq!(book.line_count(), TheoryBook::builtin().line_count());
    }
}
