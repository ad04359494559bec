//! Ownership graph of played moves and user variations.
//!
//! Nodes live in an id-keyed arena rather than behind shared pointers:
//! every non-root node has exactly one parent id, the mainline is an
//! unbroken chain from the root, and variations attach to any node as
//! extra children.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square};
use regex::Regex;

use crate::classify::ClassificationResult;
use crate::error::CoreError;
use crate::eval::EvaluationLine;
use crate::san;

/// Opaque node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evaluation lifecycle; moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvalStatus {
    Unevaluated,
    Pending,
    Complete,
}

/// One played move, as applied to a concrete position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    pub color: Color,
    pub san: String,
    pub captured: Option<Piece>,
    pub is_castle: bool,
    pub is_en_passant: bool,
    pub is_promotion: bool,
}

impl MoveRecord {
    /// Capture the facts about `mv` as played on `board`.
    pub fn from_move(board: &Board, mv: ChessMove) -> Self {
        let from = mv.get_source();
        let to = mv.get_dest();
        let piece = board.piece_on(from).unwrap_or(Piece::Pawn);
        let color = board.side_to_move();

        let is_castle = piece == Piece::King
            && (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs() == 2;
        let is_en_passant = piece == Piece::Pawn
            && from.get_file() != to.get_file()
            && board.piece_on(to).is_none();
        let captured = if is_en_passant {
            Some(Piece::Pawn)
        } else {
            board.piece_on(to)
        };

        Self {
            from,
            to,
            promotion: mv.get_promotion(),
            color,
            san: san::move_to_san(board, mv),
            captured,
            is_castle,
            is_en_passant,
            is_promotion: mv.get_promotion().is_some(),
        }
    }

    pub fn uci(&self) -> String {
        san::move_to_uci(ChessMove::new(self.from, self.to, self.promotion))
    }
}

/// A node in the move tree; the root carries no move.
#[derive(Debug, Clone)]
pub struct MoveNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub on_mainline: bool,
    pub record: Option<MoveRecord>,
    /// FEN of the position this node's move produced
    pub fen: String,
    pub lines: Vec<EvaluationLine>,
    pub classification: Option<ClassificationResult>,
    pub eval_status: EvalStatus,
}

impl MoveNode {
    pub fn board(&self) -> Result<Board, CoreError> {
        Board::from_str(&self.fen).map_err(|_| CoreError::InvalidFen(self.fen.clone()))
    }
}

/// The tree of played moves plus variations, with a navigation cursor.
#[derive(Debug, Clone)]
pub struct MoveTree {
    root: NodeId,
    nodes: HashMap<NodeId, MoveNode>,
    mainline: Vec<NodeId>,
    cursor: NodeId,
    next_id: u32,
}

impl MoveTree {
    pub fn new() -> Self {
        let root_id = NodeId(0);
        let root = MoveNode {
            id: root_id,
            parent: None,
            children: Vec::new(),
            on_mainline: true,
            record: None,
            fen: Board::default().to_string(),
            lines: Vec::new(),
            classification: None,
            eval_status: EvalStatus::Unevaluated,
        };
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            root: root_id,
            nodes,
            mainline: vec![root_id],
            cursor: root_id,
            next_id: 1,
        }
    }

    /// Build a tree whose mainline replays the given SAN moves.
    pub fn build_from_san_moves(moves: &[&str]) -> Result<Self, CoreError> {
        let mut tree = Self::new();
        for san_text in moves {
            let board = tree.current_board()?;
            let mv = san::parse_san(&board, san_text)?;
            tree.add_move(mv.get_source(), mv.get_dest(), mv.get_promotion())?;
        }
        Ok(tree)
    }

    /// Build a tree from PGN movetext (headers, comments, variations
    /// and NAGs are stripped; only the mainline is replayed).
    pub fn build_from_pgn(pgn: &str) -> Result<Self, CoreError> {
        let moves = extract_san_moves(pgn);
        if moves.is_empty() {
            return Err(CoreError::EmptyPgn);
        }
        let refs: Vec<&str> = moves.iter().map(|s| s.as_str()).collect();
        Self::build_from_san_moves(&refs)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    pub fn mainline(&self) -> &[NodeId] {
        &self.mainline
    }

    pub fn node(&self, id: NodeId) -> Option<&MoveNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut MoveNode> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the root always exists
    }

    /// Board at the cursor.
    pub fn current_board(&self) -> Result<Board, CoreError> {
        self.nodes[&self.cursor].board()
    }

    /// Apply a move at the cursor. Fails fast on an illegal move and
    /// leaves the tree unmodified; re-playing an existing child just
    /// navigates into it.
    pub fn add_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<NodeId, CoreError> {
        let board = self.current_board()?;
        let mv = ChessMove::new(from, to, promotion);
        if !board.legal(mv) {
            return Err(CoreError::IllegalMove(san::move_to_uci(mv)));
        }

        // Dedupe: same move already branches off this node
        let existing = self.nodes[&self.cursor]
            .children
            .iter()
            .copied()
            .find(|child| {
                self.nodes[child]
                    .record
                    .as_ref()
                    .map(|r| r.from == from && r.to == to && r.promotion == promotion)
                    .unwrap_or(false)
            });
        if let Some(child) = existing {
            self.cursor = child;
            return Ok(child);
        }

        let record = MoveRecord::from_move(&board, mv);
        let after = board.make_move_new(mv);

        // Extends the mainline only from its current tip
        let parent = &self.nodes[&self.cursor];
        let extends_mainline = parent.on_mainline
            && Some(&self.cursor) == self.mainline.last()
            && parent.children.is_empty();

        let id = NodeId(self.next_id);
        self.next_id += 1;

        let node = MoveNode {
            id,
            parent: Some(self.cursor),
            children: Vec::new(),
            on_mainline: extends_mainline,
            record: Some(record),
            fen: after.to_string(),
            lines: Vec::new(),
            classification: None,
            eval_status: EvalStatus::Unevaluated,
        };

        self.nodes.get_mut(&self.cursor).unwrap().children.push(id);
        self.nodes.insert(id, node);
        if extends_mainline {
            self.mainline.push(id);
        }
        self.cursor = id;
        Ok(id)
    }

    /// Move the cursor to a known node.
    pub fn navigate_to(&mut self, id: NodeId) -> Result<(), CoreError> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::UnknownNode(id.0));
        }
        self.cursor = id;
        Ok(())
    }

    /// Node ids from the root to `id`, inclusive.
    pub fn path_to_node(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::UnknownNode(id.0));
        }
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            path.push(node_id);
            current = self.nodes[&node_id].parent;
        }
        path.reverse();
        Ok(path)
    }

    /// SAN moves from the root to `id`, in played order.
    pub fn moves_to_node(&self, id: NodeId) -> Result<Vec<String>, CoreError> {
        Ok(self
            .path_to_node(id)?
            .into_iter()
            .filter_map(|n| self.nodes[&n].record.as_ref())
            .map(|r| r.san.clone())
            .collect())
    }

    /// Store evaluation lines for a node and complete its lifecycle.
    pub fn set_lines(&mut self, id: NodeId, lines: Vec<EvaluationLine>) -> Result<(), CoreError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(CoreError::UnknownNode(id.0))?;
        node.lines = lines;
        node.eval_status = EvalStatus::Complete;
        Ok(())
    }

    /// Advance a node's evaluation status; regressions are ignored.
    pub fn advance_status(&mut self, id: NodeId, status: EvalStatus) -> Result<(), CoreError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(CoreError::UnknownNode(id.0))?;
        if status > node.eval_status {
            node.eval_status = status;
        }
        Ok(())
    }

    pub fn set_classification(
        &mut self,
        id: NodeId,
        result: ClassificationResult,
    ) -> Result<(), CoreError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(CoreError::UnknownNode(id.0))?;
        node.classification = Some(result);
        Ok(())
    }
}

impl Default for MoveTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract SAN move tokens from PGN movetext.
///
/// Lightweight regex pass in the same spirit as the PGN importer:
/// headers, comments, nested variations, NAGs, move numbers and the
/// result marker are all dropped.
pub fn extract_san_moves(pgn: &str) -> Vec<String> {
    // Strip header lines
    let movetext: String = pgn
        .lines()
        .filter(|l| !l.trim_start().starts_with('['))
        .collect::<Vec<_>>()
        .join(" ");

    // Strip comments, then variations innermost-first
    let comment_re = Regex::new(r"\{[^}]*\}").unwrap();
    let mut text = comment_re.replace_all(&movetext, " ").into_owned();
    let variation_re = Regex::new(r"\([^()]*\)").unwrap();
    loop {
        let next = variation_re.replace_all(&text, " ").into_owned();
        if next == text {
            break;
        }
        text = next;
    }

    let move_re =
        Regex::new(r"^(O-O(-O)?|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](=[QRBN])?)[+#!?]*$").unwrap();

    text.split_whitespace()
        .map(|tok| tok.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.'))
        .filter(|tok| !tok.is_empty())
        .filter(|tok| move_re.is_match(tok))
        .map(|tok| tok.to_string())
        .collect()
}

/// Terminal state of a board, for classification of line-less nodes.
pub fn board_is_terminal(board: &Board) -> Option<BoardStatus> {
    match board.status() {
        BoardStatus::Ongoing => {
            if MoveGen::new_legal(board).len() == 0 {
                Some(BoardStatus::Stalemate)
            } else {
                None
            }
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainline_length_is_move_count_plus_one() {
        let tree =
            MoveTree::build_from_san_moves(&["e4", "e5", "Nf3", "Nc6", "Bb5"]).unwrap();
        assert_eq!(tree.mainline().len(), 6);
    }

    #[test]
    fn test_every_node_reachable_by_replaying_path() {
        let tree = MoveTree::build_from_san_moves(&["d4", "d5", "c4", "e6"]).unwrap();
        for &id in tree.mainline() {
            let mut board = Board::default();
            for san_text in tree.moves_to_node(id).unwrap() {
                let mv = san::parse_san(&board, &san_text).unwrap();
                board = board.make_move_new(mv);
            }
            assert_eq!(board.to_string(), tree.node(id).unwrap().fen);
        }
    }

    #[test]
    fn test_illegal_move_leaves_tree_unmodified() {
        let mut tree = MoveTree::new();
        let before = tree.len();
        let result = tree.add_move(
            Square::from_str("e2").unwrap(),
            Square::from_str("e6").unwrap(),
            None,
        );
        assert!(matches!(result, Err(CoreError::IllegalMove(_))));
        assert_eq!(tree.len(), before);
        assert_eq!(tree.cursor(), tree.root());
    }

    #[test]
    fn test_variation_attaches_off_mainline() {
        let mut tree = MoveTree::build_from_san_moves(&["e4", "e5"]).unwrap();
        let mainline_tip = *tree.mainline().last().unwrap();

        // Branch at the position after 1. e4
        tree.navigate_to(tree.mainline()[1]).unwrap();
        let board = tree.current_board().unwrap();
        let mv = san::parse_san(&board, "c5").unwrap();
        let variation = tree
            .add_move(mv.get_source(), mv.get_dest(), None)
            .unwrap();

        assert!(!tree.node(variation).unwrap().on_mainline);
        assert_eq!(tree.mainline().last(), Some(&mainline_tip));
        assert_eq!(tree.node(variation).unwrap().parent, Some(tree.mainline()[1]));
        assert_eq!(tree.cursor(), variation);
    }

    #[test]
    fn test_replaying_existing_child_dedupes() {
        let mut tree = MoveTree::build_from_san_moves(&["e4"]).unwrap();
        let tip = tree.cursor();
        tree.navigate_to(tree.root()).unwrap();
        let again = tree
            .add_move(
                Square::from_str("e2").unwrap(),
                Square::from_str("e4").unwrap(),
                None,
            )
            .unwrap();
        assert_eq!(again, tip);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_eval_status_never_regresses() {
        let mut tree = MoveTree::new();
        let root = tree.root();
        tree.advance_status(root, EvalStatus::Pending).unwrap();
        tree.set_lines(root, Vec::new()).unwrap();
        tree.advance_status(root, EvalStatus::Pending).unwrap();
        assert_eq!(tree.node(root).unwrap().eval_status, EvalStatus::Complete);
    }

    #[test]
    fn test_record_flags() {
        let mut tree = MoveTree::build_from_san_moves(&["e4", "d5", "exd5"]).unwrap();
        let capture = tree.node(tree.cursor()).unwrap().record.clone().unwrap();
        assert_eq!(capture.captured, Some(Piece::Pawn));
        assert!(!capture.is_castle);

        tree = MoveTree::build_from_san_moves(&["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O"])
            .unwrap();
        let castle = tree.node(tree.cursor()).unwrap().record.clone().unwrap();
        assert!(castle.is_castle);
        assert_eq!(castle.san, "O-O");
    }

    #[test]
    fn test_build_from_pgn_strips_annotations() {
        let pgn = r#"[Event "Test"]
[Result "1-0"]

1. e4 {king's pawn} e5 (1... c5 2. Nf3) 2. Nf3! Nc6 3. Bb5 1-0"#;
        let tree = MoveTree::build_from_pgn(pgn).unwrap();
        assert_eq!(tree.mainline().len(), 6);
        let sans = tree.moves_to_node(*tree.mainline().last().unwrap()).unwrap();
        assert_eq!(sans, vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]);
    }

    #[test]
    fn test_pgn_without_moves_is_rejected() {
        assert!(matches!(
            MoveTree::build_from_pgn("[Event \"x\"]\n\n*"),
            Err(CoreError::EmptyPgn)
        ));
    }
}
