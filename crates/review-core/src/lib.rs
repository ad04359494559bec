pub use chess;

pub mod board_utils;
pub mod classify;
pub mod error;
pub mod eval;
pub mod exchange;
pub mod move_tree;
pub mod narrative;
pub mod phase;
pub mod report;
pub mod san;
pub mod theory;

pub use classify::{classify, Classification, ClassificationResult};
pub use error::CoreError;
pub use eval::{EvaluationLine, Score};
pub use move_tree::{EvalStatus, MoveNode, MoveRecord, MoveTree, NodeId};
pub use narrative::{GameResult, GameStory, NarrativeSummary};
pub use phase::{GamePhase, PhaseBoundary};
pub use report::{build_report, GameAnalysisResult};
