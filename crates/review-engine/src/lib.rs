//! Engine side of the game-review pipeline: UCI process management,
//! fallback-tiered oracles, bulk and interactive scheduling, and the
//! whole-game analysis driver. Pure heuristics live in `review-core`.

pub mod analyzer;
pub mod cloud;
pub mod config;
pub mod error;
pub mod oracle;
pub mod scheduler;
pub mod uci;

pub use analyzer::analyze_game;
pub use config::EngineConfig;
pub use error::EngineError;
pub use oracle::{OracleAbort, PositionOracle};
pub use scheduler::{AnalysisSession, EvalOutcome};
