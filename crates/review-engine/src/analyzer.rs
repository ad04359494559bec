//! Whole-game analysis driver: PGN in, classified report out.

use tracing::info;

use review_core::classify::{classify, MoveContext, PreviousContext};
use review_core::eval::start_position_lines;
use review_core::narrative::GameResult;
use review_core::report::{build_report, GameAnalysisResult};
use review_core::{CoreError, MoveTree, NodeId};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scheduler::evaluate_positions;

/// Analyze a finished game: build the tree, bulk-evaluate every
/// mainline position, classify each move against its predecessor and
/// aggregate the report. `progress` receives 0..=100.
pub async fn analyze_game<F>(
    config: &EngineConfig,
    pgn: &str,
    progress: F,
) -> Result<GameAnalysisResult, EngineError>
where
    F: Fn(u8) + Send + Sync + 'static,
{
    let mut tree = MoveTree::build_from_pgn(pgn)?;
    let result = result_from_pgn(pgn);
    let ids: Vec<NodeId> = tree.mainline().to_vec();
    info!(moves = ids.len() - 1, ?result, "Analyzing game");

    // The root has no engine-evaluated predecessor; seed it so the
    // first move classifies like any other
    tree.set_lines(ids[0], start_position_lines())?;

    let mut fens = Vec::with_capacity(ids.len() - 1);
    for &id in &ids[1..] {
        let node = tree.node(id).ok_or(CoreError::UnknownNode(id.0))?;
        fens.push(node.fen.clone());
    }

    let lines_per_move = evaluate_positions(config, fens, progress).await;
    for (i, lines) in lines_per_move.into_iter().enumerate() {
        tree.set_lines(ids[i + 1], lines)?;
    }

    classify_mainline(&mut tree)?;
    Ok(build_report(&tree, result)?)
}

/// Classify every mainline move in played order. Each move sees its
/// predecessor's lines and classification, so theory chains and forced
/// detection work without re-deriving anything.
pub fn classify_mainline(tree: &mut MoveTree) -> Result<(), EngineError> {
    let ids: Vec<NodeId> = tree.mainline().to_vec();
    for (i, &id) in ids.iter().enumerate().skip(1) {
        let prev_id = ids[i - 1];
        let (prev_fen, prev_lines, prev_class) = {
            let prev = tree.node(prev_id).ok_or(CoreError::UnknownNode(prev_id.0))?;
            (
                prev.fen.clone(),
                prev.lines.clone(),
                prev.classification.as_ref().map(|c| c.classification),
            )
        };

        let history = tree.moves_to_node(id)?;
        let result = {
            let node = tree.node(id).ok_or(CoreError::UnknownNode(id.0))?;
            let record = match &node.record {
                Some(r) => r.clone(),
                None => continue,
            };
            let mv_ctx = MoveContext {
                fen: &node.fen,
                lines: &node.lines,
                record: Some(&record),
            };
            let prev_ctx = PreviousContext {
                fen: &prev_fen,
                lines: &prev_lines,
                classification: prev_class,
            };
            classify(&mv_ctx, &prev_ctx, &history)
        };
        tree.set_classification(id, result)?;
    }
    Ok(())
}

/// Game result from the PGN `Result` tag, falling back to the trailing
/// movetext marker. Anything unrecognized reads as a draw.
pub fn result_from_pgn(pgn: &str) -> GameResult {
    let tag = pgn.lines().find_map(|l| {
        l.trim()
            .strip_prefix("[Result \"")
            .and_then(|rest| rest.split('"').next())
    });
    let token = match tag {
        Some(t) => t.to_string(),
        None => pgn
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string(),
    };
    match token.as_str() {
        "1-0" => GameResult::WhiteWins,
        "0-1" => GameResult::BlackWins,
        _ => GameResult::Draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_core::eval::{EvaluationLine, Score};
    use review_core::Classification;

    #[test]
    fn test_result_from_pgn_tag_and_marker() {
        assert_eq!(
            result_from_pgn("[Result \"1-0\"]\n\n1. e4 e5 1-0"),
            GameResult::WhiteWins
        );
        assert_eq!(result_from_pgn("1. e4 e5 2. Nf3 0-1"), GameResult::BlackWins);
        assert_eq!(
            result_from_pgn("[Result \"1/2-1/2\"]\n\n1. e4 1/2-1/2"),
            GameResult::Draw
        );
        assert_eq!(result_from_pgn("1. e4 e5 *"), GameResult::Draw);
    }

    #[test]
    fn test_classify_mainline_chains_theory() {
        let mut tree = MoveTree::build_from_san_moves(&["e4", "e5", "Nf3"]).unwrap();
        let ids: Vec<NodeId> = tree.mainline().to_vec();
        tree.set_lines(ids[0], start_position_lines()).unwrap();
        for (i, &id) in ids.iter().enumerate().skip(1) {
            let cp = if i % 2 == 1 { -25 } else { 25 };
            tree.set_lines(
                id,
                vec![
                    EvaluationLine {
                        id: 1,
                        depth: 16,
                        pv: vec!["g1f3".to_string()],
                        score: Score::Cp(cp),
                    },
                    EvaluationLine {
                        id: 2,
                        depth: 16,
                        pv: vec!["d2d4".to_string()],
                        score: Score::Cp(cp - 10),
                    },
                ],
            )
            .unwrap();
        }

        classify_mainline(&mut tree).unwrap();
        for &id in &ids[1..] {
            let result = tree.node(id).unwrap().classification.clone().unwrap();
            assert_eq!(result.classification, Classification::Theory);
        }
    }
}
