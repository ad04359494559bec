//! Aggregate game report: accuracy, rating estimate, phases, narrative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;
use crate::error::CoreError;
use crate::eval::eval_bar_percent;
use crate::move_tree::MoveTree;
use crate::narrative::{classify_game, GameResult, NarrativeSummary};
use crate::phase::{detect_phases, PhaseBoundary};

/// Per-move centipawn loss is capped here before averaging so a single
/// throwaway move cannot dominate the rating estimate.
const CP_LOSS_CAP: i32 = 500;

/// Aggregates for one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    /// 0..=100, weighted by per-move classification
    pub accuracy: f64,
    pub average_centipawn_loss: f64,
    pub estimated_rating: f64,
    pub move_counts: BTreeMap<String, u32>,
}

/// One mainline move with its analysis attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    /// 1-based half-move index; odd = White
    pub ply: usize,
    pub san: String,
    pub classification: ClassificationResult,
    /// Evaluation bar after the move, 0..=100
    pub eval_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysisResult {
    pub white: SideSummary,
    pub black: SideSummary,
    pub phases: Vec<PhaseBoundary>,
    pub narrative: NarrativeSummary,
    pub moves: Vec<MoveAnalysis>,
}

/// Build the final report from a fully classified tree.
///
/// Mainline nodes missing lines (terminal positions) carry the previous
/// bar value forward; nodes missing a classification are skipped in the
/// per-side aggregates but still appear in the phase/narrative inputs.
pub fn build_report(tree: &MoveTree, result: GameResult) -> Result<GameAnalysisResult, CoreError> {
    let mut moves = Vec::new();
    let mut bar_curve = vec![50.0];
    let mut white_stats = SideStats::default();
    let mut black_stats = SideStats::default();

    for (ply, &id) in tree.mainline().iter().enumerate().skip(1) {
        let node = tree.node(id).ok_or(CoreError::UnknownNode(id.0))?;
        let percent = node
            .lines
            .first()
            .map(|l| eval_bar_percent(&l.score))
            .unwrap_or_else(|| bar_curve.last().copied().unwrap_or(50.0));
        bar_curve.push(percent);

        let record = match &node.record {
            Some(r) => r,
            None => continue,
        };
        let classification = match &node.classification {
            Some(c) => c.clone(),
            None => continue,
        };

        let stats = if ply % 2 == 1 {
            &mut white_stats
        } else {
            &mut black_stats
        };
        stats.add(&classification);

        moves.push(MoveAnalysis {
            ply,
            san: record.san.clone(),
            classification,
            eval_percent: percent,
        });
    }

    Ok(GameAnalysisResult {
        white: white_stats.finish(),
        black: black_stats.finish(),
        phases: detect_phases(tree)?,
        narrative: classify_game(&bar_curve, result),
        moves,
    })
}

/// Estimated playing strength from average centipawn loss.
///
/// Exponential decay fitted so that near-zero loss reads as a strong
/// engine-like 3100 and 250 acpl as a casual 1140; floored at 400.
pub fn estimate_rating(average_cp_loss: f64) -> f64 {
    (3100.0 * (-average_cp_loss / 250.0).exp()).max(400.0)
}

#[derive(Default)]
struct SideStats {
    weight_sum: f64,
    cp_loss_sum: f64,
    moves: u32,
    counts: BTreeMap<String, u32>,
}

impl SideStats {
    fn add(&mut self, result: &ClassificationResult) {
        self.weight_sum += result.accuracy_weight;
        self.cp_loss_sum += result.centipawn_loss.min(CP_LOSS_CAP) as f64;
        self.moves += 1;
        *self
            .counts
            .entry(result.classification.name().to_string())
            .or_insert(0) += 1;
    }

    fn finish(self) -> SideSummary {
        if self.moves == 0 {
            return SideSummary {
                accuracy: 100.0,
                average_centipawn_loss: 0.0,
                estimated_rating: estimate_rating(0.0),
                move_counts: self.counts,
            };
        }
        let n = self.moves as f64;
        let acpl = self.cp_loss_sum / n;
        SideSummary {
            accuracy: 100.0 * self.weight_sum / n,
            average_centipawn_loss: acpl,
            estimated_rating: estimate_rating(acpl),
            move_counts: self.counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::eval::{EvaluationLine, Score};

    fn classified(tier: Classification, loss: i32) -> ClassificationResult {
        ClassificationResult {
            classification: tier,
            accuracy_weight: tier.accuracy_weight(),
            centipawn_loss: loss,
            aux: Default::default(),
        }
    }

    fn line(cp: i32) -> Vec<EvaluationLine> {
        vec![EvaluationLine {
            id: 1,
            depth: 16,
            pv: vec!["e2e4".to_string()],
            score: Score::Cp(cp),
        }]
    }

    #[test]
    fn test_report_splits_sides_by_ply_parity() {
        let mut tree = MoveTree::build_from_san_moves(&["e4", "e5", "Nf3", "Nc6"]).unwrap();
        let ids: Vec<_> = tree.mainline().to_vec();
        for (i, &id) in ids.iter().enumerate().skip(1) {
            tree.set_lines(id, line(20)).unwrap();
            let tier = if i % 2 == 1 {
                Classification::Perfect
            } else {
                Classification::Mistake
            };
            tree.set_classification(id, classified(tier, if i % 2 == 1 { 0 } else { 260 }))
                .unwrap();
        }

        let report = build_report(&tree, GameResult::Draw).unwrap();
        assert_eq!(report.moves.len(), 4);
        assert_eq!(report.white.move_counts.get("perfect"), Some(&2));
        assert_eq!(report.black.move_counts.get("mistake"), Some(&2));
        assert!(report.white.accuracy > report.black.accuracy);
        assert!(report.white.estimated_rating > report.black.estimated_rating);
    }

    #[test]
    fn test_rating_curve_shape() {
        assert!(estimate_rating(0.0) > 3000.0);
        assert!(estimate_rating(100.0) < estimate_rating(50.0));
        assert_eq!(estimate_rating(10_000.0), 400.0);
    }

    #[test]
    fn test_empty_game_report() {
        let tree = MoveTree::new();
        let report = build_report(&tree, GameResult::Draw).unwrap();
        assert!(report.moves.is_empty());
        assert_eq!(report.white.accuracy, 100.0);
        assert_eq!(report.phases.len(), 1);
    }

    #[test]
    fn test_terminal_node_carries_bar_forward() {
        let mut tree = MoveTree::build_from_san_moves(&["e4", "e5"]).unwrap();
        let ids: Vec<_> = tree.mainline().to_vec();
        tree.set_lines(ids[1], line(300)).unwrap();
        tree.set_classification(ids[1], classified(Classification::Good, 30))
            .unwrap();
        // Second node: no lines, classified terminal
        tree.set_lines(ids[2], Vec::new()).unwrap();
        tree.set_classification(ids[2], classified(Classification::Perfect, 0))
            .unwrap();

        let report = build_report(&tree, GameResult::Draw).unwrap();
        assert_eq!(report.moves[0].eval_percent, report.moves[1].eval_percent);
    }
}
