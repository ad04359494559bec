//! Position oracle: one engine instance with timeout, fallback tiers
//! and cancellation.
//!
//! Failure never escapes to callers. A timed-out or crashed engine is
//! killed and the next configured tier takes over; when every tier has
//! failed the oracle goes dead and all further calls resolve with an
//! empty line list immediately. Aborts likewise resolve empty, never
//! error.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chess::{Board, Color};
use tokio::sync::Notify;
use tracing::{debug, warn};

use review_core::eval::{EvaluationLine, Score};

use crate::config::EngineConfig;
use crate::uci::{RawLine, UciEngine};

/// Per-depth-unit search budget.
const TIMEOUT_PER_DEPTH: Duration = Duration::from_secs(30);

/// Cancels an in-flight evaluation from another task.
#[derive(Clone)]
pub struct OracleAbort {
    notify: Arc<Notify>,
}

impl OracleAbort {
    pub fn abort(&self) {
        self.notify.notify_waiters();
    }
}

pub struct PositionOracle {
    tiers: Vec<String>,
    tier: usize,
    engine: Option<UciEngine>,
    depth: u32,
    multipv: u32,
    hash_mb: u32,
    dead: bool,
    abort: Arc<Notify>,
}

impl PositionOracle {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tiers: config.engine_paths.clone(),
            tier: 0,
            engine: None,
            depth: config.search_depth,
            multipv: config.multipv,
            hash_mb: config.hash_mb,
            dead: false,
            abort: Arc::new(Notify::new()),
        }
    }

    /// Handle for cancelling this oracle's in-flight evaluation.
    pub fn abort_handle(&self) -> OracleAbort {
        OracleAbort {
            notify: self.abort.clone(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Path of the engine tier currently answering evaluations.
    pub fn engine_name(&self) -> Option<&str> {
        if self.dead {
            return None;
        }
        self.tiers.get(self.tier).map(String::as_str)
    }

    /// Evaluate one position. Resolves with ranked White-perspective
    /// lines, or an empty list on terminal positions, exhaustion of all
    /// engine tiers, or abort. `&mut self` keeps evaluations serialized
    /// per oracle.
    pub async fn evaluate(&mut self, fen: &str) -> Vec<EvaluationLine> {
        if self.dead {
            return Vec::new();
        }
        let budget = TIMEOUT_PER_DEPTH * self.depth;

        while self.tier < self.tiers.len() {
            let path = self.tiers[self.tier].clone();
            if self.engine.is_none() {
                match UciEngine::new(&path, self.hash_mb, self.multipv).await {
                    Ok(engine) => self.engine = Some(engine),
                    Err(e) => {
                        warn!(path = %path, error = %e, "Engine tier failed to start");
                        self.tier += 1;
                        continue;
                    }
                }
            }
            let abort = self.abort.clone();
            let depth = self.depth;
            let outcome = {
                let engine = self.engine.as_mut().unwrap();
                tokio::select! {
                    res = tokio::time::timeout(budget, engine.analyze(fen, depth)) => Some(res),
                    _ = abort.notified() => None,
                }
            };

            match outcome {
                Some(Ok(Ok(raw))) => return normalize_lines(fen, raw),
                Some(Ok(Err(e))) => {
                    warn!(path = %path, error = %e, "Engine failed, trying next tier");
                }
                Some(Err(_)) => {
                    warn!(path = %path, timeout = ?budget, "Engine timed out, trying next tier");
                }
                None => {
                    debug!(fen, "Evaluation aborted");
                    // The search is mid-flight; the process is not
                    // reusable. Kill it and respawn lazily.
                    if let Some(mut engine) = self.engine.take() {
                        engine.kill();
                    }
                    return Vec::new();
                }
            }
            if let Some(mut engine) = self.engine.take() {
                engine.kill();
            }
            self.tier += 1;
        }

        warn!("All engine tiers exhausted; oracle resolves empty from now on");
        self.dead = true;
        Vec::new()
    }

    /// Release the underlying process.
    pub async fn terminate(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.quit().await;
        }
    }
}

/// Convert raw side-to-move-relative lines into ranked
/// White-perspective `EvaluationLine`s.
fn normalize_lines(fen: &str, mut raw: Vec<RawLine>) -> Vec<EvaluationLine> {
    let black_to_move = Board::from_str(fen)
        .map(|b| b.side_to_move() == Color::Black)
        .unwrap_or(false);

    raw.sort_by_key(|r| r.multipv);
    raw.into_iter()
        .filter_map(|r| {
            let score = match (r.score_cp, r.score_mate) {
                (_, Some(m)) => Score::Mate(m),
                (Some(cp), None) => Score::Cp(cp),
                (None, None) => return None,
            };
            let score = if black_to_move { score.flipped() } else { score };
            Some(EvaluationLine {
                id: r.multipv,
                depth: r.depth,
                pv: r.pv,
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(multipv: u32, cp: Option<i32>, mate: Option<i32>, pv: &[&str]) -> RawLine {
        RawLine {
            multipv,
            depth: 16,
            score_cp: cp,
            score_mate: mate,
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_flips_for_black_to_move() {
        let white_fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let black_fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

        let lines = normalize_lines(white_fen, vec![raw(1, Some(30), None, &["e2e4"])]);
        assert_eq!(lines[0].score, Score::Cp(30));

        let lines = normalize_lines(black_fen, vec![raw(1, Some(30), None, &["e7e5"])]);
        assert_eq!(lines[0].score, Score::Cp(-30));

        let lines = normalize_lines(black_fen, vec![raw(1, None, Some(2), &["d8h4"])]);
        assert_eq!(lines[0].score, Score::Mate(-2));
    }

    #[test]
    fn test_normalize_sorts_by_rank() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let lines = normalize_lines(
            fen,
            vec![
                raw(3, Some(5), None, &["c2c4"]),
                raw(1, Some(30), None, &["e2e4"]),
                raw(2, Some(20), None, &["d2d4"]),
            ],
        );
        let ids: Vec<u32> = lines.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abort_resolves_in_flight_evaluation_empty() {
        use std::os::unix::fs::PermissionsExt;

        // An engine that never answers `go`, so the search can only end
        // through cancellation
        let path = std::env::temp_dir().join(format!("fake-uci-stall-{}.sh", std::process::id()));
        let script = "#!/bin/sh\nwhile read cmd; do\n  case \"$cmd\" in\n    uci) echo uciok ;;\n    isready) echo readyok ;;\n    go*) sleep 60 ;;\n    quit) exit 0 ;;\n  esac\ndone\n";
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = EngineConfig {
            engine_paths: vec![path.to_str().unwrap().to_string()],
            ..EngineConfig::default()
        };
        let mut oracle = PositionOracle::new(&config);
        let abort = oracle.abort_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            abort.abort();
        });

        let lines = oracle
            .evaluate("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .await;
        assert!(lines.is_empty());
        // Cancellation is not a tier failure
        assert!(!oracle.is_dead());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_all_bad_tiers_resolve_empty_then_go_dead() {
        let config = EngineConfig {
            engine_paths: vec![
                "/nonexistent/engine-a".to_string(),
                "/nonexistent/engine-b".to_string(),
            ],
            ..EngineConfig::default()
        };
        let mut oracle = PositionOracle::new(&config);
        let lines = oracle
            .evaluate("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .await;
        assert!(lines.is_empty());
        assert!(oracle.is_dead());

        // Dead oracle short-circuits
        let again = oracle
            .evaluate("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .await;
        assert!(again.is_empty());
    }
}
