//! UCI engine wrapper (async process I/O).
//!
//! Scores in `RawLine` are side-to-move relative, exactly as the engine
//! reports them; the oracle normalizes perspective before they reach
//! the core types.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::EngineError;

/// One `info ... pv ...` message, unnormalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based MultiPV index
    pub multipv: u32,
    pub depth: u32,
    pub score_cp: Option<i32>,
    pub score_mate: Option<i32>,
    pub pv: Vec<String>,
}

pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl UciEngine {
    /// Spawn an engine process and run the UCI handshake.
    pub async fn new(path: &str, hash_mb: u32, multipv: u32) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Engine(format!("Failed to spawn engine {path}: {e}")))?;

        let stdin = process.stdin.take().unwrap();
        let stdout = BufReader::new(process.stdout.take().unwrap());

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine.send("setoption name Threads value 1").await?;
        engine
            .send(&format!("setoption name Hash value {hash_mb}"))
            .await?;
        engine
            .send(&format!("setoption name MultiPV value {multipv}"))
            .await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "UCI <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| EngineError::Engine(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| EngineError::Engine(format!("Failed to read from engine: {e}")))?;
            if n == 0 {
                return Err(EngineError::Engine("Engine closed its stdout".into()));
            }
            let trimmed = line.trim();
            debug!(line = trimmed, "UCI >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Run a fixed-depth MultiPV search and collect the final info
    /// lines, one per MultiPV slot, deepest report wins per slot.
    ///
    /// A `depth 0 ... mate 0` report means the position is already
    /// decided; the search resolves immediately with no lines.
    pub async fn analyze(&mut self, fen: &str, depth: u32) -> Result<Vec<RawLine>, EngineError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut best: Vec<Option<RawLine>> = Vec::new();
        let mut terminal = false;
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| EngineError::Engine(format!("Failed to read from engine: {e}")))?;
            if n == 0 {
                return Err(EngineError::Engine("Engine closed its stdout".into()));
            }
            let trimmed = line.trim();

            if trimmed.starts_with("bestmove") {
                break;
            }
            if terminal {
                continue;
            }
            if let Some(raw) = parse_info(trimmed) {
                if raw.depth == 0 && raw.score_mate == Some(0) {
                    // Terminal position, nothing to search. Keep
                    // reading until the trailing bestmove is consumed
                    // so the next search starts on a clean stream.
                    terminal = true;
                    continue;
                }
                let idx = raw.multipv.saturating_sub(1) as usize;
                if best.len() <= idx {
                    best.resize(idx + 1, None);
                }
                let keep = match &best[idx] {
                    Some(existing) => raw.depth >= existing.depth,
                    None => true,
                };
                if keep {
                    best[idx] = Some(raw);
                }
            }
        }

        if terminal {
            return Ok(Vec::new());
        }
        Ok(best.into_iter().flatten().collect())
    }

    /// Send quit and wait for the process to exit.
    pub async fn quit(mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }

    /// Synchronous best-effort kill, for abandoning a stuck search.
    pub fn kill(&mut self) {
        let _ = self.process.start_kill();
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Parse one `info` message carrying a PV. Returns `None` for any other
/// protocol line.
pub fn parse_info(line: &str) -> Option<RawLine> {
    // Terminal `depth 0 score mate 0` reports carry no pv
    if !line.starts_with("info") || !line.contains(" score ") {
        return None;
    }
    // Interim fail-high/fail-low reports carry unreliable scores
    if line.contains(" lowerbound") || line.contains(" upperbound") {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();

    let mut raw = RawLine {
        multipv: 1,
        depth: 0,
        score_cp: None,
        score_mate: None,
        pv: Vec::new(),
    };

    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "depth" if i + 1 < parts.len() => {
                raw.depth = parts[i + 1].parse().ok()?;
                i += 2;
            }
            "multipv" if i + 1 < parts.len() => {
                raw.multipv = parts[i + 1].parse().ok()?;
                i += 2;
            }
            "score" if i + 2 < parts.len() => {
                match parts[i + 1] {
                    "cp" => raw.score_cp = parts[i + 2].parse().ok(),
                    "mate" => raw.score_mate = parts[i + 2].parse().ok(),
                    _ => {}
                }
                i += 3;
            }
            "pv" => {
                raw.pv = parts[i + 1..]
                    .iter()
                    .take_while(|p| !p.starts_with("bmc") && **p != "string")
                    .map(|p| p.to_string())
                    .collect();
                break;
            }
            _ => i += 1,
        }
    }

    if raw.pv.is_empty() && raw.score_mate != Some(0) {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_cp_line() {
        let line =
            "info depth 16 seldepth 22 multipv 2 score cp 35 nodes 100000 pv e2e4 e7e5 g1f3";
        let raw = parse_info(line).unwrap();
        assert_eq!(raw.depth, 16);
        assert_eq!(raw.multipv, 2);
        assert_eq!(raw.score_cp, Some(35));
        assert_eq!(raw.score_mate, None);
        assert_eq!(raw.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_info_mate_line() {
        let line = "info depth 12 multipv 1 score mate -3 nodes 5000 pv d8d5 h1g1 d5g2";
        let raw = parse_info(line).unwrap();
        assert_eq!(raw.score_mate, Some(-3));
        assert_eq!(raw.score_cp, None);
    }

    #[test]
    fn test_parse_info_defaults_multipv_to_one() {
        let line = "info depth 10 score cp -12 pv e7e5";
        assert_eq!(parse_info(line).unwrap().multipv, 1);
    }

    #[test]
    fn test_parse_info_terminal_mate_report() {
        let raw = parse_info("info depth 0 score mate 0").unwrap();
        assert_eq!(raw.depth, 0);
        assert_eq!(raw.score_mate, Some(0));
        assert!(raw.pv.is_empty());
    }

    #[test]
    fn test_parse_info_ignores_non_pv_lines() {
        assert!(parse_info("info depth 16 currmove e2e4 currmovenumber 1").is_none());
        assert!(parse_info("bestmove e2e4 ponder e7e5").is_none());
        assert!(parse_info("info string NNUE evaluation enabled").is_none());
    }

    #[test]
    fn test_parse_info_rejects_bound_scores() {
        assert!(parse_info("info depth 14 score cp 120 lowerbound nodes 900 pv e2e4").is_none());
        assert!(parse_info("info depth 14 score cp -40 upperbound nodes 900 pv e7e5").is_none());
    }

    #[cfg(unix)]
    fn fake_engine(name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("fake-uci-{name}-{}.sh", std::process::id()));
        let script = format!(
            "#!/bin/sh\nwhile read cmd; do\n  case \"$cmd\" in\n    uci) echo uciok ;;\n    isready) echo readyok ;;\n    quit) exit 0 ;;\n{body}  esac\ndone\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminal_search_leaves_stream_clean_for_next_search() {
        // First `go` reports an already-decided position, second one a
        // normal search. The trailing bestmove of the first search must
        // not terminate the second one early.
        let path = fake_engine(
            "terminal",
            "    \"go depth 16\")\n      if [ -z \"$gone\" ]; then\n        gone=1\n        echo \"info depth 0 score mate 0\"\n        echo \"bestmove (none)\"\n      else\n        echo \"info depth 16 multipv 1 score cp 30 pv e2e4 e7e5\"\n        echo \"bestmove e2e4\"\n      fi ;;\n",
        );
        let mut engine = UciEngine::new(path.to_str().unwrap(), 16, 1).await.unwrap();

        let mated = engine
            .analyze("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1", 16)
            .await
            .unwrap();
        assert!(mated.is_empty());

        let live = engine
            .analyze("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 16)
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].score_cp, Some(30));
        assert_eq!(live[0].pv, vec!["e2e4", "e7e5"]);

        engine.quit().await;
        let _ = std::fs::remove_file(path);
    }
}
