//! Opportunistic cloud evaluation lookup.
//!
//! Speaks the Lichess cloud-eval response shape: `{"depth": D, "pvs":
//! [{"moves": "e2e4 e7e5", "cp": 30 | "mate": -2}, ...]}`. Scores in
//! that format are already White-relative. Any failure, timeout or
//! too-shallow answer degrades to `None`; the caller falls back to the
//! local oracle.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use review_core::eval::{EvaluationLine, Score};

pub struct CloudEvalClient {
    client: Client,
    url: String,
}

impl CloudEvalClient {
    pub fn new(url: String, timeout_ms: u64) -> Self {
        let client = Client::builder()
            .user_agent("GameReview/1.0")
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client, url }
    }

    /// Look up a position. `None` on any failure or when the stored
    /// evaluation is shallower than `min_depth`.
    pub async fn lookup(&self, fen: &str, min_depth: u32, multipv: u32) -> Option<Vec<EvaluationLine>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("fen", fen), ("multiPv", &multipv.to_string())])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Cloud eval miss");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        parse_cloud_response(&body, min_depth)
    }
}

fn parse_cloud_response(body: &Value, min_depth: u32) -> Option<Vec<EvaluationLine>> {
    let depth = body.get("depth")?.as_u64()? as u32;
    if depth < min_depth {
        debug!(depth, min_depth, "Cloud eval too shallow");
        return None;
    }
    let pvs = body.get("pvs")?.as_array()?;

    let mut lines = Vec::with_capacity(pvs.len());
    for (i, entry) in pvs.iter().enumerate() {
        let score = if let Some(cp) = entry.get("cp").and_then(|v| v.as_i64()) {
            Score::Cp(cp as i32)
        } else if let Some(mate) = entry.get("mate").and_then(|v| v.as_i64()) {
            Score::Mate(mate as i32)
        } else {
            continue;
        };
        let pv = entry
            .get("moves")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .split_whitespace()
            .map(String::from)
            .collect();
        lines.push(EvaluationLine {
            id: i as u32 + 1,
            depth,
            pv,
            score,
        });
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines)
    }
}
