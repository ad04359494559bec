//! Engine configuration from environment variables.

use std::env;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Engine binaries in fallback order: primary first, then up to two
    /// substitute tiers tried when the primary times out or crashes
    pub engine_paths: Vec<String>,

    /// Search depth per position
    pub search_depth: u32,

    /// Ranked lines requested per position
    pub multipv: u32,

    /// Engine hash table size in MiB
    pub hash_mb: u32,

    /// Cloud evaluation endpoint; `None` disables the cloud shortcut
    pub cloud_eval_url: Option<String>,

    /// Budget for one cloud lookup before falling back to local search
    pub cloud_timeout_ms: u64,

    /// Upper bound on bulk-analysis workers
    pub max_workers: usize,
}

impl EngineConfig {
    pub fn load() -> Self {
        let primary = env::var("ENGINE_PATH")
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());
        let mut engine_paths = vec![primary];
        if let Ok(fallbacks) = env::var("ENGINE_FALLBACK_PATHS") {
            engine_paths.extend(
                fallbacks
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from),
            );
        }
        // Primary plus at most two fallback tiers
        engine_paths.truncate(3);

        let search_depth = env::var("SEARCH_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);

        let multipv = env::var("MULTIPV")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let hash_mb = env::var("ENGINE_HASH_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(256);

        let cloud_eval_url = env::var("CLOUD_EVAL_URL").ok().filter(|v| !v.is_empty());

        let cloud_timeout_ms = env::var("CLOUD_EVAL_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_500);

        let max_workers = env::var("MAX_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(num_cpus::get);

        Self {
            engine_paths,
            search_depth,
            multipv,
            hash_mb,
            cloud_eval_url,
            cloud_timeout_ms,
            max_workers,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_paths: vec!["/usr/local/bin/stockfish".to_string()],
            search_depth: 16,
            multipv: 3,
            hash_mb: 256,
            cloud_eval_url: None,
            cloud_timeout_ms: 2_500,
            max_workers: num_cpus::get(),
        }
    }
}
