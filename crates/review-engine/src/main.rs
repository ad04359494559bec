//! Game review CLI: analyze a PGN file and print the report as JSON.

use anyhow::Context;
use tracing::info;

use review_engine::analyzer;
use review_engine::config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let path = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .context("usage: review-engine <game.pgn> [--depth N]")?;

    let mut config = EngineConfig::load();
    if let Some(i) = args.iter().position(|a| a == "--depth") {
        if let Some(depth) = args.get(i + 1).and_then(|v| v.parse().ok()) {
            config.search_depth = depth;
        }
    }

    let pgn = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {path}"))?;

    info!(path = %path, depth = config.search_depth, "Starting game analysis");
    let report = analyzer::analyze_game(&config, &pgn, |pct| {
        info!(pct, "Analysis progress");
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
