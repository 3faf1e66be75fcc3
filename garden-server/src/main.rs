//! Memory Garden HTTP service.
//!
//! Thin axum binding over [`garden_core::GardenEngine`]: cookie-bound
//! identity, the status/play/coupon endpoints, and the dev channel when a
//! deployment opts in. All game authority lives in the engine; handlers
//! translate between HTTP and engine calls and nothing else.
//!
//! Configuration resolves in two layers: an optional TOML file named by
//! `GARDEN_CONFIG`, then `GARDEN_*` environment overrides.

mod cookie;
mod dev;
mod routes;

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use garden_core::store::GardenStore;
use garden_core::{GardenConfig, GardenEngine};

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Apply `GARDEN_*` environment overrides on top of the loaded config.
fn apply_env_overrides(config: &mut GardenConfig) {
    if let Ok(host) = std::env::var("GARDEN_HOST") {
        config.server.host = host;
    }
    if let Some(port) = env_parse("GARDEN_PORT") {
        config.server.port = port;
    }
    if let Some(seconds) = env_parse("GARDEN_COOLDOWN_SECONDS") {
        config.game.cooldown_seconds = seconds;
    }
    if let Some(ms) = env_parse("GARDEN_REVEAL_MS") {
        config.game.reveal_ms = ms;
    }
    if let Some(count) = env_parse("GARDEN_TILE_COUNT") {
        config.game.tile_count = count;
    }
    if let Some(squares) = env_parse("GARDEN_SQUARES_PER_GARDEN") {
        config.game.squares_per_garden = squares;
    }
    for tier in &mut config.rewards.tiers {
        let key = format!("GARDEN_REWARD_{}_WEIGHT", tier.percentage);
        if let Some(weight) = env_parse(&key) {
            tier.weight = weight;
        }
    }
    if let Some(enabled) = env_parse("GARDEN_DEV_MODE") {
        config.dev.enabled = enabled;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var("GARDEN_CONFIG") {
        Ok(path) => GardenConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading config from {path}"))?,
        Err(_) => GardenConfig::default(),
    };
    apply_env_overrides(&mut config);

    let db_path =
        std::env::var("GARDEN_DB_PATH").unwrap_or_else(|_| "memory_garden.db".to_string());
    let store = GardenStore::open(&db_path, &config.persistence)
        .with_context(|| format!("opening store at {db_path}"))?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen addr")?;
    let dev_enabled = config.dev.enabled;
    let engine = Arc::new(GardenEngine::new(config, store)?);

    let app = routes::router(engine);
    info!(%addr, dev = dev_enabled, "memory garden service listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
