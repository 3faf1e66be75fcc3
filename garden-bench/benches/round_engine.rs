//! Engine hot-path benchmarks.
//!
//! Informal targets (request/response service, single persistence write
//! per request):
//!   round_generation_12_tiles ....... < 10μs
//!   cooldown_check .................. < 1μs
//!   reward_draw_and_code ............ < 5μs
//!   full_play_cycle_in_memory ....... < 500μs

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use garden_core::config::GardenConfig;
use garden_core::engine::{GameStatus, GardenEngine};
use garden_core::round::Round;
use garden_core::store::GardenStore;
use garden_core::types::PlayerId;
use garden_core::{cooldown, progression, reward};

/// Benchmark: generating one full round (sample + target designation).
fn bench_round_generation(c: &mut Criterion) {
    let config = GardenConfig::default();
    let player = PlayerId::new();
    let now = Utc::now();
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("round_generation_12_tiles", |b| {
        b.iter(|| {
            let round = Round::generate(
                black_box(player),
                &config.game,
                &config.images,
                &mut rng,
                now,
            )
            .expect("generates");
            black_box(round);
        });
    });
}

/// Benchmark: the pure cooldown computation.
fn bench_cooldown_check(c: &mut Criterion) {
    let last = Utc::now();
    let now = last + Duration::seconds(40_000);

    c.bench_function("cooldown_check", |b| {
        b.iter(|| {
            let status = cooldown::check(black_box(Some(last)), black_box(86_400), now);
            black_box(status);
        });
    });
}

/// Benchmark: garden advance (pure rollover arithmetic).
fn bench_progression(c: &mut Criterion) {
    c.bench_function("garden_advance", |b| {
        b.iter(|| {
            let advanced = progression::advance(black_box(11), black_box(4), black_box(12));
            black_box(advanced);
        });
    });
}

/// Benchmark: weighted tier draw plus one code candidate.
fn bench_reward(c: &mut Criterion) {
    let config = GardenConfig::default();
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("reward_draw_and_code", |b| {
        b.iter(|| {
            let pct = reward::draw_percentage(&config.rewards, &mut rng).expect("draws");
            let code = reward::generate_code(&config.rewards, &mut rng);
            black_box((pct, code));
        });
    });
}

/// Benchmark: one complete status + winning play against an in-memory
/// store, including the transactional commit.
fn bench_full_play_cycle(c: &mut Criterion) {
    let mut config = GardenConfig::default();
    config.dev.enabled = true;
    let engine = GardenEngine::new(config, GardenStore::open_in_memory().expect("opens"))
        .expect("valid config");
    let now = Utc::now();
    let player = engine.create_player(now).expect("creates");

    c.bench_function("full_play_cycle_in_memory", |b| {
        b.iter(|| {
            engine.dev_reset_cooldown(&player.id).expect("resets");
            let status = engine.status(&player.id, now).expect("status");
            let GameStatus::Playable {
                round_id,
                tiles,
                target_url,
                ..
            } = status
            else {
                panic!("player must be eligible after a reset");
            };
            let selection = tiles
                .iter()
                .find(|t| t.image_url == target_url)
                .expect("target matches a tile")
                .id;
            let resolution = engine
                .submit_play(&player.id, round_id, selection, now)
                .expect("resolves");
            black_box(resolution);
        });
    });
}

criterion_group!(
    benches,
    bench_round_generation,
    bench_cooldown_check,
    bench_progression,
    bench_reward,
    bench_full_play_cycle
);
criterion_main!(benches);
