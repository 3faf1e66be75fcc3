//! End-to-end engine flows: eligibility, resolution, rewards, progression,
//! supersede semantics, and persistence across restarts.

use chrono::{DateTime, Duration, Utc};

use garden_core::api::{PlayResponse, StatusResponse};
use garden_core::config::GardenConfig;
use garden_core::engine::{GameStatus, GardenEngine, Outcome};
use garden_core::store::GardenStore;
use garden_core::tiles::Tile;
use garden_core::types::{ForcedOutcome, RoundId, TileId};
use garden_core::GardenError;

fn test_config() -> GardenConfig {
    let mut config = GardenConfig::default();
    config.game.tile_count = 6;
    config.game.squares_per_garden = 3;
    config.dev.enabled = true;
    config
}

fn engine() -> GardenEngine {
    GardenEngine::new(test_config(), GardenStore::open_in_memory().expect("opens"))
        .expect("valid config")
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

struct IssuedRound {
    round_id: RoundId,
    tiles: Vec<Tile>,
    target_url: String,
}

fn issued(status: &GameStatus) -> IssuedRound {
    match status {
        GameStatus::Playable {
            round_id,
            tiles,
            target_url,
            ..
        } => IssuedRound {
            round_id: *round_id,
            tiles: tiles.clone(),
            target_url: target_url.clone(),
        },
        GameStatus::Cooldown { .. } => panic!("expected a playable status"),
    }
}

impl IssuedRound {
    fn matching_tile(&self) -> TileId {
        self.tiles
            .iter()
            .find(|t| t.image_url == self.target_url)
            .expect("target matches exactly one tile")
            .id
    }

    fn non_matching_tile(&self) -> TileId {
        self.tiles
            .iter()
            .find(|t| t.image_url != self.target_url)
            .expect("some tile differs from the target")
            .id
    }
}

// ---------------------------------------------------------------------------
// Scenario A: fresh player wins the first round
// ---------------------------------------------------------------------------

#[test]
fn fresh_player_wins_first_round() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");

    let status = engine.status(&player.id, t0).expect("status");
    let round = issued(&status);
    assert_eq!(round.tiles.len(), 6);

    let resolution = engine
        .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
        .expect("resolves");
    assert_eq!(resolution.outcome, Outcome::Win);
    assert_eq!(resolution.progress.squares_claimed, 1);
    assert!(resolution.reward.is_some());

    match engine.status(&player.id, t0).expect("status") {
        GameStatus::Cooldown {
            remaining_seconds, ..
        } => assert_eq!(remaining_seconds, test_config().game.cooldown_seconds),
        GameStatus::Playable { .. } => panic!("cooldown must be active"),
    }
}

// ---------------------------------------------------------------------------
// Scenario B: loss discloses the answer, claims nothing, starts cooldown
// ---------------------------------------------------------------------------

#[test]
fn loss_discloses_answer_and_claims_nothing() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    let round = issued(&engine.status(&player.id, t0).expect("status"));

    let correct = round.matching_tile();
    let resolution = engine
        .submit_play(&player.id, round.round_id, round.non_matching_tile(), t0)
        .expect("resolves");
    assert_eq!(resolution.outcome, Outcome::Loss);
    assert_eq!(resolution.correct_tile_id, correct);
    assert!(resolution.reward.is_none());
    assert_eq!(resolution.progress.squares_claimed, 0);

    assert!(matches!(
        engine.status(&player.id, t0).expect("status"),
        GameStatus::Cooldown { .. }
    ));
}

// ---------------------------------------------------------------------------
// Scenario C: the final square completes the garden atomically
// ---------------------------------------------------------------------------

#[test]
fn final_square_completes_garden() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");

    for win in 1..=2u32 {
        engine.dev_reset_cooldown(&player.id).expect("resets");
        let round = issued(&engine.status(&player.id, t0).expect("status"));
        let resolution = engine
            .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
            .expect("resolves");
        assert_eq!(resolution.progress.squares_claimed, win);
        assert!(!resolution.garden_just_completed);
    }

    engine.dev_reset_cooldown(&player.id).expect("resets");
    let round = issued(&engine.status(&player.id, t0).expect("status"));
    let resolution = engine
        .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
        .expect("resolves");
    assert!(resolution.garden_just_completed);
    assert_eq!(resolution.progress.squares_claimed, 0);
    assert_eq!(resolution.progress.gardens_completed, 1);
}

// ---------------------------------------------------------------------------
// Scenario D: double resolution of one round
// ---------------------------------------------------------------------------

#[test]
fn second_submission_of_same_round_is_stale() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    let round = issued(&engine.status(&player.id, t0).expect("status"));
    let selection = round.matching_tile();

    engine
        .submit_play(&player.id, round.round_id, selection, t0)
        .expect("first resolves");
    let err = engine
        .submit_play(&player.id, round.round_id, selection, t0)
        .expect_err("second must fail");
    assert!(matches!(err, GardenError::StaleRound { .. }));
}

// ---------------------------------------------------------------------------
// Scenario E: two status calls, play against the first round
// ---------------------------------------------------------------------------

#[test]
fn superseded_round_is_stale_even_if_unresolved() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");

    let first = issued(&engine.status(&player.id, t0).expect("status"));
    let second = issued(&engine.status(&player.id, t0).expect("status"));
    assert_ne!(first.round_id, second.round_id);

    assert!(matches!(
        engine.submit_play(&player.id, first.round_id, first.matching_tile(), t0),
        Err(GardenError::StaleRound { .. })
    ));

    engine
        .submit_play(&player.id, second.round_id, second.matching_tile(), t0)
        .expect("current round resolves");
}

// ---------------------------------------------------------------------------
// Cooldown countdown across repeated status calls
// ---------------------------------------------------------------------------

#[test]
fn cooldown_counts_down_and_reopens() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    let round = issued(&engine.status(&player.id, t0).expect("status"));
    engine
        .submit_play(&player.id, round.round_id, round.non_matching_tile(), t0)
        .expect("resolves");

    let window = test_config().game.cooldown_seconds as i64;
    let mut previous = u64::MAX;
    for offset in [0, 600, 3_600, window / 2, window - 1] {
        match engine
            .status(&player.id, t0 + Duration::seconds(offset))
            .expect("status")
        {
            GameStatus::Cooldown {
                remaining_seconds, ..
            } => {
                assert!(remaining_seconds <= previous, "countdown must not increase");
                previous = remaining_seconds;
            }
            GameStatus::Playable { .. } => panic!("window still open at +{offset}s"),
        }
    }

    assert!(matches!(
        engine
            .status(&player.id, t0 + Duration::seconds(window))
            .expect("status"),
        GameStatus::Playable { .. }
    ));
}

// ---------------------------------------------------------------------------
// Rewards: documented percentages, globally unique codes
// ---------------------------------------------------------------------------

#[test]
fn wins_mint_unique_codes_with_documented_percentages() {
    let engine = engine();
    let t0 = now();
    let allowed = test_config().rewards.percentages();
    let mut codes = std::collections::HashSet::new();

    for _ in 0..3 {
        let player = engine.create_player(t0).expect("creates");
        for _ in 0..4 {
            engine.dev_reset_cooldown(&player.id).expect("resets");
            let round = issued(&engine.status(&player.id, t0).expect("status"));
            let resolution = engine
                .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
                .expect("resolves");
            let reward = resolution.reward.expect("wins carry rewards");
            assert!(allowed.contains(&reward.percentage));
            assert!(codes.insert(reward.code.clone()), "code reused: {}", reward.code);
        }
    }
}

#[test]
fn coupon_redemption_is_single_shot() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    let round = issued(&engine.status(&player.id, t0).expect("status"));
    let resolution = engine
        .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
        .expect("resolves");
    let code = resolution.reward.expect("win").code;

    let latest = engine
        .latest_coupon(&player.id)
        .expect("queries")
        .expect("present");
    assert_eq!(latest.code, code);
    assert!(!latest.is_redeemed());

    let redeemed = engine.redeem_coupon(&code, t0).expect("redeems");
    assert!(redeemed.is_redeemed());
    assert!(matches!(
        engine.redeem_coupon(&code, t0),
        Err(GardenError::CouponInvalid { .. })
    ));
    assert!(matches!(
        engine.redeem_coupon("MG-NOSUCH", t0),
        Err(GardenError::CouponInvalid { .. })
    ));
}

// ---------------------------------------------------------------------------
// Dev override: one-shot forced outcomes
// ---------------------------------------------------------------------------

#[test]
fn forced_win_applies_to_exactly_one_play() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    engine
        .dev_force_outcome(&player.id, ForcedOutcome::Win)
        .expect("arms");

    let round = issued(&engine.status(&player.id, t0).expect("status"));
    let resolution = engine
        .submit_play(&player.id, round.round_id, round.non_matching_tile(), t0)
        .expect("resolves");
    assert_eq!(resolution.outcome, Outcome::Win, "forced win overrides a miss");

    engine.dev_reset_cooldown(&player.id).expect("resets");
    let round = issued(&engine.status(&player.id, t0).expect("status"));
    let resolution = engine
        .submit_play(&player.id, round.round_id, round.non_matching_tile(), t0)
        .expect("resolves");
    assert_eq!(resolution.outcome, Outcome::Loss, "override must not persist");
}

// ---------------------------------------------------------------------------
// Persistence: player, progression, and coupons survive a restart
// ---------------------------------------------------------------------------

#[test]
fn state_survives_engine_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("garden.db");
    let t0 = now();

    let (player_id, code) = {
        let store = GardenStore::open(&db_path, &test_config().persistence).expect("opens");
        let engine = GardenEngine::new(test_config(), store).expect("valid config");
        let player = engine.create_player(t0).expect("creates");
        let round = issued(&engine.status(&player.id, t0).expect("status"));
        let resolution = engine
            .submit_play(&player.id, round.round_id, round.matching_tile(), t0)
            .expect("resolves");
        (player.id, resolution.reward.expect("win").code)
    };

    let store = GardenStore::open(&db_path, &test_config().persistence).expect("reopens");
    let engine = GardenEngine::new(test_config(), store).expect("valid config");

    // Identity and progression came back; the cooldown stamp still holds.
    let player = engine.ensure_player(player_id, t0).expect("fetches");
    assert_eq!(player.squares_claimed, 1);
    assert_eq!(player.total_wins, 1);
    assert!(matches!(
        engine.status(&player_id, t0).expect("status"),
        GameStatus::Cooldown { .. }
    ));

    // The coupon is still on file and still single-shot.
    engine.redeem_coupon(&code, t0).expect("redeems");
    assert!(matches!(
        engine.redeem_coupon(&code, t0),
        Err(GardenError::CouponInvalid { .. })
    ));

    // The pre-restart round is gone: rounds are ephemeral by contract.
    assert_eq!(engine.active_rounds(), 0);
}

// ---------------------------------------------------------------------------
// Wire mapping sanity on top of a real resolution
// ---------------------------------------------------------------------------

#[test]
fn wire_responses_reflect_engine_state() {
    let engine = engine();
    let t0 = now();
    let player = engine.create_player(t0).expect("creates");
    let per_garden = engine.config().game.squares_per_garden;

    let status = engine.status(&player.id, t0).expect("status");
    let wire = StatusResponse::from_status(&status, per_garden);
    assert!(wire.can_play);
    let round_id = wire.round_id.expect("playable carries a round id");
    let tiles = wire.tiles.expect("playable carries tiles");
    let target = wire.target.expect("playable carries a target");
    let selection = tiles
        .iter()
        .find(|t| t.url == target.url)
        .expect("target matches a tile")
        .id;

    let resolution = engine
        .submit_play(&player.id, round_id, selection, t0)
        .expect("resolves");
    let wire = PlayResponse::from_resolution(&resolution, per_garden);
    assert!(wire.is_win());
    assert_eq!(wire.squares_claimed, 1);
    assert_eq!(wire.squares_per_garden, per_garden);
    assert!(wire.coupon_code.is_some());
}
