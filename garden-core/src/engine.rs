//! The authoritative engine: one entry point per external operation.
//!
//! Each request-scoped operation takes an explicit `now`, acquires the
//! per-player lock, performs a single read-modify-write against the store
//! and the round store, and returns. No operation blocks beyond one
//! persistence round-trip, and overlapping `status`/`play` calls from
//! multiple tabs cannot lose updates.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::thread_rng;
use tracing::{info, warn};

use crate::config::GardenConfig;
use crate::cooldown;
use crate::error::{GardenError, Result};
use crate::progression;
use crate::reward::{self, RewardGrant};
use crate::round::{Round, RoundStore};
use crate::store::{GardenStore, PlayCommit};
use crate::tiles::Tile;
use crate::types::{
    Coupon, ForcedOutcome, GardenProgress, Player, PlayerId, RoundId, TileId,
};

/// What `status` reports to an asking player.
#[derive(Debug, Clone)]
pub enum GameStatus {
    /// The cooldown window is still open.
    Cooldown {
        /// Whole seconds until the next round, rounded up.
        remaining_seconds: u64,
        /// Current garden progression.
        progress: GardenProgress,
    },
    /// A fresh round has been generated and bound to the player.
    Playable {
        /// Freshness token the client must echo on submission.
        round_id: RoundId,
        /// The displayed tile set. The correct tile id is not included.
        tiles: Vec<Tile>,
        /// URL of the target image for the prompt phase.
        target_url: String,
        /// Client-side reveal pacing, in milliseconds.
        reveal_ms: u64,
        /// Current garden progression.
        progress: GardenProgress,
    },
}

/// Win or loss of one resolved play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The selection matched the correct tile (or a win was forced).
    Win,
    /// The selection missed (or a loss was forced).
    Loss,
}

impl Outcome {
    /// Stable string form used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }
}

/// Everything a resolved play reports back to the client.
#[derive(Debug, Clone)]
pub struct PlayResolution {
    /// Win or loss.
    pub outcome: Outcome,
    /// The correct tile, disclosed after resolution so a losing UI can
    /// reveal the right answer.
    pub correct_tile_id: TileId,
    /// Minted reward, wins only.
    pub reward: Option<RewardGrant>,
    /// Post-resolution garden progression.
    pub progress: GardenProgress,
    /// Whether this win completed a garden.
    pub garden_just_completed: bool,
}

/// The server-authoritative Memory Garden engine.
///
/// Construct one per deployment and share it behind an `Arc`; all methods
/// take `&self`.
#[derive(Debug)]
pub struct GardenEngine {
    config: GardenConfig,
    store: Mutex<GardenStore>,
    rounds: RoundStore,
    player_locks: Mutex<HashMap<PlayerId, Arc<Mutex<()>>>>,
}

impl GardenEngine {
    /// Build an engine over an opened store.
    ///
    /// # Errors
    /// Returns [`GardenError::Config`] if the configuration is invalid.
    pub fn new(config: GardenConfig, store: GardenStore) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: Mutex::new(store),
            rounds: RoundStore::new(),
            player_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &GardenConfig {
        &self.config
    }

    /// Number of currently active rounds (diagnostics).
    #[must_use]
    pub fn active_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn player_lock(&self, player_id: &PlayerId) -> Arc<Mutex<()>> {
        self.player_locks
            .lock()
            .entry(*player_id)
            .or_default()
            .clone()
    }

    fn load_player(&self, player_id: &PlayerId) -> Result<Player> {
        self.store
            .lock()
            .load_player(player_id)?
            .ok_or(GardenError::UnknownPlayer(*player_id))
    }

    // ------------------------------------------------------------------
    // Player registry
    // ------------------------------------------------------------------

    /// Create-or-fetch a player record. Idempotent: an existing record is
    /// returned unchanged.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on persistence failures.
    pub fn ensure_player(&self, player_id: PlayerId, now: DateTime<Utc>) -> Result<Player> {
        let lock = self.player_lock(&player_id);
        let _guard = lock.lock();

        let store = self.store.lock();
        if let Some(existing) = store.load_player(&player_id)? {
            return Ok(existing);
        }
        let player = Player::new(player_id, now);
        store.insert_player(&player)?;
        info!(player = %player_id, "player registered");
        Ok(player)
    }

    /// Create a brand-new player with a fresh random id.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on persistence failures.
    pub fn create_player(&self, now: DateTime<Utc>) -> Result<Player> {
        self.ensure_player(PlayerId::new(), now)
    }

    /// Fetch a player record without creating one.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on persistence failures.
    pub fn find_player(&self, player_id: &PlayerId) -> Result<Option<Player>> {
        self.store.lock().load_player(player_id)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Report a player's eligibility. Within the cooldown window this is a
    /// countdown; otherwise a fresh round is generated, superseding any
    /// previously active one (last-generated-wins).
    ///
    /// # Errors
    /// Returns [`GardenError::UnknownPlayer`] if the player does not
    /// exist, or a persistence/config error.
    pub fn status(&self, player_id: &PlayerId, now: DateTime<Utc>) -> Result<GameStatus> {
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();

        let player = self.load_player(player_id)?;
        let cooldown = cooldown::check(player.last_play_at, self.config.game.cooldown_seconds, now);
        if !cooldown.can_play {
            return Ok(GameStatus::Cooldown {
                remaining_seconds: cooldown.remaining_seconds,
                progress: player.progress(),
            });
        }

        let round = Round::generate(
            *player_id,
            &self.config.game,
            &self.config.images,
            &mut thread_rng(),
            now,
        )?;
        let status = GameStatus::Playable {
            round_id: round.id,
            tiles: round.tiles.clone(),
            target_url: round.target_url.clone(),
            reveal_ms: self.config.game.reveal_ms,
            progress: player.progress(),
        };
        info!(player = %player_id, round = %round.id, "round issued");
        self.rounds.insert(round);
        Ok(status)
    }

    // ------------------------------------------------------------------
    // Play resolution
    // ------------------------------------------------------------------

    /// Resolve a player's single submission against their current active
    /// round.
    ///
    /// The round id is re-validated under the player lock at resolution
    /// time, not at request receipt, which closes the race between
    /// overlapping `status` fetches and late submissions. The round is
    /// retired only after the durable commit succeeds, so a persistence
    /// failure consumes nothing and the client may safely retry.
    ///
    /// # Errors
    /// - [`GardenError::StaleRound`] if `round_id` is not the current
    ///   active round (none, superseded, or already resolved).
    /// - [`GardenError::InvalidSelection`] if the tile is not in the round.
    /// - [`GardenError::UnknownPlayer`] / [`GardenError::Database`] on
    ///   registry or persistence failures.
    pub fn submit_play(
        &self,
        player_id: &PlayerId,
        round_id: RoundId,
        selected_tile_id: TileId,
        now: DateTime<Utc>,
    ) -> Result<PlayResolution> {
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();

        let player = self.load_player(player_id)?;
        let round = self
            .rounds
            .current(player_id)
            .filter(|round| round.id == round_id)
            .ok_or(GardenError::StaleRound { round_id })?;
        if !round.contains_tile(selected_tile_id) {
            return Err(GardenError::InvalidSelection {
                tile_id: selected_tile_id,
            });
        }

        let won = match player.forced_outcome {
            Some(ForcedOutcome::Win) => true,
            Some(ForcedOutcome::Loss) => false,
            None => selected_tile_id == round.correct_tile_id,
        };
        if player.forced_outcome.is_some() {
            warn!(player = %player_id, won, "forced outcome consumed");
        }

        let advance = if won {
            Some(progression::advance(
                player.squares_claimed,
                player.gardens_completed,
                self.config.game.squares_per_garden,
            ))
        } else {
            None
        };
        let (squares_claimed, gardens_completed) = advance.map_or(
            (player.squares_claimed, player.gardens_completed),
            |a| (a.squares_claimed, a.gardens_completed),
        );

        let reward = if won {
            Some(self.mint_reward(player_id, round_id, selected_tile_id, &round, now, squares_claimed, gardens_completed)?)
        } else {
            self.store.lock().commit_play(&PlayCommit {
                player_id: *player_id,
                now,
                won: false,
                squares_claimed,
                gardens_completed,
                round_id,
                target_tile: round.correct_tile_id,
                selected_tile: selected_tile_id,
                reward: None,
            })?;
            None
        };

        self.rounds.retire(player_id, round_id);

        let outcome = if won { Outcome::Win } else { Outcome::Loss };
        info!(
            player = %player_id,
            round = %round_id,
            outcome = outcome.as_str(),
            squares = squares_claimed,
            gardens = gardens_completed,
            "play resolved"
        );

        Ok(PlayResolution {
            outcome,
            correct_tile_id: round.correct_tile_id,
            reward,
            progress: GardenProgress {
                squares_claimed,
                gardens_completed,
            },
            garden_just_completed: advance.is_some_and(|a| a.garden_just_completed),
        })
    }

    /// Draw a reward and commit the winning play, regenerating the coupon
    /// code on the (vanishingly rare) collision with a concurrent win.
    #[allow(clippy::too_many_arguments)]
    fn mint_reward(
        &self,
        player_id: &PlayerId,
        round_id: RoundId,
        selected_tile_id: TileId,
        round: &Round,
        now: DateTime<Utc>,
        squares_claimed: u32,
        gardens_completed: u32,
    ) -> Result<RewardGrant> {
        let rewards = &self.config.rewards;
        let percentage = reward::draw_percentage(rewards, &mut thread_rng())?;

        for _ in 0..rewards.max_code_attempts {
            let candidate = RewardGrant {
                percentage,
                code: reward::generate_code(rewards, &mut thread_rng()),
            };

            let mut store = self.store.lock();
            if store.coupon_exists(&candidate.code)? {
                continue;
            }
            let result = store.commit_play(&PlayCommit {
                player_id: *player_id,
                now,
                won: true,
                squares_claimed,
                gardens_completed,
                round_id,
                target_tile: round.correct_tile_id,
                selected_tile: selected_tile_id,
                reward: Some(&candidate),
            });
            match result {
                Ok(()) => return Ok(candidate),
                Err(err) if GardenStore::is_code_conflict(&err) => {
                    warn!(code = %candidate.code, "coupon code collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }

        Err(GardenError::Config(format!(
            "could not allocate a unique coupon code in {} attempts",
            rewards.max_code_attempts
        )))
    }

    // ------------------------------------------------------------------
    // Coupons
    // ------------------------------------------------------------------

    /// Redeem a coupon code: stamp `redeemed_at` exactly once.
    ///
    /// # Errors
    /// Returns [`GardenError::CouponInvalid`] for unknown or
    /// already-redeemed codes.
    pub fn redeem_coupon(&self, code: &str, now: DateTime<Utc>) -> Result<Coupon> {
        self.store.lock().redeem_coupon(code, now)
    }

    /// Look up a player's most recently issued coupon without redeeming it.
    ///
    /// # Errors
    /// Returns [`GardenError::Database`] on persistence failures.
    pub fn latest_coupon(&self, player_id: &PlayerId) -> Result<Option<Coupon>> {
        self.store.lock().latest_coupon_for(player_id)
    }

    // ------------------------------------------------------------------
    // Dev override channel
    // ------------------------------------------------------------------

    fn require_dev(&self) -> Result<()> {
        if self.config.dev.enabled {
            Ok(())
        } else {
            Err(GardenError::DevDisabled)
        }
    }

    /// Clear a player's cooldown so the next `status` is immediately
    /// playable.
    ///
    /// # Errors
    /// Returns [`GardenError::DevDisabled`] unless the dev channel is on.
    pub fn dev_reset_cooldown(&self, player_id: &PlayerId) -> Result<()> {
        self.require_dev()?;
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();
        self.store.lock().set_last_play(player_id, None)?;
        warn!(player = %player_id, "dev: cooldown cleared");
        Ok(())
    }

    /// Backdate a player's cooldown so it expires in `seconds` from `now`.
    ///
    /// # Errors
    /// Returns [`GardenError::DevDisabled`] unless the dev channel is on.
    pub fn dev_set_cooldown(
        &self,
        player_id: &PlayerId,
        seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_dev()?;
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();
        let cooldown = self.config.game.cooldown_seconds;
        let backdated = now - Duration::seconds(cooldown.saturating_sub(seconds) as i64);
        self.store.lock().set_last_play(player_id, Some(backdated))?;
        warn!(player = %player_id, expires_in = seconds, "dev: cooldown set");
        Ok(())
    }

    /// Zero a player's garden progression.
    ///
    /// # Errors
    /// Returns [`GardenError::DevDisabled`] unless the dev channel is on.
    pub fn dev_reset_garden(&self, player_id: &PlayerId) -> Result<()> {
        self.require_dev()?;
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();
        self.store.lock().reset_garden(player_id)?;
        warn!(player = %player_id, "dev: garden reset");
        Ok(())
    }

    /// Force the player's next play to the given outcome. Consumed by
    /// exactly one resolution, then auto-cleared.
    ///
    /// # Errors
    /// Returns [`GardenError::DevDisabled`] unless the dev channel is on.
    pub fn dev_force_outcome(&self, player_id: &PlayerId, outcome: ForcedOutcome) -> Result<()> {
        self.require_dev()?;
        let lock = self.player_lock(player_id);
        let _guard = lock.lock();
        self.store.lock().set_forced_outcome(player_id, Some(outcome))?;
        warn!(player = %player_id, outcome = outcome.as_str(), "dev: outcome forced");
        Ok(())
    }

    /// Dump a player's full persistent record.
    ///
    /// # Errors
    /// Returns [`GardenError::DevDisabled`] unless the dev channel is on.
    pub fn dev_player_state(&self, player_id: &PlayerId) -> Result<Player> {
        self.require_dev()?;
        self.load_player(player_id)
    }
}
