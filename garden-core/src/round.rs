//! Rounds and the at-most-one-active-round-per-player store.
//!
//! A round is ephemeral server state: generated when an eligible player
//! asks for status, consumed exactly once by a successful resolution, or
//! silently superseded when a newer round is generated for the same player
//! (last-generated-wins). Supersede-on-generate deliberately tolerates
//! duplicate `status` calls from concurrent tabs without a lock, at the
//! cost of invalidating a round the player may already be looking at.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

use crate::config::{GameRules, ImagePoolConfig};
use crate::error::Result;
use crate::tiles::{self, Tile};
use crate::types::{PlayerId, RoundId, TileId};

/// One secret round bound to a player. The correct tile id never leaves
/// the server before the round is resolved.
#[derive(Debug, Clone)]
pub struct Round {
    /// Freshness token echoed back by the client on submission.
    pub id: RoundId,
    /// The player this round is bound to.
    pub player_id: PlayerId,
    /// The displayed tile set.
    pub tiles: Vec<Tile>,
    /// The id of the tile whose image matches the target.
    pub correct_tile_id: TileId,
    /// URL of the target image shown during the prompt phase. Always a
    /// byte-identical copy of exactly one tile's image.
    pub target_url: String,
    /// When the round was generated.
    pub created_at: DateTime<Utc>,
}

impl Round {
    /// Generate a fresh round for a player.
    ///
    /// # Errors
    /// Returns a configuration error if the image pool cannot satisfy the
    /// requested tile count.
    pub fn generate(
        player_id: PlayerId,
        rules: &GameRules,
        images: &ImagePoolConfig,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let tile_set = tiles::generate_tile_set(images, rules.tile_count, rng)?;
        let target = tiles::pick_target(&tile_set, rng)?;
        Ok(Self {
            id: RoundId::new(),
            player_id,
            correct_tile_id: target.id,
            target_url: target.image_url.clone(),
            tiles: tile_set,
            created_at: now,
        })
    }

    /// Whether the given tile id belongs to this round's tile set.
    #[must_use]
    pub fn contains_tile(&self, tile_id: TileId) -> bool {
        self.tiles.iter().any(|t| t.id == tile_id)
    }
}

/// In-memory store binding at most one active round to each player.
///
/// Rounds are ephemeral by contract, so nothing here touches disk; a
/// process restart simply forces clients back through `status`, which is
/// already their stale-round recovery path.
#[derive(Debug, Default)]
pub struct RoundStore {
    active: RwLock<HashMap<PlayerId, Round>>,
}

impl RoundStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a round to its player, superseding any previously active round.
    pub fn insert(&self, round: Round) {
        let mut active = self.active.write();
        if let Some(previous) = active.insert(round.player_id, round) {
            debug!(
                player = %previous.player_id,
                superseded = %previous.id,
                "active round superseded by a newer one"
            );
        }
    }

    /// Clone the player's current active round, if any.
    #[must_use]
    pub fn current(&self, player_id: &PlayerId) -> Option<Round> {
        self.active.read().get(player_id).cloned()
    }

    /// Retire the player's active round, but only if its id still matches.
    /// Returns whether a round was actually removed.
    ///
    /// The id check re-validates at resolution time: a round superseded
    /// while a slow submission was in flight stays untouched.
    pub fn retire(&self, player_id: &PlayerId, round_id: RoundId) -> bool {
        let mut active = self.active.write();
        match active.get(player_id) {
            Some(round) if round.id == round_id => {
                active.remove(player_id);
                true
            }
            _ => false,
        }
    }

    /// Drop the player's active round unconditionally.
    pub fn clear(&self, player_id: &PlayerId) {
        self.active.write().remove(player_id);
    }

    /// Number of currently active rounds across all players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    /// Whether no rounds are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GardenConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_round(player_id: PlayerId, seed: u64) -> Round {
        let config = GardenConfig::default();
        let mut rng = StdRng::seed_from_u64(seed);
        Round::generate(player_id, &config.game, &config.images, &mut rng, Utc::now())
            .expect("generates")
    }

    #[test]
    fn generated_round_has_unique_correct_answer() {
        let round = make_round(PlayerId::new(), 3);
        let matching = round
            .tiles
            .iter()
            .filter(|t| t.image_url == round.target_url)
            .count();
        assert_eq!(matching, 1);
        assert!(round.contains_tile(round.correct_tile_id));
    }

    #[test]
    fn insert_supersedes_previous_round() {
        let store = RoundStore::new();
        let player = PlayerId::new();
        let first = make_round(player, 1);
        let second = make_round(player, 2);
        let first_id = first.id;
        let second_id = second.id;

        store.insert(first);
        store.insert(second);

        assert_eq!(store.len(), 1);
        let current = store.current(&player).expect("round present");
        assert_eq!(current.id, second_id);
        assert!(!store.retire(&player, first_id), "superseded id must not retire");
        assert!(store.retire(&player, second_id));
    }

    #[test]
    fn retire_is_single_shot() {
        let store = RoundStore::new();
        let player = PlayerId::new();
        let round = make_round(player, 5);
        let round_id = round.id;
        store.insert(round);

        assert!(store.retire(&player, round_id));
        assert!(!store.retire(&player, round_id));
        assert!(store.current(&player).is_none());
    }

    #[test]
    fn players_do_not_share_rounds() {
        let store = RoundStore::new();
        let alice = PlayerId::new();
        let bob = PlayerId::new();
        store.insert(make_round(alice, 1));
        store.insert(make_round(bob, 2));

        assert_eq!(store.len(), 2);
        store.clear(&alice);
        assert!(store.current(&alice).is_none());
        assert!(store.current(&bob).is_some());
    }
}
