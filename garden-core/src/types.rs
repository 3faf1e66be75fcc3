//! Core type definitions for the Memory Garden engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Opaque, persistent identifier for a player. Cookie-bound on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier for one round of the memory challenge. A fresh one is minted
/// every time a round is generated, so it doubles as a freshness token:
/// a play must echo the round id it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundId(pub Uuid);

impl RoundId {
    /// Create a new random round ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoundId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Round-scoped identifier for a displayed tile slot. Deliberately distinct
/// from the tile's image URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A forced outcome for a player's next play. Test-only; set through the dev
/// channel and consumed by exactly one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcedOutcome {
    /// The next play resolves as a win regardless of the selection.
    Win,
    /// The next play resolves as a loss regardless of the selection.
    Loss,
}

impl ForcedOutcome {
    /// Stable string form used for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "win" => Some(Self::Win),
            "loss" => Some(Self::Loss),
            _ => None,
        }
    }
}

/// Persistent player record. Created lazily on first contact and mutated
/// only by play resolution, garden progression, and the dev channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Opaque identity, bound to a client cookie.
    pub id: PlayerId,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Squares claimed toward the current garden. Always strictly below
    /// the configured squares-per-garden.
    pub squares_claimed: u32,
    /// Completed gardens. Monotonic non-decreasing in normal play.
    pub gardens_completed: u32,
    /// Total resolved plays, win or loss.
    pub total_plays: u64,
    /// Total winning plays.
    pub total_wins: u64,
    /// When the player last resolved a play. Absent means immediately
    /// eligible.
    pub last_play_at: Option<DateTime<Utc>>,
    /// One-shot forced outcome for the next play, if armed.
    pub forced_outcome: Option<ForcedOutcome>,
}

impl Player {
    /// Create a fresh player record.
    #[must_use]
    pub fn new(id: PlayerId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            squares_claimed: 0,
            gardens_completed: 0,
            total_plays: 0,
            total_wins: 0,
            last_play_at: None,
            forced_outcome: None,
        }
    }

    /// Current garden progression snapshot.
    #[must_use]
    pub fn progress(&self) -> GardenProgress {
        GardenProgress {
            squares_claimed: self.squares_claimed,
            gardens_completed: self.gardens_completed,
        }
    }
}

/// Snapshot of a player's garden progression, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenProgress {
    /// Squares claimed toward the current garden.
    pub squares_claimed: u32,
    /// Gardens completed so far.
    pub gardens_completed: u32,
}

// ---------------------------------------------------------------------------
// Coupon
// ---------------------------------------------------------------------------

/// A single-use discount coupon minted on a winning play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Globally unique code. Never reused across players or time.
    pub code: String,
    /// The player the coupon was issued to.
    pub player_id: PlayerId,
    /// Discount percentage, drawn from the configured tier set.
    pub percentage: u8,
    /// When the coupon was minted.
    pub issued_at: DateTime<Utc>,
    /// When the coupon was redeemed, if ever. Set at most once.
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Whether the coupon has already been redeemed.
    #[must_use]
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_unique() {
        assert_ne!(PlayerId::new(), PlayerId::new());
    }

    #[test]
    fn player_id_round_trips_through_display() {
        let id = PlayerId::new();
        let parsed: PlayerId = id.to_string().parse().expect("valid uuid");
        assert_eq!(id, parsed);
    }

    #[test]
    fn forced_outcome_round_trips() {
        for outcome in [ForcedOutcome::Win, ForcedOutcome::Loss] {
            assert_eq!(ForcedOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(ForcedOutcome::parse("draw"), None);
    }

    #[test]
    fn fresh_player_starts_empty() {
        let player = Player::new(PlayerId::new(), Utc::now());
        assert_eq!(player.squares_claimed, 0);
        assert_eq!(player.gardens_completed, 0);
        assert!(player.last_play_at.is_none());
        assert!(player.forced_outcome.is_none());
    }
}
