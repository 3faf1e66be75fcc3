//! Wire-level request and response types for the HTTP contract.
//!
//! Shared between the server binding and the client session crate so the
//! two sides cannot drift. Field names are the JSON contract; everything
//! here is plain data with no engine behavior.

use serde::{Deserialize, Serialize};

use crate::engine::{GameStatus, PlayResolution};
use crate::tiles::Tile;
use crate::types::{GardenProgress, PlayerId, RoundId, TileId};

/// Response of `POST /api/users/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    /// The player's opaque id, also carried by the identity cookie.
    pub user_id: PlayerId,
    /// Whether this call created the record (as opposed to fetching it).
    pub created: bool,
    /// Squares claimed toward the current garden.
    pub squares_claimed: u32,
    /// Gardens completed so far.
    pub gardens_completed: u32,
}

/// One tile as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileView {
    /// Round-scoped tile id.
    pub id: TileId,
    /// Image URL.
    pub url: String,
}

impl From<&Tile> for TileView {
    fn from(tile: &Tile) -> Self {
        Self {
            id: tile.id,
            url: tile.image_url.clone(),
        }
    }
}

/// The target image shown during the prompt phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
    /// Image URL; a byte-identical copy of exactly one tile's image.
    pub url: String,
}

/// Response of `GET /api/game/status`.
///
/// Either a cooldown countdown (`can_play: false`, round fields absent) or
/// a fresh round (`can_play: true`). The correct tile id is never present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether a round was issued by this call.
    pub can_play: bool,
    /// Whole seconds until eligibility; zero when playable.
    pub remaining_seconds: u64,
    /// Freshness token to echo on `play`. Present when playable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<RoundId>,
    /// The round's tile set. Present when playable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileView>>,
    /// The target image. Present when playable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetView>,
    /// Client-side reveal pacing in milliseconds. Present when playable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_ms: Option<u64>,
    /// Squares claimed toward the current garden.
    pub squares_claimed: u32,
    /// Wins required to complete one garden.
    pub squares_per_garden: u32,
    /// Gardens completed so far.
    pub gardens_completed: u32,
}

impl StatusResponse {
    /// Build the wire form of an engine status report.
    #[must_use]
    pub fn from_status(status: &GameStatus, squares_per_garden: u32) -> Self {
        match status {
            GameStatus::Cooldown {
                remaining_seconds,
                progress,
            } => Self {
                can_play: false,
                remaining_seconds: *remaining_seconds,
                round_id: None,
                tiles: None,
                target: None,
                reveal_ms: None,
                squares_claimed: progress.squares_claimed,
                squares_per_garden,
                gardens_completed: progress.gardens_completed,
            },
            GameStatus::Playable {
                round_id,
                tiles,
                target_url,
                reveal_ms,
                progress,
            } => Self {
                can_play: true,
                remaining_seconds: 0,
                round_id: Some(*round_id),
                tiles: Some(tiles.iter().map(TileView::from).collect()),
                target: Some(TargetView {
                    url: target_url.clone(),
                }),
                reveal_ms: Some(*reveal_ms),
                squares_claimed: progress.squares_claimed,
                squares_per_garden,
                gardens_completed: progress.gardens_completed,
            },
        }
    }

    /// Garden progression carried by this response.
    #[must_use]
    pub fn progress(&self) -> GardenProgress {
        GardenProgress {
            squares_claimed: self.squares_claimed,
            gardens_completed: self.gardens_completed,
        }
    }
}

/// Body of `POST /api/game/play`. Carries the round id as a freshness
/// token; a mismatch with the server's current round is rejected as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    /// The round this submission answers.
    pub round_id: RoundId,
    /// The selected tile.
    pub selected_tile_id: TileId,
}

/// Response of `POST /api/game/play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayResponse {
    /// `"win"` or `"loss"`.
    pub result: String,
    /// The correct tile, disclosed after resolution.
    pub correct_tile_id: TileId,
    /// Reward percentage, wins only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_percentage: Option<u8>,
    /// Coupon code, wins only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    /// Squares claimed after this play.
    pub squares_claimed: u32,
    /// Wins required to complete one garden.
    pub squares_per_garden: u32,
    /// Gardens completed after this play.
    pub gardens_completed: u32,
    /// Whether this win completed a garden.
    pub garden_just_completed: bool,
}

impl PlayResponse {
    /// Build the wire form of an engine play resolution.
    #[must_use]
    pub fn from_resolution(resolution: &PlayResolution, squares_per_garden: u32) -> Self {
        Self {
            result: resolution.outcome.as_str().to_string(),
            correct_tile_id: resolution.correct_tile_id,
            reward_percentage: resolution.reward.as_ref().map(|r| r.percentage),
            coupon_code: resolution.reward.as_ref().map(|r| r.code.clone()),
            squares_claimed: resolution.progress.squares_claimed,
            squares_per_garden,
            gardens_completed: resolution.progress.gardens_completed,
            garden_just_completed: resolution.garden_just_completed,
        }
    }

    /// Whether the play resolved as a win.
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.result == "win"
    }
}

/// Response of `GET /api/coupons/redeem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponResponse {
    /// The coupon code.
    pub coupon_code: String,
    /// Discount percentage.
    pub reward_pct: u8,
    /// Whether the coupon has been redeemed.
    pub redeemed: bool,
    /// When the coupon was minted, RFC 3339.
    pub created_at: String,
    /// When the coupon was redeemed, RFC 3339, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<String>,
}

impl From<&crate::types::Coupon> for CouponResponse {
    fn from(coupon: &crate::types::Coupon) -> Self {
        Self {
            coupon_code: coupon.code.clone(),
            reward_pct: coupon.percentage,
            redeemed: coupon.is_redeemed(),
            created_at: coupon.issued_at.to_rfc3339(),
            redeemed_at: coupon.redeemed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `STALE_ROUND`.
    pub code: String,
    /// Human-readable message.
    pub error: String,
}

/// Response of the dev action endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevActionResponse {
    /// Always true on success.
    pub ok: bool,
    /// Which action was applied, e.g. `cooldown_cleared`.
    pub action: String,
    /// For `set-cooldown`: seconds until expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}
