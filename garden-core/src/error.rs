//! Error types for the Memory Garden engine.

use thiserror::Error;

use crate::types::{PlayerId, RoundId, TileId};

/// Top-level error type for all engine operations.
#[derive(Error, Debug)]
pub enum GardenError {
    /// The submitted round id no longer matches the player's active round
    /// (no round, superseded by a newer `status` call, or already resolved).
    /// The only valid client recovery is to re-fetch status.
    #[error("round {round_id} is not the active round for this player")]
    StaleRound {
        /// The round id the client submitted.
        round_id: RoundId,
    },

    /// The selected tile id is not part of the active round's tile set.
    /// A protocol error on the client's side, never silently coerced.
    #[error("tile {tile_id} is not part of the active round")]
    InvalidSelection {
        /// The tile id the client submitted.
        tile_id: TileId,
    },

    /// Redemption of an unknown or already-redeemed coupon code.
    #[error("coupon {code:?} is unknown or already redeemed")]
    CouponInvalid {
        /// The offending code.
        code: String,
    },

    /// No player record exists for the given id.
    #[error("player not found: {0}")]
    UnknownPlayer(PlayerId),

    /// A dev override was requested but the dev channel is disabled.
    #[error("dev override channel is not enabled in this deployment")]
    DevDisabled,

    /// SQLite persistence error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be decoded (timestamps, outcome markers).
    #[error("corrupt stored value: {0}")]
    CorruptRecord(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GardenError>;
