//! Client-side error types.

use thiserror::Error;

use crate::machine::Phase;

/// Errors surfaced by the client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport failed.
    #[error("request failed: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an error body.
    #[error("server error {status} ({code}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Stable machine-readable code, e.g. `STALE_ROUND`.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// The server's response did not match the wire contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The requested action is not legal in the current phase.
    #[error("cannot {action} while in phase {from:?}")]
    InvalidTransition {
        /// The phase the machine was in.
        from: Phase,
        /// The attempted action.
        action: &'static str,
    },

    /// The selected tile is not part of the cached round.
    #[error("tile {tile_id} is not part of the current round")]
    UnknownTile {
        /// The offending tile id.
        tile_id: garden_core::types::TileId,
    },
}

impl ClientError {
    /// Whether this error means the round went stale server-side and the
    /// session has been reset for a status re-fetch.
    #[must_use]
    pub fn is_stale_round(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == "STALE_ROUND")
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
