//! The pure round phase machine.
//!
//! Phases: `INIT → READY → LOADING → REVEAL → MEMORIZE → PROMPT → SELECT
//! → RESULT`, with a parallel `COOLDOWN` reachable from `INIT` whenever
//! status reports ineligibility. All timing is driven by explicit
//! `tick(now)` calls so any host (frame loop, timer, test) can pace it;
//! the machine itself never reads a clock and never decides win or loss.

use chrono::{DateTime, Duration, Utc};

use garden_core::api::{PlayRequest, PlayResponse, StatusResponse, TileView};
use garden_core::types::{GardenProgress, RoundId, TileId};

use crate::error::ClientError;

/// Pause between hiding the tiles and showing the target, in milliseconds.
const MEMORIZE_PAUSE_MS: i64 = 400;

/// The visible phases of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fetching player and status; nothing rendered yet.
    Init,
    /// Ineligible; counting down to the next round.
    Cooldown,
    /// Round data cached, waiting for the player to start.
    Ready,
    /// Preloading round assets.
    Loading,
    /// Tiles shown face-up for the server-specified reveal window.
    Reveal,
    /// Tiles hidden; brief pause before the prompt.
    Memorize,
    /// Target image shown.
    Prompt,
    /// Exactly one tile may be selected.
    Select,
    /// Selection submitted; terminal for the round.
    Result,
}

impl Phase {
    /// Stable lowercase name, convenient for logging and CSS hooks.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Cooldown => "cooldown",
            Self::Ready => "ready",
            Self::Loading => "loading",
            Self::Reveal => "reveal",
            Self::Memorize => "memorize",
            Self::Prompt => "prompt",
            Self::Select => "select",
            Self::Result => "result",
        }
    }
}

/// One observed phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// Phase before the transition.
    pub from: Phase,
    /// Phase after the transition.
    pub to: Phase,
}

/// The round data a session caches between status and submission.
#[derive(Debug, Clone)]
pub struct ActiveRound {
    /// Freshness token to echo on submission.
    pub round_id: RoundId,
    /// Tiles to display.
    pub tiles: Vec<TileView>,
    /// Target image URL for the prompt phase.
    pub target_url: String,
    /// Server-specified reveal window in milliseconds.
    pub reveal_ms: u64,
}

/// The pure phase machine. Holds no transport; see
/// [`crate::session::RoundSession`] for the driver that pairs it with an
/// API implementation.
pub struct RoundMachine {
    phase: Phase,
    round: Option<ActiveRound>,
    progress: GardenProgress,
    squares_per_garden: u32,
    cooldown_ends_at: Option<DateTime<Utc>>,
    phase_deadline: Option<DateTime<Utc>>,
    result: Option<PlayResponse>,
    observers: Vec<Box<dyn Fn(PhaseChange) + Send + Sync>>,
}

impl std::fmt::Debug for RoundMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundMachine")
            .field("phase", &self.phase)
            .field("has_round", &self.round.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RoundMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundMachine {
    /// A fresh machine in `Init`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Init,
            round: None,
            progress: GardenProgress {
                squares_claimed: 0,
                gardens_completed: 0,
            },
            squares_per_garden: 0,
            cooldown_ends_at: None,
            phase_deadline: None,
            result: None,
            observers: Vec::new(),
        }
    }

    /// Register a phase-change observer. Observers are called after every
    /// transition, in registration order.
    pub fn subscribe(&mut self, observer: impl Fn(PhaseChange) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn set_phase(&mut self, to: Phase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        let change = PhaseChange { from, to };
        for observer in &self.observers {
            observer(change);
        }
    }

    fn reset_round_state(&mut self) {
        self.round = None;
        self.cooldown_ends_at = None;
        self.phase_deadline = None;
        self.result = None;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The cached round, between status and resolution.
    #[must_use]
    pub fn round(&self) -> Option<&ActiveRound> {
        self.round.as_ref()
    }

    /// The server's resolution, once in `Result`.
    #[must_use]
    pub fn result(&self) -> Option<&PlayResponse> {
        self.result.as_ref()
    }

    /// Last known garden progression.
    #[must_use]
    pub fn progress(&self) -> GardenProgress {
        self.progress
    }

    /// Wins required per garden, as last reported by the server.
    #[must_use]
    pub fn squares_per_garden(&self) -> u32 {
        self.squares_per_garden
    }

    /// Whole seconds left in the cooldown, rounded up; `None` outside
    /// `Cooldown`.
    #[must_use]
    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> Option<u64> {
        let ends_at = self.cooldown_ends_at?;
        let remaining_ms = (ends_at - now).num_milliseconds().max(0) as u64;
        Some(remaining_ms.div_ceil(1_000))
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Feed a status response. Enters `Ready` with the round cached, or
    /// `Cooldown` with a local countdown.
    ///
    /// # Errors
    /// Rejects outside `Init`/`Cooldown`, or when a playable status is
    /// missing its round fields.
    pub fn on_status(
        &mut self,
        status: &StatusResponse,
        now: DateTime<Utc>,
    ) -> Result<Phase, ClientError> {
        if !matches!(self.phase, Phase::Init | Phase::Cooldown) {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                action: "apply status",
            });
        }

        self.reset_round_state();
        self.progress = status.progress();
        self.squares_per_garden = status.squares_per_garden;

        if status.can_play {
            let (Some(round_id), Some(tiles), Some(target), Some(reveal_ms)) = (
                status.round_id,
                status.tiles.clone(),
                status.target.clone(),
                status.reveal_ms,
            ) else {
                return Err(ClientError::Protocol(
                    "playable status is missing round fields".into(),
                ));
            };
            self.round = Some(ActiveRound {
                round_id,
                tiles,
                target_url: target.url,
                reveal_ms,
            });
            self.set_phase(Phase::Ready);
        } else {
            self.cooldown_ends_at =
                Some(now + Duration::seconds(status.remaining_seconds.min(i64::MAX as u64) as i64));
            self.set_phase(Phase::Cooldown);
        }
        Ok(self.phase)
    }

    /// Player-initiated start: `Ready → Loading`.
    ///
    /// # Errors
    /// Rejects outside `Ready`.
    pub fn begin(&mut self) -> Result<Phase, ClientError> {
        if self.phase != Phase::Ready {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                action: "begin",
            });
        }
        self.set_phase(Phase::Loading);
        Ok(self.phase)
    }

    /// Asset preloading finished: `Loading → Reveal`, arming the
    /// server-specified reveal window.
    ///
    /// # Errors
    /// Rejects outside `Loading`.
    pub fn assets_ready(&mut self, now: DateTime<Utc>) -> Result<Phase, ClientError> {
        if self.phase != Phase::Loading {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                action: "finish loading",
            });
        }
        let reveal_ms = self.round.as_ref().map_or(0, |r| r.reveal_ms);
        self.phase_deadline = Some(now + Duration::milliseconds(reveal_ms as i64));
        self.set_phase(Phase::Reveal);
        Ok(self.phase)
    }

    /// Advance timer-driven phases. Call at whatever cadence the host
    /// renders; at most one transition happens per call, so every phase is
    /// observable. Returns the new phase if one was entered.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Phase> {
        match self.phase {
            Phase::Cooldown => {
                if self.cooldown_ends_at.is_some_and(|t| now >= t) {
                    // Countdown over; the host should fetch status again.
                    self.reset_round_state();
                    self.set_phase(Phase::Init);
                    return Some(self.phase);
                }
                None
            }
            Phase::Reveal => {
                if self.phase_deadline.is_some_and(|t| now >= t) {
                    self.phase_deadline = Some(now + Duration::milliseconds(MEMORIZE_PAUSE_MS));
                    self.set_phase(Phase::Memorize);
                    return Some(self.phase);
                }
                None
            }
            Phase::Memorize => {
                if self.phase_deadline.is_some_and(|t| now >= t) {
                    self.phase_deadline = None;
                    self.set_phase(Phase::Prompt);
                    return Some(self.phase);
                }
                None
            }
            Phase::Prompt => {
                // The target is on screen; selection opens immediately.
                self.set_phase(Phase::Select);
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Lock in the player's selection: `Select → Result` (pending the
    /// server's answer). Returns the request to submit. Input stays
    /// blocked until [`Self::on_result`] or [`Self::reset`].
    ///
    /// # Errors
    /// Rejects outside `Select` (including after a prior submission, which
    /// already moved the machine to `Result`) or for a tile that is not
    /// part of the cached round.
    pub fn select(&mut self, tile_id: TileId) -> Result<PlayRequest, ClientError> {
        if self.phase != Phase::Select {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                action: "select a tile",
            });
        }
        let round = self.round.as_ref().ok_or(ClientError::Protocol(
            "select phase without a cached round".into(),
        ))?;
        if !round.tiles.iter().any(|t| t.id == tile_id) {
            return Err(ClientError::UnknownTile { tile_id });
        }

        let request = PlayRequest {
            round_id: round.round_id,
            selected_tile_id: tile_id,
        };
        self.set_phase(Phase::Result);
        Ok(request)
    }

    /// Feed the server's resolution while `Result` is pending.
    pub fn on_result(&mut self, response: PlayResponse) {
        self.progress = GardenProgress {
            squares_claimed: response.squares_claimed,
            gardens_completed: response.gardens_completed,
        };
        self.squares_per_garden = response.squares_per_garden;
        self.result = Some(response);
    }

    /// Abandon the current round and return to `Init`. The recovery path
    /// after a stale-round rejection or a failed submission: fetch status
    /// again and start over. If the server never consumed the round, the
    /// next status simply supersedes it.
    pub fn reset(&mut self) {
        self.reset_round_state();
        self.set_phase(Phase::Init);
    }

    /// Dismiss the result overlay: `Result → Init`.
    ///
    /// # Errors
    /// Rejects outside `Result`.
    pub fn dismiss(&mut self) -> Result<Phase, ClientError> {
        if self.phase != Phase::Result {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                action: "dismiss",
            });
        }
        self.reset_round_state();
        self.set_phase(Phase::Init);
        Ok(self.phase)
    }
}
