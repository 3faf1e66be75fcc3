//! The session driver: pairs the pure phase machine with an API
//! implementation and exposes the small surface views bind to.

use chrono::{DateTime, Utc};
use tracing::debug;

use garden_core::api::{CreateUserResponse, PlayRequest, PlayResponse, StatusResponse};
use garden_core::types::TileId;

use crate::error::ClientError;
use crate::machine::{Phase, PhaseChange, RoundMachine};

/// The server contract as the client consumes it. Implemented by the HTTP
/// transport and by in-process fakes in tests.
pub trait GardenApi {
    /// `POST /api/users/create`: create-or-fetch the identity.
    fn ensure_user(
        &self,
    ) -> impl std::future::Future<Output = Result<CreateUserResponse, ClientError>> + Send;

    /// `GET /api/game/status`: countdown or fresh round.
    fn fetch_status(
        &self,
    ) -> impl std::future::Future<Output = Result<StatusResponse, ClientError>> + Send;

    /// `POST /api/game/play`: the single submission for a round.
    fn submit_play(
        &self,
        request: &PlayRequest,
    ) -> impl std::future::Future<Output = Result<PlayResponse, ClientError>> + Send;
}

/// One player's round session: `init`, `begin`, `tick`, `submit`,
/// `subscribe`. All game authority stays on the server; this type only
/// sequences phases and carries the server's answers to the view.
#[derive(Debug)]
pub struct RoundSession<A: GardenApi> {
    api: A,
    machine: RoundMachine,
}

impl<A: GardenApi> RoundSession<A> {
    /// Build a session over an API implementation.
    pub fn new(api: A) -> Self {
        Self {
            api,
            machine: RoundMachine::new(),
        }
    }

    /// Register a phase-change observer.
    pub fn subscribe(&mut self, observer: impl Fn(PhaseChange) + Send + Sync + 'static) {
        self.machine.subscribe(observer);
    }

    /// Read-only access to the underlying machine (phase, round, result,
    /// progression).
    pub fn machine(&self) -> &RoundMachine {
        &self.machine
    }

    /// Ensure the player exists, fetch status, and enter `Ready` or
    /// `Cooldown`.
    ///
    /// # Errors
    /// Transport, protocol, or transition errors; the machine is left
    /// unchanged on failure.
    pub async fn init(&mut self, now: DateTime<Utc>) -> Result<Phase, ClientError> {
        let user = self.api.ensure_user().await?;
        debug!(user = %user.user_id, created = user.created, "session identity ensured");
        let status = self.api.fetch_status().await?;
        self.machine.on_status(&status, now)
    }

    /// Player-initiated start of the cached round.
    ///
    /// # Errors
    /// Rejects outside `Ready`.
    pub fn begin(&mut self) -> Result<Phase, ClientError> {
        self.machine.begin()
    }

    /// Signal that asset preloading finished.
    ///
    /// # Errors
    /// Rejects outside `Loading`.
    pub fn assets_ready(&mut self, now: DateTime<Utc>) -> Result<Phase, ClientError> {
        self.machine.assets_ready(now)
    }

    /// Advance timer-driven phases; call at render cadence.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Phase> {
        self.machine.tick(now)
    }

    /// Submit the player's selection and resolve the round against the
    /// server. On any post-submission failure (stale round, transport)
    /// the machine resets to `Init` and the caller should [`Self::init`]
    /// again; `ClientError::is_stale_round` distinguishes the two.
    ///
    /// # Errors
    /// Phase/selection errors before any request is sent (machine
    /// unchanged); transport or server errors after (machine reset).
    pub async fn submit(&mut self, tile_id: TileId) -> Result<PlayResponse, ClientError> {
        let request = self.machine.select(tile_id)?;
        match self.api.submit_play(&request).await {
            Ok(response) => {
                self.machine.on_result(response.clone());
                Ok(response)
            }
            Err(err) => {
                // Whether the round went stale or the request itself
                // failed, the session can only recover through a fresh
                // status fetch.
                debug!(round = %request.round_id, error = %err, "submission failed; resetting session");
                self.machine.reset();
                Err(err)
            }
        }
    }

    /// Dismiss the result overlay and return to `Init`.
    ///
    /// # Errors
    /// Rejects outside `Result`.
    pub fn dismiss(&mut self) -> Result<Phase, ClientError> {
        self.machine.dismiss()
    }
}
