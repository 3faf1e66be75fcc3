//! Dev channel routes: cooldown bypass, state reset, forced outcomes.
//!
//! Mounted only when the deployment enables the dev capability flag; the
//! engine double-checks the flag on every call, so these can never mutate
//! state in a production deployment even if mounted by mistake.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use garden_core::api::DevActionResponse;
use garden_core::types::{ForcedOutcome, Player};

use crate::routes::{require_player, ApiError, AppState};

/// The `/api/dev` route group.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dev/reset-cooldown", post(reset_cooldown))
        .route("/api/dev/set-cooldown", post(set_cooldown))
        .route("/api/dev/reset-garden", post(reset_garden))
        .route("/api/dev/force-win", post(force_win))
        .route("/api/dev/force-loss", post(force_loss))
        .route("/api/dev/user-state", get(user_state))
}

fn action(name: &str) -> Json<DevActionResponse> {
    Json(DevActionResponse {
        ok: true,
        action: name.to_string(),
        expires_in_seconds: None,
    })
}

async fn reset_cooldown(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DevActionResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    state.engine.dev_reset_cooldown(&player_id)?;
    Ok(action("cooldown_cleared"))
}

#[derive(Debug, Deserialize)]
struct SetCooldownQuery {
    #[serde(default = "default_seconds")]
    seconds: u64,
}

fn default_seconds() -> u64 {
    10
}

async fn set_cooldown(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SetCooldownQuery>,
) -> Result<Json<DevActionResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    state
        .engine
        .dev_set_cooldown(&player_id, query.seconds, Utc::now())?;
    Ok(Json(DevActionResponse {
        ok: true,
        action: "cooldown_set".to_string(),
        expires_in_seconds: Some(query.seconds),
    }))
}

async fn reset_garden(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DevActionResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    state.engine.dev_reset_garden(&player_id)?;
    Ok(action("garden_reset"))
}

async fn force_win(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DevActionResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    state
        .engine
        .dev_force_outcome(&player_id, ForcedOutcome::Win)?;
    Ok(action("next_play_will_win"))
}

async fn force_loss(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DevActionResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    state
        .engine
        .dev_force_outcome(&player_id, ForcedOutcome::Loss)?;
    Ok(action("next_play_will_lose"))
}

async fn user_state(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Player>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    Ok(Json(state.engine.dev_player_state(&player_id)?))
}
