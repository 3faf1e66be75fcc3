//! Public HTTP routes and the engine-error-to-HTTP mapping.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;

use garden_core::api::{
    CouponResponse, CreateUserResponse, ErrorResponse, PlayRequest, PlayResponse, StatusResponse,
};
use garden_core::types::PlayerId;
use garden_core::{GardenEngine, GardenError};

use crate::{cookie, dev};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative engine.
    pub engine: Arc<GardenEngine>,
}

/// Build the full router. Dev routes are mounted only when the deployment
/// enables the dev channel.
pub fn router(engine: Arc<GardenEngine>) -> Router {
    let dev_enabled = engine.config().dev.enabled;
    let state = AppState { engine };

    let mut router = Router::new()
        .route("/api/users/create", post(create_user))
        .route("/api/game/status", get(game_status))
        .route("/api/game/play", post(game_play))
        .route("/api/coupons/redeem", get(redeem_coupon))
        .route("/healthz", get(healthz));
    if dev_enabled {
        router = router.merge(dev::router());
    }
    router.with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Handler-level error: either a missing identity cookie or an engine
/// error, each mapped to a stable status and machine-readable code.
pub enum ApiError {
    /// No (valid) identity cookie on the request.
    NoCookie,
    /// The player has no coupon to look up.
    NoCoupon,
    /// An engine operation failed.
    Engine(GardenError),
}

impl From<GardenError> for ApiError {
    fn from(err: GardenError) -> Self {
        Self::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NoCookie => (
                StatusCode::UNAUTHORIZED,
                "NO_USER",
                "No user cookie. Call /api/users/create first.".to_string(),
            ),
            Self::NoCoupon => (
                StatusCode::NOT_FOUND,
                "NO_COUPON",
                "No coupon found.".to_string(),
            ),
            Self::Engine(err) => match err {
                GardenError::StaleRound { .. } => {
                    (StatusCode::CONFLICT, "STALE_ROUND", err.to_string())
                }
                GardenError::InvalidSelection { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_SELECTION", err.to_string())
                }
                GardenError::CouponInvalid { .. } => {
                    (StatusCode::NOT_FOUND, "COUPON_INVALID", err.to_string())
                }
                GardenError::UnknownPlayer(_) => {
                    (StatusCode::NOT_FOUND, "UNKNOWN_PLAYER", err.to_string())
                }
                GardenError::DevDisabled => {
                    (StatusCode::FORBIDDEN, "DEV_DISABLED", err.to_string())
                }
                other => {
                    error!(error = %other, "internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL",
                        "Internal error.".to_string(),
                    )
                }
            },
        };
        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                error: message,
            }),
        )
            .into_response()
    }
}

/// Extract the identity cookie or fail with 401.
pub fn require_player(state: &AppState, headers: &HeaderMap) -> Result<PlayerId, ApiError> {
    cookie::player_id(headers, &state.engine.config().server.cookie_name)
        .ok_or(ApiError::NoCookie)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /api/users/create`: create-or-fetch the cookie-bound player.
async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    let server = state.engine.config().server.clone();

    // An existing, known identity is returned unchanged.
    if let Some(id) = cookie::player_id(&headers, &server.cookie_name) {
        if let Some(player) = state.engine.find_player(&id)? {
            return Ok(Json(CreateUserResponse {
                user_id: player.id,
                created: false,
                squares_claimed: player.squares_claimed,
                gardens_completed: player.gardens_completed,
            })
            .into_response());
        }
    }

    let player = state.engine.create_player(now)?;
    let body = Json(CreateUserResponse {
        user_id: player.id,
        created: true,
        squares_claimed: 0,
        gardens_completed: 0,
    });
    let mut response = body.into_response();
    if let Some(value) = cookie::issue(&server.cookie_name, player.id, server.cookie_max_age_days) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    Ok(response)
}

/// `GET /api/game/status`: cooldown countdown or a fresh round.
async fn game_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    let status = state.engine.status(&player_id, Utc::now())?;
    Ok(Json(StatusResponse::from_status(
        &status,
        state.engine.config().game.squares_per_garden,
    )))
}

/// `POST /api/game/play`: resolve the single submission for a round.
async fn game_play(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    let resolution = state.engine.submit_play(
        &player_id,
        request.round_id,
        request.selected_tile_id,
        Utc::now(),
    )?;
    Ok(Json(PlayResponse::from_resolution(
        &resolution,
        state.engine.config().game.squares_per_garden,
    )))
}

#[derive(Debug, Deserialize)]
struct RedeemQuery {
    code: Option<String>,
}

/// `GET /api/coupons/redeem`: redeem a code, or look up the caller's
/// latest coupon when no code is given.
async fn redeem_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RedeemQuery>,
) -> Result<Json<CouponResponse>, ApiError> {
    let player_id = require_player(&state, &headers)?;
    let coupon = match query.code {
        Some(code) => state.engine.redeem_coupon(&code, Utc::now())?,
        None => state
            .engine
            .latest_coupon(&player_id)?
            .ok_or(ApiError::NoCoupon)?,
    };
    Ok(Json(CouponResponse::from(&coupon)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use garden_core::store::GardenStore;
    use garden_core::GardenConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router(dev: bool) -> Router {
        let mut config = GardenConfig::default();
        config.game.tile_count = 4;
        config.game.squares_per_garden = 3;
        config.dev.enabled = dev;
        let engine = GardenEngine::new(config, GardenStore::open_in_memory().expect("opens"))
            .expect("valid config");
        router(Arc::new(engine))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("reads body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn cookie_pair(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("set-cookie present")
            .to_str()
            .expect("ascii");
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    #[tokio::test]
    async fn create_status_play_happy_path() {
        let app = test_router(false);

        // Create the player; the identity comes back as a cookie.
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/users/create")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_pair(&response);
        let created = body_json(response).await;
        assert_eq!(created["created"], true);
        assert_eq!(created["squares_claimed"], 0);

        // Status issues a round with tiles and a target.
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/game/status")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["can_play"], true);
        let round_id = status["round_id"].as_str().expect("round id").to_string();
        let target_url = status["target"]["url"].as_str().expect("target url");
        let winning_tile = status["tiles"]
            .as_array()
            .expect("tiles")
            .iter()
            .find(|t| t["url"] == target_url)
            .expect("target matches a tile")["id"]
            .clone();

        // Play the matching tile and win.
        let body = serde_json::json!({
            "round_id": round_id,
            "selected_tile_id": winning_tile,
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/game/play")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        let play = body_json(response).await;
        assert_eq!(play["result"], "win");
        assert_eq!(play["squares_claimed"], 1);
        let code = play["coupon_code"].as_str().expect("coupon code").to_string();

        // The cooldown is now active.
        let response = app
            .clone()
            .oneshot(
                Request::get("/api/game/status")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        let status = body_json(response).await;
        assert_eq!(status["can_play"], false);
        assert!(status["remaining_seconds"].as_u64().expect("seconds") > 0);

        // The coupon redeems once, then turns invalid.
        let uri = format!("/api/coupons/redeem?code={code}");
        let response = app
            .clone()
            .oneshot(
                Request::get(uri.as_str())
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        let redeemed = body_json(response).await;
        assert_eq!(redeemed["redeemed"], true);

        let response = app
            .oneshot(
                Request::get(uri.as_str())
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let err = body_json(response).await;
        assert_eq!(err["code"], "COUPON_INVALID");
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthorized() {
        let app = test_router(false);
        let response = app
            .oneshot(
                Request::get("/api/game/status")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let err = body_json(response).await;
        assert_eq!(err["code"], "NO_USER");
    }

    #[tokio::test]
    async fn stale_round_maps_to_conflict() {
        let app = test_router(false);
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/users/create")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        let cookie = cookie_pair(&response);

        // A round id the server never issued.
        let body = serde_json::json!({
            "round_id": garden_core::types::RoundId::new(),
            "selected_tile_id": 1,
        });
        let response = app
            .oneshot(
                Request::post("/api/game/play")
                    .header(header::COOKIE, &cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let err = body_json(response).await;
        assert_eq!(err["code"], "STALE_ROUND");
    }

    #[tokio::test]
    async fn dev_routes_absent_unless_enabled() {
        let app = test_router(false);
        let response = app
            .oneshot(
                Request::post("/api/dev/reset-cooldown")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let app = test_router(true);
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/users/create")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        let cookie = cookie_pair(&response);
        let response = app
            .oneshot(
                Request::post("/api/dev/reset-cooldown")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_is_idempotent_for_known_cookie() {
        let app = test_router(false);
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/users/create")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        let cookie = cookie_pair(&response);
        let first = body_json(response).await;

        let response = app
            .oneshot(
                Request::post("/api/users/create")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("responds");
        assert!(response.headers().get(SET_COOKIE).is_none());
        let second = body_json(response).await;
        assert_eq!(second["created"], false);
        assert_eq!(second["user_id"], first["user_id"]);
    }
}
