//! HTTP transport implementing [`GardenApi`] over reqwest.
//!
//! The identity cookie is captured from the create response and replayed
//! on every later call, so one `GardenHttp` value is one player identity.

use parking_lot::Mutex;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use garden_core::api::{
    CreateUserResponse, ErrorResponse, PlayRequest, PlayResponse, StatusResponse,
};

use crate::error::ClientError;
use crate::session::GardenApi;

/// Reqwest-backed implementation of the server contract.
#[derive(Debug)]
pub struct GardenHttp {
    base_url: String,
    http: Client,
    cookie: Mutex<Option<String>>,
}

impl GardenHttp {
    /// Build a transport against a server base URL, e.g.
    /// `http://127.0.0.1:15002`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
            cookie: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn stored_cookie(&self) -> Option<String> {
        self.cookie.lock().clone()
    }

    fn capture_cookie(&self, response: &Response) {
        if let Some(value) = response.headers().get(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if let Some(pair) = raw.split(';').next() {
                    debug!("identity cookie captured");
                    *self.cookie.lock() = Some(pair.trim().to_string());
                }
            }
        }
    }
}

/// Decode a success body, or map an error body onto [`ClientError::Api`].
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => (err.code, err.error),
        Err(_) => ("UNKNOWN".to_string(), body),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

impl GardenApi for GardenHttp {
    async fn ensure_user(&self) -> Result<CreateUserResponse, ClientError> {
        let mut request = self.http.post(self.url("/api/users/create"));
        if let Some(cookie) = self.stored_cookie() {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        self.capture_cookie(&response);
        handle_response(response).await
    }

    async fn fetch_status(&self) -> Result<StatusResponse, ClientError> {
        let mut request = self.http.get(self.url("/api/game/status"));
        if let Some(cookie) = self.stored_cookie() {
            request = request.header(COOKIE, cookie);
        }
        handle_response(request.send().await?).await
    }

    async fn submit_play(&self, play: &PlayRequest) -> Result<PlayResponse, ClientError> {
        let mut request = self.http.post(self.url("/api/game/play")).json(play);
        if let Some(cookie) = self.stored_cookie() {
            request = request.header(COOKIE, cookie);
        }
        handle_response(request.send().await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let transport = GardenHttp::new("http://localhost:15002/");
        assert_eq!(
            transport.url("/api/game/status"),
            "http://localhost:15002/api/game/status"
        );
    }
}
