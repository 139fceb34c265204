//! API client for the habitrack REST backend.
//!
//! Every resource request goes through [`ApiClient::execute`], which attaches
//! the bearer token and handles expiry: on a 401 the request is replayed once
//! after the session's single shared refresh settles.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::session::{bearer_headers, PROFILE_PATH};
use crate::auth::{RefreshTicket, Session};
use crate::models::{ProfileUpdate, UserProfile, UserSettings};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const PROFILE_UPDATE_PATH: &str = "/users/profile/update/";
const SETTINGS_PATH: &str = "/users/settings/";

/// API client bound to a session.
/// Clone is cheap - the session and its connection pool are shared.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send a request through the token-recovery layer.
    ///
    /// A 401 triggers (or joins) a refresh and the request is replayed once
    /// with the new token. A 401 on the replay is returned as
    /// [`ApiError::Unauthorized`].
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let url = self.session.url(path);
        let sent_with = self.session.access_token();

        let response = self
            .send_with_backoff(&method, &url, body, sent_with.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        debug!(url = %url, "401 received, recovering access token");
        let token = self.recover_token(sent_with.as_deref()).await?;

        let response = self
            .send_with_backoff(&method, &url, body, Some(&token))
            .await?;
        Self::check_response(response).await
    }

    /// Obtain a token to replay a request that was rejected with 401.
    async fn recover_token(&self, sent_with: Option<&str>) -> Result<String, ApiError> {
        let ticket = self
            .session
            .refresh_gate()
            .begin(sent_with, || self.session.access_token());

        match ticket {
            RefreshTicket::Current(token) => Ok(token),
            RefreshTicket::Wait(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(reason)) => Err(ApiError::RefreshFailed(reason)),
                Err(_) => Err(ApiError::RefreshFailed(
                    "token refresh was abandoned".to_string(),
                )),
            },
            RefreshTicket::Lead(guard) => {
                if !self.session.refresh().await {
                    guard.reject("Failed to refresh token");
                    return Err(ApiError::Unauthorized);
                }
                match self.session.access_token() {
                    Some(token) => {
                        guard.resolve(token.clone());
                        Ok(token)
                    }
                    None => {
                        guard.reject("Session ended during token refresh");
                        Err(ApiError::Unauthorized)
                    }
                }
            }
        }
    }

    async fn send_with_backoff(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .session
                .http()
                .request(method.clone(), url)
                .headers(bearer_headers(token));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e)))
    }

    fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(ApiError::Encode)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, None).await?;
        Self::decode(path, response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = Self::encode(body)?;
        let response = self.execute(Method::POST, path, Some(&body)).await?;
        Self::decode(path, response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = Self::encode(body)?;
        let response = self.execute(Method::PUT, path, Some(&body)).await?;
        Self::decode(path, response).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = Self::encode(body)?;
        let response = self.execute(Method::PATCH, path, Some(&body)).await?;
        Self::decode(path, response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None).await?;
        Ok(())
    }

    // ===== Account =====

    /// Reload the signed-in user's profile into the session.
    pub async fn fetch_user(&self) -> Result<UserProfile, ApiError> {
        self.record(self.get::<UserProfile>(PROFILE_PATH).await, "Failed to fetch user data")
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.session.clear_error();
        self.record(
            self.put::<UserProfile, _>(PROFILE_UPDATE_PATH, update).await,
            "Failed to update profile",
        )
    }

    pub async fn update_settings(&self, settings: &UserSettings) -> Result<UserProfile, ApiError> {
        self.session.clear_error();
        self.record(
            self.put::<UserProfile, _>(SETTINGS_PATH, settings).await,
            "Failed to update settings",
        )
    }

    fn record(
        &self,
        result: Result<UserProfile, ApiError>,
        fallback: &str,
    ) -> Result<UserProfile, ApiError> {
        match result {
            Ok(profile) => {
                self.session.set_user(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.session.set_error(e.display_message(fallback));
                Err(e)
            }
        }
    }
}
