use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::error::extract_message;
use crate::models::{LoginCredentials, Registration, UserProfile};

use super::credentials::{Credential, TokenStore};
use super::refresh::RefreshCoordinator;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) const TOKEN_PATH: &str = "/token/";
pub(crate) const TOKEN_REFRESH_PATH: &str = "/token/refresh/";
pub(crate) const PROFILE_PATH: &str = "/users/profile/";
pub(crate) const REGISTER_PATH: &str = "/users/register/";

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    /// Authenticated, with an access-token refresh in flight
    Refreshing,
}

/// The authenticated session: credential pair, profile, last error and the
/// refresh coordination shared by every request made on its behalf.
///
/// One instance is created by the application and shared (`Arc<Session>`)
/// with the API client.
pub struct Session {
    http: Client,
    base_url: String,
    store: Box<dyn TokenStore>,
    credential: RwLock<Credential>,
    user: RwLock<Option<UserProfile>>,
    error: RwLock<Option<String>>,
    refresh_gate: RefreshCoordinator,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// `Authorization: Bearer <token>`, or no header at all without a token.
pub(crate) fn bearer_headers(token: Option<&str>) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    if let Some(token) = token {
        match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => warn!("access token contains characters not valid in a header"),
        }
    }
    headers
}

impl Session {
    /// Create a session talking to `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: impl Into<String>, store: Box<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(http, base_url, store))
    }

    /// Create a session sharing an existing connection pool.
    pub fn with_client(http: Client, base_url: impl Into<String>, store: Box<dyn TokenStore>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            credential: RwLock::new(Credential::default()),
            user: RwLock::new(None),
            error: RwLock::new(None),
            refresh_gate: RefreshCoordinator::new(),
        }
    }

    /// Load the persisted credential. Returns whether an access token was found.
    pub fn restore(&self) -> Result<bool> {
        let credential = self.store.load()?;
        let found = credential.access_token.is_some();
        debug!(found, "restored credential from storage");
        *write(&self.credential) = credential;
        Ok(found)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn refresh_gate(&self) -> &RefreshCoordinator {
        &self.refresh_gate
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== Credential =====

    pub fn access_token(&self) -> Option<String> {
        read(&self.credential).access_token.clone()
    }

    pub fn credential(&self) -> Credential {
        read(&self.credential).clone()
    }

    /// Authorization header for the current access token; empty when no
    /// token is held.
    pub fn auth_header(&self) -> header::HeaderMap {
        bearer_headers(read(&self.credential).access_token.as_deref())
    }

    pub fn is_authenticated(&self) -> bool {
        read(&self.credential).access_token.is_some()
    }

    pub fn state(&self) -> SessionState {
        if !self.is_authenticated() {
            SessionState::Anonymous
        } else if self.refresh_gate.in_progress() {
            SessionState::Refreshing
        } else {
            SessionState::Authenticated
        }
    }

    fn set_tokens(&self, access: String, refresh: String) {
        let credential = Credential::new(access, refresh);
        if let Err(e) = self.store.save(&credential) {
            warn!(error = %e, "Failed to persist tokens");
        }
        *write(&self.credential) = credential;
    }

    // ===== Profile and error state =====

    pub fn user(&self) -> Option<UserProfile> {
        read(&self.user).clone()
    }

    pub(crate) fn set_user(&self, user: UserProfile) {
        *write(&self.user) = Some(user);
    }

    pub fn last_error(&self) -> Option<String> {
        read(&self.error).clone()
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        *write(&self.error) = Some(message.into());
    }

    pub fn clear_error(&self) {
        *write(&self.error) = None;
    }

    // ===== Operations =====

    /// Exchange username and password for a token pair, then load the
    /// profile. Failures are recorded in `last_error`; never errors.
    pub async fn login(&self, credentials: &LoginCredentials) -> bool {
        self.clear_error();

        let response = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(credentials)
            .send()
            .await;

        let pair = match response {
            Ok(r) if r.status().is_success() => match r.json::<TokenPair>().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Failed to parse token response");
                    self.set_error("Login failed");
                    return false;
                }
            },
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                debug!(%status, "login rejected");
                self.set_error(extract_message(&body).unwrap_or_else(|| "Login failed".to_string()));
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to send login request");
                self.set_error("Login failed");
                return false;
            }
        };

        self.set_tokens(pair.access.clone(), pair.refresh);
        info!(username = %credentials.username, "logged in");

        if let Err(message) = self.fetch_profile_with(&pair.access).await {
            warn!(error = %message, "Failed to fetch profile after login");
            self.set_error(message);
        }
        true
    }

    /// Create an account and log into it.
    ///
    /// A registration that succeeds but whose follow-up login fails returns
    /// false with a message saying the account exists.
    pub async fn register(&self, registration: &Registration) -> bool {
        self.clear_error();

        let response = self
            .http
            .post(self.url(REGISTER_PATH))
            .json(registration)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => {
                let body = r.text().await.unwrap_or_default();
                self.set_error(
                    extract_message(&body).unwrap_or_else(|| "Registration failed".to_string()),
                );
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to send registration request");
                self.set_error("Registration failed");
                return false;
            }
        }

        info!(username = %registration.username, "registered");
        if self.login(&registration.credentials()).await {
            return true;
        }
        let reason = self.last_error().unwrap_or_else(|| "Login failed".to_string());
        self.set_error(format!("Account created, but login failed: {}", reason));
        false
    }

    /// Exchange the refresh token for a new access token. Any failure ends
    /// the session.
    pub async fn refresh(&self) -> bool {
        let held = read(&self.credential).refresh_token.clone();
        let refresh_token = match held {
            Some(token) => token,
            None => {
                debug!("no refresh token held, ending session");
                self.logout();
                return false;
            }
        };

        let response = self
            .http
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await;

        let refreshed = match response {
            Ok(r) if r.status().is_success() => r.json::<RefreshResponse>().await.ok(),
            Ok(r) => {
                debug!(status = %r.status(), "refresh rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to send refresh request");
                None
            }
        };

        // Apply the outcome only to the session the refresh started from. A
        // logout or a new login while the request was in flight wins.
        let mut credential = write(&self.credential);
        if credential.refresh_token.as_deref() != Some(refresh_token.as_str()) {
            debug!("credential changed during refresh, discarding result");
            return false;
        }

        match refreshed {
            Some(refreshed) => {
                credential.access_token = Some(refreshed.access);
                if let Some(rotated) = refreshed.refresh {
                    credential.refresh_token = Some(rotated);
                }
                if let Err(e) = self.store.save(&credential) {
                    warn!(error = %e, "Failed to persist refreshed token");
                }
                info!("access token refreshed");
                true
            }
            None => {
                drop(credential);
                warn!("token refresh failed, logging out");
                self.logout();
                false
            }
        }
    }

    /// Drop both tokens and the profile, in memory and in storage.
    pub fn logout(&self) {
        *write(&self.credential) = Credential::default();
        *write(&self.user) = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        debug!("session cleared");
    }

    async fn fetch_profile_with(&self, token: &str) -> std::result::Result<(), String> {
        let response = self
            .http
            .get(self.url(PROFILE_PATH))
            .headers(bearer_headers(Some(token)))
            .send()
            .await
            .map_err(|e| format!("Failed to fetch user data: {}", e))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(extract_message(&body).unwrap_or_else(|| "Failed to fetch user data".to_string()));
        }

        let profile = response
            .json::<UserProfile>()
            .await
            .map_err(|e| format!("Failed to parse user data: {}", e))?;
        self.set_user(profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MemoryTokenStore;
    use std::sync::Arc;

    fn session_with(credential: Credential) -> (Session, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::with_credential(credential));
        let session = Session::new("http://127.0.0.1:9/api/", Box::new(store.clone())).unwrap();
        (session, store)
    }

    #[test]
    fn test_starts_anonymous() {
        let (session, _) = session_with(Credential::default());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.auth_header().is_empty());
    }

    #[test]
    fn test_restore_and_auth_header() {
        let (session, _) = session_with(Credential::new("abc", "def"));
        assert!(session.restore().unwrap());
        assert_eq!(session.state(), SessionState::Authenticated);

        let headers = session.auth_header();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_logout_clears_everything() {
        let (session, store) = session_with(Credential::new("abc", "def"));
        session.restore().unwrap();

        session.logout();
        assert!(session.auth_header().get(header::AUTHORIZATION).is_none());
        assert!(session.credential().is_empty());
        assert!(store.load().unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Anonymous);

        // Idempotent
        session.logout();
        assert!(session.credential().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_logs_out() {
        let (session, store) = session_with(Credential {
            access_token: Some("abc".to_string()),
            refresh_token: None,
        });
        session.restore().unwrap();

        assert!(!session.refresh().await);
        assert!(session.credential().is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_url_joins_base() {
        let (session, _) = session_with(Credential::default());
        assert_eq!(session.base_url(), "http://127.0.0.1:9/api");
        assert_eq!(session.url(TOKEN_PATH), "http://127.0.0.1:9/api/token/");
    }

    #[test]
    fn test_bearer_headers() {
        let headers = bearer_headers(Some("abc"));
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert!(bearer_headers(None).is_empty());
        assert!(bearer_headers(Some("bad\ntoken")).is_empty());
    }
}
