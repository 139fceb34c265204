//! Session and token-refresh behaviour against a mock backend.
//!
//! The backend issues `access-1` on login and `access-2` on refresh. Tests
//! expire the current access token to force the 401 path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use habitrack_core::api::{ApiClient, ApiError};
use habitrack_core::auth::{MemoryTokenStore, Session, SessionState, TokenStore};
use habitrack_core::models::{GoalType, LoginCredentials, ProfileUpdate, Registration, UserSettings};
use habitrack_core::stores::GoalsStore;

#[derive(Default)]
struct BackendState {
    /// Access token the backend currently accepts
    current_access: Mutex<String>,
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    /// Answer 401 to every goals request regardless of token
    reject_goals: AtomicBool,
    /// Answer 500 to profile requests
    fail_profile: AtomicBool,
    /// Tokens presented to the goals endpoint, in arrival order
    goal_tokens: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
struct Backend(Arc<BackendState>);

impl Backend {
    fn expire_access_token(&self) {
        *self.0.current_access.lock().unwrap() = String::new();
    }

    fn refresh_calls(&self) -> usize {
        self.0.refresh_calls.load(Ordering::SeqCst)
    }

    fn goal_tokens(&self) -> Vec<String> {
        self.0.goal_tokens.lock().unwrap().clone()
    }

    fn accepts(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?
            .to_string();
        let current = self.0.current_access.lock().unwrap();
        (!current.is_empty() && *current == token).then_some(token)
    }
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
    )
        .into_response()
}

async fn obtain_token(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    if body["username"] == "alice" && body["password"] == "secret" {
        *backend.0.current_access.lock().unwrap() = "access-1".to_string();
        Json(json!({"access": "access-1", "refresh": "refresh-1"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response()
    }
}

async fn refresh_token(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.0.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Keep the refresh in flight long enough for other requests to queue
    tokio::time::sleep(Duration::from_millis(100)).await;

    if backend.0.fail_refresh.load(Ordering::SeqCst) || body["refresh"] != "refresh-1" {
        return not_authenticated();
    }
    *backend.0.current_access.lock().unwrap() = "access-2".to_string();
    Json(json!({"access": "access-2"})).into_response()
}

fn alice_profile() -> Value {
    json!({
        "id": "8b1f7c2e-0000-4000-8000-000000000001",
        "username": "alice",
        "email": "alice@example.com",
        "first_name": "Alice",
        "last_name": "",
        "timezone": "UTC",
        "preferred_reminder_time": null,
        "notification_preferences": {}
    })
}

async fn profile(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if backend.accepts(&headers).is_none() {
        return not_authenticated();
    }
    if backend.0.fail_profile.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Profile unavailable"})),
        )
            .into_response();
    }
    Json(alice_profile()).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    match body["username"].as_str() {
        Some("taken") => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "username": ["A user with that username already exists."],
                "password": ["This password is too common."]
            })),
        )
            .into_response(),
        Some(username) => (
            StatusCode::CREATED,
            Json(json!({"username": username, "email": body["email"]})),
        )
            .into_response(),
        None => (StatusCode::BAD_REQUEST, Json(json!({"username": ["This field is required."]})))
            .into_response(),
    }
}

async fn update_profile(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if backend.accepts(&headers).is_none() {
        return not_authenticated();
    }
    if body["first_name"] == "" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"first_name": ["This field may not be blank."]})),
        )
            .into_response();
    }
    let mut profile = alice_profile();
    for field in ["email", "first_name", "last_name"] {
        if let Some(value) = body.get(field) {
            profile[field] = value.clone();
        }
    }
    Json(profile).into_response()
}

async fn update_settings(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if backend.accepts(&headers).is_none() {
        return not_authenticated();
    }
    let mut profile = alice_profile();
    for field in ["timezone", "preferred_reminder_time", "notification_preferences"] {
        if let Some(value) = body.get(field) {
            profile[field] = value.clone();
        }
    }
    Json(profile).into_response()
}

async fn goals_by_type(
    State(backend): State<Backend>,
    Path(goal_type): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        backend.0.goal_tokens.lock().unwrap().push(token.to_string());
    }
    if backend.0.reject_goals.load(Ordering::SeqCst) || backend.accepts(&headers).is_none() {
        return not_authenticated();
    }
    Json(json!([{
        "id": format!("goal-{}", goal_type),
        "parent": null,
        "goal_type": goal_type,
        "title": format!("{} goal", goal_type),
        "start_date": "2024-01-01",
        "target_date": "2024-12-31"
    }]))
    .into_response()
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/users/profile/", get(profile))
        .route("/api/users/register/", post(register))
        .route("/api/users/profile/update/", put(update_profile))
        .route("/api/users/settings/", put(update_settings))
        .route("/api/goals/type/{goal_type}/", get(goals_by_type))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), backend)
}

fn session_for(base_url: &str) -> (Arc<Session>, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    let session = Session::new(base_url, Box::new(store.clone())).unwrap();
    (Arc::new(session), store)
}

async fn logged_in() -> (Arc<Session>, Arc<MemoryTokenStore>, Backend) {
    let (base_url, backend) = spawn_backend().await;
    let (session, store) = session_for(&base_url);
    assert!(session.login(&LoginCredentials::new("alice", "secret")).await);
    (session, store, backend)
}

#[tokio::test]
async fn test_login_persists_tokens_and_loads_profile() {
    let (session, store, _backend) = logged_in().await;

    assert_eq!(session.state(), SessionState::Authenticated);
    let saved = store.load().unwrap();
    assert_eq!(saved.access_token.as_deref(), Some("access-1"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(session.user().unwrap().display_name(), "Alice");
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn test_invalid_login_stays_anonymous_with_message() {
    let (base_url, _backend) = spawn_backend().await;
    let (session, store) = session_for(&base_url);

    assert!(!session.login(&LoginCredentials::new("alice", "wrong")).await);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(
        session.last_error().as_deref(),
        Some("No active account found with the given credentials")
    );
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_fetches_share_one_refresh() {
    let (session, store, backend) = logged_in().await;
    let mut goals = GoalsStore::new(ApiClient::new(session.clone()));

    backend.expire_access_token();
    goals.fetch_all_goals().await.unwrap();

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(goals.big_goals().len(), 1);
    assert_eq!(goals.medium_term_goals()[0].goal_type, GoalType::MediumTerm);
    assert_eq!(goals.daily_processes().len(), 1);
    assert!(goals.error.is_none());

    // Three rejected attempts, then three replays with the refreshed token
    let tokens = backend.goal_tokens();
    assert_eq!(tokens.len(), 6);
    assert!(tokens[..3].iter().all(|t| t == "access-1"));
    assert!(tokens[3..].iter().all(|t| t == "access-2"));

    assert_eq!(session.access_token().as_deref(), Some("access-2"));
    assert_eq!(store.load().unwrap().access_token.as_deref(), Some("access-2"));
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_refresh_rejects_every_request_and_logs_out() {
    let (session, store, backend) = logged_in().await;
    let api = ApiClient::new(session.clone());

    backend.0.fail_refresh.store(true, Ordering::SeqCst);
    backend.expire_access_token();

    let (big, medium, daily) = tokio::join!(
        api.get::<Value>("/goals/type/BIG/"),
        api.get::<Value>("/goals/type/MTG/"),
        api.get::<Value>("/goals/type/DP/"),
    );
    // One caller led the refresh and gets the original 401; the other two
    // were queued behind it and get the refresh failure.
    let mut led = 0;
    let mut queued = 0;
    for result in [big, medium, daily] {
        match result {
            Err(ApiError::Unauthorized) => led += 1,
            Err(ApiError::RefreshFailed(reason)) => {
                assert_eq!(reason, "Failed to refresh token");
                queued += 1;
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
    assert_eq!((led, queued), (1, 2));

    assert_eq!(backend.refresh_calls(), 1);
    assert!(session.credential().is_empty());
    assert!(store.load().unwrap().is_empty());
    assert!(session.auth_header().is_empty());
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_second_unauthorized_after_replay_propagates() {
    let (session, _store, backend) = logged_in().await;
    let mut goals = GoalsStore::new(ApiClient::new(session.clone()));

    backend.0.reject_goals.store(true, Ordering::SeqCst);
    let result = goals.fetch_all_goals().await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(backend.refresh_calls(), 1);
    assert!(goals.error.is_some());
    // The refresh itself succeeded, so the session survives
    assert_eq!(session.access_token().as_deref(), Some("access-2"));
}

#[tokio::test]
async fn test_logout_after_login_drops_header() {
    let (session, store, _backend) = logged_in().await;

    session.logout();
    assert!(session.auth_header().get(header::AUTHORIZATION).is_none());
    assert!(store.load().unwrap().is_empty());
    assert!(session.user().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_logout_during_refresh_is_not_undone() {
    let (session, store, backend) = logged_in().await;
    let api = ApiClient::new(session.clone());

    backend.expire_access_token();
    let fetch = tokio::spawn({
        let api = api.clone();
        async move { api.get::<Value>("/goals/type/BIG/").await }
    });

    // The mock refresh takes 100 ms
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(session.state(), SessionState::Refreshing);
    session.logout();

    let result = fetch.await.unwrap();
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(session.credential().is_empty());
    assert!(store.load().unwrap().is_empty());
}

fn registration(username: &str, password: &str) -> Registration {
    Registration {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: password.to_string(),
        password2: password.to_string(),
        first_name: None,
        last_name: None,
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let (base_url, _backend) = spawn_backend().await;
    let (session, store) = session_for(&base_url);

    assert!(session.register(&registration("alice", "secret")).await);
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(session.user().unwrap().username, "alice");
    assert_eq!(store.load().unwrap().access_token.as_deref(), Some("access-1"));
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn test_register_succeeds_but_login_fails() {
    let (base_url, _backend) = spawn_backend().await;
    let (session, store) = session_for(&base_url);

    assert!(!session.register(&registration("carol", "hunter22")).await);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert_eq!(
        session.last_error().as_deref(),
        Some("Account created, but login failed: No active account found with the given credentials")
    );
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_field_errors_are_flattened() {
    let (base_url, _backend) = spawn_backend().await;
    let (session, _store) = session_for(&base_url);

    assert!(!session.register(&registration("taken", "password")).await);
    assert_eq!(
        session.last_error().as_deref(),
        Some("password: This password is too common.; username: A user with that username already exists.")
    );
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_login_survives_profile_failure() {
    let (base_url, backend) = spawn_backend().await;
    let (session, store) = session_for(&base_url);
    backend.0.fail_profile.store(true, Ordering::SeqCst);

    assert!(session.login(&LoginCredentials::new("alice", "secret")).await);
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.user().is_none());
    assert_eq!(session.last_error().as_deref(), Some("Profile unavailable"));
    assert_eq!(store.load().unwrap().refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_update_profile_and_settings_store_user() {
    let (session, _store, _backend) = logged_in().await;
    let api = ApiClient::new(session.clone());

    let update = ProfileUpdate {
        last_name: Some("Liddell".to_string()),
        ..Default::default()
    };
    let profile = api.update_profile(&update).await.unwrap();
    assert_eq!(profile.display_name(), "Alice Liddell");
    assert_eq!(session.user().unwrap().last_name.as_deref(), Some("Liddell"));

    let settings = UserSettings {
        timezone: Some("Europe/Berlin".to_string()),
        ..Default::default()
    };
    api.update_settings(&settings).await.unwrap();
    assert_eq!(session.user().unwrap().timezone.as_deref(), Some("Europe/Berlin"));
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn test_update_profile_failure_records_message() {
    let (session, _store, _backend) = logged_in().await;
    let api = ApiClient::new(session.clone());

    let update = ProfileUpdate {
        first_name: Some(String::new()),
        ..Default::default()
    };
    let result = api.update_profile(&update).await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
    assert_eq!(
        session.last_error().as_deref(),
        Some("first_name: This field may not be blank.")
    );
    // The previously loaded profile is kept
    assert_eq!(session.user().unwrap().display_name(), "Alice");
}
