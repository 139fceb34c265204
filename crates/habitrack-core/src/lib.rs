//! habitrack-core: client library for the habitrack goal and habit tracker.
//!
//! The [`auth::Session`] owns the access/refresh token pair. Every resource
//! request goes through [`api::ApiClient`], which replays a request once after
//! a single shared token refresh when the backend answers 401. The stores in
//! [`stores`] keep fetched goals, standards, reflections and gamification data.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;
pub mod stores;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionState};
pub use config::Config;
