//! REST API client module for the habitrack backend.
//!
//! This module provides the `ApiClient`, the layer every resource request
//! passes through. It attaches the session's bearer token and recovers from
//! access-token expiry by coordinating a single refresh across all requests
//! that fail with 401 at the same time.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
