//! Authentication: the session, token persistence and refresh coordination.
//!
//! This module provides:
//! - `Session`: the credential pair with login, refresh and logout
//! - `TokenStore`: durable token storage (file, OS keychain, or memory)
//! - `RefreshCoordinator`: one refresh at a time, with callers that hit a 401
//!   meanwhile parked until it settles

pub mod credentials;
pub mod refresh;
pub mod session;

pub use credentials::{Credential, FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use refresh::{RefreshCoordinator, RefreshTicket};
pub use session::{Session, SessionState};
