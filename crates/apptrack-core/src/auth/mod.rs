//! Authentication module for managing sessions and credentials.
//!
//! This module provides:
//! - `SessionState`: In-memory user and access token, shared by every client clone
//! - `RefreshTokenStore`: Durable slot for the refresh token (OS keychain or memory)
//! - `Navigator`: Where to send the user when the session cannot be recovered
//! - `AuthService`: Login, registration, logout, and profile calls
//!
//! Access tokens never touch disk; refresh tokens survive restarts.

pub mod navigator;
pub mod service;
pub mod session;
pub mod storage;

pub use navigator::{LoginRedirect, Navigator};
pub use service::AuthService;
pub use session::{SessionData, SessionState};
pub use storage::{KeyringStore, MemoryStore, RefreshTokenStore};
