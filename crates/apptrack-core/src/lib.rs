//! Core library for apptrack, a client for tracking job and scholarship
//! applications against the tracker REST API.
//!
//! - [`api`]: Authenticated API client with single-flight token refresh
//! - [`auth`]: Session state, refresh token storage, login and logout
//! - [`cache`]: In-memory query cache
//! - [`models`]: Data model of the REST API
//! - [`tracker`]: Cached facade used by front ends

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod tracker;

pub use api::{ApiClient, ApiError, RefreshError};
pub use auth::{AuthService, SessionState};
pub use config::Config;
pub use tracker::Tracker;
