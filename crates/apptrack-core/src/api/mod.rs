//! REST API client module for the application tracker backend.
//!
//! This module provides the `ApiClient` for communicating with the tracker
//! API: applications, attachments, reminders, and the dashboard summary.
//!
//! The API uses short-lived JWT bearer tokens. When one expires the client
//! exchanges the persisted refresh token for a new one exactly once, however
//! many requests failed at the same time, and replays them all.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod refresh;
pub mod request;
pub mod resources;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, RefreshError};
pub use pipeline::{BearerAuth, DefaultHeaders, RequestStage};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse, Method, MultipartPart, PartValue, RequestBody};
pub use transport::{ReqwestTransport, Transport};
