//! Data models for application tracker entities.
//!
//! This module contains the data structures exchanged with the tracker
//! REST API:
//!
//! - `User`, `LoginResponse`: Account and authentication payloads
//! - `Application`: A job or scholarship application with its history
//! - `Attachment`, `StatusHistory`, `Reminder`: Records nested under an application
//! - `DashboardSummary`: Aggregates shown on the dashboard
//! - `Paginated`, `ListResponse`: Envelopes for list endpoints

pub mod application;
pub mod dashboard;
pub mod user;

pub use application::{
    Application, ApplicationDraft, ApplicationFilters, ApplicationKind, ApplicationStatus,
    Attachment, DocType, NewReminder, Reminder, ReminderChannel, StatusHistory,
};
pub use dashboard::{DashboardSummary, UpcomingDeadline};
pub use user::{LoginResponse, ProfileUpdate, RegisterRequest, User};

use serde::{Deserialize, Serialize};

/// Page envelope returned by paginated list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// List endpoints answer with a page envelope when pagination is enabled on
/// the server and with a bare array otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Page(Paginated<T>),
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Page(page) => page.results,
            ListResponse::Bare(items) => items,
        }
    }

    pub fn into_page(self) -> Paginated<T> {
        match self {
            ListResponse::Page(page) => page,
            ListResponse::Bare(items) => Paginated {
                count: items.len() as u64,
                next: None,
                previous: None,
                results: items,
            },
        }
    }
}
