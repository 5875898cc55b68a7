//! High-level facade used by front ends.
//!
//! Reads go through the [`QueryCache`] and only hit the API once an entry is
//! older than its freshness window. Writes go straight to the API and then
//! invalidate every cached query they could have changed. The cache never
//! outlives the session it was filled under.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::auth::AuthService;
use crate::cache::QueryCache;
use crate::models::{
    Application, ApplicationDraft, ApplicationFilters, ApplicationStatus, Attachment,
    DashboardSummary, DocType, LoginResponse, NewReminder, Paginated, ProfileUpdate,
    RegisterRequest, Reminder, StatusHistory, User,
};

/// Application lists and details are considered fresh for 30 seconds.
const RECORD_MAX_AGE_SECS: i64 = 30;

/// Matches the dashboard's one-minute refetch interval.
const DASHBOARD_MAX_AGE_SECS: i64 = 60;

/// The profile rarely changes; 5 minutes avoids refetching it on every command.
const USER_MAX_AGE_SECS: i64 = 300;

const KEY_APPLICATIONS: &str = "applications";
const KEY_APPLICATION: &str = "application";
const KEY_DASHBOARD: &str = "dashboard";
const KEY_REMINDERS: &str = "reminders";
const KEY_USER: &str = "user";

fn applications_key(filters: &ApplicationFilters) -> String {
    let suffix = filters.cache_key();
    if suffix.is_empty() {
        KEY_APPLICATIONS.to_string()
    } else {
        format!("{}:{}", KEY_APPLICATIONS, suffix)
    }
}

fn application_key(id: &str) -> String {
    format!("{}:{}", KEY_APPLICATION, id)
}

/// Clone is cheap - clones share the client, session and cache.
#[derive(Clone)]
pub struct Tracker {
    client: ApiClient,
    auth: AuthService,
    cache: Arc<QueryCache>,
    /// Session generation the cache contents belong to.
    cached_generation: Arc<AtomicU64>,
}

impl Tracker {
    pub fn new(client: ApiClient) -> Self {
        let generation = client.session().generation();
        Self {
            auth: AuthService::new(client.clone()),
            client,
            cache: Arc::new(QueryCache::new()),
            cached_generation: Arc::new(AtomicU64::new(generation)),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Drop everything cached under an earlier session and return the
    /// current session generation.
    fn sync_with_session(&self) -> u64 {
        let current = self.client.session().generation();
        let previous = self.cached_generation.swap(current, Ordering::SeqCst);
        if previous != current {
            debug!(previous, current, "Session changed, clearing query cache");
            self.cache.clear();
        }
        current
    }

    async fn cached<T, F, Fut>(&self, key: &str, max_age_secs: i64, fetch: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let generation = self.sync_with_session();
        if let Some(hit) = self.cache.get(key, Duration::seconds(max_age_secs)) {
            debug!(key, "Cache hit");
            return Ok(hit);
        }
        let result = fetch().await;
        // The fetch may have ended the session (failed refresh), and a
        // response that raced a logout or login belongs to the old one
        let same_session = self.sync_with_session() == generation;
        let value = result?;
        if same_session {
            self.cache.put(key, &value);
        }
        Ok(value)
    }

    fn application_changed(&self, id: Option<&str>) {
        self.cache.invalidate_prefix(KEY_APPLICATIONS);
        self.cache.invalidate(KEY_DASHBOARD);
        if let Some(id) = id {
            self.cache.invalidate_prefix(&application_key(id));
        }
    }

    // ===== Account =====

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let login = self.auth.login(email, password).await?;
        self.cache.clear();
        self.cached_generation
            .store(self.client.session().generation(), Ordering::SeqCst);
        Ok(login)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.auth.register(request).await
    }

    /// Log out and forget every cached response.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.auth.logout().await;
        self.cache.clear();
        self.cached_generation
            .store(self.client.session().generation(), Ordering::SeqCst);
        result
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.cached(KEY_USER, USER_MAX_AGE_SECS, || self.auth.current_user())
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user = self.auth.update_profile(update).await?;
        self.cache.put(KEY_USER, &user);
        Ok(user)
    }

    // ===== Reads =====

    pub async fn applications(&self, filters: &ApplicationFilters) -> Result<Paginated<Application>, ApiError> {
        self.cached(&applications_key(filters), RECORD_MAX_AGE_SECS, || {
            self.client.list_applications(filters)
        })
        .await
    }

    pub async fn application(&self, id: &str) -> Result<Application, ApiError> {
        self.cached(&application_key(id), RECORD_MAX_AGE_SECS, || {
            self.client.fetch_application(id)
        })
        .await
    }

    pub async fn status_history(&self, id: &str) -> Result<Vec<StatusHistory>, ApiError> {
        let key = format!("{}:history", application_key(id));
        self.cached(&key, RECORD_MAX_AGE_SECS, || self.client.fetch_status_history(id))
            .await
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, ApiError> {
        self.cached(KEY_DASHBOARD, DASHBOARD_MAX_AGE_SECS, || self.client.fetch_dashboard())
            .await
    }

    pub async fn reminders(&self) -> Result<Vec<Reminder>, ApiError> {
        self.cached(KEY_REMINDERS, RECORD_MAX_AGE_SECS, || self.client.list_reminders())
            .await
    }

    pub async fn application_reminders(&self, id: &str) -> Result<Vec<Reminder>, ApiError> {
        let key = format!("{}:{}", KEY_REMINDERS, id);
        self.cached(&key, RECORD_MAX_AGE_SECS, || self.client.list_application_reminders(id))
            .await
    }

    // ===== Writes =====

    pub async fn create_application(&self, draft: &ApplicationDraft) -> Result<Application, ApiError> {
        let created = self.client.create_application(draft).await?;
        self.application_changed(None);
        Ok(created)
    }

    pub async fn update_application(&self, id: &str, changes: &ApplicationDraft) -> Result<Application, ApiError> {
        let updated = self.client.update_application(id, changes).await?;
        self.application_changed(Some(id));
        Ok(updated)
    }

    pub async fn set_status(&self, id: &str, status: ApplicationStatus) -> Result<Application, ApiError> {
        let updated = self.client.set_application_status(id, status).await?;
        self.application_changed(Some(id));
        Ok(updated)
    }

    pub async fn delete_application(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete_application(id).await?;
        self.application_changed(Some(id));
        self.cache.invalidate_prefix(KEY_REMINDERS);
        Ok(())
    }

    pub async fn upload_attachment(
        &self,
        application_id: &str,
        filename: &str,
        content_type: &str,
        data: impl Into<Bytes>,
        doc_type: DocType,
    ) -> Result<Attachment, ApiError> {
        let attachment = self
            .client
            .upload_attachment(application_id, filename, content_type, data, doc_type)
            .await?;
        self.cache.invalidate_prefix(&application_key(application_id));
        Ok(attachment)
    }

    pub async fn delete_attachment(&self, application_id: &str, attachment_id: &str) -> Result<(), ApiError> {
        self.client
            .delete_attachment(application_id, attachment_id)
            .await?;
        self.cache.invalidate_prefix(&application_key(application_id));
        Ok(())
    }

    pub async fn create_reminder(&self, application_id: &str, reminder: &NewReminder) -> Result<Reminder, ApiError> {
        let created = self.client.create_reminder(application_id, reminder).await?;
        self.cache.invalidate_prefix(KEY_REMINDERS);
        self.cache.invalidate_prefix(&application_key(application_id));
        Ok(created)
    }

    /// `application_id` is only used to invalidate the owning application's detail.
    pub async fn delete_reminder(&self, reminder_id: &str, application_id: Option<&str>) -> Result<(), ApiError> {
        self.client.delete_reminder(reminder_id).await?;
        self.cache.invalidate_prefix(KEY_REMINDERS);
        if let Some(id) = application_id {
            self.cache.invalidate_prefix(&application_key(id));
        }
        Ok(())
    }
}
