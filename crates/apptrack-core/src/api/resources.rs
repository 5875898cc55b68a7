//! Typed calls for the tracker's REST resources.
//!
//! These are plain request/response wrappers; authentication and recovery
//! happen underneath in [`ApiClient::execute`].

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use super::request::{ApiRequest, MultipartPart};
use super::{ApiClient, ApiError};
use crate::models::{
    Application, ApplicationDraft, ApplicationFilters, Attachment, DashboardSummary, DocType,
    ListResponse, NewReminder, Paginated, Reminder, StatusHistory,
};

#[derive(Serialize)]
struct StatusChange<'a> {
    status: &'a str,
}

impl ApiClient {
    // ===== Applications =====

    pub async fn list_applications(&self, filters: &ApplicationFilters) -> Result<Paginated<Application>, ApiError> {
        let request = ApiRequest::get("/applications/").with_query(filters.to_query());
        let response: ListResponse<Application> = self.send_json(request).await?;
        let page = response.into_page();
        debug!(count = page.count, returned = page.results.len(), "Fetched applications");
        Ok(page)
    }

    pub async fn fetch_application(&self, id: &str) -> Result<Application, ApiError> {
        self.get(&format!("/applications/{}/", id)).await
    }

    pub async fn create_application(&self, draft: &ApplicationDraft) -> Result<Application, ApiError> {
        self.post("/applications/", draft).await
    }

    pub async fn update_application(&self, id: &str, changes: &ApplicationDraft) -> Result<Application, ApiError> {
        self.patch(&format!("/applications/{}/", id), changes).await
    }

    /// Shortcut for the most common edit. The server records the transition
    /// in the application's status history.
    pub async fn set_application_status(&self, id: &str, status: crate::models::ApplicationStatus) -> Result<Application, ApiError> {
        self.patch(&format!("/applications/{}/", id), &StatusChange { status: status.as_str() })
            .await
    }

    pub async fn delete_application(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/applications/{}/", id)).await
    }

    pub async fn fetch_status_history(&self, application_id: &str) -> Result<Vec<StatusHistory>, ApiError> {
        let response: ListResponse<StatusHistory> = self
            .get(&format!("/applications/{}/history/", application_id))
            .await?;
        Ok(response.into_vec())
    }

    // ===== Attachments =====

    /// Upload a file as multipart form data (`file`, `doc_type`).
    pub async fn upload_attachment(
        &self,
        application_id: &str,
        filename: &str,
        content_type: &str,
        data: impl Into<Bytes>,
        doc_type: DocType,
    ) -> Result<Attachment, ApiError> {
        let request = ApiRequest::post(format!("/applications/{}/attachments/", application_id))
            .with_multipart(vec![
                MultipartPart::file("file", filename, content_type, data),
                MultipartPart::text("doc_type", doc_type.as_str()),
            ]);
        self.send_json(request).await
    }

    pub async fn delete_attachment(&self, application_id: &str, attachment_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/applications/{}/attachments/{}/", application_id, attachment_id))
            .await
    }

    // ===== Reminders =====

    pub async fn list_reminders(&self) -> Result<Vec<Reminder>, ApiError> {
        let response: ListResponse<Reminder> = self.get("/reminders/").await?;
        Ok(response.into_vec())
    }

    pub async fn list_application_reminders(&self, application_id: &str) -> Result<Vec<Reminder>, ApiError> {
        let response: ListResponse<Reminder> = self
            .get(&format!("/applications/{}/reminders/", application_id))
            .await?;
        Ok(response.into_vec())
    }

    pub async fn create_reminder(&self, application_id: &str, reminder: &NewReminder) -> Result<Reminder, ApiError> {
        self.post(&format!("/applications/{}/reminders/", application_id), reminder)
            .await
    }

    pub async fn delete_reminder(&self, reminder_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/reminders/{}/", reminder_id)).await
    }

    // ===== Dashboard =====

    pub async fn fetch_dashboard(&self) -> Result<DashboardSummary, ApiError> {
        self.get("/dashboard/summary/").await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::request::{PartValue, RequestBody};
    use crate::api::testing::FakeServer;
    use crate::auth::{MemoryStore, SessionState};
    use crate::models::{ApplicationKind, ApplicationStatus};

    const APPLICATION: &str = r#"{
        "id": "0e65066c-ab20-4da0-b3bf-79dfd0668049",
        "kind": "job",
        "title": "Backend Engineer",
        "organization": "Acme",
        "applied_date": null,
        "deadline": null,
        "status": "submitted",
        "created_at": "2024-03-01T09:30:00Z",
        "updated_at": "2024-03-01T09:30:00Z"
    }"#;

    fn client(server: &Arc<FakeServer>) -> ApiClient {
        let session = SessionState::new();
        session.set_access_token("A1".to_string());
        ApiClient::builder("http://tracker.test/api/v1/")
            .session(session)
            .token_store(Arc::new(MemoryStore::with_token("R1")))
            .transport(server.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_applications_sends_filters() {
        let server = FakeServer::new("A1");
        server.script(
            "/applications/",
            vec![(200, &format!(r#"{{"count": 1, "next": null, "previous": null, "results": [{}]}}"#, APPLICATION))],
        );
        let client = client(&server);

        let filters = ApplicationFilters {
            status: Some(ApplicationStatus::Submitted),
            kind: Some(ApplicationKind::Job),
            ..Default::default()
        };
        let page = client.list_applications(&filters).await.unwrap();

        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].title, "Backend Engineer");
        let sent = server.sent_to("/applications/");
        assert_eq!(
            sent[0].query,
            vec![
                ("status".to_string(), "submitted".to_string()),
                ("kind".to_string(), "job".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_create_application_posts_draft() {
        let server = FakeServer::new("A1");
        server.script("/applications/", vec![(201, APPLICATION)]);
        let client = client(&server);

        let draft = ApplicationDraft {
            kind: Some(ApplicationKind::Job),
            title: Some("Backend Engineer".to_string()),
            organization: Some("Acme".to_string()),
            ..Default::default()
        };
        let created = client.create_application(&draft).await.unwrap();

        assert_eq!(created.status, ApplicationStatus::Submitted);
        let sent = &server.sent_to("/applications/")[0];
        assert_eq!(sent.method, reqwest::Method::POST);
        assert_eq!(
            sent.body,
            RequestBody::Json(serde_json::json!({"kind": "job", "title": "Backend Engineer", "organization": "Acme"}))
        );
    }

    #[tokio::test]
    async fn test_upload_attachment_builds_multipart() {
        let server = FakeServer::new("A1");
        let path = "/applications/app-1/attachments/";
        server.script(
            path,
            vec![(201, r#"{
                "id": "att-1",
                "filename": "cv.pdf",
                "file_size": 4,
                "content_type": "application/pdf",
                "doc_type": "cv",
                "uploaded_by": 7,
                "uploaded_at": "2024-03-01T09:31:00Z",
                "file_url": null
            }"#)],
        );
        let client = client(&server);

        let attachment = client
            .upload_attachment("app-1", "cv.pdf", "application/pdf", b"%PDF".to_vec(), DocType::Cv)
            .await
            .unwrap();

        assert_eq!(attachment.doc_type, DocType::Cv);
        match &server.sent_to(path)[0].body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].name, "file");
                assert!(matches!(&parts[0].value, PartValue::File { filename, data, .. } if filename == "cv.pdf" && data.as_ref() == b"%PDF"));
                assert_eq!(parts[1], MultipartPart::text("doc_type", "cv"));
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_is_replayed_after_refresh() {
        let server = FakeServer::new("A1");
        let path = "/applications/app-1/attachments/";
        server.script(
            path,
            vec![
                (401, r#"{"detail":"Given token not valid for any token type"}"#),
                (201, r#"{
                    "id": "att-2",
                    "filename": "transcript.pdf",
                    "file_size": 4,
                    "content_type": "application/pdf",
                    "doc_type": "transcript",
                    "uploaded_by": 7,
                    "uploaded_at": "2024-03-01T09:31:00Z",
                    "file_url": null
                }"#),
            ],
        );
        server.grant_refresh("A2");
        let client = client(&server);

        let attachment = client
            .upload_attachment("app-1", "transcript.pdf", "application/pdf", b"%PDF".to_vec(), DocType::Transcript)
            .await
            .unwrap();

        assert_eq!(attachment.id, "att-2");
        assert_eq!(attachment.doc_type, DocType::Transcript);
        assert_eq!(server.refresh_calls(), 1);
        let uploads = server.sent_to(path);
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].body, uploads[1].body);
        assert_eq!(uploads[0].bearer.as_deref(), Some("A1"));
        assert_eq!(uploads[1].bearer.as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn test_delete_reminder_accepts_no_content() {
        let server = FakeServer::new("A1");
        server.script("/reminders/rem-1/", vec![(204, "")]);
        let client = client(&server);

        client.delete_reminder("rem-1").await.unwrap();
        assert_eq!(server.sent_to("/reminders/rem-1/")[0].method, reqwest::Method::DELETE);
    }

    #[tokio::test]
    async fn test_list_reminders_accepts_bare_array() {
        let server = FakeServer::new("A1");
        server.script(
            "/reminders/",
            vec![(200, r#"[{
                "id": "rem-1",
                "application": "app-1",
                "remind_at": "2024-05-01T08:00:00Z",
                "channel": "email",
                "is_sent": false,
                "created_at": "2024-04-01T08:00:00Z",
                "scheduled_task_id": ""
            }]"#)],
        );
        let client = client(&server);

        let reminders = client.list_reminders().await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert!(!reminders[0].is_sent);
    }
}
