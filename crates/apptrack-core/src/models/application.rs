use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationKind {
    Job,
    Scholarship,
}

impl ApplicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationKind::Job => "job",
            ApplicationKind::Scholarship => "scholarship",
        }
    }
}

impl std::fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationKind::Job => write!(f, "Job"),
            ApplicationKind::Scholarship => write!(f, "Scholarship"),
        }
    }
}

impl FromStr for ApplicationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "job" => Ok(ApplicationKind::Job),
            "scholarship" => Ok(ApplicationKind::Scholarship),
            other => Err(format!("unknown application kind: {}", other)),
        }
    }
}

/// Lifecycle of an application. Ordered roughly by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Submitted,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Closed applications no longer move through the pipeline.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Offer | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Draft => write!(f, "Draft"),
            ApplicationStatus::Submitted => write!(f, "Submitted"),
            ApplicationStatus::Interview => write!(f, "Interview"),
            ApplicationStatus::Offer => write!(f, "Offer"),
            ApplicationStatus::Rejected => write!(f, "Rejected"),
            ApplicationStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("unknown application status: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub kind: ApplicationKind,
    pub title: String,
    pub organization: String,
    #[serde(default)]
    pub location_country: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub applied_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Only present on the detail endpoint
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub status_history: Vec<StatusHistory>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

impl Application {
    /// Days until the deadline relative to `today`; negative once it has passed.
    pub fn days_until_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|d| (d - today).num_days())
    }
}

/// Create/update payload. Unset fields are omitted so a PATCH only touches
/// what the caller changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplicationDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ApplicationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Query filters for the application list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilters {
    pub status: Option<ApplicationStatus>,
    pub kind: Option<ApplicationKind>,
    /// Comma separated tag list, passed through as-is.
    pub tags: Option<String>,
    pub page: Option<u32>,
}

impl ApplicationFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(kind) = self.kind {
            query.push(("kind".to_string(), kind.as_str().to_string()));
        }
        if let Some(ref tags) = self.tags {
            if !tags.is_empty() {
                query.push(("tags".to_string(), tags.clone()));
            }
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        query
    }

    /// Stable cache key suffix for this filter set.
    pub fn cache_key(&self) -> String {
        self.to_query()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Cv,
    Transcript,
    CoverLetter,
    #[default]
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Cv => "cv",
            DocType::Transcript => "transcript",
            DocType::CoverLetter => "cover_letter",
            DocType::Other => "other",
        }
    }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cv" => Ok(DocType::Cv),
            "transcript" => Ok(DocType::Transcript),
            "cover_letter" => Ok(DocType::CoverLetter),
            "other" => Ok(DocType::Other),
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub file_size: u64,
    #[serde(default)]
    pub content_type: String,
    pub doc_type: DocType,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub file_url: Option<String>,
}

impl Attachment {
    pub fn size_display(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        if self.file_size >= MB {
            format!("{:.1} MB", self.file_size as f64 / MB as f64)
        } else if self.file_size >= KB {
            format!("{:.1} KB", self.file_size as f64 / KB as f64)
        } else {
            format!("{} B", self.file_size)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: String,
    pub from_status: String,
    pub to_status: String,
    pub changed_by: Option<i64>,
    #[serde(default)]
    pub changed_by_name: Option<String>,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    #[default]
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub application: String,
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub channel: ReminderChannel,
    #[serde(default)]
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub scheduled_task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewReminder {
    pub remind_at: DateTime<Utc>,
    pub channel: ReminderChannel,
}
