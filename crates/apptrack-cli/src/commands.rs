//! Subcommands and their handlers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::debug;

use apptrack_core::models::{
    ApplicationDraft, ApplicationFilters, ApplicationKind, ApplicationStatus, DocType,
    NewReminder, ProfileUpdate, RegisterRequest, ReminderChannel,
};
use apptrack_core::{Config, Tracker};

use crate::format;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session in the keychain
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create a new account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Revoke the session and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Update profile fields
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
    },
    /// List applications
    List {
        #[arg(long)]
        status: Option<ApplicationStatus>,
        #[arg(long)]
        kind: Option<ApplicationKind>,
        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one application in detail
    Show {
        id: String,
        /// Include the status change history
        #[arg(long)]
        history: bool,
    },
    /// Create an application
    Add {
        #[arg(long)]
        kind: ApplicationKind,
        #[arg(long)]
        title: String,
        #[arg(long)]
        organization: String,
        #[command(flatten)]
        fields: DraftFields,
    },
    /// Change fields of an application
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        organization: Option<String>,
        #[command(flatten)]
        fields: DraftFields,
    },
    /// Move an application to another status
    Status { id: String, status: ApplicationStatus },
    /// Delete an application
    Delete { id: String },
    /// Attach a document to an application
    Upload {
        id: String,
        path: PathBuf,
        /// cv, transcript, cover-letter or other
        #[arg(long, default_value = "other")]
        doc_type: DocType,
        /// Overrides the type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Remove an attachment
    Detach { id: String, attachment_id: String },
    /// List reminders
    Reminders {
        #[arg(long)]
        application: Option<String>,
    },
    /// Schedule an email reminder for an application
    Remind {
        id: String,
        /// RFC 3339 time, e.g. 2024-06-01T09:00:00Z
        #[arg(long)]
        at: DateTime<Utc>,
    },
    /// Cancel a reminder
    Unremind {
        reminder_id: String,
        #[arg(long)]
        application: Option<String>,
    },
    /// Show deadlines and status counts
    Dashboard,
}

/// Optional application fields shared by `add` and `edit`.
#[derive(Debug, Args)]
pub struct DraftFields {
    #[arg(long)]
    deadline: Option<NaiveDate>,
    #[arg(long)]
    applied: Option<NaiveDate>,
    /// ISO country code
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    priority: Option<i32>,
    #[arg(long)]
    notes: Option<String>,
    /// Comma separated tags
    #[arg(long)]
    tags: Option<String>,
}

impl DraftFields {
    fn into_draft(self) -> ApplicationDraft {
        ApplicationDraft {
            deadline: self.deadline,
            applied_date: self.applied,
            location_country: self.country,
            source_url: self.url,
            priority: self.priority,
            notes: self.notes,
            tags: self.tags.map(|t| split_tags(&t)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print<T: Serialize>(&self, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", render(value));
        }
        Ok(())
    }

    fn done(&self, message: &str) {
        if !self.json {
            println!("{}", message);
        }
    }
}

pub async fn run(command: Command, tracker: &Tracker, config: &mut Config, out: Output) -> Result<()> {
    debug!(?command, "Running command");
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let login = tracker.login(&email, &password).await?;

            config.last_email = Some(email);
            config.save()?;
            out.print(&login.user, |u| format!("Logged in as {} <{}>", u.display_name(), u.email))
        }
        Command::Register { email, username, first_name, last_name } => {
            let password = rpassword::prompt_password("Password: ")?;
            let password_confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != password_confirm {
                bail!("Passwords do not match");
            }
            let request = RegisterRequest {
                email,
                username,
                password,
                password_confirm,
                first_name,
                last_name,
            };
            let user = tracker.register(&request).await?;
            out.print(&user, |u| format!("Registered {}. Run `apptrack login` to sign in.", u.email))
        }
        Command::Logout => {
            tracker.logout().await?;
            out.done("Logged out");
            Ok(())
        }
        Command::Whoami => {
            let user = tracker.current_user().await?;
            out.print(&user, |u| format!("{} <{}> ({})", u.display_name(), u.email, u.username))
        }
        Command::Profile { first_name, last_name, timezone } => {
            let update = ProfileUpdate { first_name, last_name, timezone };
            let user = tracker.update_profile(&update).await?;
            out.print(&user, |u| format!("Updated profile for {}", u.display_name()))
        }
        Command::List { status, kind, tags, page } => {
            let filters = ApplicationFilters { status, kind, tags, page };
            let page = tracker.applications(&filters).await?;
            out.print(&page, |page| {
                let today = Utc::now().date_naive();
                let mut lines = vec![format::application_header()];
                lines.extend(page.results.iter().map(|a| format::application_row(a, today)));
                lines.push(format!("{} of {} applications", page.results.len(), page.count));
                if page.has_next() {
                    lines.push(format!("More results: --page {}", filters.page.unwrap_or(1) + 1));
                }
                lines.join("\n")
            })
        }
        Command::Show { id, history } => {
            let application = tracker.application(&id).await?;
            out.print(&application, format::application_detail)?;
            if history {
                let entries = tracker.status_history(&id).await?;
                out.print(&entries, |entries| {
                    let mut lines = vec![String::new(), "History:".to_string()];
                    lines.extend(entries.iter().map(|e| format!("  {}", format::history_line(e))));
                    lines.join("\n")
                })?;
            }
            Ok(())
        }
        Command::Add { kind, title, organization, fields } => {
            let draft = ApplicationDraft {
                kind: Some(kind),
                title: Some(title),
                organization: Some(organization),
                ..fields.into_draft()
            };
            let created = tracker.create_application(&draft).await?;
            out.print(&created, |a| format!("Created {} ({})", a.title, a.id))
        }
        Command::Edit { id, title, organization, fields } => {
            let changes = ApplicationDraft {
                title,
                organization,
                ..fields.into_draft()
            };
            let updated = tracker.update_application(&id, &changes).await?;
            out.print(&updated, |a| format!("Updated {} ({})", a.title, a.id))
        }
        Command::Status { id, status } => {
            let updated = tracker.set_status(&id, status).await?;
            out.print(&updated, |a| format!("{} is now {}", a.title, a.status))
        }
        Command::Delete { id } => {
            tracker.delete_application(&id).await?;
            out.done(&format!("Deleted {}", id));
            Ok(())
        }
        Command::Upload { id, path, doc_type, content_type } => {
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("Attachment path has no file name")?
                .to_string();
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&path).to_string());
            let attachment = tracker
                .upload_attachment(&id, &filename, &content_type, data, doc_type)
                .await?;
            out.print(&attachment, |a| format!("Uploaded {} ({})", a.filename, a.size_display()))
        }
        Command::Detach { id, attachment_id } => {
            tracker.delete_attachment(&id, &attachment_id).await?;
            out.done(&format!("Removed attachment {}", attachment_id));
            Ok(())
        }
        Command::Reminders { application } => {
            let reminders = match application {
                Some(ref id) => tracker.application_reminders(id).await?,
                None => tracker.reminders().await?,
            };
            out.print(&reminders, |reminders| {
                if reminders.is_empty() {
                    "No reminders".to_string()
                } else {
                    reminders.iter().map(format::reminder_line).collect::<Vec<_>>().join("\n")
                }
            })
        }
        Command::Remind { id, at } => {
            if at <= Utc::now() {
                bail!("Reminder time must be in the future");
            }
            let reminder = NewReminder {
                remind_at: at,
                channel: ReminderChannel::Email,
            };
            let created = tracker.create_reminder(&id, &reminder).await?;
            out.print(&created, |r| format!("Reminder set: {}", format::reminder_line(r)))
        }
        Command::Unremind { reminder_id, application } => {
            tracker
                .delete_reminder(&reminder_id, application.as_deref())
                .await?;
            out.done(&format!("Cancelled reminder {}", reminder_id));
            Ok(())
        }
        Command::Dashboard => {
            let summary = tracker.dashboard().await?;
            out.print(&summary, format::dashboard)
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No value entered");
    }
    Ok(value)
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
