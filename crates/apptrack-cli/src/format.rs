//! Plain-text rendering of tracker data for the terminal.

use chrono::{NaiveDate, Utc};

use apptrack_core::models::{Application, DashboardSummary, Reminder, StatusHistory};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None or empty
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// "in 3 days", "today", "2 days ago"
pub fn format_deadline(deadline: Option<NaiveDate>, today: NaiveDate) -> String {
    let Some(deadline) = deadline else {
        return "-".to_string();
    };
    match (deadline - today).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n if n > 1 => format!("in {} days", n),
        -1 => "yesterday".to_string(),
        n => format!("{} days ago", -n),
    }
}

pub fn application_row(app: &Application, today: NaiveDate) -> String {
    format!(
        "{:<36}  {:<11}  {:<10}  {:<30}  {:<24}  {}",
        app.id,
        app.kind.to_string(),
        app.status.to_string(),
        truncate_string(&app.title, 30),
        truncate_string(&app.organization, 24),
        format_deadline(app.deadline, today),
    )
}

pub fn application_header() -> String {
    format!(
        "{:<36}  {:<11}  {:<10}  {:<30}  {:<24}  {}",
        "ID", "KIND", "STATUS", "TITLE", "ORGANIZATION", "DEADLINE"
    )
}

pub fn application_detail(app: &Application) -> String {
    let today = Utc::now().date_naive();
    let mut lines = vec![
        format!("{} at {}", app.title, app.organization),
        format!("  ID:        {}", app.id),
        format!("  Kind:      {}", app.kind),
        format!("  Status:    {}", app.status),
        format!("  Priority:  {}", app.priority),
        format!("  Country:   {}", if app.location_country.is_empty() { "-" } else { &app.location_country }),
        format!("  Source:    {}", format_optional(&app.source_url, "-")),
        format!("  Applied:   {}", format_date(app.applied_date)),
        format!(
            "  Deadline:  {} ({})",
            format_date(app.deadline),
            format_deadline(app.deadline, today)
        ),
    ];
    if !app.tags.is_empty() {
        lines.push(format!("  Tags:      {}", app.tags.join(", ")));
    }
    if !app.notes.is_empty() {
        lines.push(format!("  Notes:     {}", app.notes));
    }
    if !app.attachments.is_empty() {
        lines.push("  Attachments:".to_string());
        for attachment in &app.attachments {
            lines.push(format!(
                "    {}  {} ({}, {})",
                attachment.id,
                attachment.filename,
                attachment.doc_type.as_str(),
                attachment.size_display()
            ));
        }
    }
    if !app.reminders.is_empty() {
        lines.push("  Reminders:".to_string());
        for reminder in &app.reminders {
            lines.push(format!("    {}", reminder_line(reminder)));
        }
    }
    lines.join("\n")
}

pub fn history_line(entry: &StatusHistory) -> String {
    let by = format_optional(&entry.changed_by_name, "unknown");
    let mut line = format!(
        "{}  {} -> {}  by {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.from_status,
        entry.to_status,
        by
    );
    if !entry.note.is_empty() {
        line.push_str(&format!("  ({})", entry.note));
    }
    line
}

pub fn reminder_line(reminder: &Reminder) -> String {
    format!(
        "{}  {}  {}",
        reminder.id,
        reminder.remind_at.format("%Y-%m-%d %H:%M UTC"),
        if reminder.is_sent { "sent" } else { "pending" }
    )
}

pub fn dashboard(summary: &DashboardSummary) -> String {
    let mut lines = vec![
        format!("Applications:         {}", summary.total_applications()),
        format!("Submitted (30 days):  {}", summary.monthly_submissions),
        format!("Conversion rate:      {:.1}%", summary.conversion_rate),
        String::new(),
        "By status:".to_string(),
    ];
    for (status, count) in &summary.status_counts {
        lines.push(format!("  {:<10} {}", status, count));
    }
    lines.push(String::new());
    if summary.upcoming_deadlines.is_empty() {
        lines.push("No deadlines in the next 7 days".to_string());
    } else {
        lines.push("Upcoming deadlines:".to_string());
        for item in &summary.upcoming_deadlines {
            lines.push(format!(
                "  {}  {} at {}",
                item.deadline.format("%b %d"),
                truncate_string(&item.title, 40),
                item.organization
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Ünïcödé text", 8), "Ünïcö...");
    }

    #[test]
    fn test_format_deadline() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d);
        assert_eq!(format_deadline(day(10), today), "today");
        assert_eq!(format_deadline(day(11), today), "tomorrow");
        assert_eq!(format_deadline(day(17), today), "in 7 days");
        assert_eq!(format_deadline(day(9), today), "yesterday");
        assert_eq!(format_deadline(day(1), today), "9 days ago");
        assert_eq!(format_deadline(None, today), "-");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(&Some("x".to_string()), "-"), "x");
        assert_eq!(format_optional(&Some(String::new()), "-"), "-");
        assert_eq!(format_optional(&None, "-"), "-");
    }
}
