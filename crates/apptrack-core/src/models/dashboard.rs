use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApplicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(default)]
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
    /// Application count per status name.
    #[serde(default)]
    pub status_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub monthly_submissions: u64,
    /// Percentage of applications that reached an offer.
    #[serde(default)]
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingDeadline {
    pub id: String,
    pub title: String,
    pub organization: String,
    pub deadline: NaiveDate,
}

impl DashboardSummary {
    pub fn count_for(&self, status: ApplicationStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn total_applications(&self) -> u64 {
        self.status_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dashboard_summary() {
        let json = r#"{
            "upcoming_deadlines": [
                {"id": "2b7c0c1e-7d2e-4b8a-9a8e-3f1d3c0e9b11", "title": "Backend Engineer", "organization": "Acme", "deadline": "2024-05-10"}
            ],
            "status_counts": {"draft": 2, "submitted": 3, "offer": 1},
            "monthly_submissions": 3,
            "conversion_rate": 16.67
        }"#;
        let summary: DashboardSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.upcoming_deadlines.len(), 1);
        assert_eq!(summary.count_for(ApplicationStatus::Submitted), 3);
        assert_eq!(summary.count_for(ApplicationStatus::Rejected), 0);
        assert_eq!(summary.total_applications(), 6);
    }
}
