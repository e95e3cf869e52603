use crate::brief::util::{parse_created_date, truncate_chars};
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tracker issue as fetched for the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub created: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub priority: Option<String>,
}

/// Fixed-shape record the model produces for one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDigest {
    pub key: String,
    pub summary: String,
    pub achievements: String,
    pub deliverable: String,
    pub focus: String,
    pub risks: String,
}

impl IssueDigest {
    pub const FIELDS: [&'static str; 6] = [
        "key",
        "summary",
        "achievements",
        "deliverable",
        "focus",
        "risks",
    ];

    pub fn empty_fields(&self) -> Vec<&'static str> {
        let values = [
            &self.key,
            &self.summary,
            &self.achievements,
            &self.deliverable,
            &self.focus,
            &self.risks,
        ];
        Self::FIELDS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub key: String,
    pub created: String,
    pub title: String,
    pub priority: String,
    pub status: String,
    #[serde(default)]
    pub description: String,
    pub assignee: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl IssueMetadata {
    pub fn from_issue(issue: &Issue, description_max_chars: usize) -> Self {
        Self {
            key: issue.key.clone(),
            created: issue.created.clone(),
            title: issue.summary.clone(),
            priority: issue
                .priority
                .clone()
                .unwrap_or_else(|| "Normal".to_string()),
            status: issue.status.clone(),
            description: issue
                .description
                .as_deref()
                .map(|d| truncate_chars(d, description_max_chars))
                .unwrap_or_default(),
            assignee: issue
                .assignee
                .clone()
                .unwrap_or_else(|| "Unassigned".to_string()),
            labels: issue.labels.clone(),
        }
    }
}

/// Cached distillation of one issue for one report page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContext {
    pub key: String,
    pub report_id: String,
    pub digest: IssueDigest,
    pub metadata: IssueMetadata,
}

impl IssueContext {
    pub fn created_date(&self) -> Result<NaiveDate> {
        parse_created_date(&self.metadata.created)
    }

    pub fn is_closed(&self, closed_states: &[String]) -> bool {
        closed_states.iter().any(|s| s == &self.metadata.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub name: String,
    pub description: String,
    pub accountable: String,
    pub due_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaciEntry {
    pub name: String,
    pub team: String,
    #[serde(default)]
    pub responsible: bool,
    #[serde(default)]
    pub accountable: bool,
    #[serde(default)]
    pub consulted: bool,
    #[serde(default)]
    pub informed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: String,
    #[serde(skip_serializing)]
    pub fragments: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveReport {
    pub page_id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub status_description: String,
    pub due_date: NaiveDate,
    pub deliverables: Vec<String>,
    pub achievements: Vec<String>,
    pub focus: Vec<String>,
    pub next_steps: Vec<String>,
    pub risks: Vec<String>,
    pub prerequisites: Vec<Prerequisite>,
    pub raci: Vec<RaciEntry>,
    pub timeline: Vec<TimelineBucket>,
    pub links: Vec<Link>,
}

#[cfg(test)]
mod tests {
    use super::{Issue, IssueDigest, IssueMetadata};

    #[test]
    fn metadata_fills_tracker_gaps_with_defaults() {
        let issue = Issue {
            key: "APO-7".to_string(),
            summary: "Wire up billing".to_string(),
            description: Some("d".repeat(3000)),
            status: "In Progress".to_string(),
            created: "2025-02-10T09:00:00.000+0000".to_string(),
            assignee: None,
            labels: vec!["backend".to_string()],
            priority: None,
        };
        let meta = IssueMetadata::from_issue(&issue, 2048);
        assert_eq!(meta.priority, "Normal");
        assert_eq!(meta.assignee, "Unassigned");
        assert_eq!(meta.description.chars().count(), 2048);
        assert_eq!(meta.title, "Wire up billing");
    }

    #[test]
    fn empty_fields_lists_blank_entries() {
        let digest = IssueDigest {
            key: "APO-7".to_string(),
            summary: "s".to_string(),
            achievements: " ".to_string(),
            deliverable: "d".to_string(),
            focus: String::new(),
            risks: "r".to_string(),
        };
        assert_eq!(digest.empty_fields(), vec!["achievements", "focus"]);
    }
}
