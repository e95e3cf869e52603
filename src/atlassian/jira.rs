use crate::atlassian::RestClient;
use crate::brief::config::{IssueSource, TrackerConfig};
use crate::brief::model::Issue;
use crate::error::ApiError;
use anyhow::Result;
use serde_json::Value;

pub const SEARCH_FIELDS: &str =
    "key,summary,assignee,created,updated,status,description,priority,labels";

pub struct JiraClient {
    rest: RestClient,
    max_results: u32,
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Maps one `issues[]` entry of a search response; `None` when the entry has
/// no key.
pub fn parse_issue(raw: &Value) -> Option<Issue> {
    let key = str_at(raw, &["key"])?.to_string();
    let fields = raw.get("fields").unwrap_or(&Value::Null);
    Some(Issue {
        key,
        summary: str_at(fields, &["summary"]).unwrap_or_default().to_string(),
        description: str_at(fields, &["description"]).map(str::to_string),
        status: str_at(fields, &["status", "name"])
            .unwrap_or_default()
            .to_string(),
        created: str_at(fields, &["created"]).unwrap_or_default().to_string(),
        assignee: str_at(fields, &["assignee", "emailAddress"]).map(str::to_string),
        labels: fields
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        priority: str_at(fields, &["priority", "name"]).map(str::to_string),
    })
}

impl JiraClient {
    pub fn new(cfg: &TrackerConfig) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(&cfg.base_url, &cfg.token)?,
            max_results: cfg.max_results,
        })
    }

    pub fn search_issues(&self, jql: &str) -> Result<Vec<Issue>, ApiError> {
        let body = self.rest.get_json(
            "/rest/api/2/search",
            &[
                ("jql", jql.to_string()),
                ("fields", SEARCH_FIELDS.to_string()),
                ("maxResults", self.max_results.to_string()),
            ],
        )?;
        let raw_issues = body
            .get("issues")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut issues = Vec::with_capacity(raw_issues.len());
        for raw in raw_issues {
            match parse_issue(raw) {
                Some(issue) => issues.push(issue),
                None => tracing::warn!("search returned an issue without a key; skipped"),
            }
        }
        tracing::debug!(count = issues.len(), "issues fetched");
        Ok(issues)
    }

    /// JQL stored behind a saved filter.
    pub fn filter_jql(&self, filter_id: &str) -> Result<String, ApiError> {
        let path = format!("/rest/api/2/filter/{filter_id}");
        let body = self.rest.get_json(&path, &[])?;
        str_at(&body, &["jql"])
            .or_else(|| {
                body.get("values")
                    .and_then(|v| v.get(0))
                    .and_then(|first| str_at(first, &["jql"]))
            })
            .map(str::to_string)
            .ok_or_else(|| ApiError {
                method: "GET".to_string(),
                endpoint: self.rest.url(&path),
                cause: "filter response carries no jql".to_string(),
                body: Some(body.to_string()),
            })
    }

    pub fn fetch(&self, source: &IssueSource) -> Result<Vec<Issue>, ApiError> {
        match source {
            IssueSource::Jql(jql) => self.search_issues(jql),
            IssueSource::SavedFilter(id) => {
                let jql = self.filter_jql(id)?;
                self.search_issues(&jql)
            }
        }
    }
}
