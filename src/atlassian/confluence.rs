use crate::atlassian::RestClient;
use crate::brief::config::WikiConfig;
use crate::error::ApiError;
use anyhow::Result;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVersion {
    pub title: String,
    pub number: u64,
}

pub struct ConfluenceClient {
    rest: RestClient,
}

impl ConfluenceClient {
    pub fn new(cfg: &WikiConfig) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(&cfg.base_url, &cfg.token)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    pub fn current_version(&self, page_id: &str) -> Result<PageVersion, ApiError> {
        let path = format!("/rest/api/content/{page_id}");
        let body = self
            .rest
            .get_json(&path, &[("expand", "version".to_string())])?;
        let number = body
            .get("version")
            .and_then(|v| v.get("number"))
            .and_then(Value::as_u64);
        let title = body.get("title").and_then(Value::as_str);
        match (title, number) {
            (Some(title), Some(number)) => Ok(PageVersion {
                title: title.to_string(),
                number,
            }),
            _ => Err(ApiError {
                method: "GET".to_string(),
                endpoint: self.rest.url(&path),
                cause: "page response lacks title or version".to_string(),
                body: Some(body.to_string()),
            }),
        }
    }

    /// Replaces the page body with `html` in storage representation and
    /// returns the new version number.
    pub fn update_page(&self, page_id: &str, html: &str) -> Result<u64, ApiError> {
        let current = self.current_version(page_id)?;
        let next = current.number + 1;
        let payload = json!({
            "id": page_id,
            "type": "page",
            "title": current.title,
            "version": {"number": next},
            "body": {
                "storage": {
                    "value": html,
                    "representation": "storage"
                }
            }
        });
        self.rest
            .put_json(&format!("/rest/api/content/{page_id}"), &payload)?;
        tracing::info!(page_id, version = next, "wiki page updated");
        Ok(next)
    }
}
