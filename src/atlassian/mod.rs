//! Blocking REST clients for the issue tracker and the wiki.

pub mod confluence;
pub mod jira;

use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bearer-authenticated JSON client shared by the Jira and Confluence adapters.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    token: String,
    http: Client,
}

impl RestClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("Accept", "application/json");
        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    pub fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let endpoint = self.url(path);
        let request = self.authorize(self.http.get(&endpoint).query(query));
        send_json("GET", &endpoint, request)
    }

    pub fn put_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let endpoint = self.url(path);
        let request = self.authorize(self.http.put(&endpoint).json(body));
        send_json("PUT", &endpoint, request)
    }
}

fn send_json(method: &str, endpoint: &str, request: RequestBuilder) -> Result<Value, ApiError> {
    let failure = |cause: String, body: Option<String>| ApiError {
        method: method.to_string(),
        endpoint: endpoint.to_string(),
        cause,
        body,
    };

    tracing::debug!(method, endpoint, "atlassian request");
    let response = request.send().map_err(|err| failure(err.to_string(), None))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|err| failure(format!("HTTP {status}: unreadable body: {err}"), None))?;
    if !status.is_success() {
        return Err(failure(format!("HTTP {status}"), Some(text)));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|err| failure(format!("invalid JSON: {err}"), Some(text)))
}
