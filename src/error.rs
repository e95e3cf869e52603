use thiserror::Error;

/// Failure of one text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("structured output failed validation: {0}")]
    SchemaValidation(String),
    #[error("{provider} stopped at the token limit: {detail}")]
    TokenLimitExceeded { provider: String, detail: String },
    #[error("{provider} call failed: {message}")]
    Provider { provider: String, message: String },
}

impl GenerationError {
    /// Failures that only cost the current issue, not the whole run.
    pub fn skips_issue(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation(_) | Self::TokenLimitExceeded { .. }
        )
    }
}

/// Tracker or wiki request failure.
#[derive(Debug, Error)]
#[error("{method} {endpoint} failed: {cause}{}", render_body(.body))]
pub struct ApiError {
    pub method: String,
    pub endpoint: String,
    pub cause: String,
    pub body: Option<String>,
}

fn render_body(body: &Option<String>) -> String {
    match body.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("\nresponse body: {text}"),
        _ => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("context cache unavailable at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("context cache directory unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("context cache query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("context cache row {key} is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("context cache serialisation failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template file unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("template is invalid: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("rendering failed: {0}")]
    Render(#[from] handlebars::RenderError),
}
