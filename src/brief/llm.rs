use crate::brief::config::LlmConfig;
use crate::error::GenerationError;
use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;

const SCRUM_MASTER_PROMPT: &str = "You are scrum master managing project team for which you need to report various information from Jira backlog to project manager. Your project is agile project with 2 weeks sprints and follows the standard flow of design, architecture, build and so on.";
const PROJECT_MANAGER_PROMPT: &str = "You are project manager who has to report executive summaries about project status to management board. Your project is agile project with 2 weeks sprints and follows the standard flow of design, architecture, build and so on. You get information from scrum master which you have to transform to high level summary for final report.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    ScrumMaster,
    ProjectManager,
}

impl Persona {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::ScrumMaster => SCRUM_MASTER_PROMPT,
            Persona::ProjectManager => PROJECT_MANAGER_PROMPT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub persona: Persona,
    pub prompt: String,
    /// JSON schema the reply must satisfy; `None` asks for plain text.
    pub schema: Option<Value>,
}

impl CompletionRequest {
    pub fn text(persona: Persona, prompt: impl Into<String>) -> Self {
        Self {
            persona,
            prompt: prompt.into(),
            schema: None,
        }
    }
}

pub trait TextGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAiCompatible,
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAiCompatible => "openai-compatible",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434",
            Provider::OpenAiCompatible => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

fn parse_provider_alias(raw: &str) -> Option<Provider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ollama" | "local" => Some(Provider::Ollama),
        "openai" | "openai-compatible" | "compatible" | "deepseek" => {
            Some(Provider::OpenAiCompatible)
        }
        "anthropic" | "claude" => Some(Provider::Anthropic),
        "gemini" | "google" => Some(Provider::Gemini),
        _ => None,
    }
}

/// `openai:gpt-4.1-mini` style model names carry their own provider.
fn parse_prefixed_model(raw: &str) -> (Option<Provider>, String) {
    let trimmed = raw.trim();
    if let Some((prefix, model)) = trimmed.split_once(':')
        && let Some(provider) = parse_provider_alias(prefix)
    {
        return (Some(provider), model.trim().to_string());
    }
    (None, trimmed.to_string())
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn resolve_api_key(provider: Provider, configured: Option<&str>) -> Option<String> {
    if let Some(key) = configured.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    match provider {
        Provider::Ollama => None,
        Provider::OpenAiCompatible => {
            env_non_empty("OPENAI_API_KEY").or_else(|| env_non_empty("DEEPSEEK_API_KEY"))
        }
        Provider::Anthropic => env_non_empty("ANTHROPIC_API_KEY"),
        Provider::Gemini => env_non_empty("GEMINI_API_KEY"),
    }
}

/// Connection details shared by every provider adapter.
#[derive(Debug, Clone)]
pub struct ModelEndpoint {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    client: Client,
}

impl ModelEndpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self, provider: Provider) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| provider_error(provider, "api key missing".to_string()))
    }
}

pub struct OllamaGenerator(pub ModelEndpoint);
pub struct OpenAiCompatGenerator(pub ModelEndpoint);
pub struct AnthropicGenerator(pub ModelEndpoint);
pub struct GeminiGenerator(pub ModelEndpoint);

fn provider_error(provider: Provider, message: String) -> GenerationError {
    GenerationError::Provider {
        provider: provider.label().to_string(),
        message,
    }
}

fn token_limit(provider: Provider, detail: &str) -> GenerationError {
    GenerationError::TokenLimitExceeded {
        provider: provider.label().to_string(),
        detail: detail.to_string(),
    }
}

fn read_json(provider: Provider, response: Response) -> Result<Value, GenerationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(provider_error(
            provider,
            format!("status {status}: {}", body.trim()),
        ));
    }
    response
        .json::<Value>()
        .map_err(|err| provider_error(provider, format!("invalid json response: {err}")))
}

fn missing_text(provider: Provider) -> GenerationError {
    provider_error(provider, "response missing text content".to_string())
}

fn extract_ollama_reply(json: &Value) -> Result<String, GenerationError> {
    if json.get("done_reason").and_then(Value::as_str) == Some("length") {
        return Err(token_limit(Provider::Ollama, "done_reason=length"));
    }
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_text(Provider::Ollama))
}

fn extract_openai_compatible_reply(json: &Value) -> Result<String, GenerationError> {
    let first = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| missing_text(Provider::OpenAiCompatible))?;
    if first.get("finish_reason").and_then(Value::as_str) == Some("length") {
        return Err(token_limit(Provider::OpenAiCompatible, "finish_reason=length"));
    }
    let content = first
        .get("message")
        .and_then(|m| m.get("content"))
        .ok_or_else(|| missing_text(Provider::OpenAiCompatible))?;
    match content {
        Value::String(s) => Ok(s.to_string()),
        Value::Array(parts) => {
            let chunks: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if chunks.is_empty() {
                Err(missing_text(Provider::OpenAiCompatible))
            } else {
                Ok(chunks.join("\n"))
            }
        }
        _ => Err(missing_text(Provider::OpenAiCompatible)),
    }
}

fn extract_anthropic_reply(json: &Value) -> Result<String, GenerationError> {
    if json.get("stop_reason").and_then(Value::as_str) == Some("max_tokens") {
        return Err(token_limit(Provider::Anthropic, "stop_reason=max_tokens"));
    }
    let chunks: Vec<&str> = json
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if chunks.is_empty() {
        return Err(missing_text(Provider::Anthropic));
    }
    Ok(chunks.join("\n"))
}

fn extract_gemini_reply(json: &Value) -> Result<String, GenerationError> {
    let candidate = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| missing_text(Provider::Gemini))?;
    if candidate.get("finishReason").and_then(Value::as_str) == Some("MAX_TOKENS") {
        return Err(token_limit(Provider::Gemini, "finishReason=MAX_TOKENS"));
    }
    candidate
        .get("content")
        .and_then(|v| v.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|v| v.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_text(Provider::Gemini))
}

impl TextGenerator for OllamaGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let ep = &self.0;
        let mut payload = json!({
            "model": ep.model,
            "stream": false,
            "messages": [
                {"role": "system", "content": request.persona.system_prompt()},
                {"role": "user", "content": request.prompt}
            ],
            "options": {
                "temperature": ep.temperature,
                "num_predict": ep.max_tokens
            }
        });
        if let Some(schema) = &request.schema {
            payload["format"] = schema.clone();
        }

        let response = ep
            .client
            .post(ep.url("/api/chat"))
            .json(&payload)
            .send()
            .map_err(|err| provider_error(Provider::Ollama, err.to_string()))?;
        extract_ollama_reply(&read_json(Provider::Ollama, response)?)
    }
}

impl TextGenerator for OpenAiCompatGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let ep = &self.0;
        let api_key = ep.api_key(Provider::OpenAiCompatible)?;
        let mut payload = json!({
            "model": ep.model,
            "messages": [
                {"role": "system", "content": request.persona.system_prompt()},
                {"role": "user", "content": request.prompt}
            ],
            "temperature": ep.temperature,
            "max_tokens": ep.max_tokens
        });
        if request.schema.is_some() {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let response = ep
            .client
            .post(ep.url("/v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .map_err(|err| provider_error(Provider::OpenAiCompatible, err.to_string()))?;
        extract_openai_compatible_reply(&read_json(Provider::OpenAiCompatible, response)?)
    }
}

impl TextGenerator for AnthropicGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let ep = &self.0;
        let api_key = ep.api_key(Provider::Anthropic)?;
        let payload = json!({
            "model": ep.model,
            "max_tokens": ep.max_tokens,
            "temperature": ep.temperature,
            "system": request.persona.system_prompt(),
            "messages": [
                {"role": "user", "content": request.prompt}
            ]
        });

        let response = ep
            .client
            .post(ep.url("/v1/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .map_err(|err| provider_error(Provider::Anthropic, err.to_string()))?;
        extract_anthropic_reply(&read_json(Provider::Anthropic, response)?)
    }
}

impl TextGenerator for GeminiGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let ep = &self.0;
        let api_key = ep.api_key(Provider::Gemini)?;
        let mut generation_config = json!({
            "temperature": ep.temperature,
            "maxOutputTokens": ep.max_tokens
        });
        if request.schema.is_some() {
            generation_config["responseMimeType"] = json!("application/json");
        }
        let payload = json!({
            "systemInstruction": {"parts": [{"text": request.persona.system_prompt()}]},
            "contents": [{"parts": [{"text": request.prompt}]}],
            "generationConfig": generation_config
        });

        let url = ep.url(&format!("/v1beta/models/{}:generateContent", ep.model));
        let response = ep
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .map_err(|err| provider_error(Provider::Gemini, err.to_string()))?;
        extract_gemini_reply(&read_json(Provider::Gemini, response)?)
    }
}

pub fn resolve_provider(cfg: &LlmConfig) -> Result<(Provider, String)> {
    let (prefixed, model) = parse_prefixed_model(&cfg.model);
    let provider = match prefixed {
        Some(p) => p,
        None => parse_provider_alias(&cfg.provider)
            .ok_or_else(|| anyhow!("unknown llm provider `{}`", cfg.provider))?,
    };
    if model.is_empty() {
        return Err(anyhow!("llm model cannot be empty"));
    }
    Ok((provider, model))
}

pub fn build_generator(cfg: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    let (provider, model) = resolve_provider(cfg)?;
    let api_key = resolve_api_key(provider, cfg.api_key.as_deref());
    if provider != Provider::Ollama && api_key.is_none() {
        return Err(anyhow!(
            "{} provider needs an api key; set BRIEF_LLM_API_KEY",
            provider.label()
        ));
    }
    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("failed to build llm http client")?;
    let endpoint = ModelEndpoint {
        model,
        base_url: cfg
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string()),
        api_key,
        temperature: cfg.temperature,
        max_tokens: cfg.max_tokens,
        client,
    };
    tracing::debug!(
        provider = provider.label(),
        model = %endpoint.model,
        base_url = %endpoint.base_url,
        "text generator ready"
    );

    Ok(match provider {
        Provider::Ollama => Box::new(OllamaGenerator(endpoint)),
        Provider::OpenAiCompatible => Box::new(OpenAiCompatGenerator(endpoint)),
        Provider::Anthropic => Box::new(AnthropicGenerator(endpoint)),
        Provider::Gemini => Box::new(GeminiGenerator(endpoint)),
    })
}
