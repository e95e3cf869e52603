use crate::brief::model::{Prerequisite, RaciEntry};
use crate::brief::paths::BriefPaths;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_CLOSED_STATES: [&str; 7] = [
    "Implemented",
    "Delivered",
    "Done (Accepted)",
    "Closed",
    "Fixed",
    "Done",
    "verworfen",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub base_url: String,
    pub token: String,
    pub max_results: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            max_results: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WikiConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "granite4".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sprint_length_days: u32,
    pub chunk_budget_chars: usize,
    pub description_max_chars: usize,
    pub summary_max_chars: usize,
    pub rollup_lines: usize,
    pub closed_states: Vec<String>,
    pub timeline_year: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sprint_length_days: 14,
            chunk_budget_chars: 3800,
            description_max_chars: 2048,
            summary_max_chars: 255,
            rollup_lines: 5,
            closed_states: DEFAULT_CLOSED_STATES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            timeline_year: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub template_path: Option<String>,
    pub write_preview: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template_path: None,
            write_preview: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub page_id: String,
    pub epic: String,
    #[serde(default)]
    pub jql: Option<String>,
    #[serde(default)]
    pub filter_id: Option<String>,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub deliverables: String,
    #[serde(default)]
    pub success_criteria: String,
    pub due_date: NaiveDate,
    #[serde(default = "default_project_status")]
    pub status: String,
    #[serde(default)]
    pub status_description: String,
    #[serde(default)]
    pub architecture_url: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub raci: Vec<RaciEntry>,
}

fn default_project_status() -> String {
    "green".to_string()
}

/// Where a project's issues come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueSource {
    Jql(String),
    SavedFilter(String),
}

impl ProjectConfig {
    pub fn issue_source(&self) -> Result<IssueSource> {
        let jql = self.jql.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let filter = self
            .filter_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (jql, filter) {
            (Some(jql), None) => Ok(IssueSource::Jql(jql.to_string())),
            (None, Some(id)) => Ok(IssueSource::SavedFilter(id.to_string())),
            (Some(_), Some(_)) => Err(anyhow!(
                "project `{}` sets both jql and filter_id; keep one",
                self.name
            )),
            (None, None) => Err(anyhow!(
                "project `{}` needs either jql or filter_id",
                self.name
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BriefConfig {
    pub tracker: TrackerConfig,
    pub wiki: WikiConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub report: ReportConfig,
    pub projects: Vec<ProjectConfig>,
}

impl BriefConfig {
    pub fn selected_projects(&self, only: Option<&str>) -> Result<Vec<&ProjectConfig>> {
        let Some(name) = only.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(self.projects.iter().collect());
        };
        let picked: Vec<_> = self
            .projects
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .collect();
        if picked.is_empty() {
            return Err(anyhow!("no project named `{name}` in configuration"));
        }
        Ok(picked)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialBriefConfig {
    tracker: Option<TrackerConfig>,
    wiki: Option<WikiConfig>,
    llm: Option<LlmConfig>,
    pipeline: Option<PipelineConfig>,
    report: Option<ReportConfig>,
    #[serde(default)]
    projects: Vec<ProjectConfig>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_parsed<T: std::str::FromStr>(var: &str, fallback: T) -> T {
    match env_non_empty(var) {
        Some(v) => v.parse::<T>().unwrap_or(fallback),
        None => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env_non_empty(var).as_deref() {
        Some("1" | "true" | "TRUE" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "no" | "off") => false,
        _ => fallback,
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    let Some(raw) = env_non_empty(var) else {
        return fallback.to_vec();
    };
    let out = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    if out.is_empty() { fallback.to_vec() } else { out }
}

fn validate(cfg: &BriefConfig) -> Result<()> {
    let p = &cfg.pipeline;
    if p.sprint_length_days == 0 {
        return Err(anyhow!("invalid sprint length: must be >= 1 day"));
    }
    if p.summary_max_chars == 0 {
        return Err(anyhow!("invalid summary length: must be >= 1 character"));
    }
    if p.chunk_budget_chars <= p.summary_max_chars {
        return Err(anyhow!(
            "invalid chunk budget: require summary_max_chars < chunk_budget_chars"
        ));
    }
    if p.description_max_chars == 0 {
        return Err(anyhow!("invalid description limit: must be >= 1 character"));
    }
    if p.rollup_lines == 0 {
        return Err(anyhow!("invalid rollup line count: must be >= 1"));
    }
    if p.closed_states.is_empty() {
        return Err(anyhow!("invalid closed states: list cannot be empty"));
    }
    if cfg.llm.timeout_secs == 0 {
        return Err(anyhow!("invalid llm timeout: must be >= 1 second"));
    }

    let mut names = BTreeSet::new();
    for project in &cfg.projects {
        if project.name.trim().is_empty() {
            return Err(anyhow!("invalid project: name cannot be empty"));
        }
        if project.page_id.trim().is_empty() {
            return Err(anyhow!("project `{}` has an empty page_id", project.name));
        }
        if !names.insert(project.name.to_ascii_lowercase()) {
            return Err(anyhow!("duplicate project name `{}`", project.name));
        }
        project.issue_source()?;
    }
    Ok(())
}

fn merge_partial(base: &mut BriefConfig, parsed: PartialBriefConfig) {
    if let Some(tracker) = parsed.tracker {
        base.tracker = tracker;
    }
    if let Some(wiki) = parsed.wiki {
        base.wiki = wiki;
    }
    if let Some(llm) = parsed.llm {
        base.llm = llm;
    }
    if let Some(pipeline) = parsed.pipeline {
        base.pipeline = pipeline;
    }
    if let Some(report) = parsed.report {
        base.report = report;
    }
    base.projects = parsed.projects;
}

fn merge_file_config(base: &mut BriefConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: PartialBriefConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse brief config {}: {err}", path.display()))?;
    merge_partial(base, parsed);
    Ok(())
}

fn apply_env_overrides(cfg: &mut BriefConfig) {
    cfg.tracker.base_url = env_or_string("BRIEF_JIRA_URL", &cfg.tracker.base_url);
    cfg.tracker.token = env_or_string("BRIEF_JIRA_TOKEN", &cfg.tracker.token);
    cfg.tracker.max_results = env_or_parsed("BRIEF_JIRA_MAX_RESULTS", cfg.tracker.max_results);
    cfg.wiki.base_url = env_or_string("BRIEF_CONFLUENCE_URL", &cfg.wiki.base_url);
    cfg.wiki.token = env_or_string("BRIEF_CONFLUENCE_TOKEN", &cfg.wiki.token);

    cfg.llm.provider = env_or_string("BRIEF_LLM_PROVIDER", &cfg.llm.provider);
    cfg.llm.model = env_or_string("BRIEF_LLM_MODEL", &cfg.llm.model);
    if let Some(base_url) = env_non_empty("BRIEF_LLM_BASE_URL") {
        cfg.llm.base_url = Some(base_url);
    }
    if let Some(api_key) = env_non_empty("BRIEF_LLM_API_KEY") {
        cfg.llm.api_key = Some(api_key);
    }
    cfg.llm.temperature = env_or_parsed("BRIEF_LLM_TEMPERATURE", cfg.llm.temperature);
    cfg.llm.max_tokens = env_or_parsed("BRIEF_LLM_MAX_TOKENS", cfg.llm.max_tokens);
    cfg.llm.timeout_secs = env_or_parsed("BRIEF_LLM_TIMEOUT_SECS", cfg.llm.timeout_secs);

    let p = &mut cfg.pipeline;
    p.sprint_length_days = env_or_parsed("BRIEF_SPRINT_LENGTH_DAYS", p.sprint_length_days);
    p.chunk_budget_chars = env_or_parsed("BRIEF_CHUNK_BUDGET_CHARS", p.chunk_budget_chars);
    p.description_max_chars =
        env_or_parsed("BRIEF_DESCRIPTION_MAX_CHARS", p.description_max_chars);
    p.closed_states = env_or_csv("BRIEF_CLOSED_STATES", &p.closed_states);
    if let Some(year) = env_non_empty("BRIEF_TIMELINE_YEAR").and_then(|v| v.parse().ok()) {
        p.timeline_year = Some(year);
    }

    if let Some(template) = env_non_empty("BRIEF_TEMPLATE_PATH") {
        cfg.report.template_path = Some(template);
    }
    cfg.report.write_preview = env_or_bool("BRIEF_WRITE_PREVIEW", cfg.report.write_preview);
}

pub fn parse_config_str(raw: &str) -> Result<BriefConfig> {
    let mut cfg = BriefConfig::default();
    let parsed: PartialBriefConfig =
        toml::from_str(raw).map_err(|err| anyhow!("failed to parse brief config: {err}"))?;
    merge_partial(&mut cfg, parsed);
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(paths: &BriefPaths) -> Result<BriefConfig> {
    let mut cfg = BriefConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
