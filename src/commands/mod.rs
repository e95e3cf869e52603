pub mod distill;
pub mod report;
pub mod run;
pub mod status;

use crate::brief::cache::ContextCache;
use crate::brief::config::{BriefConfig, ProjectConfig, load_config};
use crate::brief::paths::{BriefPaths, resolve_paths};
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Resolved paths, validated configuration and an open cache.
pub struct Session {
    pub paths: BriefPaths,
    pub cfg: BriefConfig,
    pub cache: ContextCache,
}

impl Session {
    pub fn open() -> Result<Self> {
        let paths = resolve_paths()?;
        let cfg = load_config(&paths)?;
        let cache = ContextCache::open(&paths.cache_db).with_context(|| {
            format!("failed to open context cache {}", paths.cache_db.display())
        })?;
        Ok(Self { paths, cfg, cache })
    }

    /// Projects to work on; records an issue and returns an empty list when
    /// nothing matches.
    pub fn projects(&self, only: Option<&str>, report: &mut CommandReport) -> Vec<&ProjectConfig> {
        if self.cfg.projects.is_empty() {
            report.issue(format!(
                "no projects configured in {}",
                self.paths.config_file.display()
            ));
            return Vec::new();
        }
        match self.cfg.selected_projects(only) {
            Ok(projects) => projects,
            Err(err) => {
                report.issue(err.to_string());
                Vec::new()
            }
        }
    }
}

pub fn ensure_tracker_configured(cfg: &BriefConfig, report: &mut CommandReport) -> bool {
    if cfg.tracker.base_url.trim().is_empty() {
        report.issue("tracker base_url missing; set [tracker].base_url or BRIEF_JIRA_URL");
        return false;
    }
    true
}

pub fn ensure_wiki_configured(cfg: &BriefConfig, report: &mut CommandReport) -> bool {
    if cfg.wiki.base_url.trim().is_empty() {
        report.issue("wiki base_url missing; set [wiki].base_url or BRIEF_CONFLUENCE_URL");
        return false;
    }
    true
}
