use anyhow::Result;

use crate::brief::cache::ContextCache;
use crate::brief::config::{IssueSource, load_config};
use crate::brief::llm::resolve_provider;
use crate::brief::paths::resolve_paths;
use crate::commands::CommandReport;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("brief_home={}", paths.brief_home.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("cache_db={}", paths.cache_db.display()));
    report.detail(format!("preview_dir={}", paths.preview_dir.display()));

    if !paths.config_file.exists() {
        report.detail("config_file missing; built-in defaults and BRIEF_* overrides apply");
    }
    match load_config(&paths) {
        Ok(cfg) => {
            match resolve_provider(&cfg.llm) {
                Ok((provider, model)) => {
                    report.detail(format!("llm={}:{model}", provider.label()));
                }
                Err(err) => report.issue(format!("llm config invalid: {err}")),
            }
            report.detail(format!("projects={}", cfg.projects.len()));
            for project in &cfg.projects {
                let source = match project.issue_source() {
                    Ok(IssueSource::Jql(jql)) => format!("jql=\"{jql}\""),
                    Ok(IssueSource::SavedFilter(id)) => format!("filter={id}"),
                    Err(err) => err.to_string(),
                };
                report.detail(format!(
                    "project {} page={} epic={} {source}",
                    project.name, project.page_id, project.epic
                ));
            }
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    if !paths.cache_db.exists() {
        report.detail("cache=empty");
        return Ok(report);
    }
    match ContextCache::open(&paths.cache_db) {
        Ok(cache) => {
            let keys = cache.list_all_keys()?;
            report.detail(format!(
                "cached_issues={} in {}",
                keys.len(),
                cache.path().display()
            ));
            for (page_id, count) in cache.report_counts()? {
                report.detail(format!("cache page={page_id} contexts={count}"));
            }
        }
        Err(err) => report.issue(format!("cache unreadable: {err}")),
    }

    Ok(report)
}
