//! Per-project orchestration: fetch, distil, roll up, render, publish.

use crate::atlassian::confluence::ConfluenceClient;
use crate::atlassian::jira::JiraClient;
use crate::brief::audit::append_event;
use crate::brief::cache::ContextCache;
use crate::brief::chunk::ChunkSummarizer;
use crate::brief::config::{BriefConfig, ProjectConfig};
use crate::brief::distill::{DistillJob, DistillOutcome, distill_project};
use crate::brief::llm::TextGenerator;
use crate::brief::paths::BriefPaths;
use crate::brief::publish::{ReportRenderer, write_preview};
use crate::brief::report::assemble;
use crate::brief::rollup::build_rollups;
use crate::brief::timeline::build_timeline;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

pub struct PipelineContext<'a> {
    pub cfg: &'a BriefConfig,
    pub paths: &'a BriefPaths,
    pub cache: &'a ContextCache,
    pub generator: &'a dyn TextGenerator,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub today: NaiveDate,
    pub year: Option<i32>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReportOutcome {
    pub contexts: usize,
    pub preview_path: Option<PathBuf>,
    pub published_version: Option<u64>,
}

pub fn distill_for_project(
    ctx: &PipelineContext<'_>,
    jira: &JiraClient,
    project: &ProjectConfig,
    dry_run: bool,
) -> Result<DistillOutcome> {
    let source = project.issue_source()?;
    let issues = jira
        .fetch(&source)
        .with_context(|| format!("failed to fetch issues for {}", project.name))?;
    tracing::info!(project = %project.name, issues = issues.len(), "issues fetched");

    let job = DistillJob {
        project: &project.name,
        report_id: &project.page_id,
        dry_run,
    };
    distill_project(
        &job,
        &issues,
        ctx.cache,
        ctx.generator,
        &ctx.cfg.pipeline,
        ctx.paths,
    )
}

/// Builds the report from cached context only. Nothing is published unless
/// every step before it succeeded.
pub fn report_for_project(
    ctx: &PipelineContext<'_>,
    renderer: &ReportRenderer,
    wiki: &ConfluenceClient,
    project: &ProjectConfig,
    opts: ReportOptions,
) -> Result<ReportOutcome> {
    let pipeline = &ctx.cfg.pipeline;
    let contexts = ctx
        .cache
        .contexts_for_report(&project.page_id)
        .with_context(|| format!("failed to load cached context for {}", project.name))?;
    tracing::info!(project = %project.name, contexts = contexts.len(), "building report");

    let rollups = build_rollups(&contexts, pipeline, opts.today, ctx.generator)
        .with_context(|| format!("category rollups failed for {}", project.name))?;

    let year = opts
        .year
        .or(pipeline.timeline_year)
        .unwrap_or_else(|| opts.today.year());
    let summarizer = ChunkSummarizer::new(
        ctx.generator,
        pipeline.chunk_budget_chars,
        pipeline.summary_max_chars,
    );
    let timeline = build_timeline(&contexts, year, &summarizer)
        .with_context(|| format!("timeline failed for {}", project.name))?;

    let report = assemble(
        project,
        rollups,
        timeline,
        &ctx.cfg.tracker.base_url,
        wiki.base_url(),
    );
    let html = renderer
        .render(&report)
        .with_context(|| format!("failed to render report for {}", project.name))?;

    let mut outcome = ReportOutcome {
        contexts: contexts.len(),
        ..ReportOutcome::default()
    };
    if opts.dry_run || ctx.cfg.report.write_preview {
        outcome.preview_path = Some(write_preview(
            &ctx.paths.preview_dir,
            &project.page_id,
            &html,
        )?);
    }
    if opts.dry_run {
        append_event(ctx.paths, "publish", "dry-run", &project.name, &project.page_id)?;
        return Ok(outcome);
    }

    let version = wiki
        .update_page(&project.page_id, &html)
        .with_context(|| format!("failed to publish {}", project.name))?;
    append_event(
        ctx.paths,
        "publish",
        "ok",
        &project.name,
        &format!("page {} version {version}", project.page_id),
    )?;
    outcome.published_version = Some(version);
    Ok(outcome)
}
