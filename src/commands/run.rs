use anyhow::{Context, Result};

use crate::atlassian::confluence::ConfluenceClient;
use crate::atlassian::jira::JiraClient;
use crate::brief::llm::build_generator;
use crate::brief::pipeline::{
    PipelineContext, ReportOptions, distill_for_project, report_for_project,
};
use crate::brief::publish::ReportRenderer;
use crate::commands::{
    CommandReport, Session, distill, ensure_tracker_configured, ensure_wiki_configured, report,
};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub project: Option<String>,
    pub year: Option<i32>,
    pub dry_run: bool,
}

/// Distil then publish each project in turn. A failing project is reported
/// and the next one still runs.
pub fn run_with(session: &Session, opts: &RunOptions) -> Result<CommandReport> {
    let mut out = CommandReport::new("run");
    if opts.dry_run {
        out.detail("run.dry_run=true");
    }
    let projects = session.projects(opts.project.as_deref(), &mut out);
    if projects.is_empty() || !ensure_tracker_configured(&session.cfg, &mut out) {
        return Ok(out);
    }
    if !opts.dry_run && !ensure_wiki_configured(&session.cfg, &mut out) {
        return Ok(out);
    }

    let renderer =
        ReportRenderer::from_config(&session.cfg.report).context("failed to load report template")?;
    let generator = build_generator(&session.cfg.llm)?;
    let jira = JiraClient::new(&session.cfg.tracker)?;
    let wiki = ConfluenceClient::new(&session.cfg.wiki)?;
    let ctx = PipelineContext {
        cfg: &session.cfg,
        paths: &session.paths,
        cache: &session.cache,
        generator: generator.as_ref(),
    };
    let report_opts = ReportOptions {
        today: report::today(),
        year: opts.year,
        dry_run: opts.dry_run,
    };

    for project in projects {
        let _span = tracing::info_span!("project", name = %project.name).entered();
        let distilled = match distill_for_project(&ctx, &jira, project, opts.dry_run) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = ?err, "distillation failed");
                out.issue(format!("{}: {err:#}", project.name));
                continue;
            }
        };
        distill::describe_outcome(&mut out, &project.name, &distilled);

        match report_for_project(&ctx, &renderer, &wiki, project, report_opts) {
            Ok(outcome) => report::describe_outcome(&mut out, &project.name, &outcome),
            Err(err) => {
                tracing::error!(error = ?err, "report failed");
                out.issue(format!("{}: {err:#}", project.name));
            }
        }
    }
    Ok(out)
}

pub fn run(opts: &RunOptions) -> Result<CommandReport> {
    let session = Session::open()?;
    run_with(&session, opts)
}
