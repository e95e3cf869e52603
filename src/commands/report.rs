use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use crate::atlassian::confluence::ConfluenceClient;
use crate::brief::llm::build_generator;
use crate::brief::pipeline::{PipelineContext, ReportOptions, ReportOutcome, report_for_project};
use crate::brief::publish::ReportRenderer;
use crate::commands::{CommandReport, Session, ensure_wiki_configured};

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub project: Option<String>,
    pub year: Option<i32>,
    pub dry_run: bool,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn describe_outcome(report: &mut CommandReport, project: &str, outcome: &ReportOutcome) {
    report.detail(format!("{project}: contexts={}", outcome.contexts));
    if let Some(path) = &outcome.preview_path {
        report.detail(format!("{project}: preview={}", path.display()));
    }
    if let Some(version) = outcome.published_version {
        report.detail(format!("{project}: published version={version}"));
    }
}

pub fn run_with(session: &Session, opts: &PublishOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("report");
    if opts.dry_run {
        report.detail("report.dry_run=true");
    }
    let projects = session.projects(opts.project.as_deref(), &mut report);
    if projects.is_empty() {
        return Ok(report);
    }
    if !opts.dry_run && !ensure_wiki_configured(&session.cfg, &mut report) {
        return Ok(report);
    }

    let renderer =
        ReportRenderer::from_config(&session.cfg.report).context("failed to load report template")?;
    let generator = build_generator(&session.cfg.llm)?;
    let wiki = ConfluenceClient::new(&session.cfg.wiki)?;
    let ctx = PipelineContext {
        cfg: &session.cfg,
        paths: &session.paths,
        cache: &session.cache,
        generator: generator.as_ref(),
    };
    let report_opts = ReportOptions {
        today: today(),
        year: opts.year,
        dry_run: opts.dry_run,
    };

    for project in projects {
        match report_for_project(&ctx, &renderer, &wiki, project, report_opts) {
            Ok(outcome) => describe_outcome(&mut report, &project.name, &outcome),
            Err(err) => {
                tracing::error!(project = %project.name, error = ?err, "report failed");
                report.issue(format!("{}: {err:#}", project.name));
            }
        }
    }
    Ok(report)
}

pub fn run(opts: &PublishOptions) -> Result<CommandReport> {
    let session = Session::open()?;
    run_with(&session, opts)
}
